//! Core types shared by every component of the collection layer.
//!
//! - [`CollectionPacket`] is the unit moved hop by hop toward the root
//! - [`Provenance`] holds the layout-specific path data, tagged by [`PacketFormat`]
//! - [`MessagePath`] is the fixed-capacity, bounds-checked provenance array
//! - [`NodeRole`] is fixed at startup and exposes its [`Capabilities`]

pub mod constants;
mod node;
mod packet;
mod path;
mod sample;

pub use node::{Capabilities, LinkEstimate, NodeId, NodeRole, NodeState, QueueKind};
pub use packet::{CollectionPacket, PacketFormat, Provenance};
pub use path::{MessagePath, PathPush};
pub use sample::AccelerationSample;

/// Millisecond timestamp on the node's local clock.
pub type Millis = u64;
