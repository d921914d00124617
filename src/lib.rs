//! Collection and forwarding layer for accelerometer sensor-network motes.
//!
//! Every mote samples a 3-axis accelerometer on a fixed period and sends the
//! reading toward a single root over a collection tree. Relays record their
//! id and link quality on the packet as it passes; the root bridges what it
//! receives onto a framed serial link to a host.
//!
//! # Features
//!
//! - **Bounded everything**: fixed-depth queues, fixed-capacity paths, no
//!   allocation growth under load
//! - **Explicit time**: handlers take `now`, so nodes run under the async
//!   [`Driver`] or step by step in tests
//! - **Three wire layouts**: see [`PacketFormat`]
//! - **Simulation**: [`MeshBuilder`] runs a whole tree on in-memory channels
//!
//! # Quick Start
//!
//! ```rust
//! use moteflow::{AccelerationSample, LinkEstimate, MoteNode, NodeConfig, NodeId, SendOutcome};
//!
//! # fn main() -> moteflow::Result<()> {
//! let mut mote = MoteNode::new(NodeConfig::new(NodeId(3)))?;
//! mote.start(0);
//!
//! let link = LinkEstimate::new(60, NodeId(7));
//! let packet = mote.on_sample_tick(0, Ok(AccelerationSample::new(10, -5, 100)), link);
//! assert_eq!(packet.map(|p| p.origin()), Some(NodeId(3)));
//!
//! let outgoing = mote.poll_radio(0);
//! assert!(outgoing.is_some());
//! mote.complete_radio(SendOutcome::Sent, 0);
//! assert!(mote.radio_queue().is_empty());
//! # Ok(())
//! # }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;
pub mod wire;

// Per-mote components
pub mod aggregator;
pub mod annotator;
pub mod builder;
pub mod config;
pub mod node;
pub mod queue;
pub mod sampler;

// Async runtime and collaborators
pub mod driver;
pub mod mesh;
pub mod provider;
pub mod providers;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

pub use aggregator::RootAggregator;
pub use annotator::{Annotation, PathAnnotator};
pub use builder::MessageBuilder;
pub use config::NodeConfig;
pub use node::{MoteNode, NodeStats};
pub use queue::{Completion, ForwardingQueue, QueueStats, SendOutcome};
pub use sampler::SampleSource;

// Runtime exports
pub use driver::{Driver, DriverHandle};
pub use mesh::{MeshBuilder, MeshConfig, MeshHandle, MeshNodeSpec};
pub use provider::{RadioFrame, RadioTransport, SensorProvider, SerialTransport};
pub use stream::DeframeExt;
