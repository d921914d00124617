//! In-memory collaborators
//!
//! - [`replay`]: sensor that replays recorded readings
//! - [`fabric`]: static collection tree connecting motes through channels
//! - [`serial`]: serial uplink writing frames into a host channel

pub mod fabric;
pub mod replay;
pub mod serial;

pub use fabric::{FabricRadio, MeshFabric};
pub use replay::ReplaySensor;
pub use serial::ChannelSerial;
