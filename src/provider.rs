//! Collaborator interfaces consumed by the collection layer
//!
//! The sensor driver, the tree-routing radio stack and the serial transport
//! live outside this crate. A node only sees them through these traits, so the
//! same driver runs against hardware bindings or the in-memory versions in
//! [`providers`](crate::providers).

use crate::types::{AccelerationSample, CollectionPacket, LinkEstimate, NodeId};
use crate::Result;

/// Radio payload as delivered to the receiving mote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioFrame {
    /// Mote that transmitted this hop
    pub source: NodeId,
    /// Active-message type used for dispatch
    pub am_type: u8,
    /// Encoded collection packet
    pub payload: Vec<u8>,
}

/// Accelerometer driver.
#[async_trait::async_trait]
pub trait SensorProvider: Send + 'static {
    /// Take one reading.
    ///
    /// The driver bounds this call by one sampling period; a read that fails
    /// or times out skips the cycle.
    async fn read(&mut self) -> Result<AccelerationSample>;
}

/// Tree-routing layer and radio underneath it.
#[async_trait::async_trait]
pub trait RadioTransport: Send + 'static {
    /// Send `packet` one hop toward the root.
    ///
    /// May fail when the link is busy, the parent does not acknowledge, or
    /// there is currently no route.
    async fn send(&mut self, packet: &CollectionPacket, am_type: u8) -> Result<()>;

    /// Current parent and link quality, `None` while there is no route.
    fn link_estimate(&self) -> Option<LinkEstimate>;
}

/// Serial uplink from the root to the host.
#[async_trait::async_trait]
pub trait SerialTransport: Send + 'static {
    /// Write one complete frame.
    async fn send(&mut self, frame: &[u8]) -> Result<()>;
}
