//! Static collection tree over in-memory channels
//!
//! Stands in for the tree-routing protocol and the radio: each mote has a
//! fixed parent and link quality, and a send delivers the encoded packet to
//! the parent's inbox. Routes can be changed or removed and send failures
//! injected while the mesh runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

use crate::provider::{RadioFrame, RadioTransport};
use crate::types::{CollectionPacket, LinkEstimate, NodeId, QueueKind};
use crate::wire::encode_packet;
use crate::{CollectionError, Result};

#[derive(Debug, Default)]
struct FabricState {
    routes: HashMap<NodeId, LinkEstimate>,
    inboxes: HashMap<NodeId, mpsc::Sender<RadioFrame>>,
    injected_failures: HashMap<NodeId, u32>,
    frames_delivered: u64,
}

/// Shared view of the simulated collection tree.
#[derive(Debug, Clone, Default)]
pub struct MeshFabric {
    state: Arc<Mutex<FabricState>>,
}

impl MeshFabric {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FabricState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a mote; returns its inbox.
    pub fn register(&self, id: NodeId, inbox_capacity: usize) -> mpsc::Receiver<RadioFrame> {
        let (tx, rx) = mpsc::channel(inbox_capacity.max(1));
        self.lock().inboxes.insert(id, tx);
        debug!(node = %id, "Mote attached to fabric");
        rx
    }

    /// Point `id` at `parent` with the given link quality.
    pub fn set_route(&self, id: NodeId, parent: NodeId, quality: u16) {
        self.lock().routes.insert(id, LinkEstimate::new(quality, parent));
    }

    /// Remove the route of `id`; its sends fail until a route is set again.
    pub fn clear_route(&self, id: NodeId) {
        self.lock().routes.remove(&id);
    }

    /// Make the next `count` sends from `id` fail as if unacknowledged.
    pub fn fail_next_sends(&self, id: NodeId, count: u32) {
        *self.lock().injected_failures.entry(id).or_default() += count;
    }

    /// Frames handed to a parent's inbox so far.
    pub fn frames_delivered(&self) -> u64 {
        self.lock().frames_delivered
    }

    pub fn link_estimate(&self, id: NodeId) -> Option<LinkEstimate> {
        self.lock().routes.get(&id).copied()
    }

    /// Radio handle for mote `id`.
    pub fn radio(&self, id: NodeId) -> FabricRadio {
        FabricRadio { id, fabric: self.clone() }
    }

    fn deliver(&self, from: NodeId, frame: RadioFrame) -> Result<()> {
        let mut state = self.lock();

        if let Some(remaining) = state.injected_failures.get_mut(&from) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CollectionError::send_failed(QueueKind::Radio, "no acknowledgement"));
            }
        }

        let route = state
            .routes
            .get(&from)
            .copied()
            .ok_or_else(|| CollectionError::send_failed(QueueKind::Radio, "no route to root"))?;
        let inbox = state.inboxes.get(&route.next_hop).ok_or_else(|| {
            CollectionError::send_failed(QueueKind::Radio, format!("parent {} unreachable", route.next_hop))
        })?;

        match inbox.try_send(frame) {
            Ok(()) => {
                state.frames_delivered += 1;
                trace!(%from, to = %route.next_hop, "Frame delivered");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(CollectionError::send_failed(QueueKind::Radio, "link busy")),
            Err(TrySendError::Closed(_)) => {
                Err(CollectionError::send_failed(QueueKind::Radio, format!("parent {} offline", route.next_hop)))
            }
        }
    }
}

/// One mote's radio on the fabric.
#[derive(Debug, Clone)]
pub struct FabricRadio {
    id: NodeId,
    fabric: MeshFabric,
}

#[async_trait::async_trait]
impl RadioTransport for FabricRadio {
    async fn send(&mut self, packet: &CollectionPacket, am_type: u8) -> Result<()> {
        let frame = RadioFrame { source: self.id, am_type, payload: encode_packet(packet) };
        self.fabric.deliver(self.id, frame)
    }

    fn link_estimate(&self) -> Option<LinkEstimate> {
        self.fabric.link_estimate(self.id)
    }
}
