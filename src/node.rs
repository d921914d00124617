//! Per-mote event handlers
//!
//! [`MoteNode`] owns everything a mote keeps in memory: its queues, builder,
//! annotator and (on the root) the aggregator. Handlers are synchronous,
//! non-blocking and take the current time explicitly, so the same node runs
//! under the async [`Driver`](crate::driver::Driver) and under step-by-step
//! simulations in tests.
//!
//! The role is chosen once from the configuration. Handlers a role has no
//! capability for are counted and ignored.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::aggregator::RootAggregator;
use crate::annotator::{Annotation, PathAnnotator};
use crate::builder::MessageBuilder;
use crate::config::NodeConfig;
use crate::provider::RadioFrame;
use crate::queue::{Completion, ForwardingQueue, QueueStats, SendOutcome};
use crate::sampler::SampleSource;
use crate::types::{
    AccelerationSample, Capabilities, CollectionPacket, LinkEstimate, Millis, NodeId, NodeRole,
    NodeState, QueueKind,
};
use crate::wire::decode_packet;
use crate::Result;

/// Snapshot of a node's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub node_id: NodeId,
    pub role: NodeRole,
    pub state: NodeState,
    pub samples_taken: u64,
    pub samples_missed: u64,
    pub samples_dropped: u64,
    pub packets_forwarded: u64,
    pub forward_drops: u64,
    pub paths_truncated: u64,
    pub packets_bridged: u64,
    pub malformed_frames: u64,
    pub ignored_events: u64,
    pub radio_depth: usize,
    pub radio: QueueStats,
    pub serial_depth: usize,
    pub serial: Option<QueueStats>,
}

/// Root-only state.
#[derive(Debug)]
struct RootSide {
    aggregator: RootAggregator,
    serial_queue: ForwardingQueue<CollectionPacket>,
}

#[derive(Debug)]
pub struct MoteNode {
    config: NodeConfig,
    role: NodeRole,
    state: NodeState,
    builder: MessageBuilder,
    annotator: PathAnnotator,
    sampler: SampleSource,
    /// Outbound radio queue, or the inbound radio queue on the root
    radio_queue: ForwardingQueue<CollectionPacket>,
    root: Option<RootSide>,
    samples_dropped: u64,
    packets_forwarded: u64,
    forward_drops: u64,
    paths_truncated: u64,
    malformed_frames: u64,
    ignored_events: u64,
}

impl MoteNode {
    /// Create an idle node from a validated configuration.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        let role = config.role();

        let radio_queue = ForwardingQueue::new(
            QueueKind::Radio,
            config.send_queue_depth,
            config.radio_waiting_ms,
            config.max_send_retries,
        );
        let root = (role == NodeRole::Root).then(|| RootSide {
            aggregator: RootAggregator::new(config.node_id, config.am_type),
            serial_queue: ForwardingQueue::new(
                QueueKind::Serial,
                config.uart_queue_depth,
                config.serial_waiting_ms,
                config.max_send_retries,
            ),
        });

        Ok(Self {
            builder: MessageBuilder::new(config.node_id, config.format),
            annotator: PathAnnotator,
            sampler: SampleSource::new(config.sampling_period_ms, 0),
            radio_queue,
            root,
            role,
            state: NodeState::Idle,
            config,
            samples_dropped: 0,
            packets_forwarded: 0,
            forward_drops: 0,
            paths_truncated: 0,
            malformed_frames: 0,
            ignored_events: 0,
        })
    }

    /// Leave `Idle` for the role's active state. Only the first call has an effect.
    pub fn start(&mut self, now: Millis) {
        if self.state != NodeState::Idle {
            warn!(node = %self.id(), state = ?self.state, "Node already started");
            return;
        }
        self.state = self.role.active_state();
        self.sampler = SampleSource::new(self.config.sampling_period_ms, now);
        info!(node = %self.id(), role = %self.role, format = %self.config.format, "Node started");
    }

    pub fn id(&self) -> NodeId {
        self.config.node_id
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn capabilities(&self) -> Capabilities {
        self.role.capabilities()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn active(&self) -> bool {
        self.state != NodeState::Idle
    }

    /// Whether the sampling period has elapsed.
    pub fn sample_due(&self, now: Millis) -> bool {
        self.active() && self.capabilities().samples && self.sampler.due(now)
    }

    /// Sampling timer fired. Returns the packet if one was queued.
    pub fn on_sample_tick(
        &mut self,
        now: Millis,
        reading: Result<AccelerationSample>,
        link: LinkEstimate,
    ) -> Option<CollectionPacket> {
        if !self.active() || !self.capabilities().samples {
            self.ignored_events += 1;
            return None;
        }

        let sample = self.sampler.on_tick(now, reading)?;
        let packet = self.builder.build(sample, link);
        match self.radio_queue.enqueue(packet, now) {
            Ok(()) => Some(packet),
            Err(e) => {
                self.samples_dropped += 1;
                debug!(node = %self.id(), "Sample dropped: {}", e);
                None
            }
        }
    }

    /// Raw frame delivered by the radio.
    pub fn on_radio_frame(&mut self, frame: &RadioFrame, link: LinkEstimate, now: Millis) -> bool {
        if frame.am_type != self.config.am_type {
            trace!(node = %self.id(), am_type = frame.am_type, "Ignoring foreign AM type");
            self.ignored_events += 1;
            return false;
        }
        match decode_packet(self.config.format, &frame.payload) {
            Ok(packet) => self.on_receive(packet, link, now),
            Err(e) => {
                self.malformed_frames += 1;
                debug!(node = %self.id(), source = %frame.source, "Malformed frame: {}", e);
                false
            }
        }
    }

    /// Packet delivered by the routing layer. Returns whether it was queued.
    ///
    /// Relays annotate and queue it for the next hop; the root queues it
    /// untouched for bridging.
    pub fn on_receive(&mut self, mut packet: CollectionPacket, link: LinkEstimate, now: Millis) -> bool {
        if !self.active() {
            self.ignored_events += 1;
            return false;
        }

        let caps = self.capabilities();
        if caps.forwards {
            if self.annotator.annotate(&mut packet, self.id(), link) == Annotation::Truncated {
                self.paths_truncated += 1;
            }
        } else if !caps.aggregates {
            trace!(node = %self.id(), origin = %packet.origin(), "Leaf does not forward");
            self.ignored_events += 1;
            return false;
        }

        match self.radio_queue.enqueue(packet, now) {
            Ok(()) => {
                if caps.forwards {
                    self.packets_forwarded += 1;
                }
                true
            }
            Err(e) => {
                self.forward_drops += 1;
                debug!(node = %self.id(), origin = %packet.origin(), "Transit packet dropped: {}", e);
                false
            }
        }
    }

    /// Radio pacing tick on a non-root node: next packet to transmit.
    pub fn poll_radio(&mut self, now: Millis) -> Option<CollectionPacket> {
        if !self.active() || self.role == NodeRole::Root {
            return None;
        }
        self.radio_queue.dequeue_for_send(now)
    }

    /// Report the result of the transmission handed out by [`poll_radio`](Self::poll_radio).
    pub fn complete_radio(&mut self, outcome: SendOutcome, now: Millis) -> Completion<CollectionPacket> {
        self.radio_queue.complete_send(outcome, now)
    }

    /// Radio pacing tick on the root: bridge one packet onto the serial queue.
    pub fn bridge(&mut self, now: Millis) -> Option<CollectionPacket> {
        if !self.active() {
            return None;
        }
        let root = self.root.as_mut()?;
        root.aggregator.pump(&mut self.radio_queue, &mut root.serial_queue, now)
    }

    /// Serial pacing tick on the root: next framed packet for the host.
    pub fn poll_serial(&mut self, now: Millis) -> Option<Vec<u8>> {
        if !self.active() {
            return None;
        }
        let root = self.root.as_mut()?;
        let packet = root.serial_queue.dequeue_for_send(now)?;
        match root.aggregator.frame_for_host(&packet) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(node = %self.config.node_id, "Cannot frame packet for host: {}", e);
                root.serial_queue.complete_send(SendOutcome::Failed, now);
                None
            }
        }
    }

    /// Report the result of the write handed out by [`poll_serial`](Self::poll_serial).
    pub fn complete_serial(&mut self, outcome: SendOutcome, now: Millis) -> Completion<CollectionPacket> {
        match self.root.as_mut() {
            Some(root) => root.serial_queue.complete_send(outcome, now),
            None => Completion::Idle,
        }
    }

    pub fn radio_queue(&self) -> &ForwardingQueue<CollectionPacket> {
        &self.radio_queue
    }

    pub fn serial_queue(&self) -> Option<&ForwardingQueue<CollectionPacket>> {
        self.root.as_ref().map(|root| &root.serial_queue)
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            node_id: self.config.node_id,
            role: self.role,
            state: self.state,
            samples_taken: self.sampler.produced(),
            samples_missed: self.sampler.missed(),
            samples_dropped: self.samples_dropped,
            packets_forwarded: self.packets_forwarded,
            forward_drops: self.forward_drops,
            paths_truncated: self.paths_truncated,
            packets_bridged: self.root.as_ref().map_or(0, |root| root.aggregator.bridged()),
            malformed_frames: self.malformed_frames,
            ignored_events: self.ignored_events,
            radio_depth: self.radio_queue.len(),
            radio: self.radio_queue.stats(),
            serial_depth: self.root.as_ref().map_or(0, |root| root.serial_queue.len()),
            serial: self.root.as_ref().map(|root| root.serial_queue.stats()),
        }
    }
}
