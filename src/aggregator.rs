//! Radio-to-serial bridge on the root

use tracing::{debug, trace};

use crate::queue::{ForwardingQueue, SendOutcome};
use crate::types::{CollectionPacket, Millis, NodeId};
use crate::wire::{SerialPacket, encode_frame, encode_packet};
use crate::Result;

/// Moves packets delivered over the radio onto the serial uplink.
///
/// Only the root owns one, and it is the only component that touches both
/// queues. Packets cross unmodified; framing is applied when the serial queue
/// hands an entry to the transport.
#[derive(Debug)]
pub struct RootAggregator {
    local: NodeId,
    am_type: u8,
    bridged: u64,
    deferred: u64,
}

impl RootAggregator {
    pub fn new(local: NodeId, am_type: u8) -> Self {
        Self { local, am_type, bridged: 0, deferred: 0 }
    }

    /// Move at most one packet from `radio` to `serial`.
    ///
    /// Runs on the radio pacing tick. A full serial queue counts as a failed
    /// send on the radio side, so the packet gets the same bounded retries as
    /// any other send before it is dropped.
    pub fn pump(
        &mut self,
        radio: &mut ForwardingQueue<CollectionPacket>,
        serial: &mut ForwardingQueue<CollectionPacket>,
        now: Millis,
    ) -> Option<CollectionPacket> {
        let packet = radio.dequeue_for_send(now)?;
        match serial.enqueue(packet, now) {
            Ok(()) => {
                radio.complete_send(SendOutcome::Sent, now);
                self.bridged += 1;
                trace!(origin = %packet.origin(), hop_count = packet.hop_count(), "Bridged to serial");
                Some(packet)
            }
            Err(e) => {
                radio.complete_send(SendOutcome::Failed, now);
                self.deferred += 1;
                debug!(origin = %packet.origin(), "Bridge deferred: {}", e);
                None
            }
        }
    }

    /// Frame a packet for the host.
    pub fn frame_for_host(&self, packet: &CollectionPacket) -> Result<Vec<u8>> {
        encode_frame(&SerialPacket::to_host(self.local, self.am_type, encode_packet(packet)))
    }

    pub fn bridged(&self) -> u64 {
        self.bridged
    }

    /// Bridge attempts refused by a full serial queue.
    pub fn deferred(&self) -> u64 {
        self.deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::constants::{AM_ACCELERATION_MSG, UART_QUEUE_DEPTH};
    use crate::types::{AccelerationSample, LinkEstimate, PacketFormat, QueueKind};
    use crate::wire::{decode_frame, decode_packet};
    use crate::MessageBuilder;

    fn packet(origin: u16) -> CollectionPacket {
        MessageBuilder::new(NodeId(origin), PacketFormat::PathWithLinkMetric)
            .build(AccelerationSample::new(1, 2, 3), LinkEstimate::new(10, NodeId::ROOT))
    }

    fn queues(serial_depth: usize) -> (ForwardingQueue<CollectionPacket>, ForwardingQueue<CollectionPacket>) {
        (
            ForwardingQueue::new(QueueKind::Radio, 20, 1000, 1),
            ForwardingQueue::new(QueueKind::Serial, serial_depth, 1000, 1),
        )
    }

    #[test]
    fn bridges_unmodified() {
        let (mut radio, mut serial) = queues(UART_QUEUE_DEPTH);
        let mut aggregator = RootAggregator::new(NodeId::ROOT, AM_ACCELERATION_MSG);
        let original = packet(3);
        radio.enqueue(original, 0).unwrap();

        assert_eq!(aggregator.pump(&mut radio, &mut serial, 0), Some(original));
        assert!(radio.is_empty());
        assert_eq!(serial.iter().next(), Some(&original));
        assert_eq!(aggregator.bridged(), 1);
    }

    #[test]
    fn full_serial_queue_defers_then_drops() {
        let (mut radio, mut serial) = queues(1);
        let mut aggregator = RootAggregator::new(NodeId::ROOT, AM_ACCELERATION_MSG);
        serial.enqueue(packet(9), 0).unwrap();
        radio.enqueue(packet(3), 0).unwrap();

        assert_eq!(aggregator.pump(&mut radio, &mut serial, 0), None);
        assert_eq!(radio.len(), 1);
        assert_eq!(aggregator.pump(&mut radio, &mut serial, 1000), None);
        assert!(radio.is_empty());
        assert_eq!(radio.stats().dropped_after_retries, 1);
        assert_eq!(aggregator.deferred(), 2);
    }

    #[test]
    fn host_frame_carries_encoded_packet() {
        let aggregator = RootAggregator::new(NodeId::ROOT, AM_ACCELERATION_MSG);
        let original = packet(3);
        let frame = aggregator.frame_for_host(&original).unwrap();

        let serial = decode_frame(&frame).unwrap();
        assert_eq!(serial.src, NodeId::ROOT);
        assert_eq!(serial.am_type, AM_ACCELERATION_MSG);
        let decoded = decode_packet(PacketFormat::PathWithLinkMetric, &serial.payload).unwrap();
        assert_eq!(decoded, original);
    }
}
