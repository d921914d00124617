//! Packet fixtures shared by unit tests and benchmarks
//!
//! Builds packets the way motes do, through [`MessageBuilder`] and
//! [`PathAnnotator`], so fixtures always respect the path invariants.

#![cfg(any(test, feature = "benchmark"))]

use crate::annotator::PathAnnotator;
use crate::builder::MessageBuilder;
use crate::types::{AccelerationSample, CollectionPacket, LinkEstimate, NodeId, PacketFormat};
use crate::wire::{SerialPacket, encode_frame, encode_packet};

/// Deterministic reading derived from `n`.
pub fn sample(n: u16) -> AccelerationSample {
    let n = n as i16;
    AccelerationSample::new(n.wrapping_mul(3), n.wrapping_sub(512), 1000i16.wrapping_add(n))
}

/// Packet sampled at `origin` and forwarded by `relays` in order.
///
/// Every hop reports link quality `10 * hop` toward the next mote in the chain,
/// the last relay toward the root.
pub fn relayed_packet(format: PacketFormat, origin: u16, relays: &[u16], n: u16) -> CollectionPacket {
    let next = |i: usize| relays.get(i).copied().map(NodeId).unwrap_or(NodeId::ROOT);
    let mut packet = MessageBuilder::new(NodeId(origin), format).build(sample(n), LinkEstimate::new(10, next(0)));
    for (i, &relay) in relays.iter().enumerate() {
        let link = LinkEstimate::new(10 * (i as u16 + 2), next(i + 1));
        PathAnnotator.annotate(&mut packet, NodeId(relay), link);
    }
    packet
}

/// `count` single-hop packets from motes 1..=4.
pub fn packet_batch(format: PacketFormat, count: usize) -> Vec<CollectionPacket> {
    (0..count).map(|i| relayed_packet(format, (i % 4) as u16 + 1, &[], i as u16)).collect()
}

/// Serial byte stream carrying `count` framed packets, as the host reads it.
pub fn host_byte_stream(format: PacketFormat, count: usize) -> Vec<u8> {
    packet_batch(format, count)
        .iter()
        .filter_map(|packet| encode_frame(&SerialPacket::to_host(NodeId::ROOT, 30, encode_packet(packet))).ok())
        .flatten()
        .collect()
}
