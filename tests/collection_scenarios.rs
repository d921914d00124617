//! Step-by-step scenarios across several motes, driven with explicit time.

use moteflow::wire::{decode_frame, decode_packet, encode_packet};
use moteflow::{
    AccelerationSample, CollectionError, CollectionPacket, Completion, ForwardingQueue, LinkEstimate,
    MessageBuilder, MoteNode, NodeConfig, NodeId, NodeRole, PacketFormat, QueueKind, RadioFrame, SendOutcome,
};

const AM: u8 = 30;

fn mote(id: u16, format: PacketFormat) -> MoteNode {
    let mut node = MoteNode::new(NodeConfig { format, ..NodeConfig::new(NodeId(id)) }).unwrap();
    node.start(0);
    node
}

/// Hand the packet the node releases at `now` to the radio and report success.
fn transmit(node: &mut MoteNode, now: u64) -> RadioFrame {
    let packet = node.poll_radio(now).expect("packet ready to send");
    assert!(matches!(node.complete_radio(SendOutcome::Sent, now), Completion::Delivered(_)));
    RadioFrame { source: node.id(), am_type: AM, payload: encode_packet(&packet) }
}

#[test]
fn sample_travels_from_mote_through_relay_to_host() {
    let format = PacketFormat::PathWithLinkMetric;
    let mut origin = mote(3, format);
    let mut relay = mote(7, format);
    let mut root = mote(50, format);
    assert_eq!(root.role(), NodeRole::Root);

    let built = origin
        .on_sample_tick(0, Ok(AccelerationSample::new(10, -5, 100)), LinkEstimate::new(200, NodeId(7)))
        .unwrap();
    assert_eq!(built.sample(), AccelerationSample::new(10, -5, 100));
    assert_eq!(built.origin(), NodeId(3));
    assert_eq!(built.hop_count(), 0);
    assert_eq!(built.message_path(), Some([3, 0, 0, 0]));
    assert_eq!(built.quality(), 200);

    let frame = transmit(&mut origin, 0);
    assert!(relay.on_radio_frame(&frame, LinkEstimate::new(150, NodeId(50)), 1000));
    let forwarded = relay.radio_queue().iter().next().copied().unwrap();
    assert_eq!(forwarded.hop_count(), 1);
    assert_eq!(forwarded.message_path(), Some([3, 7, 0, 0]));
    assert_eq!(forwarded.origin(), NodeId(3));
    assert_eq!(forwarded.quality(), 200);
    assert_eq!(forwarded.sample(), built.sample());

    let frame = transmit(&mut relay, 1000);
    assert!(root.on_radio_frame(&frame, LinkEstimate::new(0, NodeId::EMPTY), 2000));
    let bridged = root.bridge(2000).unwrap();
    assert_eq!(bridged, forwarded);
    assert_eq!(root.serial_queue().unwrap().iter().next(), Some(&forwarded));

    let bytes = root.poll_serial(2000).unwrap();
    root.complete_serial(SendOutcome::Sent, 2000);
    let host = decode_frame(&bytes).unwrap();
    assert_eq!(host.src, NodeId(50));
    assert_eq!(host.am_type, AM);
    assert_eq!(decode_packet(format, &host.payload).unwrap(), forwarded);
}

#[test]
fn quality_array_layout_keeps_per_hop_quality() {
    let format = PacketFormat::PathWithQualityArray;
    let mut origin = mote(3, format);
    let mut relay = mote(7, format);

    origin.on_sample_tick(0, Ok(AccelerationSample::new(1, 2, 3)), LinkEstimate::new(200, NodeId(7)));
    let frame = transmit(&mut origin, 0);
    relay.on_radio_frame(&frame, LinkEstimate::new(150, NodeId(50)), 1000);

    let forwarded = relay.radio_queue().iter().next().copied().unwrap();
    let decoded = decode_packet(format, &encode_packet(&forwarded)).unwrap();
    assert_eq!(decoded.message_path(), Some([3, 7, 0, 0]));
    assert_eq!(decoded.quality(), 200);
    assert_eq!(decoded.origin(), NodeId(3));
}

#[test]
fn long_chain_truncates_path_but_keeps_counting() {
    let format = PacketFormat::PathWithLinkMetric;
    let mut hops: Vec<MoteNode> = [3, 11, 12, 13, 14, 15].into_iter().map(|id| mote(id, format)).collect();

    hops[0].on_sample_tick(0, Ok(AccelerationSample::new(1, 1, 1)), LinkEstimate::new(9, NodeId(11)));
    let mut now = 0;
    let mut frame = transmit(&mut hops[0], now);
    for relay in hops.iter_mut().skip(1) {
        now += 1000;
        assert!(relay.on_radio_frame(&frame, LinkEstimate::new(9, NodeId(50)), now));
        frame = transmit(relay, now);
    }

    let last = hops.last().unwrap();
    assert_eq!(last.stats().paths_truncated, 1);
    let arrived = decode_packet(format, &frame.payload).unwrap();
    assert_eq!(arrived.hop_count(), 5);
    assert_eq!(arrived.message_path(), Some([3, 11, 12, 13]));
    assert_eq!(arrived.origin(), NodeId(3));
}

fn numbered(n: i16) -> CollectionPacket {
    MessageBuilder::new(NodeId(3), PacketFormat::PathWithLinkMetric)
        .build(AccelerationSample::new(n, 0, 0), LinkEstimate::new(1, NodeId(50)))
}

#[test]
fn overflowing_serial_queue_rejects_newest() {
    let mut serial = ForwardingQueue::new(QueueKind::Serial, 20, 1000, 3);
    for n in 0..20 {
        serial.enqueue(numbered(n), 100).unwrap();
    }

    let err = serial.enqueue(numbered(20), 5000).unwrap_err();
    assert!(matches!(err, CollectionError::QueueFull { queue: QueueKind::Serial, capacity: 20 }));
    assert_eq!(serial.len(), 20);
    assert_eq!(serial.stats().rejected_full, 1);

    let mut drained = Vec::new();
    let mut now = 5000;
    while let Some(packet) = serial.dequeue_for_send(now) {
        serial.complete_send(SendOutcome::Sent, now);
        drained.push(packet.sample().x);
        now += 1000;
    }
    assert_eq!(drained, (0..20).collect::<Vec<_>>());
    assert!(!drained.contains(&20));
}

#[test]
fn root_defers_bridging_while_serial_is_full() {
    let mut root = MoteNode::new(NodeConfig { uart_queue_depth: 1, ..NodeConfig::new(NodeId(50)) }).unwrap();
    root.start(0);
    let link = LinkEstimate::new(0, NodeId::EMPTY);
    assert!(root.on_receive(numbered(1), link, 0));
    assert!(root.on_receive(numbered(2), link, 0));

    assert!(root.bridge(0).is_some());
    // serial full: counts as a failed radio-side send
    assert!(root.bridge(1000).is_none());
    assert_eq!(root.radio_queue().stats().send_failures, 1);
    assert_eq!(root.radio_queue().len(), 1);

    assert!(root.poll_serial(1000).is_some());
    root.complete_serial(SendOutcome::Sent, 1000);
    assert_eq!(root.bridge(2000).map(|p| p.sample().x), Some(2));
    assert_eq!(root.stats().packets_bridged, 2);
}
