//! Packet construction on the sampling mote

use tracing::trace;

use crate::types::{AccelerationSample, CollectionPacket, LinkEstimate, NodeId, PacketFormat, Provenance};

/// Assembles a fresh [`CollectionPacket`] from a local sample.
///
/// The packet starts with `hop_count == 0`, `origin` and `message_path[0]`
/// set to the local id and every other path slot empty. Construction is pure.
#[derive(Debug, Clone, Copy)]
pub struct MessageBuilder {
    local: NodeId,
    format: PacketFormat,
}

impl MessageBuilder {
    pub fn new(local: NodeId, format: PacketFormat) -> Self {
        Self { local, format }
    }

    pub fn local_id(&self) -> NodeId {
        self.local
    }

    pub fn format(&self) -> PacketFormat {
        self.format
    }

    /// Build a packet carrying `sample` and the quality of the outbound hop.
    pub fn build(&self, sample: AccelerationSample, link: LinkEstimate) -> CollectionPacket {
        let provenance = Provenance::initial(self.format, self.local, link.quality, link.next_hop);
        trace!(origin = %self.local, format = %self.format, quality = link.quality, "Built packet");
        CollectionPacket::from_parts(sample, self.local, 0, link.quality, provenance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_origin_packet() {
        let builder = MessageBuilder::new(NodeId(3), PacketFormat::PathWithLinkMetric);
        let packet =
            builder.build(AccelerationSample::new(10, -5, 100), LinkEstimate::new(200, NodeId(7)));

        assert_eq!(packet.sample(), AccelerationSample::new(10, -5, 100));
        assert_eq!(packet.origin(), NodeId(3));
        assert_eq!(packet.hop_count(), 0);
        assert_eq!(packet.quality(), 200);
        assert_eq!(packet.message_path(), Some([3, 0, 0, 0]));
        match packet.provenance() {
            Provenance::LinkMetric { link_value, link_addr, .. } => {
                assert_eq!(*link_value, 200);
                assert_eq!(*link_addr, NodeId(7));
            }
            other => panic!("unexpected provenance {other:?}"),
        }
    }

    #[test]
    fn minimal_packets_have_no_path() {
        let builder = MessageBuilder::new(NodeId(3), PacketFormat::Minimal);
        let packet = builder.build(AccelerationSample::default(), LinkEstimate::new(1, NodeId(7)));
        assert_eq!(packet.format(), PacketFormat::Minimal);
        assert!(packet.message_path().is_none());
    }
}
