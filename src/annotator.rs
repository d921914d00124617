//! Per-hop provenance updates on relay motes

use tracing::{debug, trace};

use crate::types::{CollectionPacket, LinkEstimate, NodeId, PathPush};

/// What a relay managed to record on a transiting packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// Relay id written at this path index
    Extended(usize),
    /// Path already full; provenance truncated, hop still counted
    Truncated,
    /// Layout carries no path; hop counted only
    Counted,
}

/// Extends a packet's path and link-quality data at each relay.
///
/// Performs no filtering or deduplication; loop freedom is the routing
/// layer's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathAnnotator;

impl PathAnnotator {
    /// Record `relay` and its outbound link, then count the hop.
    ///
    /// The hop count saturates at `u16::MAX` and is otherwise unbounded; the
    /// path stops growing once its array is full.
    pub fn annotate(
        &self,
        packet: &mut CollectionPacket,
        relay: NodeId,
        link: LinkEstimate,
    ) -> Annotation {
        let pushed = packet.provenance.record_hop(relay, link.quality, link.next_hop);
        packet.hop_count = packet.hop_count.saturating_add(1);

        match pushed {
            Some(PathPush::Appended(index)) => {
                trace!(origin = %packet.origin(), %relay, index, hop_count = packet.hop_count, "Path extended");
                Annotation::Extended(index)
            }
            Some(PathPush::Full) => {
                debug!(origin = %packet.origin(), %relay, hop_count = packet.hop_count, "Path full, provenance truncated");
                Annotation::Truncated
            }
            None => Annotation::Counted,
        }
    }
}
