//! Collection packet model
//!
//! The three historical layouts of the acceleration message cannot share one
//! on-wire type, so the packet keeps a common header and carries the
//! layout-specific provenance as a tagged variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::NUMBER_OF_MOTES;
use super::node::NodeId;
use super::path::{MessagePath, PathPush};
use super::sample::AccelerationSample;
use crate::CollectionError;

/// Protocol-version tag selecting the on-wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacketFormat {
    /// Acceleration, hop count, origin and quality only
    Minimal,
    /// Path plus the immediate forwarder's link metric and address
    #[default]
    PathWithLinkMetric,
    /// Path plus a per-hop quality array
    PathWithQualityArray,
}

impl PacketFormat {
    /// Encoded payload size in bytes.
    pub const fn wire_len(self) -> usize {
        match self {
            PacketFormat::Minimal => 12,
            PacketFormat::PathWithLinkMetric => 24,
            PacketFormat::PathWithQualityArray => 24,
        }
    }
}

impl fmt::Display for PacketFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketFormat::Minimal => "minimal",
            PacketFormat::PathWithLinkMetric => "path-with-link-metric",
            PacketFormat::PathWithQualityArray => "path-with-quality-array",
        };
        f.write_str(name)
    }
}

/// Layout-specific provenance carried by a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    Minimal,
    LinkMetric {
        path: MessagePath,
        link_value: u16,
        link_addr: NodeId,
    },
    QualityArray {
        path: MessagePath,
        path_quality: [u16; NUMBER_OF_MOTES],
    },
}

impl Provenance {
    /// Empty provenance for a freshly built packet.
    pub(crate) fn initial(format: PacketFormat, origin: NodeId, quality: u16, next_hop: NodeId) -> Self {
        match format {
            PacketFormat::Minimal => Provenance::Minimal,
            PacketFormat::PathWithLinkMetric => Provenance::LinkMetric {
                path: MessagePath::starting_at(origin),
                link_value: quality,
                link_addr: next_hop,
            },
            PacketFormat::PathWithQualityArray => {
                let mut path_quality = [0u16; NUMBER_OF_MOTES];
                path_quality[0] = quality;
                Provenance::QualityArray { path: MessagePath::starting_at(origin), path_quality }
            }
        }
    }

    pub fn format(&self) -> PacketFormat {
        match self {
            Provenance::Minimal => PacketFormat::Minimal,
            Provenance::LinkMetric { .. } => PacketFormat::PathWithLinkMetric,
            Provenance::QualityArray { .. } => PacketFormat::PathWithQualityArray,
        }
    }

    pub fn path(&self) -> Option<&MessagePath> {
        match self {
            Provenance::Minimal => None,
            Provenance::LinkMetric { path, .. } | Provenance::QualityArray { path, .. } => {
                Some(path)
            }
        }
    }

    /// Append a relay hop. `None` when the layout carries no path.
    pub(crate) fn record_hop(&mut self, relay: NodeId, quality: u16, next_hop: NodeId) -> Option<PathPush> {
        match self {
            Provenance::Minimal => None,
            Provenance::LinkMetric { path, link_value, link_addr } => {
                *link_value = quality;
                *link_addr = next_hop;
                Some(path.push(relay))
            }
            Provenance::QualityArray { path, path_quality } => {
                let pushed = path.push(relay);
                if let PathPush::Appended(index) = pushed {
                    path_quality[index] = quality;
                }
                Some(pushed)
            }
        }
    }
}

/// The unit exchanged between motes.
///
/// Created once by the sampling mote, extended in place by each relay and
/// consumed by the root. The origin cannot change after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PacketFields")]
pub struct CollectionPacket {
    sample: AccelerationSample,
    origin: NodeId,
    pub(crate) hop_count: u16,
    quality: u16,
    pub(crate) provenance: Provenance,
}

/// Unchecked serde form of [`CollectionPacket`].
#[derive(Deserialize)]
struct PacketFields {
    sample: AccelerationSample,
    origin: NodeId,
    hop_count: u16,
    quality: u16,
    provenance: Provenance,
}

impl TryFrom<PacketFields> for CollectionPacket {
    type Error = CollectionError;

    /// Accepts only packets a mote could have produced: a real origin at the
    /// head of the path and a path as long as the hop count allows.
    fn try_from(raw: PacketFields) -> Result<Self, Self::Error> {
        if raw.origin.is_empty() {
            return Err(CollectionError::parse("Collection packet", "origin id 0 is reserved"));
        }
        if let Some(path) = raw.provenance.path() {
            if path.first() != raw.origin {
                return Err(CollectionError::parse(
                    "Collection packet",
                    format!("path starts at {} but origin is {}", path.first(), raw.origin),
                ));
            }
            let expected = (raw.hop_count as usize).saturating_add(1).min(NUMBER_OF_MOTES);
            if path.len() != expected {
                return Err(CollectionError::parse(
                    "Collection packet",
                    format!("{} path entries for hop count {}", path.len(), raw.hop_count),
                ));
            }
        }
        Ok(Self::from_parts(raw.sample, raw.origin, raw.hop_count, raw.quality, raw.provenance))
    }
}

impl CollectionPacket {
    pub(crate) fn from_parts(
        sample: AccelerationSample,
        origin: NodeId,
        hop_count: u16,
        quality: u16,
        provenance: Provenance,
    ) -> Self {
        Self { sample, origin, hop_count, quality, provenance }
    }

    pub fn sample(&self) -> AccelerationSample {
        self.sample
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }

    /// Relays traversed so far; keeps counting after the path fills.
    pub fn hop_count(&self) -> u16 {
        self.hop_count
    }

    pub fn quality(&self) -> u16 {
        self.quality
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn format(&self) -> PacketFormat {
        self.provenance.format()
    }

    pub fn path(&self) -> Option<&MessagePath> {
        self.provenance.path()
    }

    /// Path slots as transmitted, or `None` for the minimal layout.
    pub fn message_path(&self) -> Option<[u16; NUMBER_OF_MOTES]> {
        self.path().map(MessagePath::to_wire)
    }
}
