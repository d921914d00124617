//! Fixed-capacity provenance path

use serde::{Deserialize, Serialize};

use super::constants::NUMBER_OF_MOTES;
use super::node::NodeId;
use crate::CollectionError;

/// Outcome of appending a hop to a [`MessagePath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPush {
    /// The id was written at this slot index
    Appended(usize),
    /// Every slot is taken; the path is left untouched
    Full,
}

/// Ordered list of motes a packet visited, origin first.
///
/// The slot array has the on-wire capacity. `len` counts written slots and is
/// tracked separately from the packet's hop count, which keeps counting after
/// the array fills up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PathSlots")]
pub struct MessagePath {
    slots: [NodeId; NUMBER_OF_MOTES],
    len: u8,
}

/// Unchecked serde form of [`MessagePath`].
#[derive(Deserialize)]
struct PathSlots {
    slots: [NodeId; NUMBER_OF_MOTES],
    len: u8,
}

impl TryFrom<PathSlots> for MessagePath {
    type Error = CollectionError;

    fn try_from(raw: PathSlots) -> Result<Self, Self::Error> {
        let len = raw.len as usize;
        if len == 0 || len > NUMBER_OF_MOTES {
            return Err(CollectionError::parse(
                "Message path",
                format!("length {len} outside 1..={NUMBER_OF_MOTES}"),
            ));
        }
        if raw.slots[0].is_empty() {
            return Err(CollectionError::parse("Message path", "slot 0 must hold the origin"));
        }
        Ok(Self { slots: raw.slots, len: raw.len })
    }
}

impl MessagePath {
    /// Path holding only the sampling mote.
    pub fn starting_at(origin: NodeId) -> Self {
        let mut slots = [NodeId::EMPTY; NUMBER_OF_MOTES];
        slots[0] = origin;
        Self { slots, len: 1 }
    }

    /// Rebuild a path from wire slots. A packet that made `hop_count` hops
    /// carries `hop_count + 1` ids, capped at the array capacity.
    pub fn from_wire(slots: [u16; NUMBER_OF_MOTES], hop_count: u16) -> Self {
        let len = (hop_count as usize).saturating_add(1).min(NUMBER_OF_MOTES);
        Self { slots: slots.map(NodeId), len: len as u8 }
    }

    /// Append a relay id. Never writes past the array.
    pub fn push(&mut self, id: NodeId) -> PathPush {
        let index = self.len as usize;
        if index >= NUMBER_OF_MOTES {
            return PathPush::Full;
        }
        self.slots[index] = id;
        self.len += 1;
        PathPush::Appended(index)
    }

    /// Number of written slots.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len as usize >= NUMBER_OF_MOTES
    }

    /// Written hops, origin first.
    pub fn hops(&self) -> &[NodeId] {
        &self.slots[..self.len as usize]
    }

    /// Id at slot zero.
    pub fn first(&self) -> NodeId {
        self.slots[0]
    }

    /// All slots as transmitted, empty slots included.
    pub fn to_wire(&self) -> [u16; NUMBER_OF_MOTES] {
        self.slots.map(NodeId::value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_stops_at_capacity() {
        let mut path = MessagePath::starting_at(NodeId(3));
        assert_eq!(path.push(NodeId(7)), PathPush::Appended(1));
        assert_eq!(path.push(NodeId(8)), PathPush::Appended(2));
        assert_eq!(path.push(NodeId(9)), PathPush::Appended(3));
        assert!(path.is_full());
        assert_eq!(path.push(NodeId(10)), PathPush::Full);
        assert_eq!(path.to_wire(), [3, 7, 8, 9]);
    }

    #[test]
    fn wire_length_follows_hop_count() {
        let path = MessagePath::from_wire([3, 7, 0, 0], 1);
        assert_eq!(path.hops(), &[NodeId(3), NodeId(7)]);

        let capped = MessagePath::from_wire([3, 7, 8, 9], 12);
        assert_eq!(capped.len(), NUMBER_OF_MOTES);
    }

    #[test]
    fn deserialize_checks_length_and_origin_slot() {
        let path: MessagePath = serde_yaml_ng::from_str("slots: [3, 7, 0, 0]\nlen: 2\n").unwrap();
        assert_eq!(path.hops(), &[NodeId(3), NodeId(7)]);

        assert!(serde_yaml_ng::from_str::<MessagePath>("slots: [3, 0, 0, 0]\nlen: 9\n").is_err());
        assert!(serde_yaml_ng::from_str::<MessagePath>("slots: [3, 0, 0, 0]\nlen: 0\n").is_err());
        assert!(serde_yaml_ng::from_str::<MessagePath>("slots: [0, 7, 0, 0]\nlen: 2\n").is_err());
    }

    #[test]
    fn serialized_path_reads_back() {
        let mut path = MessagePath::starting_at(NodeId(3));
        path.push(NodeId(7));
        let yaml = serde_yaml_ng::to_string(&path).unwrap();
        assert_eq!(serde_yaml_ng::from_str::<MessagePath>(&yaml).unwrap(), path);
    }
}
