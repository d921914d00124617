//! Node configuration
//!
//! Every field defaults to the shared protocol constants, so a YAML document
//! only needs to name what differs:
//!
//! ```rust
//! use moteflow::{NodeConfig, NodeId, NodeRole, PacketFormat};
//!
//! let config = NodeConfig::from_yaml(
//!     "node_id: 7\nformat: path-with-quality-array\n",
//! ).unwrap();
//! assert_eq!(config.node_id, NodeId(7));
//! assert_eq!(config.format, PacketFormat::PathWithQualityArray);
//! assert_eq!(config.role(), NodeRole::Relay);
//! assert_eq!(config.send_queue_depth, 20);
//! ```

use serde::{Deserialize, Serialize};

use crate::types::constants::{
    AM_ACCELERATION_MSG, CTP_COLLECTION_ID, DEFAULT_MAX_SEND_RETRIES, ROOT_ID, SAMPLING_PERIOD,
    SEND_QUEUE_DEPTH, UART_QUEUE_DEPTH, WAITING_PERIOD_RADIO, WAITING_PERIOD_SERIAL,
};
use crate::types::{Millis, NodeId, NodeRole, PacketFormat};
use crate::{CollectionError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Local radio address
    pub node_id: NodeId,
    /// Address of the sink
    pub root_id: NodeId,
    /// On-wire layout shared by the whole mesh
    pub format: PacketFormat,
    /// Whether a non-root node forwards traffic from its subtree
    pub forwarding: bool,
    /// Active-message type of the acceleration payload
    pub am_type: u8,
    /// Collection id handed to the routing layer
    pub collection_id: u8,
    pub sampling_period_ms: Millis,
    pub radio_waiting_ms: Millis,
    pub serial_waiting_ms: Millis,
    pub send_queue_depth: usize,
    pub uart_queue_depth: usize,
    /// Retries after the first failed send before an entry is dropped
    pub max_send_retries: u8,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId(1),
            root_id: NodeId(ROOT_ID),
            format: PacketFormat::default(),
            forwarding: true,
            am_type: AM_ACCELERATION_MSG,
            collection_id: CTP_COLLECTION_ID,
            sampling_period_ms: SAMPLING_PERIOD,
            radio_waiting_ms: WAITING_PERIOD_RADIO,
            serial_waiting_ms: WAITING_PERIOD_SERIAL,
            send_queue_depth: SEND_QUEUE_DEPTH,
            uart_queue_depth: UART_QUEUE_DEPTH,
            max_send_retries: DEFAULT_MAX_SEND_RETRIES,
        }
    }
}

impl NodeConfig {
    /// Default configuration for `node_id`.
    pub fn new(node_id: NodeId) -> Self {
        Self { node_id, ..Self::default() }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.is_empty() {
            return Err(CollectionError::config("node_id 0 is reserved for empty path slots"));
        }
        if self.root_id.is_empty() {
            return Err(CollectionError::config("root_id 0 is reserved for empty path slots"));
        }
        if self.sampling_period_ms == 0 {
            return Err(CollectionError::config("sampling_period_ms must be non-zero"));
        }
        if self.radio_waiting_ms == 0 || self.serial_waiting_ms == 0 {
            return Err(CollectionError::config("waiting periods must be non-zero"));
        }
        if self.send_queue_depth == 0 || self.uart_queue_depth == 0 {
            return Err(CollectionError::config("queue depths must be non-zero"));
        }
        Ok(())
    }

    /// Role derived from the ids, fixed for the node's lifetime.
    pub fn role(&self) -> NodeRole {
        NodeRole::select(self.node_id, self.root_id, self.forwarding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = NodeConfig::default();
        assert_eq!(config.root_id, NodeId(50));
        assert_eq!(config.sampling_period_ms, 2000);
        assert_eq!(config.radio_waiting_ms, 1000);
        assert_eq!(config.serial_waiting_ms, 1000);
        assert_eq!(config.uart_queue_depth, 20);
        assert_eq!(config.am_type, 30);
        assert_eq!(config.collection_id, 30);
        config.validate().unwrap();
    }

    #[test]
    fn root_role_from_yaml() {
        let config = NodeConfig::from_yaml("node_id: 50\n").unwrap();
        assert_eq!(config.role(), NodeRole::Root);
    }

    #[test]
    fn leaf_role_when_forwarding_disabled() {
        let config = NodeConfig::from_yaml("node_id: 3\nforwarding: false\n").unwrap();
        assert_eq!(config.role(), NodeRole::Leaf);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(NodeConfig::from_yaml("node_id: 0\n").is_err());
        assert!(NodeConfig::from_yaml("node_id: 3\nsend_queue_depth: 0\n").is_err());
        assert!(NodeConfig::from_yaml("node_id: 3\nsampling_period_ms: 0\n").is_err());
        assert!(NodeConfig::from_yaml("node_id: 3\nbogus: 1\n").is_err());
    }
}
