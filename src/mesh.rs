//! Whole-mesh simulation
//!
//! A [`MeshConfig`] describes a static collection tree. [`MeshBuilder`] wires
//! one [`Driver`] per mote onto a shared [`MeshFabric`] and hands back a
//! [`MeshHandle`] from which the host side of the root's serial uplink can be
//! consumed as a stream of decoded packets.
//!
//! ```yaml
//! defaults:
//!   format: path-with-link-metric
//! nodes:
//!   - id: 50
//!   - id: 7
//!     parent: 50
//!     link_quality: 40
//!   - id: 3
//!     parent: 7
//!     link_quality: 60
//!     forwarding: false
//!     samples: [[10, -5, 100], ~, [12, -4, 98]]
//! ```

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::driver::{Driver, DriverHandle};
use crate::node::{MoteNode, NodeStats};
use crate::provider::SerialTransport;
use crate::providers::{ChannelSerial, MeshFabric, ReplaySensor};
use crate::stream::DeframeExt;
use crate::types::{AccelerationSample, CollectionPacket, NodeId};
use crate::wire::decode_packet;
use crate::{CollectionError, Result};

const DEFAULT_LINK_QUALITY: u16 = 10;
const DEFAULT_UPLINK_BUFFER: usize = 256;

fn default_link_quality() -> u16 {
    DEFAULT_LINK_QUALITY
}

fn default_forwarding() -> bool {
    true
}

/// One mote of the simulated tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshNodeSpec {
    pub id: NodeId,
    /// Next hop toward the root; `None` leaves the mote unrouted
    #[serde(default)]
    pub parent: Option<NodeId>,
    /// Link metric reported for the route to `parent`
    #[serde(default = "default_link_quality")]
    pub link_quality: u16,
    #[serde(default = "default_forwarding")]
    pub forwarding: bool,
    /// Looping sensor trace, `~` for a failed read
    #[serde(default)]
    pub samples: Vec<Option<[i16; 3]>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshConfig {
    /// Settings shared by every mote; `node_id` is ignored
    #[serde(default)]
    pub defaults: NodeConfig,
    pub nodes: Vec<MeshNodeSpec>,
}

impl MeshConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the tree: unique ids, exactly one root, parents that exist.
    pub fn validate(&self) -> Result<()> {
        let root = self.defaults.root_id;
        let mut ids = HashSet::new();
        for spec in &self.nodes {
            if !ids.insert(spec.id) {
                return Err(CollectionError::config(format!("duplicate mote id {}", spec.id)));
            }
        }
        if !ids.contains(&root) {
            return Err(CollectionError::config(format!("root {} is not part of the mesh", root)));
        }

        for spec in &self.nodes {
            self.node_config(spec).validate()?;
            match spec.parent {
                Some(parent) if parent == spec.id => {
                    return Err(CollectionError::config(format!("mote {} is its own parent", spec.id)));
                }
                Some(parent) if !ids.contains(&parent) => {
                    return Err(CollectionError::config(format!(
                        "mote {} routes through unknown parent {}",
                        spec.id, parent
                    )));
                }
                Some(_) if spec.id == root => {
                    return Err(CollectionError::config("the root has no parent"));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Full configuration of one mote.
    pub fn node_config(&self, spec: &MeshNodeSpec) -> NodeConfig {
        NodeConfig { node_id: spec.id, forwarding: spec.forwarding, ..self.defaults.clone() }
    }
}

/// Assembles and launches a simulated mesh.
#[derive(Debug)]
pub struct MeshBuilder {
    config: MeshConfig,
    sensors: HashMap<NodeId, ReplaySensor>,
    uplink_buffer: usize,
}

impl MeshBuilder {
    pub fn new(config: MeshConfig) -> Self {
        Self { config, sensors: HashMap::new(), uplink_buffer: DEFAULT_UPLINK_BUFFER }
    }

    /// Replace the sensor of mote `id`.
    pub fn sensor(mut self, id: NodeId, sensor: ReplaySensor) -> Self {
        self.sensors.insert(id, sensor);
        self
    }

    /// Frames the host side may fall behind by before the root's serial
    /// writes start failing.
    pub fn uplink_buffer(mut self, frames: usize) -> Self {
        self.uplink_buffer = frames.max(1);
        self
    }

    /// Spawn every mote. Must be called from within a tokio runtime.
    pub fn launch(mut self) -> Result<MeshHandle> {
        self.config.validate()?;

        let fabric = MeshFabric::new();
        let mut inboxes = HashMap::new();
        for spec in &self.config.nodes {
            let capacity = self.config.defaults.send_queue_depth;
            inboxes.insert(spec.id, fabric.register(spec.id, capacity));
            if let Some(parent) = spec.parent {
                fabric.set_route(spec.id, parent, spec.link_quality);
            }
        }

        let mut host = None;
        let mut drivers = BTreeMap::new();
        for spec in &self.config.nodes {
            let node = MoteNode::new(self.config.node_config(spec))?;
            let Some(inbox) = inboxes.remove(&spec.id) else {
                continue;
            };

            let sensor = match self.sensors.remove(&spec.id) {
                Some(sensor) => sensor,
                None if spec.samples.is_empty() => ReplaySensor::constant(AccelerationSample::default()),
                None => ReplaySensor::looping(
                    spec.samples.iter().map(|s| s.map(|[x, y, z]| AccelerationSample::new(x, y, z))).collect(),
                ),
            };

            let serial = if spec.id == self.config.defaults.root_id {
                let (serial, rx) = ChannelSerial::new(self.uplink_buffer);
                host = Some(rx);
                Some(Box::new(serial) as Box<dyn SerialTransport>)
            } else {
                if spec.parent.is_none() {
                    warn!(node = %spec.id, "Mote has no parent; its sends fail until a route is set");
                }
                None
            };

            let handle = Driver::spawn(node, sensor, fabric.radio(spec.id), serial, inbox);
            drivers.insert(spec.id, handle);
        }

        info!(motes = drivers.len(), format = %self.config.defaults.format, "Mesh launched");
        Ok(MeshHandle { fabric, config: self.config, drivers, host })
    }
}

/// Running mesh.
pub struct MeshHandle {
    fabric: MeshFabric,
    config: MeshConfig,
    drivers: BTreeMap<NodeId, DriverHandle>,
    host: Option<mpsc::Receiver<Vec<u8>>>,
}

impl MeshHandle {
    /// Packets delivered to the host, decoded from the serial frames.
    ///
    /// Returns `None` once the uplink has been taken. Frames that fail to
    /// deframe or decode are logged and skipped.
    pub fn uplink(&mut self) -> Option<BoxStream<'static, CollectionPacket>> {
        let host = self.host.take()?;
        let format = self.config.defaults.format;
        let am_type = self.config.defaults.am_type;

        let packets = ReceiverStream::new(host).deframed().filter_map(move |frame| async move {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Dropping corrupted serial frame: {}", e);
                    return None;
                }
            };
            if frame.am_type != am_type {
                warn!(am_type = frame.am_type, "Ignoring serial frame of foreign type");
                return None;
            }
            match decode_packet(format, &frame.payload) {
                Ok(packet) => Some(packet),
                Err(e) => {
                    warn!(src = %frame.src, "Dropping undecodable packet: {}", e);
                    None
                }
            }
        });
        Some(packets.boxed())
    }

    pub fn stats(&self, id: NodeId) -> Option<NodeStats> {
        self.drivers.get(&id).map(DriverHandle::stats)
    }

    /// Snapshots of mote `id` as they change.
    pub fn stats_stream(&self, id: NodeId) -> Option<WatchStream<NodeStats>> {
        self.drivers.get(&id).map(DriverHandle::stats_stream)
    }

    /// Stats of every mote, ordered by id.
    pub fn all_stats(&self) -> Vec<NodeStats> {
        self.drivers.values().map(DriverHandle::stats).collect()
    }

    /// The shared fabric, for changing routes or injecting failures.
    pub fn fabric(&self) -> &MeshFabric {
        &self.fabric
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Stop every mote.
    pub async fn shutdown(self) {
        for (_, handle) in self.drivers {
            handle.shutdown().await;
        }
    }
}
