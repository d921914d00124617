//! Driver runs a mote's event loop on a tokio task

use futures::FutureExt;
use futures::future::{BoxFuture, Fuse, FusedFuture};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::node::{MoteNode, NodeStats};
use crate::provider::{RadioFrame, RadioTransport, SensorProvider, SerialTransport};
use crate::queue::SendOutcome;
use crate::types::{AccelerationSample, LinkEstimate, Millis, NodeId, NodeRole};
use crate::{CollectionError, Result};

/// Outstanding sensor read: hands the sensor back with the tick it served.
type PendingRead<S> = Fuse<BoxFuture<'static, (S, Millis, Result<AccelerationSample>)>>;

/// Handle to a running node.
pub struct DriverHandle {
    /// Receiver for counter snapshots, updated after every event
    pub stats: watch::Receiver<NodeStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Latest counter snapshot.
    pub fn stats(&self) -> NodeStats {
        self.stats.borrow().clone()
    }

    /// Stream of snapshots, starting with the current one.
    pub fn stats_stream(&self) -> WatchStream<NodeStats> {
        WatchStream::new(self.stats.clone())
    }

    /// Stop the node and wait for its task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Node task ended abnormally: {}", e);
        }
    }
}

/// Runs one [`MoteNode`] against its collaborators.
///
/// Everything happens on a single task: the sampling timer, the radio and
/// serial pacing timers and inbound radio frames are `select!`-ed, and each
/// handler runs to completion before the next event is looked at. That gives
/// the cooperative, non-preemptive execution the node's handlers assume.
///
/// The sensor read is the one slow collaborator call. It is kept pending as
/// its own `select!` arm, so a stalled sensor delays only sampling while
/// forwarding and bridging keep their pace.
pub struct Driver;

impl Driver {
    /// Spawn the event loop for `node`.
    ///
    /// `serial` is only used when the node is the root.
    pub fn spawn<S, R>(
        node: MoteNode,
        sensor: S,
        radio: R,
        serial: Option<Box<dyn SerialTransport>>,
        inbound: mpsc::Receiver<RadioFrame>,
    ) -> DriverHandle
    where
        S: SensorProvider,
        R: RadioTransport,
    {
        let (stats_tx, stats_rx) = watch::channel(node.stats());
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(async move {
            Self::event_loop(node, sensor, radio, serial, inbound, stats_tx, cancel_task).await;
        });

        DriverHandle { stats: stats_rx, cancel, task }
    }

    async fn event_loop<S, R>(
        mut node: MoteNode,
        sensor: S,
        mut radio: R,
        mut serial: Option<Box<dyn SerialTransport>>,
        mut inbound: mpsc::Receiver<RadioFrame>,
        stats_tx: watch::Sender<NodeStats>,
        cancel: CancellationToken,
    ) where
        S: SensorProvider,
        R: RadioTransport,
    {
        let config = node.config().clone();
        let id = config.node_id;
        let caps = node.capabilities();
        let sampling_period = Duration::from_millis(config.sampling_period_ms);

        let epoch = Instant::now();
        let now = move || epoch.elapsed().as_millis() as Millis;

        let mut sampling = interval(sampling_period);
        sampling.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut radio_pacing = interval(Duration::from_millis(config.radio_waiting_ms));
        radio_pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut serial_pacing = interval(Duration::from_millis(config.serial_waiting_ms));
        serial_pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if node.role() == NodeRole::Root && serial.is_none() {
            warn!(node = %id, "Root started without a serial uplink; bridged packets will stay queued");
        }

        node.start(now());
        stats_tx.send_replace(node.stats());
        info!(node = %id, role = %node.role(), "Node event loop started");

        let mut inbound_open = true;
        let mut sensor = Some(sensor);
        let mut read: PendingRead<S> = Fuse::terminated();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(node = %id, "Node cancelled");
                    break;
                }

                frame = inbound.recv(), if inbound_open => {
                    match frame {
                        Some(frame) => {
                            let link = link_or_unrouted(&radio);
                            trace!(node = %id, source = %frame.source, "Frame received");
                            node.on_radio_frame(&frame, link, now());
                        }
                        None => {
                            debug!(node = %id, "Inbound radio channel closed");
                            inbound_open = false;
                        }
                    }
                }

                _ = radio_pacing.tick() => {
                    if node.role() == NodeRole::Root {
                        node.bridge(now());
                    } else if let Some(packet) = node.poll_radio(now()) {
                        let outcome = match radio.send(&packet, config.am_type).await {
                            Ok(()) => SendOutcome::Sent,
                            Err(e) => {
                                debug!(node = %id, origin = %packet.origin(), "Radio send failed: {}", e);
                                SendOutcome::Failed
                            }
                        };
                        node.complete_radio(outcome, now());
                    }
                }

                _ = serial_pacing.tick(), if serial.is_some() => {
                    if let Some(uplink) = serial.as_mut() {
                        if let Some(frame) = node.poll_serial(now()) {
                            let outcome = match uplink.send(&frame).await {
                                Ok(()) => SendOutcome::Sent,
                                Err(e) => {
                                    debug!(node = %id, "Serial send failed: {}", e);
                                    SendOutcome::Failed
                                }
                            };
                            node.complete_serial(outcome, now());
                        }
                    }
                }

                (returned, started, reading) = &mut read, if !read.is_terminated() => {
                    sensor = Some(returned);
                    let link = link_or_unrouted(&radio);
                    node.on_sample_tick(started, reading, link);
                }

                _ = sampling.tick(), if caps.samples => {
                    let tick_at = now();
                    if !read.is_terminated() {
                        debug!(node = %id, "Sensor read still pending; skipping tick");
                    } else if !node.sample_due(tick_at) {
                        trace!(node = %id, tick_at, "Sampling tick before the next due time");
                    } else if let Some(mut current) = sensor.take() {
                        read = async move {
                            let reading = match tokio::time::timeout(sampling_period, current.read()).await {
                                Ok(reading) => reading,
                                Err(_) => Err(CollectionError::Timeout { duration: sampling_period }),
                            };
                            (current, tick_at, reading)
                        }
                        .boxed()
                        .fuse();
                    }
                }
            }

            stats_tx.send_replace(node.stats());
        }

        let stats = node.stats();
        info!(
            node = %id,
            samples = stats.samples_taken,
            forwarded = stats.packets_forwarded,
            bridged = stats.packets_bridged,
            "Node event loop ended"
        );
    }
}

fn link_or_unrouted<R: RadioTransport>(radio: &R) -> LinkEstimate {
    radio.link_estimate().unwrap_or(LinkEstimate::new(0, NodeId::EMPTY))
}
