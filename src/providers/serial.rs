//! Serial uplink backed by a channel to the host side

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::provider::SerialTransport;
use crate::types::QueueKind;
use crate::{CollectionError, Result};

/// Writes each frame as one chunk into a bounded channel.
///
/// A full channel behaves like a busy UART and fails the write; the serial
/// queue's retry policy takes it from there.
#[derive(Debug, Clone)]
pub struct ChannelSerial {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelSerial {
    /// Create the transport and the host end of the link.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl SerialTransport for ChannelSerial {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        match self.tx.try_send(frame.to_vec()) {
            Ok(()) => {
                trace!(len = frame.len(), "Serial frame written");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(CollectionError::send_failed(QueueKind::Serial, "host not reading")),
            Err(TrySendError::Closed(_)) => Err(CollectionError::send_failed(QueueKind::Serial, "host disconnected")),
        }
    }
}
