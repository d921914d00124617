//! Error types for the collection layer.
//!
//! Every failure in this crate degrades to the loss of a single sample or
//! packet; none of them stop a node. The error type still carries structured
//! context so the drop counters and logs can say why data went missing.
//!
//! ## Error Categories
//!
//! - **Sample Errors**: the sensor collaborator produced no reading this period
//! - **Queue Errors**: a bounded forwarding queue rejected an entry
//! - **Send Errors**: the radio or serial collaborator reported a failed send
//! - **Parse / Frame Errors**: malformed wire packets or serial frames
//! - **Config Errors**: invalid node or mesh configuration
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use moteflow::CollectionError;
//!
//! let error = CollectionError::send_failed(moteflow::QueueKind::Radio, "link busy");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::types::QueueKind;

/// Result type alias for collection operations.
pub type Result<T, E = CollectionError> = std::result::Result<T, E>;

/// Main error type for collection and forwarding operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CollectionError {
    #[error("Sensor reading unavailable: {reason}")]
    SampleUnavailable { reason: String },

    #[error("{queue} queue full ({capacity} entries), packet rejected")]
    QueueFull { queue: QueueKind, capacity: usize },

    #[error("{interface} send failed: {reason}")]
    SendFailure {
        interface: QueueKind,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Serial frame error: {details}")]
    Frame { details: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Channel closed: {channel}")]
    ChannelClosed { channel: String },
}

impl CollectionError {
    /// Returns whether the failed operation may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            CollectionError::SampleUnavailable { .. } => true,
            CollectionError::QueueFull { .. } => true,
            CollectionError::SendFailure { .. } => true,
            CollectionError::Timeout { .. } => true,
            CollectionError::Parse { .. } => false,
            CollectionError::Frame { .. } => false,
            CollectionError::Config { .. } => false,
            CollectionError::ChannelClosed { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            CollectionError::SampleUnavailable { .. } => vec![
                "Check the accelerometer wiring and power",
                "The next sampling period supersedes this one",
            ],
            CollectionError::QueueFull { .. } => vec![
                "Increase the queue depth in the node configuration",
                "Lengthen the sampling period to reduce offered load",
                "Check that the next hop is draining its queue",
            ],
            CollectionError::SendFailure { .. } => vec![
                "Check the routing layer has a route to the root",
                "Increase the bounded retry count",
                "Verify the serial uplink is connected",
            ],
            CollectionError::Parse { .. } => vec![
                "Verify both ends use the same packet format",
                "Check the payload length against the format size",
            ],
            CollectionError::Frame { .. } => vec![
                "Check the serial baud rate",
                "Discard bytes until the next frame delimiter",
            ],
            CollectionError::Config { .. } => vec![
                "Check node ids are non-zero and unique",
                "Check queue depths and periods are non-zero",
            ],
            CollectionError::Timeout { .. } => vec![
                "Check the sensor responds within one sampling period",
                "Lengthen the sampling period",
            ],
            CollectionError::ChannelClosed { .. } => {
                vec!["The peer task has shut down", "Restart the node driver"]
            }
        }
    }

    /// Helper constructor for sensor failures.
    pub fn sample_unavailable(reason: impl Into<String>) -> Self {
        CollectionError::SampleUnavailable { reason: reason.into() }
    }

    /// Helper constructor for rejected enqueues.
    pub fn queue_full(queue: QueueKind, capacity: usize) -> Self {
        CollectionError::QueueFull { queue, capacity }
    }

    /// Helper constructor for transport send failures.
    pub fn send_failed(interface: QueueKind, reason: impl Into<String>) -> Self {
        CollectionError::SendFailure { interface, reason: reason.into(), source: None }
    }

    /// Helper constructor for transport send failures with source.
    pub fn send_failed_with_source(
        interface: QueueKind,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        CollectionError::SendFailure { interface, reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for wire parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        CollectionError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for serial framing errors.
    pub fn frame(details: impl Into<String>) -> Self {
        CollectionError::Frame { details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        CollectionError::Config { reason: reason.into() }
    }

    /// Helper constructor for closed channels.
    pub fn channel_closed(channel: impl Into<String>) -> Self {
        CollectionError::ChannelClosed { channel: channel.into() }
    }
}

impl From<serde_yaml_ng::Error> for CollectionError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        CollectionError::Config { reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            reason in "[a-z ]{1,40}",
            capacity in 1usize..1000,
            context in "[a-z ]{1,20}",
            details in "[a-z ]{1,40}",
        ) {
            let sample = CollectionError::sample_unavailable(reason.clone());
            prop_assert!(sample.to_string().contains(&reason));

            let full = CollectionError::queue_full(QueueKind::Serial, capacity);
            prop_assert!(full.to_string().contains(&capacity.to_string()));
            prop_assert!(full.to_string().contains("serial"));

            let parse = CollectionError::parse(context.clone(), details.clone());
            let msg = parse.to_string();
            prop_assert!(msg.contains(&context));
            prop_assert!(msg.contains(&details));
        }
    }

    #[test]
    fn send_failure_chains_its_source() {
        let io = std::io::Error::other("radio NACK");
        let err = CollectionError::send_failed_with_source(QueueKind::Radio, "no ack", Box::new(io));

        let source = std::error::Error::source(&err).expect("source should be preserved");
        assert_eq!(source.to_string(), "radio NACK");
        assert!(err.to_string().starts_with("radio send failed"));
    }

    #[test]
    fn retry_classification() {
        assert!(CollectionError::send_failed(QueueKind::Radio, "busy").is_retryable());
        assert!(CollectionError::queue_full(QueueKind::Radio, 20).is_retryable());
        assert!(!CollectionError::parse("packet", "short").is_retryable());
        assert!(!CollectionError::config("bad").is_retryable());

        for err in [
            CollectionError::sample_unavailable("adc"),
            CollectionError::frame("crc"),
            CollectionError::Timeout { duration: Duration::from_millis(2000) },
            CollectionError::channel_closed("inbound"),
        ] {
            assert!(!err.recovery_suggestions().is_empty());
        }
    }

    #[test]
    fn error_is_send_sync_static() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<CollectionError>();
    }

    #[test]
    fn yaml_errors_become_config_errors() {
        let err = serde_yaml_ng::from_str::<u16>("[not a number").unwrap_err();
        let converted: CollectionError = err.into();
        assert!(matches!(converted, CollectionError::Config { .. }));
    }
}
