//! Protocol constants shared by every mote in the collection tree.
//!
//! Periods are in milliseconds.

/// Active-message type of the acceleration payload.
pub const AM_ACCELERATION_MSG: u8 = 30;

/// Collection identifier handed to the tree-routing layer.
pub const CTP_COLLECTION_ID: u8 = 30;

/// Well-known address of the sink.
pub const ROOT_ID: u16 = 50;

/// Interval between two accelerometer samples.
pub const SAMPLING_PERIOD: u64 = 2000;

/// Minimum gap between two sends on a radio queue.
pub const WAITING_PERIOD_RADIO: u64 = 1000;

/// Minimum gap between two sends on the serial queue.
pub const WAITING_PERIOD_SERIAL: u64 = 1000;

/// Depth of the serial-bound queue on the root.
pub const UART_QUEUE_DEPTH: usize = 20;

/// Depth of the radio-bound queue on every mote.
pub const SEND_QUEUE_DEPTH: usize = 20;

/// Capacity of the provenance arrays carried in each packet.
pub const NUMBER_OF_MOTES: usize = 4;

/// Failed sends retried before the entry is dropped.
pub const DEFAULT_MAX_SEND_RETRIES: u8 = 3;
