//! Binary encodings used on the radio and on the serial uplink.
//!
//! [`format`] encodes a [`CollectionPacket`](crate::CollectionPacket) in
//! network byte order for each [`PacketFormat`](crate::PacketFormat);
//! [`serial`] wraps encoded packets in the framed serial protocol the root
//! speaks toward the host.

pub mod format;
pub mod serial;

pub use format::{decode_packet, encode_packet};
pub use serial::{FrameAccumulator, SerialPacket, decode_frame, encode_frame};
