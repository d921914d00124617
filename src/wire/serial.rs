//! Framed serial protocol between the root and the host
//!
//! Frames are HDLC-like:
//!
//! ```text
//! 0x7E | proto | dispatch | dest(2) src(2) len(1) group(1) type(1) | payload | crc(2, LE) | 0x7E
//! ```
//!
//! Everything between the flags is byte-stuffed (`0x7E`/`0x7D` become `0x7D`
//! followed by the byte XOR `0x20`). The CRC is CRC-16/CCITT with a zero seed
//! over the unstuffed bytes from `proto` to the end of the payload.

use tracing::{debug, trace};

use crate::types::NodeId;
use crate::{CollectionError, Result};

pub const HDLC_FLAG: u8 = 0x7E;
pub const HDLC_ESCAPE: u8 = 0x7D;
const ESCAPE_XOR: u8 = 0x20;

/// Packet protocol without link-level acknowledgement.
pub const SERIAL_PROTO_PACKET_NOACK: u8 = 0x45;
/// Dispatch id of active-message payloads.
pub const SERIAL_ACTIVE_MESSAGE_ID: u8 = 0x00;
/// Destination used for frames sent to the host.
pub const SERIAL_BROADCAST_ADDR: u16 = 0xFFFF;
/// Default active-message group.
pub const DEFAULT_AM_GROUP: u8 = 0x22;

const AM_HEADER_LEN: usize = 7;
const CRC_LEN: usize = 2;
/// Longest unstuffed frame body the accumulator buffers before resyncing.
pub const MAX_FRAME_BODY: usize = 2 + AM_HEADER_LEN + u8::MAX as usize + CRC_LEN;

/// Active message carried over the serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPacket {
    pub dest: u16,
    pub src: NodeId,
    pub group: u8,
    pub am_type: u8,
    pub payload: Vec<u8>,
}

impl SerialPacket {
    /// Packet addressed to the host from `src`.
    pub fn to_host(src: NodeId, am_type: u8, payload: Vec<u8>) -> Self {
        Self { dest: SERIAL_BROADCAST_ADDR, src, group: DEFAULT_AM_GROUP, am_type, payload }
    }
}

/// CRC-16/CCITT, polynomial 0x1021, seed 0.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &byte| {
        let mut crc = crc ^ ((byte as u16) << 8);
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
        }
        crc
    })
}

/// Encode a packet as one complete frame, flags included.
pub fn encode_frame(packet: &SerialPacket) -> Result<Vec<u8>> {
    let len = u8::try_from(packet.payload.len()).map_err(|_| {
        CollectionError::frame(format!("payload of {} bytes exceeds 255", packet.payload.len()))
    })?;

    let mut body = Vec::with_capacity(2 + AM_HEADER_LEN + packet.payload.len() + CRC_LEN);
    body.push(SERIAL_PROTO_PACKET_NOACK);
    body.push(SERIAL_ACTIVE_MESSAGE_ID);
    body.extend_from_slice(&packet.dest.to_be_bytes());
    body.extend_from_slice(&packet.src.value().to_be_bytes());
    body.push(len);
    body.push(packet.group);
    body.push(packet.am_type);
    body.extend_from_slice(&packet.payload);
    let crc = crc16(&body);
    body.extend_from_slice(&crc.to_le_bytes());

    let mut frame = Vec::with_capacity(body.len() + 8);
    frame.push(HDLC_FLAG);
    for byte in body {
        if byte == HDLC_FLAG || byte == HDLC_ESCAPE {
            frame.push(HDLC_ESCAPE);
            frame.push(byte ^ ESCAPE_XOR);
        } else {
            frame.push(byte);
        }
    }
    frame.push(HDLC_FLAG);
    Ok(frame)
}

/// Decode one complete frame, flags included.
pub fn decode_frame(frame: &[u8]) -> Result<SerialPacket> {
    let inner = frame
        .strip_prefix(&[HDLC_FLAG])
        .and_then(|rest| rest.strip_suffix(&[HDLC_FLAG]))
        .ok_or_else(|| CollectionError::frame("missing frame delimiters"))?;
    decode_body(&unstuff(inner)?)
}

fn unstuff(stuffed: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(stuffed.len());
    let mut bytes = stuffed.iter();
    while let Some(&byte) = bytes.next() {
        match byte {
            HDLC_FLAG => return Err(CollectionError::frame("flag byte inside frame")),
            HDLC_ESCAPE => {
                let next = bytes
                    .next()
                    .ok_or_else(|| CollectionError::frame("dangling escape at end of frame"))?;
                out.push(next ^ ESCAPE_XOR);
            }
            _ => out.push(byte),
        }
    }
    Ok(out)
}

fn decode_body(body: &[u8]) -> Result<SerialPacket> {
    if body.len() < 2 + AM_HEADER_LEN + CRC_LEN {
        return Err(CollectionError::frame(format!("frame body too short ({} bytes)", body.len())));
    }

    let (content, crc_bytes) = body.split_at(body.len() - CRC_LEN);
    let expected = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let actual = crc16(content);
    if expected != actual {
        return Err(CollectionError::frame(format!(
            "crc mismatch: frame says {expected:#06x}, computed {actual:#06x}"
        )));
    }

    if content[0] != SERIAL_PROTO_PACKET_NOACK {
        return Err(CollectionError::frame(format!("unsupported protocol byte {:#04x}", content[0])));
    }
    if content[1] != SERIAL_ACTIVE_MESSAGE_ID {
        return Err(CollectionError::frame(format!("unsupported dispatch byte {:#04x}", content[1])));
    }

    let header = &content[2..2 + AM_HEADER_LEN];
    let payload = &content[2 + AM_HEADER_LEN..];
    let len = header[4] as usize;
    if len != payload.len() {
        return Err(CollectionError::frame(format!(
            "length field says {len} bytes, frame carries {}",
            payload.len()
        )));
    }

    Ok(SerialPacket {
        dest: u16::from_be_bytes([header[0], header[1]]),
        src: NodeId(u16::from_be_bytes([header[2], header[3]])),
        group: header[5],
        am_type: header[6],
        payload: payload.to_vec(),
    })
}

/// Splits an arbitrarily chunked byte stream into frames.
///
/// Bytes before the first flag are discarded. A frame that fails to decode is
/// reported and the accumulator resynchronises on the next flag.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    in_frame: bool,
    escaped: bool,
    overflowed: bool,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns every frame completed by this chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<SerialPacket>> {
        let mut frames = Vec::new();
        for &byte in chunk {
            if byte == HDLC_FLAG {
                if self.in_frame && (!self.buf.is_empty() || self.overflowed) {
                    frames.push(self.finish());
                }
                self.in_frame = true;
                self.reset();
                continue;
            }
            if !self.in_frame || self.overflowed {
                continue;
            }
            if self.escaped {
                self.buf.push(byte ^ ESCAPE_XOR);
                self.escaped = false;
            } else if byte == HDLC_ESCAPE {
                self.escaped = true;
            } else {
                self.buf.push(byte);
            }
            if self.buf.len() > MAX_FRAME_BODY {
                debug!(len = self.buf.len(), "Serial frame too long, waiting for next flag");
                self.overflowed = true;
                self.buf.clear();
            }
        }
        frames
    }

    fn finish(&mut self) -> Result<SerialPacket> {
        if self.overflowed {
            return Err(CollectionError::frame("frame exceeded maximum length"));
        }
        if self.escaped {
            return Err(CollectionError::frame("dangling escape at end of frame"));
        }
        trace!(len = self.buf.len(), "Serial frame complete");
        decode_body(&self.buf)
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.escaped = false;
        self.overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_packet(payload: Vec<u8>) -> SerialPacket {
        SerialPacket::to_host(NodeId(50), 30, payload)
    }

    #[test]
    fn crc_matches_reference_vector() {
        // CRC-16/XMODEM check value
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn frame_layout() {
        let frame = encode_frame(&sample_packet(vec![0x01, 0x02])).unwrap();
        assert_eq!(frame[0], HDLC_FLAG);
        assert_eq!(*frame.last().unwrap(), HDLC_FLAG);
        assert_eq!(&frame[1..10], &[0x45, 0x00, 0xFF, 0xFF, 0x00, 0x32, 0x02, 0x22, 0x1E]);
        assert_eq!(&frame[10..12], &[0x01, 0x02]);
    }

    #[test]
    fn flag_and_escape_bytes_are_stuffed() {
        let packet = sample_packet(vec![HDLC_FLAG, HDLC_ESCAPE, 0x00]);
        let frame = encode_frame(&packet).unwrap();
        assert_eq!(frame.iter().filter(|&&b| b == HDLC_FLAG).count(), 2);
        assert_eq!(decode_frame(&frame).unwrap(), packet);
    }

    #[test]
    fn corrupted_frame_fails_crc() {
        let mut frame = encode_frame(&sample_packet(vec![1, 2, 3])).unwrap();
        // first payload byte; the header bytes before it need no stuffing
        frame[10] ^= 0x01;
        let err = decode_frame(&frame).unwrap_err();
        assert!(err.to_string().contains("crc mismatch"));
    }

    #[test]
    fn oversized_payload_is_refused() {
        assert!(encode_frame(&sample_packet(vec![0; 256])).is_err());
    }

    #[test]
    fn accumulator_resyncs_after_garbage() {
        let packet = sample_packet(vec![9, 8, 7]);
        let frame = encode_frame(&packet).unwrap();

        let mut stream = vec![0x11, 0x22];
        stream.extend_from_slice(&[HDLC_FLAG, 0x45, 0x01, HDLC_FLAG]);
        stream.extend_from_slice(&frame);

        let mut acc = FrameAccumulator::new();
        let results = acc.push(&stream);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap(), &packet);
    }

    proptest! {
        #[test]
        fn accumulator_is_chunking_independent(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 1..5),
            split in 1usize..16,
        ) {
            let packets: Vec<_> = payloads.into_iter().map(sample_packet).collect();
            let stream: Vec<u8> = packets
                .iter()
                .flat_map(|p| encode_frame(p).unwrap())
                .collect();

            let mut acc = FrameAccumulator::new();
            let mut decoded = Vec::new();
            for chunk in stream.chunks(split) {
                for frame in acc.push(chunk) {
                    decoded.push(frame.unwrap());
                }
            }
            prop_assert_eq!(decoded, packets);
        }
    }
}
