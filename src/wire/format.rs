//! Collection packet wire layouts
//!
//! All fields are big-endian ("network order").
//!
//! | layout | bytes | fields |
//! |---|---|---|
//! | minimal | 12 | x, y, z, hopcount, origin, quality |
//! | path-with-link-metric | 24 | x, y, z, message_path[4], hopcount, origin, quality, link_path_value, link_path_addr |
//! | path-with-quality-array | 24 | x, y, z, message_path[4], path_quality[4], hopcount |
//!
//! The quality-array layout carries neither origin nor quality; they are read
//! back from slot zero of the path and quality arrays.

use tracing::trace;

use crate::types::constants::NUMBER_OF_MOTES;
use crate::types::{
    AccelerationSample, CollectionPacket, MessagePath, NodeId, PacketFormat, Provenance,
};
use crate::{CollectionError, Result};

const AXES_LEN: usize = 6;
const PATH_LEN: usize = 2 * NUMBER_OF_MOTES;

/// Encode a packet in its own layout.
pub fn encode_packet(packet: &CollectionPacket) -> Vec<u8> {
    let format = packet.format();
    let mut out = Vec::with_capacity(format.wire_len());

    let sample = packet.sample();
    put_i16(&mut out, sample.x);
    put_i16(&mut out, sample.y);
    put_i16(&mut out, sample.z);

    match packet.provenance() {
        Provenance::Minimal => {
            put_u16(&mut out, packet.hop_count());
            put_u16(&mut out, packet.origin().value());
            put_u16(&mut out, packet.quality());
        }
        Provenance::LinkMetric { path, link_value, link_addr } => {
            put_array(&mut out, &path.to_wire());
            put_u16(&mut out, packet.hop_count());
            put_u16(&mut out, packet.origin().value());
            put_u16(&mut out, packet.quality());
            put_u16(&mut out, *link_value);
            put_u16(&mut out, link_addr.value());
        }
        Provenance::QualityArray { path, path_quality } => {
            put_array(&mut out, &path.to_wire());
            put_array(&mut out, path_quality);
            put_u16(&mut out, packet.hop_count());
        }
    }

    debug_assert_eq!(out.len(), format.wire_len());
    out
}

/// Decode a payload that is expected to use `format`.
pub fn decode_packet(format: PacketFormat, data: &[u8]) -> Result<CollectionPacket> {
    let expected = format.wire_len();
    if data.len() != expected {
        return Err(CollectionError::parse(
            format!("{format} packet"),
            format!("expected {} bytes, got {}", expected, data.len()),
        ));
    }

    let sample = AccelerationSample::new(
        parse_i16_be(data, 0)?,
        parse_i16_be(data, 2)?,
        parse_i16_be(data, 4)?,
    );

    let packet = match format {
        PacketFormat::Minimal => {
            let hop_count = parse_u16_be(data, 6)?;
            let origin = parse_origin(data, 8)?;
            let quality = parse_u16_be(data, 10)?;
            CollectionPacket::from_parts(sample, origin, hop_count, quality, Provenance::Minimal)
        }
        PacketFormat::PathWithLinkMetric => {
            let slots = parse_array(data, AXES_LEN)?;
            let base = AXES_LEN + PATH_LEN;
            let hop_count = parse_u16_be(data, base)?;
            let origin = parse_origin(data, base + 2)?;
            let quality = parse_u16_be(data, base + 4)?;
            let link_value = parse_u16_be(data, base + 6)?;
            let link_addr = NodeId(parse_u16_be(data, base + 8)?);
            if slots[0] != origin.value() {
                return Err(CollectionError::parse(
                    "Message path",
                    format!("path starts at {} but origin is {}", slots[0], origin),
                ));
            }
            let path = MessagePath::from_wire(slots, hop_count);
            CollectionPacket::from_parts(
                sample,
                origin,
                hop_count,
                quality,
                Provenance::LinkMetric { path, link_value, link_addr },
            )
        }
        PacketFormat::PathWithQualityArray => {
            let slots = parse_array(data, AXES_LEN)?;
            let path_quality = parse_array(data, AXES_LEN + PATH_LEN)?;
            let hop_count = parse_u16_be(data, AXES_LEN + 2 * PATH_LEN)?;
            let origin = parse_origin(data, AXES_LEN)?;
            let path = MessagePath::from_wire(slots, hop_count);
            CollectionPacket::from_parts(
                sample,
                origin,
                hop_count,
                path_quality[0],
                Provenance::QualityArray { path, path_quality },
            )
        }
    };

    trace!(%format, origin = %packet.origin(), hop_count = packet.hop_count(), "Decoded packet");
    Ok(packet)
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_array(out: &mut Vec<u8>, values: &[u16; NUMBER_OF_MOTES]) {
    for value in values {
        put_u16(out, *value);
    }
}

/// Safe byte parsing helpers with bounds checking
fn parse_u16_be(data: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > data.len() {
        return Err(CollectionError::parse(
            "Integer parsing",
            format!(
                "Insufficient data for u16 at offset {} (need 2 bytes, have {})",
                offset,
                data.len().saturating_sub(offset)
            ),
        ));
    }
    Ok(u16::from_be_bytes([data[offset], data[offset + 1]]))
}

fn parse_i16_be(data: &[u8], offset: usize) -> Result<i16> {
    parse_u16_be(data, offset).map(|raw| raw as i16)
}

fn parse_array(data: &[u8], offset: usize) -> Result<[u16; NUMBER_OF_MOTES]> {
    let mut values = [0u16; NUMBER_OF_MOTES];
    for (i, value) in values.iter_mut().enumerate() {
        *value = parse_u16_be(data, offset + 2 * i)?;
    }
    Ok(values)
}

fn parse_origin(data: &[u8], offset: usize) -> Result<NodeId> {
    let origin = NodeId(parse_u16_be(data, offset)?);
    if origin.is_empty() {
        return Err(CollectionError::parse("Origin field", "origin id 0 is reserved"));
    }
    Ok(origin)
}
