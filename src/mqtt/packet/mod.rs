// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

// Fixed header, packet type, and the per-packet-type codecs for the MQTT v5
// subset this client speaks: CONNECT, CONNACK, PUBLISH, PUBACK, SUBSCRIBE,
// SUBACK, UNSUBSCRIBE, UNSUBACK, PINGREQ, PINGRESP, DISCONNECT.

pub mod connack;
pub mod connect;
pub mod disconnect;
pub mod pingreq;
pub mod pingresp;
pub mod puback;
pub mod publish;
pub mod qos;
pub mod suback;
pub mod subscribe;
pub mod unsuback;
pub mod unsubscribe;

pub use connack::Connack;
pub use connect::Connect;
pub use disconnect::Disconnect;
pub use pingreq::Pingreq;
pub use pingresp::Pingresp;
pub use puback::Puback;
pub use publish::Publish;
pub use qos::Qos;
pub use suback::Suback;
pub use subscribe::Subscribe;
pub use unsuback::Unsuback;
pub use unsubscribe::Unsubscribe;

use crate::error::PacketError;
use crate::mqtt::vbi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    Connack = 2,
    Publish = 3,
    Puback = 4,
    Subscribe = 8,
    Suback = 9,
    Unsubscribe = 10,
    Unsuback = 11,
    Pingreq = 12,
    Pingresp = 13,
    Disconnect = 14,
}

impl PacketType {
    pub fn name(self) -> &'static str {
        match self {
            PacketType::Connect => "CONNECT",
            PacketType::Connack => "CONNACK",
            PacketType::Publish => "PUBLISH",
            PacketType::Puback => "PUBACK",
            PacketType::Subscribe => "SUBSCRIBE",
            PacketType::Suback => "SUBACK",
            PacketType::Unsubscribe => "UNSUBSCRIBE",
            PacketType::Unsuback => "UNSUBACK",
            PacketType::Pingreq => "PINGREQ",
            PacketType::Pingresp => "PINGRESP",
            PacketType::Disconnect => "DISCONNECT",
        }
    }
}

/// Split a fixed-header first byte into packet type and flags nibble.
/// Returns `Ok(None)` for a recognized-but-unhandled type (PUBREC, AUTH, ...)
/// so the read loop can log-and-ignore per its contract instead of treating
/// every unknown nibble as a hard decode error.
pub fn decode_packet_type(first_byte: u8) -> Result<Option<(PacketType, u8)>, PacketError> {
    let flags = first_byte & 0x0F;
    let ty = match first_byte >> 4 {
        1 => PacketType::Connect,
        2 => PacketType::Connack,
        3 => PacketType::Publish,
        4 => PacketType::Puback,
        8 => PacketType::Subscribe,
        9 => PacketType::Suback,
        10 => PacketType::Unsubscribe,
        11 => PacketType::Unsuback,
        12 => PacketType::Pingreq,
        13 => PacketType::Pingresp,
        14 => PacketType::Disconnect,
        0 | 5..=7 | 15 => return Err(PacketError::UnknownPacketType(first_byte)),
        _ => return Ok(None),
    };
    Ok(Some((ty, flags)))
}

/// Encode a fixed header: `(type << 4 | flags)` followed by the VBI remaining length.
pub fn encode_fixed_header(
    packet_type: PacketType,
    flags: u8,
    remaining_length: u32,
) -> Result<Vec<u8>, PacketError> {
    let mut out = Vec::with_capacity(5);
    out.push((packet_type as u8) << 4 | (flags & 0x0F));
    out.extend(vbi::encode(remaining_length)?);
    Ok(out)
}

/// Append a zero-length MQTT v5 properties field: a single `0x00` VBI byte.
/// This client never emits non-empty properties (see crate docs).
pub fn encode_empty_properties(out: &mut Vec<u8>) {
    out.push(0x00);
}

/// Skip a properties field of arbitrary length, returning bytes consumed
/// (the VBI length prefix plus the property bytes themselves). Inbound
/// properties are never interpreted, only skipped cleanly.
pub fn skip_properties(buf: &[u8]) -> Result<usize, PacketError> {
    let (len, prefix) = vbi::decode(buf)?;
    let total = prefix + len as usize;
    if buf.len() < total {
        return Err(PacketError::Truncated("properties"));
    }
    Ok(total)
}
