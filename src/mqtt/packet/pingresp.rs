/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use crate::error::PacketError;
use crate::mqtt::packet::{decode_packet_type, PacketType};

/// PINGRESP: fixed header only. Decoding only confirms the type byte; the
/// remaining-length VBI byte (always `0x00`) is consumed by the read loop
/// before this is reached.
#[derive(Debug, Clone, Copy)]
pub struct Pingresp;

impl Pingresp {
    pub fn decode(first_byte: u8) -> Result<Self, PacketError> {
        match decode_packet_type(first_byte)? {
            Some((PacketType::Pingresp, _)) => Ok(Pingresp),
            Some((other, _)) => Err(PacketError::TypeMismatch {
                expected: "PINGRESP",
                found: other.name(),
            }),
            None => Err(PacketError::UnknownPacketType(first_byte)),
        }
    }
}
