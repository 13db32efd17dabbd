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
use crate::error::{PacketError, ReasonCode};
use crate::mqtt::packet::{decode_packet_type, skip_properties, PacketType};

/// SUBACK: one reason code per topic filter in the originating SUBSCRIBE,
/// in the same order.
#[derive(Debug, Clone)]
pub struct Suback {
    pub packet_id: u16,
    pub reason_codes: Vec<ReasonCode>,
}

impl Suback {
    pub fn decode(first_byte: u8, body: &[u8]) -> Result<Self, PacketError> {
        match decode_packet_type(first_byte)? {
            Some((PacketType::Suback, _)) => {}
            Some((other, _)) => {
                return Err(PacketError::TypeMismatch {
                    expected: "SUBACK",
                    found: other.name(),
                })
            }
            None => return Err(PacketError::UnknownPacketType(first_byte)),
        }
        if body.len() < 2 {
            return Err(PacketError::Truncated("SUBACK packet id"));
        }
        let packet_id = u16::from_be_bytes([body[0], body[1]]);
        let props_len = skip_properties(&body[2..])?;
        let payload = &body[2 + props_len..];
        if payload.is_empty() {
            return Err(PacketError::Malformed("SUBACK with no reason codes"));
        }
        let reason_codes = payload.iter().map(|&b| ReasonCode(b)).collect();
        Ok(Suback {
            packet_id,
            reason_codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_reason_codes_in_order() {
        let body = [0x00, 0x05, 0x00, 0x00, 0x01, 0x80];
        let suback = Suback::decode(0x90, &body).unwrap();
        assert_eq!(suback.packet_id, 5);
        assert_eq!(
            suback.reason_codes,
            vec![ReasonCode(0x00), ReasonCode(0x01), ReasonCode(0x80)]
        );
    }
}
