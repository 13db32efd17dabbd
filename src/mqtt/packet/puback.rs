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
use crate::mqtt::packet::{decode_packet_type, encode_fixed_header, PacketType};

/// PUBACK, acknowledging a QoS 1 PUBLISH. When the remaining length is
/// exactly 2 the reason code is implicitly success and properties are
/// absent entirely, per the MQTT v5 "short form" allowance.
#[derive(Debug, Clone, Copy)]
pub struct Puback {
    pub packet_id: u16,
    pub reason_code: ReasonCode,
}

impl Puback {
    pub fn new(packet_id: u16, reason_code: ReasonCode) -> Self {
        Puback {
            packet_id,
            reason_code,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        if self.reason_code.is_success() {
            let mut out = encode_fixed_header(PacketType::Puback, 0, 2)?;
            out.extend_from_slice(&self.packet_id.to_be_bytes());
            Ok(out)
        } else {
            let mut out = encode_fixed_header(PacketType::Puback, 0, 4)?;
            out.extend_from_slice(&self.packet_id.to_be_bytes());
            out.push(self.reason_code.0);
            out.push(0x00); // empty properties
            Ok(out)
        }
    }

    pub fn decode(first_byte: u8, body: &[u8]) -> Result<Self, PacketError> {
        match decode_packet_type(first_byte)? {
            Some((PacketType::Puback, _)) => {}
            Some((other, _)) => {
                return Err(PacketError::TypeMismatch {
                    expected: "PUBACK",
                    found: other.name(),
                })
            }
            None => return Err(PacketError::UnknownPacketType(first_byte)),
        }
        if body.len() < 2 {
            return Err(PacketError::Truncated("PUBACK packet id"));
        }
        let packet_id = u16::from_be_bytes([body[0], body[1]]);
        let reason_code = body.get(2).copied().unwrap_or(0x00);
        Ok(Puback {
            packet_id,
            reason_code: ReasonCode(reason_code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_success_round_trips() {
        let puback = Puback::new(42, ReasonCode::SUCCESS);
        let encoded = puback.encode().unwrap();
        assert_eq!(encoded.len(), 4); // fixed header (2) + packet id (2)
        let decoded = Puback::decode(encoded[0], &encoded[2..]).unwrap();
        assert_eq!(decoded.packet_id, 42);
        assert!(decoded.reason_code.is_success());
    }

    #[test]
    fn failure_reason_round_trips() {
        let puback = Puback::new(7, ReasonCode(0x87));
        let encoded = puback.encode().unwrap();
        let decoded = Puback::decode(encoded[0], &encoded[2..]).unwrap();
        assert_eq!(decoded.packet_id, 7);
        assert_eq!(decoded.reason_code.0, 0x87);
    }
}
