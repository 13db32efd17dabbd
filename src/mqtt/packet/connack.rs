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

/// CONNACK. Session presence is never meaningful to this client (it always
/// connects with `clean_start = true`), so only the reason code is kept.
#[derive(Debug, Clone, Copy)]
pub struct Connack {
    pub session_present: bool,
    pub reason_code: ReasonCode,
}

impl Connack {
    pub fn decode(first_byte: u8, body: &[u8]) -> Result<Self, PacketError> {
        match decode_packet_type(first_byte)? {
            Some((PacketType::Connack, _)) => {}
            Some((other, _)) => {
                return Err(PacketError::TypeMismatch {
                    expected: "CONNACK",
                    found: other.name(),
                })
            }
            None => return Err(PacketError::UnknownPacketType(first_byte)),
        }
        if body.len() < 2 {
            return Err(PacketError::Truncated("CONNACK variable header"));
        }
        let session_present = body[0] & 0x01 != 0;
        let reason_code = ReasonCode(body[1]);
        // properties are present but never interpreted
        let _ = skip_properties(&body[2..]);
        Ok(Connack {
            session_present,
            reason_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_success() {
        let body = [0x00, 0x00, 0x00];
        let connack = Connack::decode(0x20, &body).unwrap();
        assert!(!connack.session_present);
        assert!(connack.reason_code.is_success());
    }

    #[test]
    fn decodes_refusal_reason() {
        let body = [0x00, 0x87, 0x00];
        let connack = Connack::decode(0x20, &body).unwrap();
        assert_eq!(connack.reason_code.0, 0x87);
    }
}
