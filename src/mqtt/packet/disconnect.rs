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

/// DISCONNECT. This client only ever sends the no-payload form (reason code
/// `0x00`, normal disconnection); the reason-code-and-properties variable
/// header is optional on the wire and omitted entirely when absent.
#[derive(Debug, Clone, Copy)]
pub struct Disconnect {
    pub reason_code: ReasonCode,
}

impl Disconnect {
    pub fn normal() -> Self {
        Disconnect {
            reason_code: ReasonCode::SUCCESS,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        if self.reason_code.is_success() {
            encode_fixed_header(PacketType::Disconnect, 0, 0)
        } else {
            let mut out = encode_fixed_header(PacketType::Disconnect, 0, 1)?;
            out.push(self.reason_code.0);
            Ok(out)
        }
    }

    /// Decode the variable header from a server-sent DISCONNECT. `body` is
    /// the bytes after the fixed header; an empty body means reason code
    /// `0x00` by omission.
    pub fn decode(first_byte: u8, body: &[u8]) -> Result<Self, PacketError> {
        match decode_packet_type(first_byte)? {
            Some((PacketType::Disconnect, _)) => {}
            Some((other, _)) => {
                return Err(PacketError::TypeMismatch {
                    expected: "DISCONNECT",
                    found: other.name(),
                })
            }
            None => return Err(PacketError::UnknownPacketType(first_byte)),
        }
        let reason_code = body.first().copied().unwrap_or(0x00);
        Ok(Disconnect {
            reason_code: ReasonCode(reason_code),
        })
    }
}
