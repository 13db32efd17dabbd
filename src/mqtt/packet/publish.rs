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
use crate::mqtt::packet::{
    decode_packet_type, encode_empty_properties, encode_fixed_header, skip_properties,
    PacketType, Qos,
};
use crate::mqtt::strings;

/// PUBLISH. Retain lives in flags bit 0, QoS in bits 1-2, DUP in bit 3. The
/// packet id is present on the wire iff `qos > AtMostOnce`.
#[derive(Debug, Clone)]
pub struct Publish {
    pub topic: String,
    pub qos: Qos,
    pub retain: bool,
    pub dup: bool,
    pub packet_id: Option<u16>,
    pub payload: Vec<u8>,
}

impl Publish {
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        if self.qos != Qos::AtMostOnce && self.packet_id.is_none() {
            return Err(PacketError::Malformed(
                "PUBLISH with qos > 0 requires a packet id",
            ));
        }

        let mut flags = 0u8;
        if self.retain {
            flags |= 0b0001;
        }
        flags |= (self.qos.as_u8() & 0x03) << 1;
        if self.dup {
            flags |= 0b1000;
        }

        let mut body = Vec::new();
        strings::encode(&self.topic, &mut body)?;
        if let Some(packet_id) = self.packet_id {
            body.extend_from_slice(&packet_id.to_be_bytes());
        }
        encode_empty_properties(&mut body);
        body.extend_from_slice(&self.payload);

        let mut out = encode_fixed_header(PacketType::Publish, flags, body.len() as u32)?;
        out.extend(body);
        Ok(out)
    }

    pub fn decode(first_byte: u8, body: &[u8]) -> Result<Self, PacketError> {
        let (_, flags) = match decode_packet_type(first_byte)? {
            Some((PacketType::Publish, flags)) => (PacketType::Publish, flags),
            Some((other, _)) => {
                return Err(PacketError::TypeMismatch {
                    expected: "PUBLISH",
                    found: other.name(),
                })
            }
            None => return Err(PacketError::UnknownPacketType(first_byte)),
        };
        let retain = flags & 0b0001 != 0;
        let qos = Qos::from_wire((flags >> 1) & 0x03)
            .ok_or(PacketError::Malformed("invalid qos in PUBLISH flags"))?;
        let dup = flags & 0b1000 != 0;

        let (topic, mut offset) = strings::decode(body)?;
        let packet_id = if qos != Qos::AtMostOnce {
            if body.len() < offset + 2 {
                return Err(PacketError::Truncated("PUBLISH packet id"));
            }
            let id = u16::from_be_bytes([body[offset], body[offset + 1]]);
            offset += 2;
            Some(id)
        } else {
            None
        };
        let props_len = skip_properties(&body[offset..])?;
        offset += props_len;
        let payload = body[offset..].to_vec();

        Ok(Publish {
            topic,
            qos,
            retain,
            dup,
            packet_id,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos0_round_trips_without_packet_id() {
        let publish = Publish {
            topic: "mpypi/nodes/dev/info".into(),
            qos: Qos::AtMostOnce,
            retain: true,
            dup: false,
            packet_id: None,
            payload: b"{\"fw\":\"1.0\"}".to_vec(),
        };
        let encoded = publish.encode().unwrap();
        let decoded = Publish::decode(encoded[0], &encoded[2..]).unwrap();
        assert_eq!(decoded.topic, publish.topic);
        assert_eq!(decoded.payload, publish.payload);
        assert!(decoded.retain);
        assert_eq!(decoded.packet_id, None);
    }

    #[test]
    fn qos1_round_trips_with_packet_id() {
        let publish = Publish {
            topic: "mpypi/channels/stable".into(),
            qos: Qos::AtLeastOnce,
            retain: false,
            dup: true,
            packet_id: Some(99),
            payload: b"[]".to_vec(),
        };
        let encoded = publish.encode().unwrap();
        let decoded = Publish::decode(encoded[0], &encoded[2..]).unwrap();
        assert_eq!(decoded.packet_id, Some(99));
        assert!(decoded.dup);
    }

    #[test]
    fn rejects_qos1_without_packet_id() {
        let publish = Publish {
            topic: "a".into(),
            qos: Qos::AtLeastOnce,
            retain: false,
            dup: false,
            packet_id: None,
            payload: Vec::new(),
        };
        assert!(publish.encode().is_err());
    }
}
