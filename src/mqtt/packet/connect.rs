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
use crate::mqtt::packet::{encode_empty_properties, encode_fixed_header, PacketType, Qos};
use crate::mqtt::strings;

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 5;

#[derive(Debug, Clone)]
pub struct Will {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
    pub retain: bool,
}

/// A CONNECT packet. Always sent with `clean_start = true` by this client
/// (see `crate::mqtt::client`); session resumption is out of scope.
#[derive(Debug, Clone)]
pub struct Connect {
    pub client_id: String,
    pub clean_start: bool,
    pub keep_alive: u16,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
    pub will: Option<Will>,
}

impl Connect {
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let mut flags = 0u8;
        if self.clean_start {
            flags |= 0b0000_0010;
        }
        if let Some(will) = &self.will {
            flags |= 0b0000_0100;
            flags |= (will.qos.as_u8() & 0x03) << 3;
            if will.retain {
                flags |= 0b0010_0000;
            }
        }
        if self.username.is_some() {
            flags |= 0b1000_0000;
        }
        if self.password.is_some() {
            flags |= 0b0100_0000;
        }

        let mut variable_and_payload = Vec::new();
        strings::encode(PROTOCOL_NAME, &mut variable_and_payload)?;
        variable_and_payload.push(PROTOCOL_LEVEL);
        variable_and_payload.push(flags);
        variable_and_payload.extend_from_slice(&self.keep_alive.to_be_bytes());
        encode_empty_properties(&mut variable_and_payload);

        strings::encode(&self.client_id, &mut variable_and_payload)?;
        if let Some(will) = &self.will {
            encode_empty_properties(&mut variable_and_payload);
            strings::encode(&will.topic, &mut variable_and_payload)?;
            variable_and_payload.extend_from_slice(&(will.payload.len() as u16).to_be_bytes());
            variable_and_payload.extend_from_slice(&will.payload);
        }
        if let Some(username) = &self.username {
            strings::encode(username, &mut variable_and_payload)?;
        }
        if let Some(password) = &self.password {
            variable_and_payload.extend_from_slice(&(password.len() as u16).to_be_bytes());
            variable_and_payload.extend_from_slice(password);
        }

        let mut out =
            encode_fixed_header(PacketType::Connect, 0, variable_and_payload.len() as u32)?;
        out.extend(variable_and_payload);
        Ok(out)
    }
}
