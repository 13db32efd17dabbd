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

/// SUBSCRIBE. Subscription options carry only the requested QoS in bits 0-1;
/// no-local, retain-as-published and retain-handling are never set.
#[derive(Debug, Clone)]
pub struct Subscribe {
    pub packet_id: u16,
    pub topic_filters: Vec<(String, Qos)>,
}

impl Subscribe {
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.packet_id.to_be_bytes());
        encode_empty_properties(&mut body);
        for (filter, qos) in &self.topic_filters {
            strings::encode(filter, &mut body)?;
            body.push(qos.as_u8());
        }
        // SUBSCRIBE always carries flags nibble 0b0010 per the fixed spec.
        let mut out = encode_fixed_header(PacketType::Subscribe, 0b0010, body.len() as u32)?;
        out.extend(body);
        Ok(out)
    }
}
