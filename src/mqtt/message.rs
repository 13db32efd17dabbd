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
// The application-facing view of a PUBLISH, decoupled from wire framing.

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::error::PacketError;
use crate::mqtt::packet::{Publish, Qos};

/// Lazily-classified payload: JSON if it parses, raw bytes otherwise. Never
/// re-derived once computed.
#[derive(Debug, Clone)]
pub enum PayloadView {
    Json(Value),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload_raw: Vec<u8>,
    pub qos: Qos,
    pub retain: bool,
    pub packet_id: Option<u16>,
    view: OnceCell<PayloadView>,
}

impl MqttMessage {
    pub fn new(topic: impl Into<String>, payload_raw: Vec<u8>, qos: Qos, retain: bool) -> Self {
        MqttMessage {
            topic: topic.into(),
            payload_raw,
            qos,
            retain,
            packet_id: None,
            view: OnceCell::new(),
        }
    }

    /// Build a JSON-bodied message, matching callers that publish structured
    /// update-channel payloads (node info, manifests).
    pub fn from_json(topic: impl Into<String>, value: &Value, qos: Qos, retain: bool) -> Self {
        let payload_raw = serde_json::to_vec(value).unwrap_or_default();
        MqttMessage::new(topic, payload_raw, qos, retain)
    }

    /// Classify and cache the payload view on first access.
    pub fn payload_view(&self) -> &PayloadView {
        self.view.get_or_init(|| {
            match serde_json::from_slice::<Value>(&self.payload_raw) {
                Ok(v) => PayloadView::Json(v),
                Err(_) => PayloadView::Bytes(self.payload_raw.clone()),
            }
        })
    }

    /// Serialize to an outbound PUBLISH (always with `dup = false`; the
    /// client sets `packet_id` just before framing on the wire).
    pub fn to_packed(&self, packet_id: Option<u16>) -> Result<Publish, PacketError> {
        Ok(Publish {
            topic: self.topic.clone(),
            qos: self.qos,
            retain: self.retain,
            dup: false,
            packet_id,
            payload: self.payload_raw.clone(),
        })
    }

    /// Reconstruct from a decoded PUBLISH.
    pub fn from_packed(publish: Publish) -> Self {
        MqttMessage {
            topic: publish.topic,
            payload_raw: publish.payload,
            qos: publish.qos,
            retain: publish.retain,
            packet_id: publish.packet_id,
            view: OnceCell::new(),
        }
    }
}
