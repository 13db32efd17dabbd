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

// Boundary configuration, loaded once at boot from a JSON document and
// never re-read by the protocol code.

use std::fmt;
use std::time::Duration;

use derive_builder::Builder;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize, Default)]
struct MqttConfigDoc {
    #[serde(default)]
    server: String,
    #[serde(default)]
    port: u16,
    #[serde(default)]
    ssl: bool,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    keep_alive_interval: Option<u64>,
    #[serde(default)]
    wdt_timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct UpdateConfigDoc {
    channel: Option<String>,
    #[serde(default)]
    auto_update: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RuntimeConfigDoc {
    mqtt: MqttConfigDoc,
    #[serde(default)]
    update: UpdateConfigDoc,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    emergency_buf_len: Option<usize>,
}

#[derive(Builder, Clone)]
#[builder(setter(into), build_fn(private, name = "build_unchecked"))]
pub struct MqttConfig {
    pub server: String,
    pub port: u16,
    #[builder(default = "false")]
    pub ssl: bool,
    #[builder(default)]
    pub username: Option<String>,
    #[builder(default)]
    pub password: Option<String>,
    #[builder(default = "Duration::from_secs(60)")]
    pub keep_alive_interval: Duration,
    #[builder(default)]
    pub wdt_timeout: Option<Duration>,
}

impl fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("keep_alive_interval", &self.keep_alive_interval)
            .field("wdt_timeout", &self.wdt_timeout)
            .finish()
    }
}

#[derive(Debug, Builder, Clone)]
#[builder(setter(into), build_fn(private, name = "build_unchecked"))]
pub struct UpdateConfig {
    #[builder(default)]
    pub channel: Option<String>,
    #[builder(default = "false")]
    pub auto_update: bool,
}

#[derive(Builder, Clone)]
#[builder(setter(into), build_fn(private, name = "build_unchecked"))]
pub struct RuntimeConfig {
    pub mqtt: MqttConfig,
    #[builder(default)]
    pub update: UpdateConfig,
    #[builder(default)]
    pub hostname: Option<String>,
    #[builder(default = "0")]
    pub emergency_buf_len: usize,
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("mqtt", &self.mqtt)
            .field("update", &self.update)
            .field("hostname", &self.hostname)
            .field("emergency_buf_len", &self.emergency_buf_len)
            .finish()
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        UpdateConfig {
            channel: None,
            auto_update: false,
        }
    }
}

impl RuntimeConfig {
    /// Parses and validates a config document, applying the same defaults
    /// the original `mqtt_as`-derived runtime used.
    pub fn from_json(bytes: &[u8]) -> Result<RuntimeConfig, ConfigError> {
        let doc: RuntimeConfigDoc = serde_json::from_slice(bytes)?;

        if doc.mqtt.server.is_empty() {
            return Err(ConfigError::MissingField("mqtt.server"));
        }
        if doc.mqtt.port == 0 {
            return Err(ConfigError::MissingField("mqtt.port"));
        }

        let mqtt = MqttConfigBuilder::default()
            .server(doc.mqtt.server)
            .port(doc.mqtt.port)
            .ssl(doc.mqtt.ssl)
            .username(doc.mqtt.username)
            .password(doc.mqtt.password)
            .keep_alive_interval(Duration::from_secs(doc.mqtt.keep_alive_interval.unwrap_or(60)))
            .wdt_timeout(doc.mqtt.wdt_timeout.map(Duration::from_millis))
            .build_unchecked()
            .expect("all required MqttConfig fields set above");

        let update = UpdateConfigBuilder::default()
            .channel(doc.update.channel)
            .auto_update(doc.update.auto_update)
            .build_unchecked()
            .expect("all required UpdateConfig fields set above");

        RuntimeConfigBuilder::default()
            .mqtt(mqtt)
            .update(update)
            .hostname(doc.hostname)
            .emergency_buf_len(doc.emergency_buf_len.unwrap_or(0))
            .build_unchecked()
            .map_err(|e| ConfigError::InvalidValue {
                field: "runtime",
                reason: e.to_string(),
            })
    }
}
