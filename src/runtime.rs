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

// The top-level object a device's `main` constructs: wires a loaded
// [`RuntimeConfig`] to a connection and, if configured, an update channel.
// Everything here is built once at boot and passed down explicitly — no
// ambient process-wide state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use crate::config::RuntimeConfig;
use crate::error::{ClientError, CoreError};
use crate::mqtt::client::{ClientConfig, MqttClient};
use crate::mqtt::dispatcher::ConnectionManager;
use crate::mqtt::transport::{TcpTransport, Transport, TlsTransport};
use crate::ota::channel::UpdateChannel;

/// Triggers an actual device reset on real hardware; never returns there.
/// Test doubles may return normally.
pub trait DeviceReset: Send + Sync {
    fn reset(&self) -> std::io::Result<()>;
}

/// Feeds an OS/hardware watchdog so the device is not reset while the
/// runtime is making progress.
pub trait Watchdog: Send + Sync {
    fn arm(&self, timeout: Duration);
    fn feed(&self);
}

/// A clock boundary so keep-alive and update-channel timing can be driven
/// by a virtual clock under test instead of real wall time.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> std::time::Instant;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct NoopWatchdog;

impl Watchdog for NoopWatchdog {
    fn arm(&self, _timeout: Duration) {}
    fn feed(&self) {}
}

/// Owns the loaded configuration, the running connection, and (if
/// `update.channel` was configured) the update channel built on top of it.
pub struct Runtime {
    config: RuntimeConfig,
    connection: Arc<ConnectionManager>,
    update_channel: Option<Arc<UpdateChannel>>,
    device_reset: Arc<dyn DeviceReset>,
}

impl Runtime {
    /// Connects to `config.mqtt`'s broker, registers the default connection,
    /// and (if configured) builds the update channel on top of it.
    ///
    /// `tls_config` is required iff `config.mqtt.ssl` is set: TLS parameters
    /// are opaque to the core (§6), so the embedding application builds the
    /// `rustls::ClientConfig` (trust roots, client certs) and hands it in.
    pub async fn bootstrap(
        config: RuntimeConfig,
        client_id: String,
        tls_config: Option<Arc<tokio_rustls::rustls::ClientConfig>>,
        device_reset: Arc<dyn DeviceReset>,
    ) -> Result<Self, CoreError> {
        let transport: Box<dyn Transport> = if config.mqtt.ssl {
            let tls_config = tls_config.ok_or_else(|| {
                CoreError::Config(crate::error::ConfigError::InvalidValue {
                    field: "mqtt.ssl_params",
                    reason: "mqtt.ssl is set but no TLS config was supplied".to_string(),
                })
            })?;
            Box::new(
                TlsTransport::connect(&config.mqtt.server, config.mqtt.port, tls_config)
                    .await
                    .map_err(ClientError::from)?,
            )
        } else {
            Box::new(
                TcpTransport::connect(&config.mqtt.server, config.mqtt.port)
                    .await
                    .map_err(ClientError::from)?,
            )
        };

        let client_config = ClientConfig {
            client_id: client_id.clone(),
            username: config.mqtt.username.clone(),
            password: config.mqtt.password.clone().map(String::into_bytes),
            will: None,
            keep_alive: config.mqtt.keep_alive_interval,
            ..ClientConfig::default()
        };

        let client = Arc::new(MqttClient::connect(transport, client_config).await?);
        let connection = ConnectionManager::spawn(client);

        let update_channel = if let Some(channel_name) = config.update.channel.clone() {
            Some(
                UpdateChannel::register(
                    connection.clone(),
                    channel_name,
                    client_id,
                    config.update.auto_update,
                    device_reset.clone(),
                )
                .await?,
            )
        } else {
            None
        };

        Ok(Runtime {
            config,
            connection,
            update_channel,
            device_reset,
        })
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn update_channel(&self) -> Option<&Arc<UpdateChannel>> {
        self.update_channel.as_ref()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Runs `body` to completion, logging any otherwise-unhandled failure
    /// with its full `source()` chain and triggering a device reset rather
    /// than unwinding out of `main`.
    pub async fn run<F, Fut>(&self, body: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(), CoreError>>,
    {
        if let Err(err) = body().await {
            report_failure_and_reset(&err, self.device_reset.as_ref());
        }
    }
}

fn report_failure_and_reset(err: &CoreError, device_reset: &dyn DeviceReset) {
    let mut source: &dyn std::error::Error = err;
    error!(error = %err, "runtime failure, device will reset");
    while let Some(next) = source.source() {
        error!(caused_by = %next, "...");
        source = next;
    }
    if let Err(e) = device_reset.reset() {
        error!(error = %e, "device reset itself failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingReset {
        count: std::sync::atomic::AtomicUsize,
    }

    impl DeviceReset for CountingReset {
        fn reset(&self) -> std::io::Result<()> {
            self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn report_failure_triggers_reset() {
        let reset = CountingReset {
            count: std::sync::atomic::AtomicUsize::new(0),
        };
        let err = CoreError::Client(crate::error::ClientError::NotConnected);
        report_failure_and_reset(&err, &reset);
        assert_eq!(reset.count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
