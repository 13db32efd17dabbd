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
// The manifest-driven update state machine: diffs a channel's desired
// package set against the local inventory, fetches what's missing over
// MQTT, and installs it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::error::{CoreError, UpdateError};
use crate::mqtt::dispatcher::{Consumer, ConnectionManager};
use crate::mqtt::message::MqttMessage;
use crate::mqtt::packet::Qos;
use crate::ota::inventory;
use crate::ota::manifest::{parse_manifest, ManifestEntry};
use crate::ota::wheel::WheelPackage;
use crate::ota::zip::ZipArchive;
use crate::runtime::DeviceReset;

const INSTALL_PREFIX: &str = "/lib";

struct ChannelState {
    waiting_pkgs: HashSet<String>,
    pkgs_installed: bool,
}

/// Owns one channel's worth of manifest-diff/fetch/install state. Registered
/// as a [`Consumer`] on both the channel's retained manifest topic and its
/// per-device `cmd` topic; subscribes to `mpypi/packages/<pkg_id>` on demand
/// while a fetch is outstanding.
pub struct UpdateChannel {
    connection: Arc<ConnectionManager>,
    client_id: String,
    channel_topic: String,
    cmd_topic: String,
    auto_update: bool,
    device_reset: Arc<dyn DeviceReset>,
    state: Mutex<ChannelState>,
    update_done: Notify,
    self_weak: Weak<UpdateChannel>,
}

impl UpdateChannel {
    /// Subscribes to the channel and cmd topics and publishes this device's
    /// retained node info.
    pub async fn register(
        connection: Arc<ConnectionManager>,
        channel_name: String,
        client_id: String,
        auto_update: bool,
        device_reset: Arc<dyn DeviceReset>,
    ) -> Result<Arc<Self>, CoreError> {
        let channel_topic = format!("mpypi/channels/{channel_name}");
        let cmd_topic = format!("mpypi/nodes/{client_id}/cmd");
        let info_topic = format!("mpypi/nodes/{client_id}/info");

        let update_channel = Arc::new_cyclic(|weak| UpdateChannel {
            connection: connection.clone(),
            client_id: client_id.clone(),
            channel_topic: channel_topic.clone(),
            cmd_topic: cmd_topic.clone(),
            auto_update,
            device_reset,
            state: Mutex::new(ChannelState {
                waiting_pkgs: HashSet::new(),
                pkgs_installed: false,
            }),
            update_done: Notify::new(),
            self_weak: weak.clone(),
        });

        let consumer: Arc<dyn Consumer> = update_channel.clone();
        connection
            .subscribe(channel_topic, Qos::AtLeastOnce, consumer.clone())
            .await?;
        connection
            .subscribe(cmd_topic, Qos::AtLeastOnce, consumer)
            .await?;

        let info = node_info_payload(&client_id);
        connection
            .publish(MqttMessage::from_json(info_topic, &info, Qos::AtLeastOnce, true))
            .await?;

        Ok(update_channel)
    }

    fn self_as_consumer(&self) -> Arc<dyn Consumer> {
        self.self_weak
            .upgrade()
            .expect("channel outlives any message it is processing")
    }

    async fn on_manifest(&self, msg: &MqttMessage) {
        let entries = match parse_manifest(&msg.payload_raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "malformed manifest, ignoring");
                return;
            }
        };

        let mut waiting = HashSet::new();
        for entry in &entries {
            match entry {
                ManifestEntry::Wheel {
                    name, version, pkg_sha256,
                } => {
                    let installed = inventory::package_info(name, None);
                    let up_to_date = installed
                        .as_ref()
                        .and_then(WheelPackage::version)
                        .is_some_and(|v| v == version);
                    if !up_to_date {
                        waiting.insert(format!("wheel/{pkg_sha256}"));
                    }
                }
                ManifestEntry::Src { path, pkg_sha256 } => {
                    let matches = sha256_hex_of_file(path)
                        .is_some_and(|actual| &actual == pkg_sha256);
                    if !matches {
                        waiting.insert(format!("src/{path}/{pkg_sha256}"));
                    }
                }
            }
        }

        let came_from_cmd = msg.topic == self.cmd_topic;
        let empty = waiting.is_empty();
        {
            let mut state = self.state.lock().await;
            state.waiting_pkgs = waiting.clone();
        }

        if empty {
            debug!("manifest diff is empty, nothing to fetch");
            self.update_done.notify_waiters();
            return;
        }

        if !(came_from_cmd || self.auto_update) {
            debug!(pending = waiting.len(), "diff produced pending packages, waiting for cmd or auto_update");
            return;
        }

        info!(pending = waiting.len(), "fetching packages");
        let consumer = self.self_as_consumer();
        for pkg_id in &waiting {
            let topic = package_topic(pkg_id);
            if let Err(e) = self
                .connection
                .subscribe(topic, Qos::AtLeastOnce, consumer.clone())
                .await
            {
                warn!(pkg_id, error = %e, "failed to subscribe to package topic");
            }
        }

        loop {
            if self.state.lock().await.waiting_pkgs.is_empty() {
                break;
            }
            self.update_done.notified().await;
        }

        let installed = self.state.lock().await.pkgs_installed;
        if installed {
            info!("update complete, resetting device");
            tokio::time::sleep(Duration::from_secs(3)).await;
            if let Err(e) = self.device_reset.reset() {
                warn!(error = %e, "device reset failed");
            }
        }
    }

    async fn on_package(&self, pkg_id: &str, msg: &MqttMessage) {
        {
            let state = self.state.lock().await;
            if !state.waiting_pkgs.contains(pkg_id) {
                debug!(pkg_id, "duplicate package delivery, ignoring");
                return;
            }
        }

        {
            let mut state = self.state.lock().await;
            state.waiting_pkgs.remove(pkg_id);
        }

        let topic = package_topic(pkg_id);
        let consumer = self.self_as_consumer();
        if let Err(e) = self.connection.unsubscribe(&topic, &consumer).await {
            warn!(pkg_id, error = %e, "failed to unsubscribe from package topic");
        }

        match install_package(pkg_id, &msg.payload_raw) {
            Ok(()) => {
                info!(pkg_id, "package installed");
                self.state.lock().await.pkgs_installed = true;
            }
            Err(e) => {
                warn!(pkg_id, error = %e, "package install failed, artifact discarded");
            }
        }

        let empty = self.state.lock().await.waiting_pkgs.is_empty();
        if empty {
            self.update_done.notify_waiters();
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[async_trait]
impl Consumer for UpdateChannel {
    async fn handle_message(&self, msg: &MqttMessage) {
        if msg.topic == self.channel_topic || msg.topic == self.cmd_topic {
            // Detached so the dispatch loop stays free to deliver the
            // per-package messages `on_manifest` itself waits on below;
            // awaiting it inline here would deadlock the moment it blocks
            // on `update_done`.
            let Some(channel) = self.self_weak.upgrade() else {
                return;
            };
            let msg = msg.clone();
            tokio::spawn(async move {
                channel.on_manifest(&msg).await;
            });
        } else if let Some(pkg_id) = msg.topic.strip_prefix("mpypi/packages/") {
            self.on_package(pkg_id, msg).await;
        } else {
            debug!(topic = %msg.topic, "update channel received message for unrecognized topic");
        }
    }
}

fn package_topic(pkg_id: &str) -> String {
    format!("mpypi/packages/{pkg_id}")
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sha256_hex_of_file(path: &str) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    Some(hex_encode(&Sha256::digest(&bytes)))
}

fn install_package(pkg_id: &str, payload: &[u8]) -> Result<(), UpdateError> {
    if let Some(sha) = pkg_id.strip_prefix("wheel/") {
        let _ = sha;
        install_wheel(payload)
    } else if let Some(rest) = pkg_id.strip_prefix("src/") {
        let (path, sha) = rest
            .rsplit_once('/')
            .ok_or_else(|| UpdateError::MalformedPkgId(pkg_id.to_string()))?;
        install_src(path, sha, payload)
    } else {
        Err(UpdateError::MalformedPkgId(pkg_id.to_string()))
    }
}

/// Writes the delivered payload to `/<path>`, unlinking any existing file
/// first so a shorter replacement never leaves trailing stale bytes.
fn install_src(path: &str, expected_sha256: &str, payload: &[u8]) -> Result<(), UpdateError> {
    if path.contains("..") || path.contains('\\') {
        return Err(UpdateError::UnsafePkgPath(path.to_string()));
    }
    let actual = hex_encode(&Sha256::digest(payload));
    if actual != expected_sha256 {
        return Err(UpdateError::ChecksumMismatch);
    }

    let dest = Path::new(path);
    if dest.exists() {
        std::fs::remove_file(dest)?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, payload)?;
    Ok(())
}

fn write_member(archive: &ZipArchive, wheel: &WheelPackage, name: &str) -> Result<(), UpdateError> {
    let bytes = wheel.verified_read(archive, name)?;
    let dest = PathBuf::from(INSTALL_PREFIX).join(name);
    if dest.exists() {
        std::fs::remove_file(&dest)?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&dest, &bytes)?;
    Ok(())
}

fn install_wheel(payload: &[u8]) -> Result<(), UpdateError> {
    let archive = ZipArchive::open(payload.to_vec())?;
    let wheel = WheelPackage::from_archive(&archive)?;
    let name = wheel
        .name()
        .ok_or_else(|| UpdateError::MalformedManifest("wheel missing Name".to_string()))?
        .to_string();

    match inventory::package_info(&name, None) {
        None => {
            for member in wheel.record.keys() {
                write_member(&archive, &wheel, member)?;
            }
        }
        Some(existing) => {
            if existing.tag() != wheel.tag() {
                return Err(UpdateError::WheelUpgradeTagMismatch {
                    name,
                    existing: existing.tag().unwrap_or_default().to_string(),
                    delivered: wheel.tag().unwrap_or_default().to_string(),
                });
            }

            for (member, entry) in &wheel.record {
                let unchanged = existing
                    .record
                    .get(member)
                    .is_some_and(|old| old.hash == entry.hash && old.size == entry.size);
                if !unchanged {
                    write_member(&archive, &wheel, member)?;
                }
            }
            for member in existing.record.keys() {
                if !wheel.record.contains_key(member) {
                    let _ = std::fs::remove_file(PathBuf::from(INSTALL_PREFIX).join(member));
                }
            }

            if existing.version() != wheel.version() {
                let old_dist_info = PathBuf::from(INSTALL_PREFIX).join(&existing.dist_info_dir);
                let _ = std::fs::remove_dir_all(old_dist_info);
            }
        }
    }
    Ok(())
}

fn node_info_payload(client_id: &str) -> serde_json::Value {
    let mut versions = serde_json::Map::new();
    for pkg in inventory::installed_packages(None) {
        if let (Some(name), Some(version)) = (pkg.name(), pkg.version()) {
            versions.insert(name.to_string(), serde_json::Value::String(version.to_string()));
        }
    }
    serde_json::json!({
        "platform": std::env::consts::OS,
        "client_id": client_id,
        "packages": versions,
    })
}
