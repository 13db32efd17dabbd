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

//! A fake MQTT broker driven over an in-memory duplex pair, so the async
//! client/dispatcher/update-channel stack can be exercised end to end without
//! a real socket. CONNECT/SUBSCRIBE/UNSUBSCRIBE/qos-1-PUBLISH are acknowledged
//! automatically; everything the test cares about (raw PUBLISH delivery,
//! withholding PINGRESP) is driven explicitly through the returned handle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use blox_core::mqtt::client::{ClientConfig, MqttClient};
use blox_core::mqtt::packet::{Publish, Qos};
use blox_core::mqtt::transport::DuplexTransport;
use blox_core::mqtt::vbi;

const PACKET_CONNECT: u8 = 1;
const PACKET_PUBLISH: u8 = 3;
const PACKET_SUBSCRIBE: u8 = 8;
const PACKET_UNSUBSCRIBE: u8 = 10;
const PACKET_PINGREQ: u8 = 12;

/// Drives the broker side of the duplex pair plus the test-facing knobs.
pub struct FakeBroker {
    respond_to_ping: Arc<AtomicBool>,
    muted: Arc<AtomicBool>,
    inbound_publishes: Arc<Mutex<Vec<Publish>>>,
    subscribed_filters: Arc<Mutex<Vec<String>>>,
    ping_count: Arc<AtomicUsize>,
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    _reader_task: JoinHandle<()>,
}

impl FakeBroker {
    /// Connects a client with `config` against a freshly spawned fake broker.
    pub async fn start(config: ClientConfig) -> (MqttClient, FakeBroker) {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);

        let respond_to_ping = Arc::new(AtomicBool::new(true));
        let muted = Arc::new(AtomicBool::new(false));
        let inbound_publishes = Arc::new(Mutex::new(Vec::new()));
        let subscribed_filters = Arc::new(Mutex::new(Vec::new()));
        let ping_count = Arc::new(AtomicUsize::new(0));
        let (to_client, mut from_test) = mpsc::unbounded_channel::<Vec<u8>>();

        let (read_half, write_half) = tokio::io::split(server_side);
        let write_half = Arc::new(Mutex::new(write_half));

        let reply_writer = write_half.clone();
        let reply_respond_to_ping = respond_to_ping.clone();
        let reply_muted = muted.clone();
        let reply_inbound = inbound_publishes.clone();
        let reply_filters = subscribed_filters.clone();
        let reply_pings = ping_count.clone();
        let reader_task = tokio::spawn(async move {
            let mut reader = read_half;
            while let Some((ty, flags, body)) = read_frame(&mut reader).await {
                handle_inbound(
                    ty,
                    flags,
                    &body,
                    &reply_writer,
                    &reply_respond_to_ping,
                    &reply_muted,
                    &reply_inbound,
                    &reply_filters,
                    &reply_pings,
                )
                .await;
            }
        });

        let forward_task_writer = write_half;
        tokio::spawn(async move {
            while let Some(bytes) = from_test.recv().await {
                let mut w = forward_task_writer.lock().await;
                let _ = w.write_all(&bytes).await;
                let _ = w.flush().await;
            }
        });

        let transport: Box<dyn blox_core::mqtt::transport::Transport> =
            Box::new(DuplexTransport::new(client_side));
        let client = MqttClient::connect(transport, config)
            .await
            .expect("fake broker always grants CONNECT");

        (
            client,
            FakeBroker {
                respond_to_ping,
                muted,
                inbound_publishes,
                subscribed_filters,
                ping_count,
                to_client,
                _reader_task: reader_task,
            },
        )
    }

    pub async fn start_default() -> (MqttClient, FakeBroker) {
        Self::start(ClientConfig {
            client_id: "test-device".into(),
            keep_alive: Duration::from_secs(3600),
            ..ClientConfig::default()
        })
        .await
    }

    /// Delivers a raw PUBLISH to the client as if the broker sent it.
    pub fn deliver(&self, topic: impl Into<String>, payload: Vec<u8>, qos: Qos, retain: bool) {
        let packet = Publish {
            topic: topic.into(),
            qos,
            retain,
            dup: false,
            packet_id: if qos == Qos::AtMostOnce { None } else { Some(1) },
            payload,
        };
        let encoded = packet.encode().expect("well-formed PUBLISH");
        let _ = self.to_client.send(encoded);
    }

    /// Stops acknowledging PINGREQ, simulating a broker that has gone silent.
    pub fn stop_pingresp(&self) {
        self.respond_to_ping.store(false, Ordering::SeqCst);
    }

    /// Stops every automatic acknowledgement (CONNACK already happened by
    /// the time a test can call this). Used to starve pending acks deliberately.
    pub fn mute(&self) {
        self.muted.store(true, Ordering::SeqCst);
    }

    pub async fn inbound_publishes(&self) -> Vec<Publish> {
        self.inbound_publishes.lock().await.clone()
    }

    pub async fn subscribed_filters(&self) -> Vec<String> {
        self.subscribed_filters.lock().await.clone()
    }

    pub fn ping_count(&self) -> usize {
        self.ping_count.load(Ordering::SeqCst)
    }
}

/// Polls `condition` every 10ms until it's true or `timeout` elapses.
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Like [`wait_until`], but for conditions that need to await something
/// (e.g. a [`FakeBroker`] accessor backed by a `tokio::sync::Mutex`).
pub async fn wait_until_async<F, Fut>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Option<(u8, u8, Vec<u8>)> {
    let mut first = [0u8; 1];
    reader.read_exact(&mut first).await.ok()?;
    let ty = first[0] >> 4;
    let flags = first[0] & 0x0F;

    let mut vbi_bytes = Vec::with_capacity(4);
    let remaining_length = loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).await.ok()?;
        vbi_bytes.push(byte[0]);
        match vbi::decode(&vbi_bytes) {
            Ok((value, _consumed)) => break value,
            Err(_) if vbi_bytes.len() < 4 => continue,
            Err(_) => return None,
        }
    };

    let mut body = vec![0u8; remaining_length as usize];
    reader.read_exact(&mut body).await.ok()?;
    Some((ty, flags, body))
}

#[allow(clippy::too_many_arguments)]
async fn handle_inbound(
    ty: u8,
    flags: u8,
    body: &[u8],
    writer: &Arc<Mutex<impl tokio::io::AsyncWrite + Unpin>>,
    respond_to_ping: &Arc<AtomicBool>,
    muted: &Arc<AtomicBool>,
    inbound_publishes: &Arc<Mutex<Vec<Publish>>>,
    subscribed_filters: &Arc<Mutex<Vec<String>>>,
    ping_count: &Arc<AtomicUsize>,
) {
    if muted.load(Ordering::SeqCst) && ty != PACKET_CONNECT {
        if ty == PACKET_PINGREQ {
            ping_count.fetch_add(1, Ordering::SeqCst);
        }
        return;
    }

    match ty {
        PACKET_CONNECT => {
            let mut w = writer.lock().await;
            let _ = w.write_all(&[0x20, 0x03, 0x00, 0x00, 0x00]).await;
            let _ = w.flush().await;
        }
        PACKET_SUBSCRIBE => {
            if body.len() < 3 {
                return;
            }
            let packet_id = [body[0], body[1]];
            let (filter, _) =
                blox_core::mqtt::strings::decode(&body[3..]).expect("well-formed SUBSCRIBE filter");
            subscribed_filters.lock().await.push(filter);
            let mut w = writer.lock().await;
            let _ = w
                .write_all(&[0x90, 0x03, packet_id[0], packet_id[1], 0x00, 0x01])
                .await;
            let _ = w.flush().await;
        }
        PACKET_UNSUBSCRIBE => {
            if body.len() < 2 {
                return;
            }
            let packet_id = [body[0], body[1]];
            let mut w = writer.lock().await;
            let _ = w
                .write_all(&[0xB0, 0x03, packet_id[0], packet_id[1], 0x00, 0x00])
                .await;
            let _ = w.flush().await;
        }
        PACKET_PUBLISH => {
            let first_byte = (PACKET_PUBLISH << 4) | flags;
            let Ok(publish) = Publish::decode(first_byte, body) else {
                return;
            };
            let qos = publish.qos;
            let packet_id = publish.packet_id;
            inbound_publishes.lock().await.push(publish);
            if qos == Qos::AtLeastOnce {
                if let Some(id) = packet_id {
                    let id_bytes = id.to_be_bytes();
                    let mut w = writer.lock().await;
                    let _ = w.write_all(&[0x40, 0x02, id_bytes[0], id_bytes[1]]).await;
                    let _ = w.flush().await;
                }
            }
        }
        PACKET_PINGREQ => {
            ping_count.fetch_add(1, Ordering::SeqCst);
            if respond_to_ping.load(Ordering::SeqCst) {
                let mut w = writer.lock().await;
                let _ = w.write_all(&[0xD0, 0x00]).await;
                let _ = w.flush().await;
            }
        }
        _ => {}
    }
}

/// A minimal single-disk STORE-method ZIP, generalized from a single-entry
/// version in `ota::zip`'s own tests to build multi-member wheel fixtures.
pub fn build_store_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for (name, content) in entries {
        let crc = crc32fast::hash(content);
        let local_offset = out.len() as u32;
        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // method: store
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(content);

        central.extend_from_slice(b"PK\x01\x02");
        central.extend_from_slice(&[20, 0, 20, 0]);
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(content.len() as u32).to_le_bytes());
        central.extend_from_slice(&(content.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&local_offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }

    let cd_offset = out.len() as u32;
    let cd_size = central.len() as u32;
    out.extend_from_slice(&central);

    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());

    out
}

/// Builds a wheel archive: `members` plus a generated `.dist-info/` with
/// METADATA/WHEEL/RECORD whose hashes are correct unless `corrupt_first_hash`
/// is set, in which case the first member's RECORD hash is deliberately wrong.
pub fn build_wheel(
    name: &str,
    version: &str,
    tag: &str,
    members: &[(&str, &[u8])],
    corrupt_first_hash: bool,
) -> Vec<u8> {
    let dist_info = format!("{name}-{version}.dist-info/");
    let metadata = format!("Metadata-Version: 2.1\nName: {name}\nVersion: {version}\n");
    let wheel = format!("Wheel-Version: 1.0\nTag: {tag}\n");

    let mut record_lines = Vec::new();
    for (index, (member_name, content)) in members.iter().enumerate() {
        let digest = Sha256::digest(content);
        let mut encoded = URL_SAFE_NO_PAD.encode(digest);
        if corrupt_first_hash && index == 0 {
            encoded = URL_SAFE_NO_PAD.encode(Sha256::digest(b"not the real content"));
        }
        record_lines.push(format!("{member_name},sha256={encoded},{}", content.len()));
    }
    record_lines.push(format!("{dist_info}METADATA,,"));
    record_lines.push(format!("{dist_info}WHEEL,,"));
    record_lines.push(format!("{dist_info}RECORD,,"));
    let record = record_lines.join("\n") + "\n";

    let mut entries: Vec<(String, Vec<u8>)> = members
        .iter()
        .map(|(n, c)| (n.to_string(), c.to_vec()))
        .collect();
    entries.push((format!("{dist_info}METADATA"), metadata.into_bytes()));
    entries.push((format!("{dist_info}WHEEL"), wheel.into_bytes()));
    entries.push((format!("{dist_info}RECORD"), record.into_bytes()));

    let refs: Vec<(&str, &[u8])> = entries.iter().map(|(n, c)| (n.as_str(), c.as_slice())).collect();
    build_store_zip(&refs)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

static UNIQUE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A process-unique name fragment so parallel tests don't collide on shared
/// filesystem paths (`/lib`, in particular, which the update channel installs
/// into directly and cannot be redirected).
pub fn unique_suffix(label: &str) -> String {
    let n = UNIQUE_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{label}_{}_{n}", std::process::id())
}

struct NoopReset {
    count: AtomicUsize,
}

/// A [`blox_core::runtime::DeviceReset`] that counts resets instead of
/// rebooting, so tests can observe that the update channel decided to reset.
pub struct CountingReset {
    inner: Arc<NoopReset>,
}

impl CountingReset {
    pub fn new() -> Self {
        CountingReset {
            inner: Arc::new(NoopReset {
                count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    pub fn handle(&self) -> Arc<dyn blox_core::runtime::DeviceReset> {
        self.inner.clone()
    }
}

impl blox_core::runtime::DeviceReset for NoopReset {
    fn reset(&self) -> std::io::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
