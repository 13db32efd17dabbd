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
// The async MQTT v5 client: one long-lived core task owns the transport and
// all protocol state; callers interact through channels, never a lock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ClientError, ReasonCode};
use crate::mqtt::packet::connect::Will;
use crate::mqtt::packet::{
    decode_packet_type, Connack, Connect, Disconnect, PacketType, Pingreq, Pingresp, Puback,
    Publish, Qos, Suback, Subscribe, Unsuback, Unsubscribe,
};
use crate::mqtt::pending_ack::{AckOutcome, PendingAckTable};
use crate::mqtt::transport::{Transport, TransportReader, TransportWriter};
use crate::mqtt::MqttMessage;

/// Default window for CONNACK/SUBACK/UNSUBACK/PUBACK/PINGRESP, per the
/// original's `mqtt_as` defaults.
pub const SYSTEM_ACK_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_INBOUND_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
    pub will: Option<Will>,
    pub keep_alive: Duration,
    pub ack_timeout: Duration,
    pub inbound_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            client_id: String::new(),
            username: None,
            password: None,
            will: None,
            keep_alive: Duration::from_secs(60),
            ack_timeout: SYSTEM_ACK_TIMEOUT,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

/// A bounded inbound queue where a full buffer drops the oldest message
/// rather than blocking the read loop.
struct InboundRing {
    queue: Mutex<VecDeque<MqttMessage>>,
    available: Notify,
    capacity: usize,
}

impl InboundRing {
    fn new(capacity: usize) -> Self {
        InboundRing {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Notify::new(),
            capacity,
        }
    }

    async fn push(&self, msg: MqttMessage) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                warn!(topic = %dropped.topic, "inbound ring full, dropping oldest message");
            }
        }
        queue.push_back(msg);
        self.available.notify_one();
    }

    async fn recv(&self) -> MqttMessage {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(msg) = queue.pop_front() {
                    return msg;
                }
            }
            self.available.notified().await;
        }
    }

    async fn clear(&self) {
        self.queue.lock().await.clear();
    }
}

enum Command {
    Subscribe {
        filters: Vec<(String, Qos)>,
        respond: oneshot::Sender<Result<Vec<ReasonCode>, ClientError>>,
    },
    Unsubscribe {
        filters: Vec<String>,
        respond: oneshot::Sender<Result<Vec<ReasonCode>, ClientError>>,
    },
    Publish {
        msg: MqttMessage,
        respond: oneshot::Sender<Result<(), ClientError>>,
    },
    Disconnect {
        respond: oneshot::Sender<()>,
    },
}

/// A cheap-to-clone capability for sending client commands, independent of
/// `consume()`'s exclusive inbound receiver. Handed to the dispatcher and
/// the update channel so they can publish/subscribe concurrently with the
/// caller draining messages.
#[derive(Clone)]
pub struct ClientHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ClientHandle {
    pub async fn subscribe(&self, filters: Vec<(String, Qos)>) -> Result<Vec<ReasonCode>, ClientError> {
        let (respond, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe { filters, respond })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    pub async fn unsubscribe(&self, filters: Vec<String>) -> Result<Vec<ReasonCode>, ClientError> {
        let (respond, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Unsubscribe { filters, respond })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    pub async fn publish(&self, msg: MqttMessage) -> Result<(), ClientError> {
        let (respond, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Publish { msg, respond })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    pub async fn disconnect(&self) {
        let (respond, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Disconnect { respond })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

/// The client itself. Not `Clone`: `consume()` holds the only inbound
/// receiver. Use [`MqttClient::handle`] to share publish/subscribe access.
pub struct MqttClient {
    cmd_tx: mpsc::Sender<Command>,
    inbound: Arc<InboundRing>,
    core_task: JoinHandle<()>,
}

impl MqttClient {
    /// Opens the connection: starts the core task, sends CONNECT, and waits
    /// for CONNACK within `config.ack_timeout`.
    pub async fn connect(
        transport: Box<dyn Transport>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let (reader, writer) = transport.into_split();
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let inbound = Arc::new(InboundRing::new(config.inbound_capacity));

        let mut pending = PendingAckTable::new();
        let connack_rx = pending.reserve_connect();

        let core = CoreTask {
            reader,
            writer,
            pending,
            inbound: inbound.clone(),
            keep_alive: config.keep_alive,
            ack_timeout: config.ack_timeout,
        };

        let connect_packet = Connect {
            client_id: config.client_id.clone(),
            clean_start: true,
            keep_alive: config.keep_alive.as_secs().min(u16::MAX as u64) as u16,
            username: config.username.clone(),
            password: config.password.clone(),
            will: config.will.clone(),
        };
        let encoded = connect_packet.encode().map_err(ClientError::Packet)?;

        let core_task = tokio::spawn(core.run(cmd_rx, encoded));

        let outcome = tokio::time::timeout(config.ack_timeout, connack_rx)
            .await
            .map_err(|_| ClientError::AckTimeout)?
            .map_err(|_| ClientError::NotConnected)??;

        if let AckOutcome::Reason(reason) = outcome {
            if !reason.is_success() {
                return Err(ClientError::ConnectionRefused(reason));
            }
        }

        info!(client_id = %config.client_id, "mqtt connected");
        Ok(MqttClient {
            cmd_tx,
            inbound,
            core_task,
        })
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    pub async fn subscribe(&self, filters: Vec<(String, Qos)>) -> Result<Vec<ReasonCode>, ClientError> {
        self.handle().subscribe(filters).await
    }

    pub async fn unsubscribe(&self, filters: Vec<String>) -> Result<Vec<ReasonCode>, ClientError> {
        self.handle().unsubscribe(filters).await
    }

    pub async fn publish(&self, msg: MqttMessage) -> Result<(), ClientError> {
        self.handle().publish(msg).await
    }

    /// An infinite, lazy inbound sequence. Suspends until a message is
    /// available; never yields duplicates across a reconnect since the ring
    /// is cleared on close.
    pub async fn consume(&self) -> MqttMessage {
        self.inbound.recv().await
    }

    pub async fn disconnect(self) {
        self.handle().disconnect().await;
        let _ = self.core_task.await;
        self.inbound.clear().await;
    }
}

struct CoreTask {
    reader: Box<dyn TransportReader>,
    writer: Box<dyn TransportWriter>,
    pending: PendingAckTable,
    inbound: Arc<InboundRing>,
    keep_alive: Duration,
    ack_timeout: Duration,
}

impl CoreTask {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, connect_bytes: Vec<u8>) {
        if let Err(e) = self.writer.write(&connect_bytes).await {
            error!(error = %e, "failed to send CONNECT");
            self.pending.fail_all(ClientError::Transport(e));
            return;
        }
        let _ = self.writer.flush().await;

        let ping_enabled = !self.keep_alive.is_zero();
        let ping_interval = if ping_enabled {
            self.keep_alive / 3
        } else {
            Duration::from_secs(u64::MAX / 2)
        };
        let mut next_ping_at = Instant::now() + ping_interval;
        let mut ping_wait_until: Option<Instant> = None;
        let mut ping_timeouts: u8 = 0;

        loop {
            let ping_send_fut = tokio::time::sleep_until(next_ping_at);
            let ping_wait_fut = tokio::time::sleep_until(
                ping_wait_until.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600)),
            );

            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Disconnect { respond }) => {
                            let _ = self.writer.write(&Disconnect::normal().encode().unwrap_or_default()).await;
                            let _ = self.writer.flush().await;
                            self.writer.close().await;
                            self.pending.fail_all(ClientError::NotConnected);
                            let _ = respond.send(());
                            return;
                        }
                        Some(other) => self.handle_command(other).await,
                        None => {
                            self.writer.close().await;
                            return;
                        }
                    }
                }

                frame = read_frame(&mut self.reader) => {
                    match frame {
                        Ok(Some((ty, flags, body))) => {
                            if matches!(ty, PacketType::Pingresp) {
                                ping_wait_until = None;
                                ping_timeouts = 0;
                            }
                            if let Err(e) = self.dispatch(ty, flags, body).await {
                                warn!(error = %e, "error while handling inbound packet");
                            }
                        }
                        Ok(None) => trace!("ignored unrecognized but well-formed packet type"),
                        Err(e) => {
                            error!(error = %e, "transport or protocol failure, closing connection");
                            self.pending.fail_all(e);
                            self.writer.close().await;
                            return;
                        }
                    }
                }

                _ = ping_send_fut, if ping_enabled && ping_wait_until.is_none() => {
                    if let Ok(bytes) = Pingreq.encode() {
                        let _ = self.writer.write(&bytes).await;
                        let _ = self.writer.flush().await;
                    }
                    ping_wait_until = Some(Instant::now() + self.ack_timeout);
                    next_ping_at = Instant::now() + ping_interval;
                }

                _ = ping_wait_fut, if ping_wait_until.is_some() => {
                    ping_timeouts += 1;
                    warn!(consecutive = ping_timeouts, "PINGRESP timed out");
                    if ping_timeouts >= 3 {
                        self.pending.fail_all(ClientError::KeepAliveViolated);
                        self.writer.close().await;
                        return;
                    }
                    if let Ok(bytes) = Pingreq.encode() {
                        let _ = self.writer.write(&bytes).await;
                        let _ = self.writer.flush().await;
                    }
                    ping_wait_until = Some(Instant::now() + self.ack_timeout);
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribe { filters, respond } => {
                let result = self.do_subscribe(filters).await;
                let _ = respond.send(result);
            }
            Command::Unsubscribe { filters, respond } => {
                let result = self.do_unsubscribe(filters).await;
                let _ = respond.send(result);
            }
            Command::Publish { msg, respond } => {
                let result = self.do_publish(msg).await;
                let _ = respond.send(result);
            }
            Command::Disconnect { .. } => unreachable!("handled in run()"),
        }
    }

    async fn do_subscribe(&mut self, filters: Vec<(String, Qos)>) -> Result<Vec<ReasonCode>, ClientError> {
        let (packet_id, rx) = self.pending.reserve()?;
        debug!(packet_id, filters = filters.len(), "sending SUBSCRIBE");
        let packet = Subscribe {
            packet_id,
            topic_filters: filters,
        };
        let encoded = packet.encode().map_err(ClientError::Packet)?;
        self.writer.write(&encoded).await.map_err(ClientError::Transport)?;
        self.writer.flush().await.map_err(ClientError::Transport)?;
        await_ack(rx, self.ack_timeout).await
    }

    async fn do_unsubscribe(&mut self, filters: Vec<String>) -> Result<Vec<ReasonCode>, ClientError> {
        let (packet_id, rx) = self.pending.reserve()?;
        debug!(packet_id, filters = filters.len(), "sending UNSUBSCRIBE");
        let packet = Unsubscribe {
            packet_id,
            topic_filters: filters,
        };
        let encoded = packet.encode().map_err(ClientError::Packet)?;
        self.writer.write(&encoded).await.map_err(ClientError::Transport)?;
        self.writer.flush().await.map_err(ClientError::Transport)?;
        await_ack(rx, self.ack_timeout).await
    }

    async fn do_publish(&mut self, msg: MqttMessage) -> Result<(), ClientError> {
        if msg.qos == Qos::AtMostOnce {
            let publish = msg.to_packed(None).map_err(ClientError::Packet)?;
            let encoded = publish.encode().map_err(ClientError::Packet)?;
            self.writer.write(&encoded).await.map_err(ClientError::Transport)?;
            self.writer.flush().await.map_err(ClientError::Transport)?;
            return Ok(());
        }

        let (packet_id, rx) = self.pending.reserve()?;
        let publish = msg.to_packed(Some(packet_id)).map_err(ClientError::Packet)?;
        let encoded = publish.encode().map_err(ClientError::Packet)?;
        self.writer.write(&encoded).await.map_err(ClientError::Transport)?;
        self.writer.flush().await.map_err(ClientError::Transport)?;
        await_ack(rx, self.ack_timeout).await.map(|_| ())
    }

    async fn dispatch(&mut self, ty: PacketType, flags: u8, body: Vec<u8>) -> Result<(), ClientError> {
        match ty {
            PacketType::Connack => {
                let first_byte = (PacketType::Connack as u8) << 4;
                let connack = Connack::decode(first_byte, &body).map_err(ClientError::Packet)?;
                self.pending
                    .complete(0, Ok(AckOutcome::Reason(connack.reason_code)));
            }
            PacketType::Publish => {
                let first_byte = (PacketType::Publish as u8) << 4 | flags;
                let publish = Publish::decode(first_byte, &body).map_err(ClientError::Packet)?;
                let qos = publish.qos;
                let packet_id = publish.packet_id;
                let msg = MqttMessage::from_packed(publish);
                trace!(topic = %msg.topic, "inbound PUBLISH");
                self.inbound.push(msg).await;
                if qos == Qos::AtLeastOnce {
                    if let Some(id) = packet_id {
                        let ack = Puback::new(id, ReasonCode::SUCCESS);
                        let encoded = ack.encode().map_err(ClientError::Packet)?;
                        self.writer.write(&encoded).await.map_err(ClientError::Transport)?;
                        self.writer.flush().await.map_err(ClientError::Transport)?;
                    }
                }
            }
            PacketType::Suback => {
                let first_byte = (PacketType::Suback as u8) << 4;
                let suback = Suback::decode(first_byte, &body).map_err(ClientError::Packet)?;
                self.pending.complete(
                    suback.packet_id,
                    Ok(AckOutcome::Success {
                        granted: suback.reason_codes.iter().map(|r| r.0).collect(),
                    }),
                );
            }
            PacketType::Unsuback => {
                let first_byte = (PacketType::Unsuback as u8) << 4;
                let unsuback = Unsuback::decode(first_byte, &body).map_err(ClientError::Packet)?;
                self.pending.complete(
                    unsuback.packet_id,
                    Ok(AckOutcome::Success {
                        granted: unsuback.reason_codes.iter().map(|r| r.0).collect(),
                    }),
                );
            }
            PacketType::Puback => {
                let first_byte = (PacketType::Puback as u8) << 4;
                let puback = Puback::decode(first_byte, &body).map_err(ClientError::Packet)?;
                self.pending
                    .complete(puback.packet_id, Ok(AckOutcome::Reason(puback.reason_code)));
            }
            PacketType::Disconnect => {
                let first_byte = (PacketType::Disconnect as u8) << 4;
                let disconnect = Disconnect::decode(first_byte, &body).map_err(ClientError::Packet)?;
                warn!(reason = %disconnect.reason_code, "server sent DISCONNECT");
                self.pending
                    .fail_all(ClientError::ServerDisconnect(disconnect.reason_code));
                return Err(ClientError::ServerDisconnect(disconnect.reason_code));
            }
            PacketType::Pingresp => {
                let _ = Pingresp::decode((PacketType::Pingresp as u8) << 4);
            }
            other => {
                debug!(packet_type = other.name(), "ignoring unexpected packet type");
            }
        }
        Ok(())
    }
}

async fn await_ack(rx: oneshot::Receiver<Result<AckOutcome, ClientError>>, timeout: Duration) -> Result<Vec<ReasonCode>, ClientError> {
    let outcome = tokio::time::timeout(timeout, rx)
        .await
        .map_err(|_| ClientError::AckTimeout)?
        .map_err(|_| ClientError::NotConnected)??;
    match outcome {
        AckOutcome::Success { granted } => Ok(granted.into_iter().map(ReasonCode).collect()),
        AckOutcome::Reason(reason) => {
            if reason.is_success() {
                Ok(vec![reason])
            } else {
                Err(ClientError::MqttReason(reason))
            }
        }
    }
}

/// Reads one fixed header (type/flags byte, then a VBI remaining length up
/// to 4 bytes) followed by exactly that many body bytes. `Ok(None)` for a
/// recognized-but-unhandled type so the caller can log-and-continue.
async fn read_frame(
    reader: &mut Box<dyn TransportReader>,
) -> Result<Option<(PacketType, u8, Vec<u8>)>, ClientError> {
    let first = reader.read_exact(1).await.map_err(ClientError::Transport)?;
    let first_byte = first[0];

    let mut vbi_bytes = Vec::with_capacity(4);
    let remaining_length = loop {
        let byte = reader.read_exact(1).await.map_err(ClientError::Transport)?[0];
        vbi_bytes.push(byte);
        match crate::mqtt::vbi::decode(&vbi_bytes) {
            Ok((value, _consumed)) => break value,
            Err(crate::error::VbiError::Incomplete) if vbi_bytes.len() < 4 => continue,
            Err(_) => return Err(ClientError::ProtocolDesync),
        }
    };

    let body = reader
        .read_exact(remaining_length as usize)
        .await
        .map_err(ClientError::Transport)?;

    match decode_packet_type(first_byte) {
        Ok(Some((ty, flags))) => Ok(Some((ty, flags, body))),
        Ok(None) => Ok(None),
        Err(_) => Err(ClientError::ProtocolDesync),
    }
}
