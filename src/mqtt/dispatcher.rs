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
// A named registry of connections, each with topic-keyed consumer fan-out.
// Owned explicitly by [`crate::runtime::Runtime`] rather than as an ambient
// singleton.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::ClientError;
use crate::mqtt::client::{ClientHandle, MqttClient};
use crate::mqtt::message::MqttMessage;
use crate::mqtt::packet::Qos;

pub const DEFAULT_CONNECTION_NAME: &str = "default";

/// A handler for messages delivered on a subscribed topic. Implementors own
/// their own state; the dispatcher holds only this trait object.
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn handle_message(&self, msg: &MqttMessage);
}

struct TopicEntry {
    qos: Qos,
    consumers: Vec<Arc<dyn Consumer>>,
}

/// One MQTT connection plus its topic-to-consumer fan-out table.
pub struct ConnectionManager {
    client_handle: ClientHandle,
    topics: RwLock<HashMap<String, TopicEntry>>,
    dispatch_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Wraps a connected client and starts its dispatch task, which pulls
    /// from `consume()` and fans each message out to matching consumers.
    pub fn spawn(client: Arc<MqttClient>) -> Arc<Self> {
        let manager = Arc::new(ConnectionManager {
            client_handle: client.handle(),
            topics: RwLock::new(HashMap::new()),
            dispatch_task: std::sync::Mutex::new(None),
        });

        let dispatch_manager = manager.clone();
        let task = tokio::spawn(async move {
            loop {
                let msg = client.consume().await;
                dispatch_manager.dispatch(msg).await;
            }
        });
        *manager.dispatch_task.lock().expect("dispatch_task mutex poisoned") = Some(task);

        manager
    }

    async fn dispatch(&self, msg: MqttMessage) {
        let topics = self.topics.read().await;
        let Some(entry) = topics.get(&msg.topic) else {
            debug!(topic = %msg.topic, "no consumer registered, dropping");
            return;
        };
        let msg = Arc::new(msg);
        let mut handles = Vec::with_capacity(entry.consumers.len());
        for consumer in &entry.consumers {
            let consumer = consumer.clone();
            let msg = msg.clone();
            handles.push(tokio::spawn(async move {
                consumer.handle_message(&msg).await;
            }));
        }
        drop(topics);
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "consumer handler panicked");
            }
        }
    }

    /// Register `consumer` for `topic`. Issues SUBSCRIBE only on the
    /// topic's first consumer (edge-triggered).
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
        qos: Qos,
        consumer: Arc<dyn Consumer>,
    ) -> Result<(), ClientError> {
        let topic = topic.into();
        let mut topics = self.topics.write().await;
        match topics.get_mut(&topic) {
            Some(entry) => {
                entry.consumers.push(consumer);
                Ok(())
            }
            None => {
                debug!(%topic, "first consumer, sending SUBSCRIBE");
                self.client_handle
                    .subscribe(vec![(topic.clone(), qos)])
                    .await?;
                topics.insert(
                    topic,
                    TopicEntry {
                        qos,
                        consumers: vec![consumer],
                    },
                );
                Ok(())
            }
        }
    }

    /// Remove `consumer` from `topic`. Issues UNSUBSCRIBE once the topic has
    /// no consumers left (edge-triggered).
    pub async fn unsubscribe(
        &self,
        topic: &str,
        consumer: &Arc<dyn Consumer>,
    ) -> Result<(), ClientError> {
        let mut topics = self.topics.write().await;
        let Some(entry) = topics.get_mut(topic) else {
            return Ok(());
        };
        entry.consumers.retain(|c| !Arc::ptr_eq(c, consumer));
        if entry.consumers.is_empty() {
            debug!(%topic, "last consumer removed, sending UNSUBSCRIBE");
            topics.remove(topic);
            self.client_handle
                .unsubscribe(vec![topic.to_string()])
                .await?;
        }
        Ok(())
    }

    pub async fn publish(&self, msg: MqttMessage) -> Result<(), ClientError> {
        self.client_handle.publish(msg).await
    }

    pub fn client_handle(&self) -> ClientHandle {
        self.client_handle.clone()
    }
}
