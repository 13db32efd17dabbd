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

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use blox_core::mqtt::client::ClientConfig;
use blox_core::mqtt::dispatcher::{ConnectionManager, Consumer};
use blox_core::mqtt::message::MqttMessage;
use blox_core::mqtt::packet::Qos;

use common::{wait_until, FakeBroker};

struct RecordingConsumer {
    received: AtomicUsize,
}

impl RecordingConsumer {
    fn new() -> Self {
        RecordingConsumer {
            received: AtomicUsize::new(0),
        }
    }

    fn count(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Consumer for RecordingConsumer {
    async fn handle_message(&self, _msg: &MqttMessage) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn two_consumers_on_one_topic_share_a_single_subscribe() {
    let config = ClientConfig {
        client_id: "dev-fanout".into(),
        keep_alive: Duration::from_secs(3600),
        ..ClientConfig::default()
    };
    let (client, broker) = FakeBroker::start(config).await;
    let manager = ConnectionManager::spawn(Arc::new(client));

    let first = Arc::new(RecordingConsumer::new());
    let second = Arc::new(RecordingConsumer::new());

    manager
        .subscribe("mpypi/channels/stable", Qos::AtLeastOnce, first.clone() as Arc<dyn Consumer>)
        .await
        .expect("first subscribe succeeds");
    manager
        .subscribe("mpypi/channels/stable", Qos::AtLeastOnce, second.clone() as Arc<dyn Consumer>)
        .await
        .expect("second subscribe is fan-out only, no wire traffic");

    assert_eq!(broker.subscribed_filters().await, vec!["mpypi/channels/stable"]);

    broker.deliver("mpypi/channels/stable", b"[]".to_vec(), Qos::AtLeastOnce, false);

    assert!(wait_until(|| first.count() == 1 && second.count() == 1, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn last_unsubscribe_sends_wire_unsubscribe() {
    let config = ClientConfig {
        client_id: "dev-fanout-2".into(),
        keep_alive: Duration::from_secs(3600),
        ..ClientConfig::default()
    };
    let (client, broker) = FakeBroker::start(config).await;
    let manager = ConnectionManager::spawn(Arc::new(client));

    let consumer: Arc<dyn Consumer> = Arc::new(RecordingConsumer::new());
    manager
        .subscribe("mpypi/nodes/dev-fanout-2/cmd", Qos::AtLeastOnce, consumer.clone())
        .await
        .expect("subscribe succeeds");

    manager
        .unsubscribe("mpypi/nodes/dev-fanout-2/cmd", &consumer)
        .await
        .expect("unsubscribe succeeds");

    // A second subscribe on the same topic must issue SUBSCRIBE again, since
    // the edge-triggered table dropped the entry once its last consumer left.
    let consumer2: Arc<dyn Consumer> = Arc::new(RecordingConsumer::new());
    manager
        .subscribe("mpypi/nodes/dev-fanout-2/cmd", Qos::AtLeastOnce, consumer2)
        .await
        .expect("re-subscribe succeeds");

    let filters = broker.subscribed_filters().await;
    assert_eq!(filters.len(), 2);
    assert!(filters.iter().all(|f| f == "mpypi/nodes/dev-fanout-2/cmd"));
}
