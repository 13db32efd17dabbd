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

use std::sync::Arc;
use std::time::Duration;

use blox_core::mqtt::client::ClientConfig;
use blox_core::mqtt::dispatcher::ConnectionManager;
use blox_core::mqtt::packet::Qos;
use blox_core::ota::channel::UpdateChannel;

use common::{sha256_hex, unique_suffix, wait_until, wait_until_async, CountingReset, FakeBroker};

/// A `src` manifest entry is written to the literal path it names, replacing
/// any existing file outright so a shorter replacement leaves no trailing
/// bytes from the file it overwrote.
#[tokio::test]
async fn src_update_overwrites_without_trailing_bytes() {
    let dest = std::env::temp_dir().join(unique_suffix("blox_src_update")).with_extension("py");
    std::fs::write(&dest, b"OLD = 'this line is much longer than the replacement'\n")
        .expect("seed file");

    let new_contents = b"NEW = 1\n".to_vec();
    let new_sha = sha256_hex(&new_contents);

    let client_id = unique_suffix("dev");
    let config = ClientConfig {
        client_id: client_id.clone(),
        keep_alive: Duration::from_secs(3600),
        ..ClientConfig::default()
    };
    let (client, broker) = FakeBroker::start(config).await;
    let connection = ConnectionManager::spawn(Arc::new(client));

    let reset = CountingReset::new();
    let _channel = UpdateChannel::register(
        connection,
        "stable".to_string(),
        client_id.clone(),
        true,
        reset.handle(),
    )
    .await
    .expect("channel registers");

    assert!(
        wait_until_async(
            || async { broker.subscribed_filters().await.len() >= 2 },
            Duration::from_secs(2),
        )
        .await
    );

    let dest_str = dest.to_str().expect("path is valid utf-8").to_string();
    let manifest = serde_json::json!([
        {"type": "src", "path": dest_str, "pkg_sha256": new_sha}
    ]);
    broker.deliver(
        "mpypi/channels/stable",
        serde_json::to_vec(&manifest).unwrap(),
        Qos::AtLeastOnce,
        true,
    );

    let package_topic = format!("mpypi/packages/src/{dest_str}/{new_sha}");
    assert!(
        wait_until_async(
            || async { broker.subscribed_filters().await.iter().any(|f| f == &package_topic) },
            Duration::from_secs(5),
        )
        .await
    );

    broker.deliver(package_topic, new_contents.clone(), Qos::AtLeastOnce, false);

    assert!(wait_until(|| reset.count() == 1, Duration::from_secs(8)).await);

    let written = std::fs::read(&dest).expect("destination file exists");
    assert_eq!(written, new_contents);

    let _ = std::fs::remove_file(&dest);
}
