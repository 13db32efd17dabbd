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

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use blox_core::mqtt::client::ClientConfig;
use blox_core::mqtt::dispatcher::ConnectionManager;
use blox_core::mqtt::packet::Qos;
use blox_core::ota::channel::UpdateChannel;

use common::{build_wheel, unique_suffix, wait_until, wait_until_async, CountingReset, FakeBroker};

/// A manifest naming an uninstalled wheel, with auto-update on, must fetch
/// the package over its per-package topic and reset the device once the
/// grace period after install has elapsed.
#[tokio::test]
async fn auto_update_installs_wheel_and_resets() {
    let pkg_name = unique_suffix("blox_auto_pkg");
    let module_path = format!("{pkg_name}.py");
    let module_contents = b"VALUE = 1\n".to_vec();
    let wheel_bytes = build_wheel(
        &pkg_name,
        "1.0.0",
        "py3-none-any",
        &[(module_path.as_str(), module_contents.as_slice())],
        false,
    );

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
        .await,
        "channel/cmd SUBSCRIBE must follow registration"
    );

    let channel_topic = "mpypi/channels/stable";
    let manifest = serde_json::json!([
        {"type": "wheel", "name": pkg_name, "version": "1.0.0", "pkg_sha256": "deadbeef"}
    ]);
    broker.deliver(
        channel_topic,
        serde_json::to_vec(&manifest).unwrap(),
        Qos::AtLeastOnce,
        true,
    );

    let package_topic = "mpypi/packages/wheel/deadbeef".to_string();
    assert!(
        wait_until_async(
            || async { broker.subscribed_filters().await.iter().any(|f| f == &package_topic) },
            Duration::from_secs(5),
        )
        .await,
        "update channel must subscribe to the package topic once the diff is non-empty"
    );

    broker.deliver(package_topic.clone(), wheel_bytes, Qos::AtLeastOnce, false);

    assert!(wait_until(|| reset.count() == 1, Duration::from_secs(8)).await);

    let installed_path = PathBuf::from("/lib").join(&module_path);
    let written = std::fs::read(&installed_path).expect("module file was installed");
    assert_eq!(written, module_contents);

    let dist_info = PathBuf::from("/lib").join(format!("{pkg_name}-1.0.0.dist-info"));
    let _ = std::fs::remove_file(&installed_path);
    let _ = std::fs::remove_dir_all(&dist_info);
}
