#![allow(clippy::unwrap_used, dead_code)]

use std::sync::Arc;

use fleetsync_api::{ChannelTransport, RemoteEnd, RequestMessage};
use fleetsync_core::{EngineConfig, ModelSchema, StatusFlag, SyncEngine};
use serde_json::{Value, json};

pub const WIDGET: &str = "widget";

pub fn widget_schema() -> ModelSchema {
    ModelSchema::new(WIDGET, "id")
        .searchable(["name"])
        .verb("deploy", StatusFlag::Deploying)
        .method_verb("refresh", StatusFlag::Refreshing)
        .server_lists(true)
}

pub fn quiet_config() -> EngineConfig {
    EngineConfig {
        ping_interval: None,
        ..EngineConfig::default()
    }
}

/// A started, connected engine with the `widget` model registered.
pub async fn engine_with(config: EngineConfig) -> (SyncEngine, RemoteEnd) {
    let (transport, remote) = ChannelTransport::pair();
    let engine = SyncEngine::new(config, Arc::new(transport));
    engine.register_schema(widget_schema());
    engine.start().await.unwrap();
    engine.wait_until_connected().await.unwrap();
    (engine, remote)
}

pub async fn engine() -> (SyncEngine, RemoteEnd) {
    engine_with(quiet_config()).await
}

/// Let the dispatcher drain whatever is queued.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub fn params(request: &RequestMessage) -> &Value {
    request.params.as_ref().unwrap()
}

/// Fetch `items` into the widget store.
pub async fn seed(engine: &SyncEngine, remote: &mut RemoteEnd, items: Value) {
    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.fetch_fresh(WIDGET).await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.method, "list");
    remote.respond_ok(request.request_id, items);
    task.await.unwrap().unwrap();
}

pub fn abc() -> Value {
    json!([
        {"id": "a", "name": "alpha", "value": 1},
        {"id": "b", "name": "beta", "value": 2},
        {"id": "c", "name": "gamma", "value": 1}
    ])
}
