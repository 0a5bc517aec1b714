#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{WIDGET, engine, engine_with, quiet_config, seed, settle};
use fleetsync_core::{CoreError, EngineConfig, ModelParams, PollFactory, PollRequest, PrimaryKey};
use serde_json::json;

fn fetch_widgets() -> PollFactory {
    Arc::new(|| PollRequest::Fetch {
        model: WIDGET.into(),
    })
}

#[tokio::test(start_paused = true)]
async fn stopping_before_the_first_reissue_sends_one_request() {
    let (engine, mut remote) = engine().await;

    engine
        .start_poll("widgets", fetch_widgets(), Duration::from_secs(10))
        .unwrap();
    engine.stop_poll("widgets");
    assert!(!engine.is_polling("widgets"));

    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(remote.drain_requests().len(), 1);

    // Unknown ids are ignored.
    engine.stop_poll("widgets");
    engine.stop_poll("never-started");
}

#[tokio::test(start_paused = true)]
async fn polls_reissue_and_pause_while_disconnected() {
    let (engine, mut remote) = engine().await;
    engine
        .start_poll("widgets", fetch_widgets(), Duration::from_secs(10))
        .unwrap();

    let first = remote.recv_request().await.unwrap();
    assert_eq!(first.method, "list");
    remote.respond_ok(first.request_id, json!([]));

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(remote.drain_requests().len(), 1);

    remote.disconnect("maintenance");
    settle().await;
    tokio::time::sleep(Duration::from_secs(35)).await;
    settle().await;
    assert!(remote.drain_requests().is_empty());

    remote.reconnect();
    settle().await;
    assert_eq!(remote.drain_requests().len(), 1, "resumes immediately");

    engine.stop_poll("widgets");
}

#[tokio::test(start_paused = true)]
async fn restarting_a_poll_replaces_its_schedule() {
    let (engine, mut remote) = engine().await;
    let interval = Duration::from_secs(10);
    engine.start_poll("widgets", fetch_widgets(), interval).unwrap();
    engine.start_poll("widgets", fetch_widgets(), interval).unwrap();
    assert_eq!(remote.drain_requests().len(), 2);

    tokio::time::sleep(interval).await;
    settle().await;
    assert_eq!(remote.drain_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn keep_alive_pings_on_connect() {
    let config = EngineConfig {
        ping_interval: Some(Duration::from_secs(50)),
        ..quiet_config()
    };
    let (engine, mut remote) = engine_with(config).await;

    let ping = remote.recv_request().await.unwrap();
    assert!(ping.is_ping());
    remote.respond_ok(ping.request_id, json!("pong"));
    assert!(engine.is_polling("status.ping"));

    tokio::time::sleep(Duration::from_secs(50)).await;
    settle().await;
    let requests = remote.drain_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is_ping());
}

#[tokio::test(start_paused = true)]
async fn timed_out_updates_roll_back() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, json!([{"id": 1, "name": "a"}])).await;

    let task = tokio::spawn({
        let engine = engine.clone();
        async move {
            let params = ModelParams::raw(json!({"id": 1, "name": "b"})).unwrap();
            engine.update(WIDGET, params).await
        }
    });
    remote.recv_request().await.unwrap();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, CoreError::Timeout { .. }));

    let state = engine.snapshot(WIDGET).unwrap();
    assert_eq!(
        state.get(&PrimaryKey::from(1)).unwrap().get("name"),
        Some(&json!("a"))
    );
    assert!(!state.saving);
    assert_eq!(engine.pending_requests(), 0);
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let (engine, _remote) = engine().await;
    assert!(
        engine
            .start_poll("widgets", fetch_widgets(), Duration::ZERO)
            .is_err()
    );
}
