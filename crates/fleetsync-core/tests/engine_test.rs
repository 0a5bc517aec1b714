#![allow(clippy::unwrap_used)]

mod common;

use common::{WIDGET, abc, engine, params, seed, settle};
use fleetsync_api::NotifyAction;
use fleetsync_core::{ConnectionState, CoreError, ErrorPayload, PrimaryKey, StatusFlag};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn created_notification_racing_a_fetch_yields_one_entity() {
    let (engine, mut remote) = engine().await;

    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.fetch(WIDGET).await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.model, WIDGET);
    assert_eq!(request.method, "list");

    let pending = engine.snapshot(WIDGET).unwrap();
    assert!(pending.loading);
    assert!(!pending.loaded);
    assert!(pending.is_empty());

    remote.notify(WIDGET, NotifyAction::Create, json!({"id": 1, "name": "w1"}));
    remote.respond_ok(request.request_id, json!([{"id": 1, "name": "w1"}]));

    let state = task.await.unwrap().unwrap();
    assert_eq!(state.len(), 1);
    assert_eq!(state.get(&PrimaryKey::from(1)).unwrap().get("name"), Some(&json!("w1")));
    assert!(state.loaded);
    assert!(!state.loading);
}

#[tokio::test]
async fn fetch_is_cached_until_reconnect() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;
    // Seeded through `fetch_fresh`, so a plain fetch is served from cache.
    engine.fetch(WIDGET).await.unwrap();
    assert!(remote.drain_requests().is_empty());

    remote.disconnect("bounce");
    remote.reconnect();
    settle().await;

    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.fetch(WIDGET).await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.method, "list");
    remote.respond_ok(request.request_id, abc());
    assert_eq!(task.await.unwrap().unwrap().len(), 3);
}

#[tokio::test]
async fn cached_fetch_waits_for_the_bulk_fetch_not_a_get() {
    let (engine, mut remote) = engine().await;

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.fetch(WIDGET).await }
    });
    let list = remote.recv_request().await.unwrap();
    assert_eq!(list.method, "list");

    let get = tokio::spawn({
        let engine = engine.clone();
        async move { engine.get(WIDGET, &PrimaryKey::from("a")).await }
    });
    let single = remote.recv_request().await.unwrap();
    assert_eq!(single.method, "get");
    remote.respond_ok(single.request_id, json!({"id": "a", "name": "alpha"}));
    get.await.unwrap().unwrap();

    let state = engine.snapshot(WIDGET).unwrap();
    assert!(state.fetching);
    assert!(state.loading);

    let second = tokio::spawn({
        let engine = engine.clone();
        async move { engine.fetch(WIDGET).await }
    });
    settle().await;
    assert!(!second.is_finished());
    assert!(remote.drain_requests().is_empty());

    remote.respond_ok(list.request_id, abc());
    assert_eq!(second.await.unwrap().unwrap().len(), 3);
    assert_eq!(first.await.unwrap().unwrap().len(), 3);

    let state = engine.snapshot(WIDGET).unwrap();
    assert!(!state.fetching);
    assert!(!state.loading);
}

#[tokio::test]
async fn notifications_are_idempotent() {
    let (engine, remote) = engine().await;
    let item = json!({"id": 7, "name": "seven"});

    remote.notify(WIDGET, NotifyAction::Create, item.clone());
    settle().await;
    let first = engine.snapshot(WIDGET).unwrap();

    remote.notify(WIDGET, NotifyAction::Create, item.clone());
    remote.notify(WIDGET, NotifyAction::Update, item);
    settle().await;
    let second = engine.snapshot(WIDGET).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first.revision(), second.revision());

    remote.notify(WIDGET, NotifyAction::Delete, json!(7));
    remote.notify(WIDGET, NotifyAction::Delete, json!({"id": 7}));
    settle().await;
    assert!(engine.snapshot(WIDGET).unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_action_is_rejected_locally() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;
    let key = PrimaryKey::from("a");

    let task = tokio::spawn({
        let engine = engine.clone();
        let key = key.clone();
        async move { engine.action(WIDGET, &key, "deploy", None).await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.method, "action");
    assert_eq!(params(&request), &json!({"id": "a", "action": "deploy", "extra": {}}));
    assert!(engine.snapshot(WIDGET).unwrap().status(&key).get(StatusFlag::Deploying));

    let err = engine.action(WIDGET, &key, "deploy", None).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::ActionConflict { flag: StatusFlag::Deploying, .. }
    ));
    assert!(remote.drain_requests().is_empty());

    remote.respond_ok(request.request_id, json!({"id": "a", "name": "alpha", "value": 9}));
    task.await.unwrap().unwrap();

    let state = engine.snapshot(WIDGET).unwrap();
    assert!(state.status(&key).is_idle());
    assert_eq!(state.get(&key).unwrap().get("value"), Some(&json!(9)));
}

#[tokio::test]
async fn method_verbs_and_unknown_verbs() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;
    let key = PrimaryKey::from("b");

    let err = engine.action(WIDGET, &key, "explode", None).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));

    let task = tokio::spawn({
        let engine = engine.clone();
        let key = key.clone();
        let extra = json!({"deep": true}).as_object().cloned();
        async move { engine.action(WIDGET, &key, "refresh", extra).await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.method, "refresh");
    assert_eq!(params(&request), &json!({"id": "b", "deep": true}));

    remote.respond_err(request.request_id, json!("Pod is busy"));
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, CoreError::Rejected { .. }));

    let state = engine.snapshot(WIDGET).unwrap();
    assert!(!state.status(&key).get(StatusFlag::Refreshing));
    assert_eq!(
        state.event_error("refresh", &key),
        Some(&ErrorPayload::Message("Pod is busy".into()))
    );

    tokio_test::assert_ok!(engine.cleanup(WIDGET));
    let state = engine.snapshot(WIDGET).unwrap();
    assert!(state.event_errors.is_empty());
    assert_eq!(state.errors, None);
}

#[tokio::test]
async fn delete_cascades_everywhere() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;
    let key = PrimaryKey::from("a");

    let list_id = engine
        .list(WIDGET, fleetsync_core::ListQuery::new().page_size(10), fleetsync_core::ListMode::Local)
        .await
        .unwrap();
    engine.select(WIDGET, &[key.clone()]).unwrap();
    engine.set_active(WIDGET, Some(&key)).await.unwrap();

    let task = tokio::spawn({
        let engine = engine.clone();
        let key = key.clone();
        async move { engine.delete(WIDGET, &key).await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.method, "delete");
    assert_eq!(params(&request), &json!({"id": "a"}));

    let state = engine.snapshot(WIDGET).unwrap();
    assert!(state.status(&key).get(StatusFlag::Deleting));
    assert!(state.saving);
    assert!(matches!(
        engine.delete(WIDGET, &key).await,
        Err(CoreError::ActionConflict { .. })
    ));

    remote.respond_ok(request.request_id, json!(null));
    task.await.unwrap().unwrap();

    let state = engine.snapshot(WIDGET).unwrap();
    assert!(state.get(&key).is_none());
    assert!(!state.statuses.contains_key(&key));
    assert!(!state.is_selected(&key));
    assert_eq!(state.active, None);
    assert!(!state.list(&list_id).unwrap().result_keys.contains(&key));
    assert!(state.saved);
    assert!(!state.saving);
}

#[tokio::test]
async fn rejected_update_restores_the_exact_snapshot() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, json!([{"id": 1, "name": "a", "ttl": 5}])).await;
    let key = PrimaryKey::from(1);
    let before = engine.snapshot(WIDGET).unwrap().get(&key).cloned().unwrap();

    let task = tokio::spawn({
        let engine = engine.clone();
        async move {
            let params = fleetsync_core::ModelParams::raw(json!({"id": 1, "name": "b"})).unwrap();
            engine.update(WIDGET, params).await
        }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.method, "update");

    let optimistic = engine.snapshot(WIDGET).unwrap();
    assert_eq!(optimistic.get(&key).unwrap().get("name"), Some(&json!("b")));
    assert!(optimistic.saving);

    remote.respond_err(request.request_id, json!("{\"name\": [\"Name is taken.\"]}"));
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));

    let state = engine.snapshot(WIDGET).unwrap();
    assert_eq!(state.get(&key), Some(&before));
    assert!(!state.saved);
    assert!(!state.saving);
    assert!(state.errors.as_ref().unwrap().field_errors().is_some());
    assert!(state.event_error("update", &key).is_some());
}

#[tokio::test]
async fn disconnect_fails_pending_requests_and_clears_flags() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;
    let key = PrimaryKey::from("c");

    let task = tokio::spawn({
        let engine = engine.clone();
        let key = key.clone();
        async move { engine.delete(WIDGET, &key).await }
    });
    remote.recv_request().await.unwrap();
    remote.disconnect("server went away");

    let err = task.await.unwrap().unwrap_err();
    assert!(err.is_connection());

    let state = engine.snapshot(WIDGET).unwrap();
    assert!(state.contains(&key));
    assert!(state.status(&key).is_idle());
    assert_eq!(state.errors, None);
    assert_eq!(engine.pending_requests(), 0);

    let err = engine.delete(WIDGET, &key).await.unwrap_err();
    assert!(err.is_connection());
    assert!(remote.drain_requests().is_empty());
}

#[tokio::test]
async fn connection_state_is_tracked_without_subscribers() {
    let (engine, remote) = engine().await;
    assert!(engine.is_connected());

    remote.disconnect("gone");
    settle().await;
    assert!(!engine.is_connected());
    assert_eq!(*engine.connection_state().borrow(), ConnectionState::Disconnected);

    remote.reconnect();
    settle().await;
    assert!(engine.is_connected());
}

#[tokio::test]
async fn mutations_of_unknown_keys_are_not_sent() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;
    let key = PrimaryKey::from("zz");

    assert!(matches!(
        engine.delete(WIDGET, &key).await,
        Err(CoreError::NotFound { .. })
    ));
    assert!(matches!(
        engine.action(WIDGET, &key, "deploy", None).await,
        Err(CoreError::NotFound { .. })
    ));
    assert!(matches!(
        engine.delete(WIDGET, &key).await,
        Err(CoreError::NotFound { .. })
    ));

    let state = engine.snapshot(WIDGET).unwrap();
    assert!(!state.statuses.contains_key(&key));
    assert!(!state.saving);
    assert!(remote.drain_requests().is_empty());
}

#[tokio::test]
async fn selection_requires_known_keys() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;

    let err = engine
        .select(WIDGET, &[PrimaryKey::from("a"), PrimaryKey::from("zzz")])
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    assert!(engine.snapshot(WIDGET).unwrap().selected.is_empty());

    engine.select_all(WIDGET).unwrap();
    assert_eq!(engine.snapshot(WIDGET).unwrap().selected.len(), 3);
    engine.deselect(WIDGET, &[PrimaryKey::from("b")]).unwrap();
    assert_eq!(engine.snapshot(WIDGET).unwrap().selected.len(), 2);
    engine.clear_selection(WIDGET).unwrap();
    assert!(engine.snapshot(WIDGET).unwrap().selected.is_empty());
}

#[tokio::test]
async fn remote_active_is_confirmed_by_the_service() {
    let (engine, mut remote) = engine().await;
    engine.register_schema(
        fleetsync_core::ModelSchema::new("gadget", "id").remote_active(true),
    );
    remote.notify("gadget", NotifyAction::Create, json!({"id": 3, "name": "g"}));
    settle().await;
    let key = PrimaryKey::from(3);

    let task = tokio::spawn({
        let engine = engine.clone();
        let key = key.clone();
        async move { engine.set_active("gadget", Some(&key)).await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.method, "set_active");
    assert_eq!(params(&request), &json!({"id": 3}));
    remote.respond_ok(request.request_id, json!({"id": 3, "name": "g", "details": true}));
    task.await.unwrap().unwrap();

    let state = engine.snapshot("gadget").unwrap();
    assert_eq!(state.active, Some(key.clone()));
    assert_eq!(state.active_entity().unwrap().get("details"), Some(&json!(true)));

    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.set_active("gadget", None).await }
    });
    let request = remote.recv_request().await.unwrap();
    remote.respond_err(request.request_id, json!("nope"));
    assert!(task.await.unwrap().is_err());
    assert_eq!(engine.snapshot("gadget").unwrap().active, None);
}

#[tokio::test]
async fn count_reads_plain_and_wrapped_results() {
    let (engine, mut remote) = engine().await;

    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.count(WIDGET, "name:alpha").await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.method, "count");
    assert_eq!(params(&request), &json!({"filter": {"name": ["alpha"]}}));
    remote.respond_ok(request.request_id, json!({"count": 12}));
    assert_eq!(task.await.unwrap().unwrap(), 12);

    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.count(WIDGET, "").await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.params, None);
    remote.respond_ok(request.request_id, json!(40));
    assert_eq!(task.await.unwrap().unwrap(), 40);
}

#[tokio::test]
async fn unknown_models_are_reported() {
    let (engine, _remote) = engine().await;
    assert!(matches!(
        engine.fetch("spaceship").await,
        Err(CoreError::UnknownModel { .. })
    ));
}

#[tokio::test]
async fn engines_are_isolated() {
    let (one, mut remote_one) = engine().await;
    let (two, _remote_two) = engine().await;
    seed(&one, &mut remote_one, abc()).await;
    assert_eq!(one.snapshot(WIDGET).unwrap().len(), 3);
    assert!(two.snapshot(WIDGET).unwrap().is_empty());
}

#[tokio::test]
async fn start_twice_fails_and_shutdown_fails_pending() {
    let (engine, mut remote) = engine().await;
    assert!(engine.start().await.is_err());

    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.fetch(WIDGET).await }
    });
    remote.recv_request().await.unwrap();
    engine.shutdown().await;

    assert!(task.await.unwrap().unwrap_err().is_connection());
    assert!(!engine.is_connected());
    assert!(!engine.snapshot(WIDGET).unwrap().loading);
}

#[tokio::test]
async fn subscribers_see_published_snapshots() {
    use futures_util::StreamExt;

    let (engine, mut remote) = engine().await;
    let mut stream = engine.subscribe(WIDGET).unwrap();
    assert!(stream.current().is_empty());

    seed(&engine, &mut remote, abc()).await;
    assert_eq!(stream.latest().len(), 3);

    let mut snapshots = engine.subscribe(WIDGET).unwrap().into_stream();
    assert_eq!(snapshots.next().await.unwrap().len(), 3);

    remote.notify(WIDGET, NotifyAction::Delete, json!("a"));
    assert_eq!(snapshots.next().await.unwrap().len(), 2);
    assert_eq!(stream.changed().await.unwrap().len(), 2);
    assert_eq!(stream.current().len(), 2);
}
