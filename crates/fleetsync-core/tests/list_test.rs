#![allow(clippy::unwrap_used)]

mod common;

use common::{WIDGET, abc, engine, params, seed, settle};
use fleetsync_api::NotifyAction;
use fleetsync_core::{CoreError, ListMode, ListQuery, PrimaryKey, SortDirection};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn keys(ids: &[&str]) -> Vec<PrimaryKey> {
    ids.iter().map(|id| PrimaryKey::from(*id)).collect()
}

fn page(items: &[(&str, &str)], count: usize, cur_page: usize, num_pages: usize) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|(id, status)| json!({"id": id, "name": id, "status": status}))
        .collect();
    json!({
        "count": count,
        "cur_page": cur_page,
        "num_pages": num_pages,
        "groups": [{"name": null, "value": null, "count": count, "collapsed": false, "items": items}]
    })
}

#[tokio::test]
async fn local_grouping_and_collapse() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;

    let id = engine
        .list(
            WIDGET,
            ListQuery::new().group_by("value").page_size(10),
            ListMode::Local,
        )
        .await
        .unwrap();

    let state = engine.snapshot(WIDGET).unwrap();
    let view = state.list(&id).unwrap();
    let groups: Vec<_> = view
        .groups
        .iter()
        .map(|g| (g.name.clone().unwrap(), g.keys.clone()))
        .collect();
    assert_eq!(
        groups,
        vec![
            ("1".to_owned(), keys(&["a", "c"])),
            ("2".to_owned(), keys(&["b"])),
        ]
    );

    engine
        .requery(
            WIDGET,
            &id,
            ListQuery::new().group_by("value").collapse("1").page_size(10),
        )
        .await
        .unwrap();
    let state = engine.snapshot(WIDGET).unwrap();
    let first = &state.list(&id).unwrap().groups[0];
    assert!(first.keys.is_empty());
    assert_eq!(first.count, Some(2));
    assert!(first.collapsed);
}

#[tokio::test]
async fn local_lists_follow_notifications() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;
    let id = engine
        .list(
            WIDGET,
            ListQuery::new()
                .filter("a")
                .sort_by("name", SortDirection::Descending)
                .page_size(10),
            ListMode::Local,
        )
        .await
        .unwrap();
    assert_eq!(
        engine.snapshot(WIDGET).unwrap().list(&id).unwrap().result_keys,
        keys(&["c", "b", "a"])
    );

    remote.notify(WIDGET, NotifyAction::Update, json!({"id": "b", "name": "bo", "value": 2}));
    remote.notify(WIDGET, NotifyAction::Create, json!({"id": "d", "name": "delta", "value": 3}));
    settle().await;

    let state = engine.snapshot(WIDGET).unwrap();
    assert_eq!(state.list(&id).unwrap().result_keys, keys(&["c", "d", "a"]));
    let names: Vec<_> = state
        .list_entities(&id)
        .iter()
        .map(|e| e.get("name").cloned().unwrap())
        .collect();
    assert_eq!(names, vec![json!("gamma"), json!("delta"), json!("alpha")]);
}

#[tokio::test]
async fn requery_resets_the_page_unless_kept() {
    let (engine, mut remote) = engine().await;
    seed(&engine, &mut remote, abc()).await;
    let id = engine
        .list(WIDGET, ListQuery::new().page_size(1), ListMode::Local)
        .await
        .unwrap();

    engine.set_page(WIDGET, &id, 3).await.unwrap();
    assert_eq!(engine.snapshot(WIDGET).unwrap().list(&id).unwrap().cur_page, 3);

    engine
        .requery(WIDGET, &id, ListQuery::new().filter("a").page(3).page_size(1))
        .await
        .unwrap();
    assert_eq!(engine.snapshot(WIDGET).unwrap().list(&id).unwrap().cur_page, 1);

    engine
        .requery(
            WIDGET,
            &id,
            ListQuery::new().filter("m").page(2).page_size(1).keep_page(),
        )
        .await
        .unwrap();
    assert_eq!(engine.snapshot(WIDGET).unwrap().list(&id).unwrap().cur_page, 2);

    // Collapsing a group is a descriptor change too.
    let grouped = ListQuery::new().group_by("value").page_size(1);
    let id = engine.list(WIDGET, grouped.clone(), ListMode::Local).await.unwrap();
    engine.set_page(WIDGET, &id, 3).await.unwrap();
    assert_eq!(engine.snapshot(WIDGET).unwrap().list(&id).unwrap().cur_page, 3);

    engine
        .requery(WIDGET, &id, grouped.clone().collapse("2").page(3))
        .await
        .unwrap();
    assert_eq!(engine.snapshot(WIDGET).unwrap().list(&id).unwrap().cur_page, 1);

    engine
        .requery(WIDGET, &id, grouped.collapse("1").page(2).keep_page())
        .await
        .unwrap();
    assert_eq!(engine.snapshot(WIDGET).unwrap().list(&id).unwrap().cur_page, 2);
}

#[tokio::test]
async fn server_lists_need_schema_support() {
    let (engine, mut remote) = engine().await;
    let err = engine
        .list("zone", ListQuery::new(), ListMode::Server)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
    assert!(remote.drain_requests().is_empty());
    assert!(engine.snapshot("zone").unwrap().lists.is_empty());
}

#[tokio::test]
async fn paging_a_server_list_unsubscribes_once() {
    let (engine, mut remote) = engine().await;

    let task = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .list(WIDGET, ListQuery::new().page_size(2), ListMode::Server)
                .await
        }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(request.method, "list");
    assert_eq!(params(&request)["page_number"], json!(1));
    assert_eq!(params(&request)["page_size"], json!(2));
    remote.respond_ok(
        request.request_id,
        page(&[("a", "New"), ("b", "New")], 4, 1, 2),
    );
    let id = task.await.unwrap().unwrap();

    let task = tokio::spawn({
        let engine = engine.clone();
        let id = id.clone();
        async move { engine.set_page(WIDGET, &id, 2).await }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(params(&request)["page_number"], json!(2));
    remote.respond_ok(
        request.request_id,
        page(&[("b", "New"), ("c", "New")], 4, 2, 2),
    );
    task.await.unwrap().unwrap();

    let unsubscribe = remote.recv_request().await.unwrap();
    assert_eq!(unsubscribe.method, "unsubscribe");
    assert_eq!(params(&unsubscribe), &json!({"ids": ["a"]}));
    remote.respond_ok(unsubscribe.request_id, json!(null));
    settle().await;
    assert!(remote.drain_requests().is_empty());

    let state = engine.snapshot(WIDGET).unwrap();
    let view = state.list(&id).unwrap();
    assert_eq!(view.result_keys, keys(&["b", "c"]));
    assert_eq!(view.cur_page, 2);
    assert_eq!(view.count, 4);
    // Page 1 entities stay cached.
    assert!(state.contains(&PrimaryKey::from("a")));
}

#[tokio::test]
async fn superseded_pages_are_cached_but_not_rendered() {
    let (engine, mut remote) = engine().await;

    let task = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .list(WIDGET, ListQuery::new().page_size(1), ListMode::Server)
                .await
        }
    });
    let request = remote.recv_request().await.unwrap();
    remote.respond_ok(request.request_id, page(&[("a", "New")], 3, 1, 3));
    let id = task.await.unwrap().unwrap();

    let slow = tokio::spawn({
        let engine = engine.clone();
        let id = id.clone();
        async move { engine.set_page(WIDGET, &id, 2).await }
    });
    let slow_request = remote.recv_request().await.unwrap();
    let fast = tokio::spawn({
        let engine = engine.clone();
        let id = id.clone();
        async move { engine.set_page(WIDGET, &id, 3).await }
    });
    let fast_request = remote.recv_request().await.unwrap();

    remote.respond_ok(fast_request.request_id, page(&[("c", "New")], 3, 3, 3));
    fast.await.unwrap().unwrap();
    let unsubscribe = remote.recv_request().await.unwrap();
    assert_eq!(params(&unsubscribe), &json!({"ids": ["a"]}));

    remote.respond_ok(slow_request.request_id, page(&[("b", "New")], 3, 2, 3));
    slow.await.unwrap().unwrap();
    settle().await;

    let state = engine.snapshot(WIDGET).unwrap();
    assert_eq!(state.list(&id).unwrap().result_keys, keys(&["c"]));
    assert!(state.contains(&PrimaryKey::from("b")));
}

#[tokio::test]
async fn server_lists_track_notifications_and_clear_releases_keys() {
    let (engine, mut remote) = engine().await;

    let task = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .list(
                    WIDGET,
                    ListQuery::new().group_by("status").page_size(10),
                    ListMode::Server,
                )
                .await
        }
    });
    let request = remote.recv_request().await.unwrap();
    assert_eq!(params(&request)["group_key"], json!("status"));
    remote.respond_ok(
        request.request_id,
        json!({
            "count": 2, "cur_page": 1, "num_pages": 1,
            "groups": [
                {"name": "New", "value": "New", "count": 1, "collapsed": false,
                 "items": [{"id": "a", "status": "New"}]},
                {"name": "Ready", "value": "Ready", "count": 1, "collapsed": false,
                 "items": [{"id": "b", "status": "Ready"}]}
            ]
        }),
    );
    let id = task.await.unwrap().unwrap();

    remote.notify(WIDGET, NotifyAction::Update, json!({"id": "a", "status": "Ready"}));
    settle().await;
    let state = engine.snapshot(WIDGET).unwrap();
    let view = state.list(&id).unwrap();
    assert_eq!(view.groups.len(), 1);
    assert_eq!(view.groups[0].keys, keys(&["b", "a"]));
    assert_eq!(view.groups[0].count, Some(2));
    assert!(!view.stale);

    remote.notify(WIDGET, NotifyAction::Create, json!({"id": "z", "status": "New"}));
    remote.notify(WIDGET, NotifyAction::Delete, json!("b"));
    settle().await;
    let state = engine.snapshot(WIDGET).unwrap();
    let view = state.list(&id).unwrap();
    assert!(view.stale);
    assert_eq!(view.result_keys, keys(&["a"]));
    assert_eq!(view.count, 1);

    engine.clear_list(WIDGET, &id).unwrap();
    let unsubscribe = remote.recv_request().await.unwrap();
    assert_eq!(unsubscribe.method, "unsubscribe");
    assert_eq!(params(&unsubscribe), &json!({"ids": ["a"]}));
    assert!(engine.snapshot(WIDGET).unwrap().list(&id).is_none());
}

#[tokio::test]
async fn disconnect_marks_server_lists_stale() {
    let (engine, mut remote) = engine().await;
    let task = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .list(WIDGET, ListQuery::new().page_size(5), ListMode::Server)
                .await
        }
    });
    let request = remote.recv_request().await.unwrap();
    remote.respond_ok(request.request_id, page(&[("a", "New")], 1, 1, 1));
    let id = task.await.unwrap().unwrap();

    remote.disconnect("lost");
    settle().await;
    assert!(engine.snapshot(WIDGET).unwrap().list(&id).unwrap().stale);
}
