//! End-to-end tests of the `/events` Server-Sent-Events stream.

#![allow(clippy::panic, clippy::indexing_slicing)]

mod common;

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{ALICE, BOB, FrameReader, TestApp, app, register, request};

async fn open_stream(app: &TestApp, token: &str, last_ts: i64) -> FrameReader {
    let uri = format!("/events?lastTs={last_ts}");
    let response = app.raw(request(Method::GET, &uri, Some(token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
    FrameReader::new(response)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[tokio::test]
async fn invalid_cursor_is_rejected() {
    let app = app();
    for uri in ["/events", "/events?lastTs=", "/events?lastTs=soon", "/events?lastTs=-1"] {
        let (status, body) = app.call(Method::GET, uri, Some(ALICE.0), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert_eq!(body, json!({ "error": "Invalid lastTs" }));
    }
    assert_eq!(app.bus.total_subscribers(), 0);
}

#[tokio::test]
async fn new_user_is_streamed_then_disconnect_releases_subscriptions() {
    let app = app();
    let mut stream = open_stream(&app, ALICE.0, now()).await;
    assert_eq!(app.bus.total_subscribers(), 6);

    let profile = register(&app, ALICE, "alice").await;

    let Some((kind, data)) = stream.next().await else {
        panic!("usercreated frame expected");
    };
    assert_eq!(kind, "usercreated");
    assert_eq!(data["id"], profile["id"]);
    assert_eq!(data["username"], "alice");
    assert!(data.get("phoneNumber").is_none());

    drop(stream);
    assert_eq!(app.bus.total_subscribers(), 0);
}

#[tokio::test]
async fn cursor_replays_earlier_changes() {
    let app = app();
    register(&app, ALICE, "alice").await;

    let mut stream = open_stream(&app, BOB.0, 0).await;
    let Some((kind, data)) = stream.next().await else {
        panic!("replayed frame expected");
    };
    assert_eq!(kind, "usercreated");
    assert_eq!(data["username"], "alice");
    assert!(stream.next_within(Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn user_changes_keep_their_order() {
    let app = app();
    let since = now();
    register(&app, ALICE, "alice").await;
    let (_, room) = app
        .call(Method::POST, "/rooms", Some(ALICE.0), Some(json!({ "name": "lobby" })))
        .await;

    let mut stream = open_stream(&app, ALICE.0, since).await;

    let (status, _) = app
        .call(Method::POST, "/profile", Some(ALICE.0), Some(json!({ "avatarPath": "b.png" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(
            Method::POST,
            "/posts",
            Some(ALICE.0),
            Some(json!({ "roomId": room["id"], "sections": [{ "type": "text", "body": "hi" }] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut kinds = Vec::new();
    for _ in 0..3 {
        let Some((kind, _)) = stream.next().await else {
            panic!("frame expected");
        };
        kinds.push(kind);
    }
    let user_kinds: Vec<&str> = kinds
        .iter()
        .map(String::as_str)
        .filter(|k| k.starts_with("user"))
        .collect();
    assert_eq!(user_kinds, ["usercreated", "userupdated"]);
    assert!(kinds.iter().any(|k| k == "postcreated"));
}

#[tokio::test]
async fn concurrent_streams_are_independent() {
    let app = app();
    let mut first = open_stream(&app, ALICE.0, now()).await;
    let mut second = open_stream(&app, BOB.0, now()).await;
    assert_eq!(app.bus.total_subscribers(), 12);

    register(&app, ALICE, "alice").await;
    for stream in [&mut first, &mut second] {
        let Some((kind, data)) = stream.next().await else {
            panic!("both streams should see the new user");
        };
        assert_eq!(kind, "usercreated");
        assert_eq!(data["username"], "alice");
    }
    // Each stream sees its own feed's copy exactly once.
    assert!(first.next_within(Duration::from_millis(200)).await.is_none());

    drop(first);
    assert_eq!(app.bus.total_subscribers(), 6);

    register(&app, BOB, "bob").await;
    let Some((kind, data)) = second.next().await else {
        panic!("remaining stream should keep receiving");
    };
    assert_eq!(kind, "usercreated");
    assert_eq!(data["username"], "bob");
}

#[tokio::test]
async fn bus_shutdown_ends_open_streams() {
    let app = app();
    let mut stream = open_stream(&app, ALICE.0, now()).await;
    app.bus.shutdown();
    assert!(stream.is_finished().await);
    assert_eq!(app.bus.total_subscribers(), 0);
}
