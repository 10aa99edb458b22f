//! Integration tests for rule loading through the HTTP feed and cache, and
//! for how the app reacts to each outcome.

mod common;

use chrono::TimeDelta;
use common::app_at;
use remindroom_core::rules::{parse_feed_url, HttpTaskFeed, RuleCache};
use remindroom_core::{LoadError, LoadPolicy, RuleLoader, RuleOrigin, Timers};
use std::sync::Arc;
use std::time::Duration;

fn http_loader(server: &mockito::Server, cache: &RuleCache) -> RuleLoader {
    let feed = HttpTaskFeed::new(Duration::from_secs(5)).unwrap();
    let url = parse_feed_url(&format!("{}/tasks", server.url())).unwrap();
    RuleLoader::new(cache.clone()).with_feed(Arc::new(feed), url)
}

#[tokio::test]
async fn test_feed_failure_without_cache_arms_fallback() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/tasks").with_status(500).create_async().await;
    let dir = tempfile::tempdir().unwrap();
    let cache = RuleCache::new(dir.path().join("rules.json"));

    let result = http_loader(&server, &cache).load().await;
    assert!(matches!(result, Err(LoadError::Exhausted { .. })));

    let mut app = app_at(8, 0);
    let report = app.apply_rules(result);
    assert!(report.fallback);
    assert_eq!(app.rules().origin(), RuleOrigin::BuiltIn);
    assert_eq!(app.timers().live(), 1);
    // built-in rules are never persisted
    assert!(!cache.exists());

    assert_eq!(app.advance(TimeDelta::seconds(60)), 2);
    let messages: Vec<_> = app.queue().peek_all().into_iter().map(|a| a.message).collect();
    assert!(messages[0].starts_with("Scheduled reminder #1"));
    assert!(messages[1].starts_with("Scheduled reminder #2"));
}

#[tokio::test]
async fn test_feed_success_is_cached_and_reused() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/tasks")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
                {"id": "standup", "title": "Standup", "message": "Join", "times": ["09:00"]},
                {"id": "water", "title": "Water", "message": "Glass #{count}", "intervalSeconds": 600},
                {"id": "done", "times": ["10:00"], "completed": true}
            ]"#,
        )
        .expect(1)
        .create_async()
        .await;
    let dir = tempfile::tempdir().unwrap();
    let cache = RuleCache::new(dir.path().join("rules.json"));

    let loaded = http_loader(&server, &cache).load().await.unwrap();
    assert_eq!(loaded.origin, RuleOrigin::Remote);
    assert_eq!(loaded.rules.rules.len(), 2);

    // second load is served from the cache without hitting the feed
    let again = http_loader(&server, &cache).load().await.unwrap();
    assert_eq!(again.origin, RuleOrigin::Cache);
    assert_eq!(again.rules, loaded.rules);
    mock.assert_async().await;

    let mut app = app_at(8, 59);
    app.apply_rules(Ok(again));
    assert_eq!(app.timers().live(), 2);
    assert_eq!(app.advance(TimeDelta::minutes(1)), 1);
    assert_eq!(app.queue().front().unwrap().title, "Standup");
}

#[tokio::test]
async fn test_always_refetch_falls_back_to_cache() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/tasks").with_status(502).create_async().await;
    let dir = tempfile::tempdir().unwrap();
    let cache = RuleCache::new(dir.path().join("rules.json"));
    cache.write(&remindroom_core::rules::starter_rules()).unwrap();

    let loaded = http_loader(&server, &cache)
        .with_policy(LoadPolicy::AlwaysRefetch)
        .load()
        .await
        .unwrap();
    assert_eq!(loaded.origin, RuleOrigin::Cache);
    assert_eq!(loaded.rules.rules.len(), 3);
}

#[tokio::test]
async fn test_malformed_feed_body_is_a_fetch_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/tasks")
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;
    let dir = tempfile::tempdir().unwrap();
    let cache = RuleCache::new(dir.path().join("rules.json"));

    match http_loader(&server, &cache).load().await {
        Err(LoadError::Exhausted { attempts }) => {
            assert!(attempts.iter().any(|a| a.starts_with("remote:")));
        }
        other => panic!("unexpected load result: {other:?}"),
    }
}
