//! Credential cache behaviour against a real HTTP server.

use jbxextract::{CredentialCache, RefreshOutcome};
use std::time::Duration;

const COOKIES: &str = "# Netscape HTTP Cookie File\n.example.org\tTRUE\t/\tFALSE\t0\tsid\tabc\n";

fn cache_for(url: String) -> CredentialCache {
    CredentialCache::new(Some(url), "gistfile1.txt")
        .with_fetch_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn fetch_caches_after_the_first_call() {
    let mut server = mockito::Server::new_async().await;
    let raw = server
        .mock("GET", "/raw/cookies.txt")
        .with_status(200)
        .with_body(COOKIES)
        .expect(1)
        .create_async()
        .await;

    let cache = cache_for(format!("{}/raw/cookies.txt", server.url()));

    assert_eq!(cache.fetch().await.as_deref(), Some(COOKIES));
    // Second call is served from the slot, not the server
    assert_eq!(cache.fetch().await.as_deref(), Some(COOKIES));
    raw.assert_async().await;

    assert!(cache.snapshot().is_some());
}

#[tokio::test]
async fn fetch_returns_none_on_http_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/raw/cookies.txt")
        .with_status(404)
        .create_async()
        .await;

    let cache = cache_for(format!("{}/raw/cookies.txt", server.url()));
    assert!(cache.fetch().await.is_none());
    assert!(cache.snapshot().is_none());
}

#[tokio::test]
async fn fetch_without_a_source_is_absent() {
    let cache = CredentialCache::new(None, "gistfile1.txt");
    assert!(cache.fetch().await.is_none());
}

#[tokio::test]
async fn unforced_refresh_short_circuits_on_a_cached_snapshot() {
    let mut server = mockito::Server::new_async().await;
    let raw = server
        .mock("GET", "/raw/cookies.txt")
        .with_status(200)
        .with_body(COOKIES)
        .expect(1)
        .create_async()
        .await;

    let cache = cache_for(format!("{}/raw/cookies.txt", server.url()));
    assert_eq!(cache.refresh(false).await, RefreshOutcome::Refreshed);

    // No new external call happens for the unforced refresh
    let outcome = cache.refresh(false).await;
    assert!(matches!(outcome, RefreshOutcome::AlreadyCached { .. }));
    raw.assert_async().await;
}

#[tokio::test]
async fn forced_refresh_always_calls_and_overwrites() {
    let mut server = mockito::Server::new_async().await;
    let raw = server
        .mock("GET", "/raw/cookies.txt")
        .with_status(200)
        .with_body(COOKIES)
        .expect(2)
        .create_async()
        .await;

    let cache = cache_for(format!("{}/raw/cookies.txt", server.url()));
    assert_eq!(cache.refresh(true).await, RefreshOutcome::Refreshed);
    let first_stamp = cache.snapshot().unwrap().fetched_at;

    assert_eq!(cache.refresh(true).await, RefreshOutcome::Refreshed);
    let second_stamp = cache.snapshot().unwrap().fetched_at;
    assert!(second_stamp >= first_stamp);
    raw.assert_async().await;
}

#[tokio::test]
async fn failed_refresh_reports_the_http_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/raw/cookies.txt")
        .with_status(503)
        .create_async()
        .await;

    let cache = cache_for(format!("{}/raw/cookies.txt", server.url()));
    assert_eq!(
        cache.refresh(true).await,
        RefreshOutcome::Failed("HTTP 503".to_string())
    );
}

#[tokio::test]
async fn gist_page_sources_resolve_through_the_api() {
    let mut server = mockito::Server::new_async().await;
    let gist_id = "002c3a85ca65cb2a80c0927a1cb0da61";

    let api = server
        .mock("GET", format!("/gists/{gist_id}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"files": {{"gistfile1.txt": {{"raw_url": "{}/fetched/cookies.txt"}}}}}}"#,
            server.url()
        ))
        .expect(1)
        .create_async()
        .await;
    let fetched = server
        .mock("GET", "/fetched/cookies.txt")
        .with_status(200)
        .with_body(COOKIES)
        .expect(1)
        .create_async()
        .await;

    // A bare gist id is not a raw URL, so the cache goes through the API
    let cache = CredentialCache::new(Some(gist_id.to_string()), "gistfile1.txt")
        .with_fetch_timeout(Duration::from_secs(2))
        .with_api_base(format!("{}/gists", server.url()));

    assert_eq!(cache.fetch().await.as_deref(), Some(COOKIES));
    api.assert_async().await;
    fetched.assert_async().await;
}

#[tokio::test]
async fn unresolvable_gist_source_is_absent_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let cache = CredentialCache::new(
        Some("002c3a85ca65cb2a80c0927a1cb0da61".to_string()),
        "gistfile1.txt",
    )
    .with_fetch_timeout(Duration::from_secs(2))
    .with_api_base(format!("{}/gists", server.url()));

    assert!(cache.fetch().await.is_none());
}
