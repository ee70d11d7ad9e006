mod common;

use axum::http::StatusCode;
use common::{TestApp, body_text};
use std::time::Duration;

#[tokio::test]
async fn index_is_served_from_cache_until_cleared() {
    let app = TestApp::new();
    let author = app.user("author");
    let post = app.post(&author, "Soon to vanish", None);

    let first = body_text(app.get("/", None).await).await;
    assert!(first.contains("Soon to vanish"));

    app.store().delete_post(post.id);

    let cached = body_text(app.get("/", None).await).await;
    assert_eq!(first, cached);

    app.state.index_cache.clear();

    let fresh = body_text(app.get("/", None).await).await;
    assert!(!fresh.contains("Soon to vanish"));
}

#[tokio::test]
async fn new_posts_appear_only_after_clearing() {
    let app = TestApp::new();
    let author = app.user("author");

    let empty = body_text(app.get("/", None).await).await;
    app.post(&author, "Late arrival", None);

    assert_eq!(body_text(app.get("/", None).await).await, empty);

    app.state.index_cache.clear();
    assert!(body_text(app.get("/", None).await).await.contains("Late arrival"));
}

#[tokio::test]
async fn pages_and_sessions_are_cached_separately() {
    let app = TestApp::new();
    let author = app.user("author");
    app.post(&author, "Visible post", None);

    let anonymous = body_text(app.get("/", None).await).await;
    let logged_in = body_text(app.get("/", Some(&app.cookie(&author))).await).await;
    assert_ne!(anonymous, logged_in);
    assert!(logged_in.contains("/auth/logout/"));

    app.get("/?page=2", None).await;
    assert_eq!(app.state.index_cache.len().await, 3);
}

#[tokio::test]
async fn other_pages_are_not_cached() {
    let app = TestApp::new();
    let author = app.user("author");
    let post = app.post(&author, "Profile entry", None);

    assert!(body_text(app.get("/profile/author/", None).await).await.contains("Profile entry"));
    app.store().delete_post(post.id);
    assert!(!body_text(app.get("/profile/author/", None).await).await.contains("Profile entry"));
    assert!(app.state.index_cache.is_empty().await);
}

#[tokio::test]
async fn entries_expire_after_the_window() {
    let app = TestApp::with_config(|config| config.index_cache_ttl = Duration::from_millis(50));
    let author = app.user("author");
    let post = app.post(&author, "Short lived", None);

    assert_eq!(app.get("/", None).await.status(), StatusCode::OK);
    app.store().delete_post(post.id);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!body_text(app.get("/", None).await).await.contains("Short lived"));
}

#[tokio::test]
async fn expired_pages_do_not_pile_up() {
    let app = TestApp::with_config(|config| config.index_cache_ttl = Duration::from_millis(50));
    let author = app.user("author");
    app.post(&author, "Only post", None);

    for page in 0..50 {
        let response = app.get(&format!("/?page={}", page), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert!(app.state.index_cache.len().await > 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    app.get("/", None).await;

    assert!(app.state.index_cache.len().await <= 1);
}
