//! Time-based page cache.
//!
//! Whole rendered responses are stored under a key built from a fixed prefix,
//! the request path and query, and the session cookie (the page chrome shows
//! who is logged in). Entries expire after the configured TTL or when the
//! cache is cleared. Mutations never invalidate entries on their own.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use moka::future::Cache;
use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Duration,
};
use tracing::{debug, warn};

use crate::auth::session_token;

pub const INDEX_PAGE_PREFIX: &str = "index_page";

/// Upper bound on stored pages. Every distinct query and session takes a slot.
pub const MAX_CACHED_PAGES: u64 = 10_000;

const MAX_CACHED_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct CachedPage {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct PageCache {
    entries: Cache<String, CachedPage>,
    enabled: bool,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_CACHED_PAGES)
    }

    pub fn with_capacity(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            enabled: !ttl.is_zero(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<CachedPage> {
        self.entries.get(key).await
    }

    pub async fn insert(
        &self,
        key: String,
        status: StatusCode,
        headers: Vec<(HeaderName, HeaderValue)>,
        body: Bytes,
    ) {
        if !self.enabled {
            return;
        }
        self.entries
            .insert(
                key,
                CachedPage {
                    status,
                    headers,
                    body,
                },
            )
            .await;
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Live entries, after pending expirations and evictions are applied.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// `prefix:path?query:session` with the query and session hashed.
pub fn page_key(prefix: &str, request: &Request) -> String {
    let path = request.uri().path();
    let query = request.uri().query().unwrap_or("");
    let session = session_token(request.headers()).unwrap_or_default();
    format!(
        "{}:{}:{:016x}:{:016x}",
        prefix,
        path,
        hash_value(query),
        hash_value(session.as_str())
    )
}

fn hash_value<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Middleware caching successful GET responses of the home page.
pub async fn cache_index_page(
    State(cache): State<PageCache>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = page_key(INDEX_PAGE_PREFIX, &request);

    if let Some(cached) = cache.get(&key).await {
        debug!(cache = INDEX_PAGE_PREFIX, outcome = "hit", "serving cached page");
        return build_response(cached);
    }

    debug!(cache = INDEX_PAGE_PREFIX, outcome = "miss", "rendering page");
    let response = next.run(request).await;

    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Failed to buffer page for caching: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| **name != header::SET_COOKIE)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    cache
        .insert(key, parts.status, headers, bytes.clone())
        .await;

    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(cached: CachedPage) -> Response {
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = cached.status;
    let headers = response.headers_mut();
    for (name, value) in cached.headers {
        headers.append(name, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn request(uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn entries_live_for_the_ttl() {
        let cache = PageCache::new(Duration::from_secs(20));
        cache
            .insert("k".into(), StatusCode::OK, vec![], Bytes::from_static(b"page"))
            .await;
        assert_eq!(cache.get("k").await.unwrap().body, Bytes::from_static(b"page"));
    }

    #[tokio::test]
    async fn expired_entries_are_dropped() {
        let cache = PageCache::new(Duration::from_millis(10));
        cache
            .insert("k".into(), StatusCode::OK, vec![], Bytes::from_static(b"page"))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = PageCache::new(Duration::from_secs(20));
        cache.insert("a".into(), StatusCode::OK, vec![], Bytes::new()).await;
        cache.insert("b".into(), StatusCode::OK, vec![], Bytes::new()).await;
        cache.clear();
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = PageCache::new(Duration::ZERO);
        cache.insert("k".into(), StatusCode::OK, vec![], Bytes::new()).await;
        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn capacity_bounds_the_entry_count() {
        let cache = PageCache::with_capacity(Duration::from_secs(20), 8);
        for page in 0..100 {
            cache
                .insert(format!("index_page:/:{}", page), StatusCode::OK, vec![], Bytes::new())
                .await;
        }
        assert!(cache.len().await <= 8);
    }

    #[test]
    fn key_captures_query_and_session() {
        let plain = page_key(INDEX_PAGE_PREFIX, &request("/", None));
        let paged = page_key(INDEX_PAGE_PREFIX, &request("/?page=2", None));
        let logged_in = page_key(
            INDEX_PAGE_PREFIX,
            &request("/", Some("yatube_session=abc")),
        );

        assert!(plain.starts_with("index_page:/:"));
        assert_ne!(plain, paged);
        assert_ne!(plain, logged_in);
        assert_eq!(plain, page_key(INDEX_PAGE_PREFIX, &request("/", None)));
    }
}
