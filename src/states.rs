use crate::{
    auth::LoginThrottle, cache::PageCache, config::Config, media::MediaStorage, store::Store,
};
use std::{num::NonZeroU32, sync::Arc};

// ============================================================================
// APPLICATION STATE - Shared data across all requests
// ============================================================================
/// `Arc` = Atomic Reference Counter
/// - Allows multiple threads to share ownership safely
/// - When last reference drops, data is cleaned up
///
/// Cloning `AppState` is cheap: every field is a handle onto shared data.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub index_cache: PageCache,
    pub media: MediaStorage,
    pub login_throttle: Arc<LoginThrottle>,
}

impl AppState {
    pub fn new(config: Config, store: Store) -> Self {
        let attempts =
            NonZeroU32::new(config.login_attempts_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            index_cache: PageCache::new(config.index_cache_ttl),
            media: MediaStorage::new(config.media_root.clone()),
            login_throttle: Arc::new(LoginThrottle::per_minute(attempts)),
            config: Arc::new(config),
            store,
        }
    }
}
