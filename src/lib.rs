// ============================================================================
// YATUBE - blogging platform
// ============================================================================

// - Paginated listings (index, groups, profiles, followed authors)
// - Short-lived page cache on the index
// - Cookie sessions backed by JWT, bcrypt password hashing
// - Author-only editing, login-gated posting, commenting and following
// - Image uploads served from the media root

pub mod auth;
pub mod cache;
pub mod config;
pub mod dto;
pub mod errors;
pub mod media;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod states;
pub mod store;
pub mod views;

pub use states::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use routes::{about, health, post as posts, user};
use tower::{ServiceBuilder, limit::ConcurrencyLimitLayer};
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

const MAX_CONCURRENT_REQUESTS: usize = 1024;

/// Builds the full router for `state`.
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let index = get(posts::index).layer(middleware::from_fn_with_state(
        state.index_cache.clone(),
        cache::cache_index_page,
    ));

    Router::new()
        // Listings
        .route("/", index)
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/follow/", get(posts::follow_index))
        // Profiles
        .route("/profile/{username}/", get(user::profile))
        .route("/profile/{username}/follow/", get(user::profile_follow))
        .route("/profile/{username}/unfollow/", get(user::profile_unfollow))
        // Posts
        .route("/create/", get(posts::create_form).post(posts::create_submit))
        .route("/posts/{id}/", get(posts::post_detail))
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .route("/posts/{id}/delete/", post(posts::delete_post))
        .route("/posts/{id}/comment/", post(posts::add_comment))
        // Accounts
        .route("/auth/signup/", get(user::signup_form).post(user::signup_submit))
        .route("/auth/login/", get(user::login_form).post(user::login_submit))
        .route("/auth/logout/", get(user::logout))
        // Static pages
        .route("/about/author/", get(about::author))
        .route("/about/tech/", get(about::tech))
        .route("/health", get(health::health_check))
        .nest_service("/media", ServeDir::new(&config.media_root))
        .fallback(routes::not_found)
        // Add state and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.request_timeout))
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS)),
        )
}
