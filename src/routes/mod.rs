pub mod about;
pub mod health;
pub mod post;
pub mod user;

use crate::errors::AppError;
use axum::response::{IntoResponse, Response};

/// Fallback for unmatched routes.
pub async fn not_found() -> Response {
    AppError::NotFound.into_response()
}

/// Profile path for `username`, percent-encoded for use in `Location`.
pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}
