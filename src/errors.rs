use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::views::{self, Layout, NotFoundTemplate};

pub const LOGIN_URL: &str = "/auth/login/";

/// Failures a handler can bail out with.
///
/// Non-authors editing a post and invalid forms are not errors: handlers
/// answer those with a redirect or a re-rendered form.
#[derive(Debug)]
pub enum AppError {
    /// Missing post, group or user. Rendered with the custom 404 page.
    NotFound,
    /// Anonymous access to a gated endpoint. `next` is the original path.
    LoginRequired { next: String },
    BadRequest(String),
    InternalError(String),
}

/// `/auth/login/?next=<next>`
pub fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_URL, urlencoding::encode(next))
}

/// Convert our custom errors to HTTP responses
///
/// `IntoResponse` trait: Axum calls this to convert errors to responses
/// This is how we control what users see when errors occur
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => {
                views::render_template_response(
                    NotFoundTemplate {
                        layout: Layout::new("Страница не найдена", None),
                    },
                    StatusCode::NOT_FOUND,
                )
            }
            AppError::LoginRequired { next } => views::found(&login_url(&next)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::InternalError(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html("<h1>Internal server error</h1>"),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn login_redirect_preserves_target() {
        let response = AppError::LoginRequired {
            next: "/create/".into(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login/?next=%2Fcreate%2F"
        );
    }

    #[test]
    fn not_found_uses_404() {
        assert_eq!(
            AppError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = AppError::InternalError("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
