use crate::{AppState, errors::AppError, models::User};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, num::NonZeroU32};
use tracing::warn;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "yatube_session";
const SESSION_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub username: String,
    pub exp: usize,
}

pub fn create_token(user_id: &Uuid, username: &str, secret: &str) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(SESSION_HOURS))
        .ok_or_else(|| AppError::InternalError("Failed to calculate expiration".into()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Token Creation failed: {}", e)))
}

/// Session token from the `Authorization: Bearer` header, else the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub fn validate_token(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let token = session_token(headers)?;

    decode::<Claims>(
        &token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hashed: &str) -> Result<bool, AppError> {
    verify(password, hashed)
        .map_err(|e| AppError::InternalError(format!("Password verification failed: {}", e)))
}

/// Resolves the request identity. A bad token or a vanished user is anonymous.
fn resolve_user(parts: &Parts, state: &AppState) -> Option<User> {
    let claims = validate_token(&parts.headers, &state.config.jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub).ok()?;
    state.store.user(&user_id)
}

// ============================================================================
// EXTRACTORS
// ============================================================================

/// Whoever is making the request, possibly nobody.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }

    pub fn username(&self) -> Option<String> {
        self.0.as_ref().map(|u| u.username.clone())
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Viewer(resolve_user(parts, state)))
    }
}

/// A logged-in user. Anonymous requests are sent to the login page with the
/// original path and query kept in `next`.
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_user(parts, state) {
            Some(user) => Ok(RequireUser(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string());
                Err(AppError::LoginRequired { next })
            }
        }
    }
}

// ============================================================================
// LOGIN THROTTLE - token bucket per username
// ============================================================================

const THROTTLE_SHRINK_THRESHOLD: usize = 10_000;

pub struct LoginThrottle {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl LoginThrottle {
    pub fn per_minute(attempts: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(attempts)),
        }
    }

    /// Consumes one attempt for `username`. False when the bucket is empty.
    pub fn check(&self, username: &str) -> bool {
        if self.limiter.len() > THROTTLE_SHRINK_THRESHOLD {
            self.limiter.retain_recent();
        }
        let allowed = self.limiter.check_key(&username.to_lowercase()).is_ok();
        if !allowed {
            warn!("Login throttled for {}", username);
        }
        allowed
    }
}
