#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;
use yatube::{
    AppState, app,
    auth::{SESSION_COOKIE, create_token, hash_password},
    config::Config,
    models::{Group, Post, User},
    store::{NewPost, Store},
};

pub const PASSWORD: &str = "war-and-peace";
pub const BOUNDARY: &str = "yatube-test-boundary";

pub const SMALL_GIF: &[u8] = b"GIF89a\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\xFF\xFF\xFF\x21\xF9\x04\x00\x00\x00\x00\x00\x2C\x00\x00\x00\x00\x02\x00\x01\x00\x00\x02\x02\x0C\x0A\x00\x3B";

/// A router over a fresh store with uploads going to a temp dir.
pub struct TestApp {
    pub state: AppState,
    pub media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let media = tempfile::tempdir().unwrap();
        let mut config = Config::for_tests(media.path());
        tweak(&mut config);
        Self {
            state: AppState::new(config, Store::new()),
            media,
        }
    }

    pub fn store(&self) -> &Store {
        &self.state.store
    }

    pub fn router(&self) -> Router {
        app(self.state.clone())
    }

    pub fn user(&self, username: &str) -> User {
        let hashed = hash_password(PASSWORD, self.state.config.bcrypt_cost).unwrap();
        self.store()
            .create_user(username, &format!("{}@example.com", username), hashed)
            .unwrap()
    }

    pub fn group(&self, title: &str, slug: &str) -> Group {
        self.store().create_group(title, slug, "").unwrap()
    }

    pub fn post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.store().create_post(NewPost {
            author_id: author.id,
            text: text.to_string(),
            group_id: group.map(|g| g.id),
            image: None,
        })
    }

    /// `Cookie` header value logging `user` in.
    pub fn cookie(&self, user: &User) -> String {
        let token = create_token(&user.id, &user.username, &self.state.config.jwt_secret).unwrap();
        format!("{}={}", SESSION_COOKIE, token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = multipart_body(fields, image);
        self.send(builder.body(Body::from(body)).unwrap()).await
    }
}

pub fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = image {
        let content_type = if filename.ends_with(".gif") {
            "image/gif"
        } else {
            "text/plain"
        };
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Number of post cards rendered on a listing page.
pub fn card_count(html: &str) -> usize {
    html.matches("<article class=\"post-card\">").count()
}
