use crate::{
    AppState,
    auth::{
        RequireUser, Viewer, clear_session, create_token, hash_password, session_cookie,
        verify_password,
    },
    dto::{FormErrors, LoginForm, NON_FIELD_ERRORS, PaginationParams, REQUIRED_MESSAGE, SignupForm},
    errors::AppError,
    models::User,
    routes::profile_url,
    pagination::{POSTS_PER_PAGE, paginate},
    store::{PostFilter, StoreError},
    views::{
        Layout, LoginTemplate, PageView, ProfileTemplate, SignupTemplate, found, render_template,
        render_template_response,
    },
};
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

const INVALID_LOGIN_MESSAGE: &str = "Пожалуйста, введите правильные имя пользователя и пароль. \
                                     Оба поля могут быть чувствительны к регистру.";
const THROTTLED_MESSAGE: &str = "Слишком много попыток входа. Повторите попытку позже.";
const USERNAME_TAKEN_MESSAGE: &str = "Пользователь с таким именем уже существует.";
const EMAIL_TAKEN_MESSAGE: &str = "Пользователь с таким адресом электронной почты уже существует.";

/// `next` if it stays on this site, else `/`.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(target) if is_local_path(target) => target,
        _ => "/",
    }
}

/// Browsers read `//host` and `/\host` as another origin.
fn is_local_path(target: &str) -> bool {
    let mut chars = target.chars();
    chars.next() == Some('/')
        && !matches!(chars.next(), Some('/' | '\\'))
        && !target.chars().any(char::is_control)
}

/// Sets the session cookie for `user` and redirects to `location`.
fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: &User,
    location: &str,
) -> Result<Response, AppError> {
    let token = create_token(&user.id, &user.username, &state.config.jwt_secret)?;
    Ok((jar.add(session_cookie(token)), found(location)).into_response())
}

// ============================================================================
// SIGNUP
// ============================================================================

fn render_signup(form: &SignupForm, errors: FormErrors) -> Result<Html<String>, AppError> {
    render_template(SignupTemplate {
        layout: Layout::new("Зарегистрироваться", None),
        username: form.username.clone(),
        email: form.email.clone(),
        errors,
    })
}

/// GET /auth/signup/
pub async fn signup_form() -> Result<Html<String>, AppError> {
    render_signup(&SignupForm::default(), FormErrors::default())
}

/// POST /auth/signup/
/// Success logs the new user in and redirects to the index.
pub async fn signup_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let mut errors = match form.validate() {
        Ok(()) => FormErrors::default(),
        Err(e) => FormErrors::from(e),
    };

    let username = form.username.trim();
    let email = form.email.trim();
    if state.store.username_taken(username) {
        errors.add("username", USERNAME_TAKEN_MESSAGE);
    }
    if state.store.email_taken(email) {
        errors.add("email", EMAIL_TAKEN_MESSAGE);
    }

    if !errors.is_empty() {
        return render_signup(&form, errors).map(IntoResponse::into_response);
    }

    let hashed_password = hash_password(&form.password1, state.config.bcrypt_cost)?;

    // Two signups can race past the checks above; the store decides.
    let user = match state.store.create_user(username, email, hashed_password) {
        Ok(user) => user,
        Err(err) => {
            let mut errors = FormErrors::default();
            match err {
                StoreError::EmailTaken => errors.add("email", EMAIL_TAKEN_MESSAGE),
                _ => errors.add("username", USERNAME_TAKEN_MESSAGE),
            }
            return render_signup(&form, errors).map(IntoResponse::into_response);
        }
    };

    info!("New user registered: {}", user.username);

    start_session(&state, jar, &user, "/")
}

// ============================================================================
// LOGIN / LOGOUT
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct NextParams {
    pub next: Option<String>,
}

fn render_login(
    username: &str,
    next: Option<&str>,
    errors: FormErrors,
    status: StatusCode,
) -> Response {
    render_template_response(
        LoginTemplate {
            layout: Layout::new("Войти", None),
            username: username.to_string(),
            next: next.unwrap_or_default().to_string(),
            errors,
        },
        status,
    )
}

/// GET /auth/login/?next=/path/
pub async fn login_form(Query(params): Query<NextParams>) -> Response {
    render_login("", params.next.as_deref(), FormErrors::default(), StatusCode::OK)
}

/// POST /auth/login/
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = form.next.as_deref().filter(|n| !n.is_empty());

    let mut errors = FormErrors::default();
    if form.username.trim().is_empty() {
        errors.add("username", REQUIRED_MESSAGE);
    }
    if form.password.is_empty() {
        errors.add("password", REQUIRED_MESSAGE);
    }
    if !errors.is_empty() {
        return Ok(render_login(&form.username, next, errors, StatusCode::OK));
    }

    if !state.login_throttle.check(&form.username) {
        errors.add(NON_FIELD_ERRORS, THROTTLED_MESSAGE);
        return Ok(render_login(
            &form.username,
            next,
            errors,
            StatusCode::TOO_MANY_REQUESTS,
        ));
    }

    // Find user by username
    let user = match state.store.user_by_username(&form.username) {
        Some(user) if verify_password(&form.password, &user.hashed_password)? => user,
        _ => {
            warn!("Failed login for {}", form.username);
            errors.add(NON_FIELD_ERRORS, INVALID_LOGIN_MESSAGE);
            return Ok(render_login(&form.username, next, errors, StatusCode::OK));
        }
    };

    info!("User logged in: {}", user.username);

    start_session(&state, jar, &user, safe_next(next))
}

/// GET /auth/logout/
pub async fn logout(viewer: Viewer, jar: CookieJar) -> Response {
    if let Some(username) = viewer.username() {
        info!("User logged out: {}", username);
    }
    (clear_session(jar), found("/")).into_response()
}

// ============================================================================
// PROFILE / FOLLOWING
// ============================================================================

/// GET /profile/:username/?page=N
pub async fn profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Html<String>, AppError> {
    let author = state
        .store
        .user_by_username(&username)
        .ok_or(AppError::NotFound)?;

    let posts = state.store.posts(PostFilter::Author(author.id));
    let count_post = posts.len();
    let page = paginate(posts, params.page.as_deref(), POSTS_PER_PAGE);

    let (show_follow, following) = match viewer.user() {
        Some(user) if user.id != author.id => {
            (true, state.store.is_following(&user.id, &author.id))
        }
        _ => (false, false),
    };

    render_template(ProfileTemplate {
        layout: Layout::new(
            format!("Профайл пользователя {}", author.username),
            viewer.username(),
        ),
        count_post,
        show_follow,
        following,
        page: PageView::build(page, &state.store),
        author: author.username,
    })
}

/// GET /profile/:username/follow/
/// Following yourself or someone already followed changes nothing.
pub async fn profile_follow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = state
        .store
        .user_by_username(&username)
        .ok_or(AppError::NotFound)?;

    if state.store.follow(user.id, author.id) {
        info!("{} now follows {}", user.username, author.username);
    }

    Ok(found(&profile_url(&author.username)))
}

/// GET /profile/:username/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = state
        .store
        .user_by_username(&username)
        .ok_or(AppError::NotFound)?;

    if state.store.unfollow(user.id, author.id) {
        info!("{} unfollowed {}", user.username, author.username);
    }

    Ok(found(&profile_url(&author.username)))
}
