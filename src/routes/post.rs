use crate::{
    AppState,
    auth::{RequireUser, Viewer},
    dto::{CommentForm, FormErrors, ImageUpload, PaginationParams, PostForm},
    errors::AppError,
    media::media_url,
    routes::profile_url,
    models::{PostId, User},
    pagination::{POSTS_PER_PAGE, paginate},
    store::{NewPost, PostChanges, PostFilter},
    views::{
        CommentView, CreatePostTemplate, FollowTemplate, GroupListTemplate, IndexTemplate, Layout,
        PageView, PostCard, PostDetailTemplate, found, group_options, render_template,
    },
};
use axum::{
    Form,
    extract::{
        FromRequest, Multipart, Path, Query, Request, State,
        multipart::MultipartError,
        rejection::FormRejection,
    },
    http::header,
    response::{Html, IntoResponse, Response},
};
use std::convert::Infallible;
use tracing::{debug, info};
use validator::Validate;

fn parse_post_id(raw: &str) -> Result<PostId, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

fn detail_url(id: PostId) -> String {
    format!("/posts/{}/", id)
}

/// GET /?page=N
/// Wrapped in the index page cache, see `cache::cache_index_page`.
pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<PaginationParams>,
) -> Result<Html<String>, AppError> {
    let posts = state.store.posts(PostFilter::All);
    let page = paginate(posts, params.page.as_deref(), POSTS_PER_PAGE);

    render_template(IndexTemplate {
        layout: Layout::new("Последние обновления на сайте", viewer.username()),
        page: PageView::build(page, &state.store),
    })
}

/// GET /group/:slug/?page=N
pub async fn group_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Html<String>, AppError> {
    let group = state.store.group_by_slug(&slug).ok_or(AppError::NotFound)?;
    let posts = state.store.posts(PostFilter::Group(group.id));
    let page = paginate(posts, params.page.as_deref(), POSTS_PER_PAGE);

    render_template(GroupListTemplate {
        layout: Layout::new(format!("Записи сообщества {}", group.title), viewer.username()),
        page: PageView::build(page, &state.store),
        group,
    })
}

/// GET /posts/:id/
pub async fn post_detail(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(raw_id): Path<String>,
) -> Result<Html<String>, AppError> {
    let post = state
        .store
        .post(parse_post_id(&raw_id)?)
        .ok_or(AppError::NotFound)?;

    let count_posts_author = state.store.post_count_by_author(&post.author_id);
    let comments = state
        .store
        .comments_for(post.id)
        .into_iter()
        .map(|c| CommentView::build(c, &state.store))
        .collect();
    let is_author = viewer.user().is_some_and(|u| post.is_authored_by(&u.id));

    render_template(PostDetailTemplate {
        layout: Layout::new(format!("Пост {}", post), viewer.username()),
        can_comment: viewer.user().is_some(),
        post: PostCard::build(post, &state.store),
        count_posts_author,
        comments,
        is_author,
    })
}

// ============================================================================
// CREATE / EDIT / DELETE
// ============================================================================

enum FormTarget {
    Create,
    Edit(PostId),
}

fn render_post_form(
    state: &AppState,
    user: &User,
    target: FormTarget,
    form: &PostForm,
    current_image: Option<&str>,
    errors: FormErrors,
) -> Result<Html<String>, AppError> {
    let (is_edit, action, button_name, title) = match target {
        FormTarget::Create => (false, "/create/".to_string(), "Добавить", "Новый пост"),
        FormTarget::Edit(id) => (
            true,
            format!("/posts/{}/edit/", id),
            "Сохранить",
            "Редактировать пост",
        ),
    };

    render_template(CreatePostTemplate {
        layout: Layout::new(title, Some(user.username.clone())),
        is_edit,
        action,
        button_name,
        text: form.text.clone(),
        groups: group_options(state.store.groups(), form.selected_group()),
        current_image: current_image.map(media_url),
        errors,
    })
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(err.body_text())
}

/// Reads `text`, `group` and `image` from a multipart body. Unknown parts
/// are skipped.
async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, AppError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => form.text = field.text().await.map_err(bad_multipart)?,
            "group" => form.group = Some(field.text().await.map_err(bad_multipart)?),
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(bad_multipart)?;
                form.image = Some(ImageUpload {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Create/edit body, multipart or urlencoded. Reading is deferred so the
/// handler can check access before a malformed body turns into a 400.
pub struct PostSubmission(Result<PostForm, AppError>);

impl<S> FromRequest<S> for PostSubmission
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let form = match Multipart::from_request(req, state).await {
                Ok(multipart) => read_post_form(multipart).await,
                Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
            };
            return Ok(Self(form));
        }

        // Missing fields and unreadable bodies end up as a blank form,
        // which then fails validation like any other empty submission.
        let form = Form::<PostForm>::from_request(req, state)
            .await
            .map(|Form(form)| form)
            .unwrap_or_default();
        Ok(Self(Ok(form)))
    }
}

/// GET /create/
pub async fn create_form(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, AppError> {
    render_post_form(
        &state,
        &user,
        FormTarget::Create,
        &PostForm::default(),
        None,
        FormErrors::default(),
    )
}

/// POST /create/ (multipart or urlencoded)
/// Valid -> 302 to the author's profile. Invalid -> form with errors, 200.
pub async fn create_submit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    PostSubmission(body): PostSubmission,
) -> Result<Response, AppError> {
    let form = body?;

    let valid = match form.clean(&state.store) {
        Ok(valid) => valid,
        Err(errors) => {
            debug!("Rejected post form from {}", user.username);
            return render_post_form(&state, &user, FormTarget::Create, &form, None, errors)
                .map(IntoResponse::into_response);
        }
    };

    let image = match &valid.image {
        Some(upload) => Some(state.media.save_post_image(upload).await?),
        None => None,
    };

    let post = state.store.create_post(NewPost {
        author_id: user.id,
        text: valid.text,
        group_id: valid.group_id,
        image,
    });

    info!("Post created: {} by user {}", post.id, user.username);

    Ok(found(&profile_url(&user.username)))
}

/// GET /posts/:id/edit/
/// Non-authors are sent back to the post without seeing the form.
pub async fn edit_form(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let post = state
        .store
        .post(parse_post_id(&raw_id)?)
        .ok_or(AppError::NotFound)?;

    if !post.is_authored_by(&user.id) {
        return Ok(found(&detail_url(post.id)));
    }

    let form = PostForm {
        text: post.text.clone(),
        group: post.group_id.map(|id| id.to_string()),
        image: None,
    };
    render_post_form(
        &state,
        &user,
        FormTarget::Edit(post.id),
        &form,
        post.image.as_deref(),
        FormErrors::default(),
    )
    .map(IntoResponse::into_response)
}

/// POST /posts/:id/edit/ (multipart or urlencoded)
pub async fn edit_submit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    PostSubmission(body): PostSubmission,
) -> Result<Response, AppError> {
    let post = state
        .store
        .post(parse_post_id(&raw_id)?)
        .ok_or(AppError::NotFound)?;

    // Check ownership
    if !post.is_authored_by(&user.id) {
        return Ok(found(&detail_url(post.id)));
    }

    let form = body?;
    let valid = match form.clean(&state.store) {
        Ok(valid) => valid,
        Err(errors) => {
            return render_post_form(
                &state,
                &user,
                FormTarget::Edit(post.id),
                &form,
                post.image.as_deref(),
                errors,
            )
            .map(IntoResponse::into_response);
        }
    };

    let image = match &valid.image {
        Some(upload) => Some(state.media.save_post_image(upload).await?),
        None => None,
    };

    state
        .store
        .update_post(
            post.id,
            PostChanges {
                text: valid.text,
                group_id: valid.group_id,
                image,
            },
        )
        .ok_or(AppError::NotFound)?;

    info!("Post edited: {} by user {}", post.id, user.username);

    Ok(found(&detail_url(post.id)))
}

/// POST /posts/:id/delete/
pub async fn delete_post(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let post = state
        .store
        .post(parse_post_id(&raw_id)?)
        .ok_or(AppError::NotFound)?;

    if !post.is_authored_by(&user.id) {
        return Ok(found(&detail_url(post.id)));
    }

    state.store.delete_post(post.id);

    info!("Post deleted: {} by user {}", post.id, user.username);

    Ok(found(&profile_url(&user.username)))
}

// ============================================================================
// COMMENTS / FOLLOW FEED
// ============================================================================

/// POST /posts/:id/comment/
/// Always ends on the post page, whether or not a comment was created.
pub async fn add_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    form: Result<Form<CommentForm>, FormRejection>,
) -> Result<Response, AppError> {
    let post = state
        .store
        .post(parse_post_id(&raw_id)?)
        .ok_or(AppError::NotFound)?;

    let form = form.map(|Form(f)| f).unwrap_or_default();
    match form.validate() {
        Ok(()) => {
            let comment = state
                .store
                .add_comment(post.id, user.id, form.text.trim().to_string())
                .ok_or(AppError::NotFound)?;
            info!(
                "Comment created: {} on post {} by user {}",
                comment.id, post.id, user.username
            );
        }
        Err(_) => debug!("Ignored empty comment on post {}", post.id),
    }

    Ok(found(&detail_url(post.id)))
}

/// GET /follow/?page=N
pub async fn follow_index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(params): Query<PaginationParams>,
) -> Result<Html<String>, AppError> {
    let posts = state.store.posts(PostFilter::FollowedBy(user.id));
    let page = paginate(posts, params.page.as_deref(), POSTS_PER_PAGE);

    render_template(FollowTemplate {
        layout: Layout::new("Избранные авторы", Some(user.username.clone())),
        page: PageView::build(page, &state.store),
    })
}
