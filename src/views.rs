use crate::{
    dto::FormErrors,
    errors::AppError,
    media::media_url,
    models::{Comment, Group, Post},
    pagination::Page,
    store::Store,
};
use askama::Template;
use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, AppError> {
    template
        .render()
        .map(Html)
        .map_err(|e| AppError::InternalError(format!("Template rendering failed: {}", e)))
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

// ============================================================================
// VIEW MODELS
// ============================================================================

/// Chrome shared by every page.
#[derive(Debug, Clone)]
pub struct Layout {
    pub title: String,
    /// Username of the logged-in viewer.
    pub viewer: Option<String>,
}

impl Layout {
    pub fn new(title: impl Into<String>, viewer: Option<String>) -> Self {
        Self {
            title: title.into(),
            viewer,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupLink {
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct PostCard {
    pub id: u64,
    pub text: String,
    pub author: String,
    pub group: Option<GroupLink>,
    pub image_url: Option<String>,
    pub pub_date: String,
}

impl PostCard {
    pub fn build(post: Post, store: &Store) -> Self {
        let author = store
            .user(&post.author_id)
            .map(|u| u.username)
            .unwrap_or_default();
        let group = post
            .group_id
            .and_then(|id| store.group(id))
            .map(|g| GroupLink {
                title: g.title,
                slug: g.slug,
            });
        Self {
            id: post.id,
            author,
            group,
            image_url: post.image.as_deref().map(media_url),
            pub_date: post.pub_date.format(DATE_FORMAT).to_string(),
            text: post.text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageLink {
    pub number: usize,
    pub current: bool,
}

/// A page of post cards plus what the paginator widget needs.
#[derive(Debug, Clone)]
pub struct PageView {
    pub posts: Vec<PostCard>,
    pub number: usize,
    pub has_other_pages: bool,
    pub has_previous: bool,
    pub previous: usize,
    pub has_next: bool,
    pub next: usize,
    pub links: Vec<PageLink>,
}

impl PageView {
    pub fn build(page: Page<Post>, store: &Store) -> Self {
        let links = page
            .page_range()
            .into_iter()
            .map(|number| PageLink {
                number,
                current: number == page.number,
            })
            .collect();
        Self {
            number: page.number,
            has_other_pages: page.has_other_pages(),
            has_previous: page.has_previous(),
            previous: page.previous_page_number(),
            has_next: page.has_next(),
            next: page.next_page_number(),
            links,
            posts: page.map(|post| PostCard::build(post, store)).items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub author: String,
    pub text: String,
    pub created: String,
}

impl CommentView {
    pub fn build(comment: Comment, store: &Store) -> Self {
        Self {
            author: store
                .user(&comment.author_id)
                .map(|u| u.username)
                .unwrap_or_default(),
            created: comment.created.format(DATE_FORMAT).to_string(),
            text: comment.text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupOption {
    pub id: u64,
    pub title: String,
    pub selected: bool,
}

pub fn group_options(groups: Vec<Group>, selected: Option<u64>) -> Vec<GroupOption> {
    groups
        .into_iter()
        .map(|g| GroupOption {
            selected: Some(g.id) == selected,
            id: g.id,
            title: g.title,
        })
        .collect()
}

// ============================================================================
// TEMPLATES
// ============================================================================

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub layout: Layout,
    pub page: PageView,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub layout: Layout,
    pub group: Group,
    pub page: PageView,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub layout: Layout,
    pub author: String,
    pub count_post: usize,
    /// Viewer is logged in and is not the author.
    pub show_follow: bool,
    pub following: bool,
    pub page: PageView,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub layout: Layout,
    pub post: PostCard,
    pub count_posts_author: usize,
    pub comments: Vec<CommentView>,
    pub is_author: bool,
    pub can_comment: bool,
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct CreatePostTemplate {
    pub layout: Layout,
    pub is_edit: bool,
    pub action: String,
    pub button_name: &'static str,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub layout: Layout,
    pub page: PageView,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub username: String,
    pub next: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub layout: Layout,
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub layout: Layout,
}
