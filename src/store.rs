use crate::models::{Comment, Follow, Group, Post, PostId, User};
use chrono::Utc;
use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use serde::Deserialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// STORE - In-memory datastore shared by every request
// ============================================================================
/// `DashMap` = Thread-safe HashMap, sharded internally, so handlers can read
/// and write concurrently without an outer lock.
///
/// Every clone of `Store` points at the same maps.
#[derive(Clone, Default)]
pub struct Store {
    users: Arc<DashMap<Uuid, User>>,
    username_index: Arc<DashMap<String, Uuid>>,
    email_index: Arc<DashMap<String, Uuid>>, // lowercased
    groups: Arc<DashMap<u64, Group>>,
    slug_index: Arc<DashMap<String, u64>>,
    posts: Arc<DashMap<PostId, Post>>,
    comments: Arc<DashMap<u64, Comment>>,
    follows: Arc<DashSet<Follow>>,
    sequences: Arc<Sequences>,
}

#[derive(Default)]
struct Sequences {
    group: AtomicU64,
    post: AtomicU64,
    comment: AtomicU64,
}

impl Sequences {
    fn next(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Debug, Deserialize)]
struct GroupSeed {
    title: String,
    slug: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already taken")]
    EmailTaken,
    #[error("group slug already taken")]
    SlugTaken,
}

/// Which posts a listing shows.
#[derive(Debug, Clone, Copy)]
pub enum PostFilter {
    All,
    Group(u64),
    Author(Uuid),
    /// Posts by every author `Uuid` follows.
    FollowedBy(Uuid),
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub text: String,
    pub group_id: Option<u64>,
    pub image: Option<String>,
}

/// Editable fields of a post. `image: None` keeps the current image.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<u64>,
    pub image: Option<String>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        hashed_password: String,
    ) -> Result<User, StoreError> {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            hashed_password,
            date_joined: Utc::now(),
        };

        match self.username_index.entry(user.username.clone()) {
            Entry::Occupied(_) => return Err(StoreError::UsernameTaken),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }

        match self.email_index.entry(user.email.to_lowercase()) {
            Entry::Occupied(_) => {
                self.username_index.remove(&user.username);
                return Err(StoreError::EmailTaken);
            }
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }

        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn user(&self, id: &Uuid) -> Option<User> {
        self.users.get(id).map(|u| u.value().clone())
    }

    pub fn user_by_username(&self, username: &str) -> Option<User> {
        let id = *self.username_index.get(username)?;
        self.user(&id)
    }

    pub fn email_taken(&self, email: &str) -> bool {
        self.email_index.contains_key(&email.to_lowercase())
    }

    pub fn username_taken(&self, username: &str) -> bool {
        self.username_index.contains_key(username)
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    pub fn create_group(
        &self,
        title: &str,
        slug: &str,
        description: &str,
    ) -> Result<Group, StoreError> {
        let id = match self.slug_index.entry(slug.to_string()) {
            Entry::Occupied(_) => return Err(StoreError::SlugTaken),
            Entry::Vacant(slot) => {
                let id = Sequences::next(&self.sequences.group);
                slot.insert(id);
                id
            }
        };

        let group = Group {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
        };
        self.groups.insert(id, group.clone());
        Ok(group)
    }

    pub fn group(&self, id: u64) -> Option<Group> {
        self.groups.get(&id).map(|g| g.value().clone())
    }

    pub fn group_by_slug(&self, slug: &str) -> Option<Group> {
        let id = *self.slug_index.get(slug)?;
        self.group(id)
    }

    /// All groups, ordered by title then id.
    pub fn groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = self.groups.iter().map(|g| g.value().clone()).collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        groups
    }

    /// Loads groups from a JSON array of `{title, slug, description}`.
    /// Slugs already present are skipped. Returns how many were created.
    pub fn seed_groups_from_json(&self, json: &str) -> Result<usize, serde_json::Error> {
        let seeds: Vec<GroupSeed> = serde_json::from_str(json)?;
        let mut created = 0;
        for seed in seeds {
            match self.create_group(&seed.title, &seed.slug, &seed.description) {
                Ok(group) => {
                    info!("Group seeded: {} ({})", group.slug, group.id);
                    created += 1;
                }
                Err(err) => warn!("Skipping group {}: {}", seed.slug, err),
            }
        }
        Ok(created)
    }

    // ------------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------------

    pub fn create_post(&self, new: NewPost) -> Post {
        let post = Post {
            id: Sequences::next(&self.sequences.post),
            author_id: new.author_id,
            text: new.text,
            group_id: new.group_id,
            image: new.image,
            pub_date: Utc::now(),
        };
        self.posts.insert(post.id, post.clone());
        post
    }

    pub fn post(&self, id: PostId) -> Option<Post> {
        self.posts.get(&id).map(|p| p.value().clone())
    }

    /// Applies `changes` in place. The author is never touched.
    pub fn update_post(&self, id: PostId, changes: PostChanges) -> Option<Post> {
        let mut post = self.posts.get_mut(&id)?;
        post.text = changes.text;
        post.group_id = changes.group_id;
        if let Some(image) = changes.image {
            post.image = Some(image);
        }
        Some(post.value().clone())
    }

    /// Removes the post together with its comments.
    pub fn delete_post(&self, id: PostId) -> Option<Post> {
        let (_, post) = self.posts.remove(&id)?;
        self.comments.retain(|_, comment| comment.post_id != id);
        Some(post)
    }

    /// Posts matching `filter`, newest first.
    pub fn posts(&self, filter: PostFilter) -> Vec<Post> {
        let followed: Vec<Uuid> = match filter {
            PostFilter::FollowedBy(user) => self.following(&user),
            _ => Vec::new(),
        };

        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|entry| match filter {
                PostFilter::All => true,
                PostFilter::Group(group_id) => entry.group_id == Some(group_id),
                PostFilter::Author(author_id) => entry.author_id == author_id,
                PostFilter::FollowedBy(_) => followed.contains(&entry.author_id),
            })
            .map(|entry| entry.value().clone())
            .collect();

        // Sort by creation date (newest first)
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    pub fn post_count_by_author(&self, author_id: &Uuid) -> usize {
        self.posts
            .iter()
            .filter(|entry| entry.author_id == *author_id)
            .count()
    }

    // ------------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------------

    /// Adds a comment to an existing post. `None` if the post is gone.
    ///
    /// The post's shard stays read-locked until the comment is stored, so a
    /// concurrent `delete_post` either runs first or sweeps this comment too.
    pub fn add_comment(&self, post_id: PostId, author_id: Uuid, text: String) -> Option<Comment> {
        let _post = self.posts.get(&post_id)?;
        let comment = Comment {
            id: Sequences::next(&self.sequences.comment),
            post_id,
            author_id,
            text,
            created: Utc::now(),
        };
        self.comments.insert(comment.id, comment.clone());
        Some(comment)
    }

    /// Comments of a post, oldest first.
    pub fn comments_for(&self, post_id: PostId) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|entry| entry.post_id == post_id)
            .map(|entry| entry.value().clone())
            .collect();
        comments.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        comments
    }

    // ------------------------------------------------------------------------
    // Follows
    // ------------------------------------------------------------------------

    /// Returns true when a new follow was recorded.
    pub fn follow(&self, user: Uuid, author: Uuid) -> bool {
        if user == author {
            return false;
        }
        self.follows.insert(Follow { user, author })
    }

    /// Returns true when an existing follow was removed.
    pub fn unfollow(&self, user: Uuid, author: Uuid) -> bool {
        self.follows.remove(&Follow { user, author }).is_some()
    }

    pub fn is_following(&self, user: &Uuid, author: &Uuid) -> bool {
        self.follows.contains(&Follow {
            user: *user,
            author: *author,
        })
    }

    /// Authors `user` follows.
    pub fn following(&self, user: &Uuid) -> Vec<Uuid> {
        self.follows
            .iter()
            .filter(|f| f.user == *user)
            .map(|f| f.author)
            .collect()
    }
}
