use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type PostId = u64;

/// Characters of the text used when a post is shown as a string.
pub const POST_STR_CHARS: usize = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Set once at creation, never reassigned.
    pub author_id: Uuid,
    pub text: String,
    pub group_id: Option<u64>,
    /// Path relative to the media root, e.g. `posts/small.gif`.
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
}

impl Post {
    pub fn is_authored_by(&self, user_id: &Uuid) -> bool {
        self.author_id == *user_id
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.text.chars().take(POST_STR_CHARS).collect();
        f.write_str(&short)
    }
}
