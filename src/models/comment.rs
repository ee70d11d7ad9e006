use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PostId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub post_id: PostId,
    pub author_id: Uuid,
    pub text: String,
    pub created: DateTime<Utc>,
}
