use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `user` follows `author`. Never self-referential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Follow {
    pub user: Uuid,
    pub author: Uuid,
}
