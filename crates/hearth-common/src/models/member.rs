//! Member model: a user's membership in a specific server.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a user's membership in a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: Uuid,
    pub server_id: Uuid,

    /// Explicitly assigned role IDs. Never contains the @everyone role.
    pub role_ids: Vec<Uuid>,

    /// Server owner; bypasses every permission check
    pub is_owner: bool,
}

impl Member {
    pub fn holds(&self, role_id: Uuid) -> bool {
        self.role_ids.contains(&role_id)
    }
}
