//! Role model: a named permission bundle within a server.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::permissions::{Permission, Permissions};

/// A role within a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub server_id: Uuid,

    /// Role name
    pub name: String,

    /// Role color (hex as integer, e.g., 0xFF5733)
    pub color: Option<i32>,

    /// Position in the role hierarchy (higher = more power)
    pub position: i32,

    /// Permissions granted server-wide to holders of this role
    pub permissions: Permissions,

    /// Whether this is the @everyone role (one per server)
    pub is_default: bool,
}

impl Role {
    /// Ordering key for override layering: position, then id.
    pub fn precedence(&self) -> (i32, Uuid) {
        (self.position, self.id)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Role name must be 1-100 characters"))]
    pub name: String,

    pub color: Option<i32>,

    #[serde(default)]
    pub permissions: Vec<Permission>,

    #[validate(range(min = 1, message = "Position must be at least 1"))]
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    pub color: Option<i32>,

    pub permissions: Option<Vec<Permission>>,
}

/// Compare-and-swap move of a role in the hierarchy.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRolePositionRequest {
    /// Position the caller last saw; the move fails if it changed since.
    pub expected_position: i32,

    #[validate(range(min = 1, message = "Position must be at least 1"))]
    pub position: i32,
}

/// Partial update applied by the storage layer.
#[derive(Debug, Clone, Default)]
pub struct RolePatch {
    pub name: Option<String>,
    pub color: Option<i32>,
    pub permissions: Option<Permissions>,
}
