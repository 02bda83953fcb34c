//! Record accessors.
//!
//! The API only talks to storage through these traits. Reads back the
//! authorization gates; writes back the management routes. Every write is
//! atomic on its own, cascades included.

use async_trait::async_trait;
use hearth_common::error::HearthResult;
use hearth_common::models::{Channel, Member, PermissionOverride, Role, RolePatch};
use uuid::Uuid;

/// Read-only lookups used on every authorized request.
#[async_trait]
pub trait RecordReader: Send + Sync {
    async fn find_channel(&self, channel_id: Uuid) -> HearthResult<Option<Channel>>;

    async fn find_member(&self, server_id: Uuid, user_id: Uuid) -> HearthResult<Option<Member>>;

    /// The member flagged as owner of `server_id`, if any.
    async fn find_owner(&self, server_id: Uuid) -> HearthResult<Option<Member>>;

    /// Every role of the server, @everyone included, highest position first.
    async fn list_server_roles(&self, server_id: Uuid) -> HearthResult<Vec<Role>>;

    /// Whether the backing storage is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}

/// Mutations issued by the management routes.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn create_role(&self, role: Role) -> HearthResult<Role>;

    async fn update_role(&self, server_id: Uuid, role_id: Uuid, patch: RolePatch) -> HearthResult<Role>;

    /// Move a role to `position` only if it still sits at `expected`.
    ///
    /// Returns `Conflict` when another writer moved it first.
    async fn set_role_position(
        &self,
        server_id: Uuid,
        role_id: Uuid,
        expected: i32,
        position: i32,
    ) -> HearthResult<Role>;

    /// Delete a role, detach it from every member and drop every channel
    /// override targeting it. The @everyone role cannot be deleted.
    async fn delete_role(&self, server_id: Uuid, role_id: Uuid) -> HearthResult<()>;

    async fn assign_role(&self, server_id: Uuid, user_id: Uuid, role_id: Uuid) -> HearthResult<Member>;

    async fn unassign_role(&self, server_id: Uuid, user_id: Uuid, role_id: Uuid) -> HearthResult<Member>;

    /// Remove a member and drop every channel override targeting them.
    async fn remove_member(&self, server_id: Uuid, user_id: Uuid) -> HearthResult<()>;

    /// Replace a channel's overrides wholesale with an already-normalized list.
    async fn replace_channel_overrides(
        &self,
        channel_id: Uuid,
        overrides: Vec<PermissionOverride>,
    ) -> HearthResult<Channel>;
}

/// Full read/write access, as held by the API state.
pub trait RecordStore: RecordReader + RecordWriter {}

impl<T: RecordReader + RecordWriter> RecordStore for T {}
