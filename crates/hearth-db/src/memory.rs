//! In-process record store.
//!
//! Used by tests, local development (`--memory`) and fixture-driven demos. All
//! records sit behind a single lock so cascades and compare-and-swap moves are
//! atomic with respect to every other request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hearth_common::error::{HearthError, HearthResult};
use hearth_common::models::{Channel, Member, OverrideTarget, PermissionOverride, Role, RolePatch};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{RecordReader, RecordWriter};

#[derive(Debug, Default)]
struct Inner {
    roles: HashMap<Uuid, Role>,
    /// Keyed by (server_id, user_id).
    members: HashMap<(Uuid, Uuid), Member>,
    channels: HashMap<Uuid, Channel>,
}

impl Inner {
    fn server_role_mut(&mut self, server_id: Uuid, role_id: Uuid) -> HearthResult<&mut Role> {
        self.roles
            .get_mut(&role_id)
            .filter(|role| role.server_id == server_id)
            .ok_or_else(|| HearthError::not_found("Role"))
    }

    fn member_mut(&mut self, server_id: Uuid, user_id: Uuid) -> HearthResult<&mut Member> {
        self.members
            .get_mut(&(server_id, user_id))
            .ok_or_else(|| HearthError::not_found("Member"))
    }

    fn prune_overrides(&mut self, server_id: Uuid, target_type: OverrideTarget, target_id: Uuid) {
        for channel in self.channels.values_mut() {
            if channel.server_id == Some(server_id) {
                channel
                    .permission_overrides
                    .retain(|ow| !ow.targets(target_type, target_id));
            }
        }
    }
}

/// Thread-safe in-memory store. Cloning shares the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_role(&self, role: Role) {
        self.inner.write().await.roles.insert(role.id, role);
    }

    pub async fn insert_member(&self, member: Member) {
        self.inner
            .write()
            .await
            .members
            .insert((member.server_id, member.user_id), member);
    }

    pub async fn insert_channel(&self, channel: Channel) {
        self.inner.write().await.channels.insert(channel.id, channel);
    }

    /// Number of (roles, members, channels) currently held.
    pub async fn counts(&self) -> (usize, usize, usize) {
        let inner = self.inner.read().await;
        (inner.roles.len(), inner.members.len(), inner.channels.len())
    }
}

#[async_trait]
impl RecordReader for MemoryStore {
    async fn find_channel(&self, channel_id: Uuid) -> HearthResult<Option<Channel>> {
        Ok(self.inner.read().await.channels.get(&channel_id).cloned())
    }

    async fn find_member(&self, server_id: Uuid, user_id: Uuid) -> HearthResult<Option<Member>> {
        Ok(self
            .inner
            .read()
            .await
            .members
            .get(&(server_id, user_id))
            .cloned())
    }

    async fn find_owner(&self, server_id: Uuid) -> HearthResult<Option<Member>> {
        Ok(self
            .inner
            .read()
            .await
            .members
            .values()
            .find(|member| member.server_id == server_id && member.is_owner)
            .cloned())
    }

    async fn list_server_roles(&self, server_id: Uuid) -> HearthResult<Vec<Role>> {
        let inner = self.inner.read().await;
        let mut roles: Vec<Role> = inner
            .roles
            .values()
            .filter(|role| role.server_id == server_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| b.precedence().cmp(&a.precedence()));
        Ok(roles)
    }
}

#[async_trait]
impl RecordWriter for MemoryStore {
    async fn create_role(&self, role: Role) -> HearthResult<Role> {
        let mut inner = self.inner.write().await;
        if inner.roles.contains_key(&role.id) {
            return Err(HearthError::Conflict {
                message: format!("Role {} already exists", role.id),
            });
        }
        if role.is_default
            && inner
                .roles
                .values()
                .any(|r| r.server_id == role.server_id && r.is_default)
        {
            return Err(HearthError::Conflict {
                message: "Server already has an @everyone role".into(),
            });
        }
        inner.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, server_id: Uuid, role_id: Uuid, patch: RolePatch) -> HearthResult<Role> {
        let mut inner = self.inner.write().await;
        let role = inner.server_role_mut(server_id, role_id)?;
        if let Some(name) = patch.name {
            role.name = name;
        }
        if let Some(color) = patch.color {
            role.color = Some(color);
        }
        if let Some(permissions) = patch.permissions {
            role.permissions = permissions;
        }
        Ok(role.clone())
    }

    async fn set_role_position(
        &self,
        server_id: Uuid,
        role_id: Uuid,
        expected: i32,
        position: i32,
    ) -> HearthResult<Role> {
        let mut inner = self.inner.write().await;
        let role = inner.server_role_mut(server_id, role_id)?;
        if role.position != expected {
            return Err(HearthError::Conflict {
                message: format!(
                    "Role position changed (expected {expected}, found {})",
                    role.position
                ),
            });
        }
        role.position = position;
        Ok(role.clone())
    }

    async fn delete_role(&self, server_id: Uuid, role_id: Uuid) -> HearthResult<()> {
        let mut inner = self.inner.write().await;
        if inner.server_role_mut(server_id, role_id)?.is_default {
            return Err(HearthError::bad_request("The @everyone role cannot be deleted"));
        }

        inner.roles.remove(&role_id);
        for member in inner.members.values_mut() {
            if member.server_id == server_id {
                member.role_ids.retain(|id| *id != role_id);
            }
        }
        inner.prune_overrides(server_id, OverrideTarget::Role, role_id);
        Ok(())
    }

    async fn assign_role(&self, server_id: Uuid, user_id: Uuid, role_id: Uuid) -> HearthResult<Member> {
        let mut inner = self.inner.write().await;
        if inner.server_role_mut(server_id, role_id)?.is_default {
            return Err(HearthError::bad_request("The @everyone role is held implicitly"));
        }
        let member = inner.member_mut(server_id, user_id)?;
        if !member.holds(role_id) {
            member.role_ids.push(role_id);
        }
        Ok(member.clone())
    }

    async fn unassign_role(&self, server_id: Uuid, user_id: Uuid, role_id: Uuid) -> HearthResult<Member> {
        let mut inner = self.inner.write().await;
        let member = inner.member_mut(server_id, user_id)?;
        member.role_ids.retain(|id| *id != role_id);
        Ok(member.clone())
    }

    async fn remove_member(&self, server_id: Uuid, user_id: Uuid) -> HearthResult<()> {
        let mut inner = self.inner.write().await;
        if inner.members.remove(&(server_id, user_id)).is_none() {
            return Err(HearthError::not_found("Member"));
        }
        inner.prune_overrides(server_id, OverrideTarget::Member, user_id);
        Ok(())
    }

    async fn replace_channel_overrides(
        &self,
        channel_id: Uuid,
        overrides: Vec<PermissionOverride>,
    ) -> HearthResult<Channel> {
        let mut inner = self.inner.write().await;
        let channel = inner
            .channels
            .get_mut(&channel_id)
            .ok_or(HearthError::ChannelNotFound)?;
        channel.permission_overrides = overrides;
        Ok(channel.clone())
    }
}
