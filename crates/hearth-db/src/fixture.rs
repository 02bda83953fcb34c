//! JSON fixtures for seeding the in-memory store.
//!
//! ```json
//! {
//!   "roles":    [{ "id": "…", "server_id": "…", "name": "@everyone", "color": null,
//!                  "position": 0, "permissions": ["SEND_MESSAGES"], "is_default": true }],
//!   "members":  [{ "user_id": "…", "server_id": "…", "role_ids": [], "is_owner": true }],
//!   "channels": [{ "id": "…", "server_id": "…", "channel_type": "text", "name": "general" }]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Context;
use hearth_common::models::{Channel, Member, Role};
use serde::Deserialize;
use uuid::Uuid;

use crate::memory::MemoryStore;

#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl Fixture {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let fixture: Fixture = serde_json::from_str(raw).context("invalid fixture JSON")?;
        fixture.check()?;
        Ok(fixture)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Reject fixtures the stores would refuse anyway. A server without an
    /// @everyone role is allowed (it exercises the fail-closed path) but logged.
    fn check(&self) -> anyhow::Result<()> {
        let mut role_servers: HashMap<Uuid, Uuid> = HashMap::new();
        let mut default_roles: HashSet<Uuid> = HashSet::new();
        for role in &self.roles {
            if role_servers.insert(role.id, role.server_id).is_some() {
                anyhow::bail!("duplicate role id {}", role.id);
            }
            if role.is_default && !default_roles.insert(role.server_id) {
                anyhow::bail!("server {} has more than one @everyone role", role.server_id);
            }
        }

        let mut owners: HashSet<Uuid> = HashSet::new();
        for member in &self.members {
            if member.is_owner && !owners.insert(member.server_id) {
                anyhow::bail!("server {} has more than one owner", member.server_id);
            }
            for role_id in &member.role_ids {
                match role_servers.get(role_id) {
                    Some(server_id) if *server_id == member.server_id => {}
                    _ => anyhow::bail!(
                        "member {} holds role {} outside server {}",
                        member.user_id,
                        role_id,
                        member.server_id
                    ),
                }
            }
        }

        for channel in &self.channels {
            if channel.is_dm() != channel.server_id.is_none() {
                anyhow::bail!("channel {} must have a server id unless it is a DM", channel.id);
            }
        }

        let servers: HashSet<Uuid> = self
            .members
            .iter()
            .map(|m| m.server_id)
            .chain(self.roles.iter().map(|r| r.server_id))
            .collect();
        for server_id in servers.difference(&default_roles) {
            tracing::warn!(%server_id, "Fixture server has no @everyone role");
        }

        Ok(())
    }

    /// Build a store holding exactly this fixture's records.
    pub async fn into_store(self) -> MemoryStore {
        let store = MemoryStore::new();
        for role in self.roles {
            store.insert_role(role).await;
        }
        for member in self.members {
            store.insert_member(member).await;
        }
        for channel in self.channels {
            store.insert_channel(channel).await;
        }
        let (roles, members, channels) = store.counts().await;
        tracing::info!(roles, members, channels, "Fixture loaded");
        store
    }
}
