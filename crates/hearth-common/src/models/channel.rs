//! Channel model: server text channels and direct messages, with their
//! channel-scoped permission overrides.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::{Permission, Permissions};

/// A channel within a server or a DM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,

    /// Server this channel belongs to (None for DMs)
    pub server_id: Option<Uuid>,

    pub channel_type: ChannelType,

    /// Channel name (DMs have none)
    pub name: Option<String>,

    /// Participants of a DM. Empty for server channels.
    #[serde(default)]
    pub recipients: Vec<Uuid>,

    /// Channel-scoped overrides, applied on top of role permissions
    #[serde(default)]
    pub permission_overrides: Vec<PermissionOverride>,
}

impl Channel {
    pub fn is_dm(&self) -> bool {
        self.channel_type == ChannelType::Dm
    }

    pub fn is_recipient(&self, user_id: Uuid) -> bool {
        self.recipients.contains(&user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// Standard text channel in a server
    Text,
    /// Direct message
    Dm,
}

impl ChannelType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Dm => "dm",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "dm" => Some(Self::Dm),
            _ => None,
        }
    }
}

/// Channel-level permission override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverride {
    /// Whether this targets a role or a member
    pub target_type: OverrideTarget,
    /// The role or user ID this override applies to
    pub target_id: Uuid,
    /// Permissions explicitly allowed
    pub allow: Permissions,
    /// Permissions explicitly denied
    pub deny: Permissions,
}

impl PermissionOverride {
    pub fn targets(&self, target_type: OverrideTarget, target_id: Uuid) -> bool {
        self.target_type == target_type && self.target_id == target_id
    }

    /// Remove `deny`, then add `allow`.
    pub fn apply(&self, perms: Permissions) -> Permissions {
        let scoped = !Permissions::ADMINISTRATOR;
        (perms - (self.deny & scoped)) | (self.allow & scoped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideTarget {
    Role,
    Member,
}

/// One override as submitted by a client, before normalization.
///
/// Lists may contain duplicates; the validator collapses them.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideInput {
    pub target_type: OverrideTarget,
    pub target_id: Uuid,
    #[serde(default)]
    pub allow: Vec<Permission>,
    #[serde(default)]
    pub deny: Vec<Permission>,
}

/// Full replacement list; its size is bounded by `limits.max_overrides_per_channel`.
#[derive(Debug, Deserialize)]
pub struct ReplaceOverridesRequest {
    pub overrides: Vec<OverrideInput>,
}
