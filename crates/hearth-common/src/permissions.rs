//! Permission taxonomy: the closed set of actions a member can be granted.
//!
//! Two representations live side by side:
//! - [`Permission`] is the closed enum. Every `match` on it is exhaustive, so adding
//!   a tag forces every table below to be updated.
//! - [`Permissions`] is the compact bitfield set used by the resolver. Sets go over
//!   the wire as arrays of tag names, never as raw bits.

use bitflags::bitflags;
use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// A set of permissions.
    ///
    /// Roles combine permissions via OR. Channel overrides remove (`deny`) and
    /// re-add (`allow`) bits on top of the role union.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        // === Meta ===
        /// Every permission, everywhere. Channel overrides cannot revoke it.
        const ADMINISTRATOR         = 1 << 0;

        // === Management ===
        const MANAGE_SERVER         = 1 << 1;
        const MANAGE_CHANNEL        = 1 << 2;
        const MANAGE_ROLES          = 1 << 3;
        /// Delete or pin other members' messages
        const MANAGE_MESSAGES       = 1 << 4;
        const MANAGE_WEBHOOKS       = 1 << 5;
        /// Change other members' nicknames
        const MANAGE_NICKNAMES      = 1 << 6;

        // === Membership ===
        const CREATE_INSTANT_INVITE = 1 << 7;
        /// Change own nickname
        const CHANGE_NICKNAME       = 1 << 8;
        const KICK_MEMBERS          = 1 << 9;
        const BAN_MEMBERS           = 1 << 10;

        // === Text ===
        const VIEW_CHANNEL          = 1 << 11;
        const SEND_MESSAGES         = 1 << 12;
        /// Embed links (auto-preview)
        const EMBED_LINKS           = 1 << 13;
        const ATTACH_FILES          = 1 << 14;
        const ADD_REACTIONS         = 1 << 15;
        /// Mention @everyone and @here
        const MENTION_EVERYONE      = 1 << 16;
        const READ_MESSAGE_HISTORY  = 1 << 17;
    }
}

/// A single permission tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Administrator,
    ManageServer,
    ManageChannel,
    ManageRoles,
    ManageMessages,
    ManageWebhooks,
    ManageNicknames,
    CreateInstantInvite,
    ChangeNickname,
    KickMembers,
    BanMembers,
    ViewChannel,
    SendMessages,
    EmbedLinks,
    AttachFiles,
    AddReactions,
    MentionEveryone,
    ReadMessageHistory,
}

impl Permission {
    /// Every tag, in declaration order.
    pub const ALL: [Permission; 18] = [
        Self::Administrator,
        Self::ManageServer,
        Self::ManageChannel,
        Self::ManageRoles,
        Self::ManageMessages,
        Self::ManageWebhooks,
        Self::ManageNicknames,
        Self::CreateInstantInvite,
        Self::ChangeNickname,
        Self::KickMembers,
        Self::BanMembers,
        Self::ViewChannel,
        Self::SendMessages,
        Self::EmbedLinks,
        Self::AttachFiles,
        Self::AddReactions,
        Self::MentionEveryone,
        Self::ReadMessageHistory,
    ];

    /// The bit for this tag.
    pub const fn flag(self) -> Permissions {
        match self {
            Self::Administrator => Permissions::ADMINISTRATOR,
            Self::ManageServer => Permissions::MANAGE_SERVER,
            Self::ManageChannel => Permissions::MANAGE_CHANNEL,
            Self::ManageRoles => Permissions::MANAGE_ROLES,
            Self::ManageMessages => Permissions::MANAGE_MESSAGES,
            Self::ManageWebhooks => Permissions::MANAGE_WEBHOOKS,
            Self::ManageNicknames => Permissions::MANAGE_NICKNAMES,
            Self::CreateInstantInvite => Permissions::CREATE_INSTANT_INVITE,
            Self::ChangeNickname => Permissions::CHANGE_NICKNAME,
            Self::KickMembers => Permissions::KICK_MEMBERS,
            Self::BanMembers => Permissions::BAN_MEMBERS,
            Self::ViewChannel => Permissions::VIEW_CHANNEL,
            Self::SendMessages => Permissions::SEND_MESSAGES,
            Self::EmbedLinks => Permissions::EMBED_LINKS,
            Self::AttachFiles => Permissions::ATTACH_FILES,
            Self::AddReactions => Permissions::ADD_REACTIONS,
            Self::MentionEveryone => Permissions::MENTION_EVERYONE,
            Self::ReadMessageHistory => Permissions::READ_MESSAGE_HISTORY,
        }
    }

    /// Wire name of the tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "ADMINISTRATOR",
            Self::ManageServer => "MANAGE_SERVER",
            Self::ManageChannel => "MANAGE_CHANNEL",
            Self::ManageRoles => "MANAGE_ROLES",
            Self::ManageMessages => "MANAGE_MESSAGES",
            Self::ManageWebhooks => "MANAGE_WEBHOOKS",
            Self::ManageNicknames => "MANAGE_NICKNAMES",
            Self::CreateInstantInvite => "CREATE_INSTANT_INVITE",
            Self::ChangeNickname => "CHANGE_NICKNAME",
            Self::KickMembers => "KICK_MEMBERS",
            Self::BanMembers => "BAN_MEMBERS",
            Self::ViewChannel => "VIEW_CHANNEL",
            Self::SendMessages => "SEND_MESSAGES",
            Self::EmbedLinks => "EMBED_LINKS",
            Self::AttachFiles => "ATTACH_FILES",
            Self::AddReactions => "ADD_REACTIONS",
            Self::MentionEveryone => "MENTION_EVERYONE",
            Self::ReadMessageHistory => "READ_MESSAGE_HISTORY",
        }
    }

    /// Whether this permission may ever be granted inside a direct message.
    pub const fn allowed_in_dm(self) -> bool {
        match self {
            Self::ViewChannel
            | Self::SendMessages
            | Self::EmbedLinks
            | Self::AttachFiles
            | Self::AddReactions
            | Self::ReadMessageHistory => true,
            Self::Administrator
            | Self::ManageServer
            | Self::ManageChannel
            | Self::ManageRoles
            | Self::ManageMessages
            | Self::ManageWebhooks
            | Self::ManageNicknames
            | Self::CreateInstantInvite
            | Self::ChangeNickname
            | Self::KickMembers
            | Self::BanMembers
            | Self::MentionEveryone => false,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known permission tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

impl From<Permission> for Permissions {
    fn from(p: Permission) -> Self {
        p.flag()
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Permissions::empty(), |acc, p| acc | p.flag())
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}

impl Permissions {
    /// Fixed allow-list for direct messages. Never contains management,
    /// kick or ban permissions.
    pub fn dm() -> Self {
        Permission::ALL
            .into_iter()
            .filter(|p| p.allowed_in_dm())
            .collect()
    }

    /// Default permissions for the @everyone role of a new server.
    pub fn default_everyone() -> Self {
        Self::VIEW_CHANNEL
            | Self::SEND_MESSAGES
            | Self::EMBED_LINKS
            | Self::ATTACH_FILES
            | Self::ADD_REACTIONS
            | Self::READ_MESSAGE_HISTORY
            | Self::CHANGE_NICKNAME
            | Self::CREATE_INSTANT_INVITE
    }

    /// Check if administrator (overrides all other checks).
    pub fn is_admin(&self) -> bool {
        self.contains(Self::ADMINISTRATOR)
    }

    /// Final decision rule: granted iff ADMINISTRATOR or the permission itself.
    pub fn grants(&self, required: Permission) -> bool {
        self.is_admin() || self.contains(required.flag())
    }

    /// The tags in this set, in declaration order.
    pub fn tags(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL
            .into_iter()
            .filter(move |p| self.contains(p.flag()))
    }

    /// Parse stored tag names, skipping anything not in the taxonomy.
    pub fn from_tag_names<S: AsRef<str>>(names: &[S]) -> Self {
        names
            .iter()
            .filter_map(|name| match name.as_ref().parse::<Permission>() {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unknown stored permission");
                    None
                }
            })
            .collect()
    }

    /// Tag names for storage.
    pub fn to_tag_names(&self) -> Vec<String> {
        self.tags().map(|p| p.as_str().to_string()).collect()
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.bits().count_ones() as usize))?;
        for p in self.tags() {
            seq.serialize_element(&p)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagsVisitor;

        impl<'de> Visitor<'de> for TagsVisitor {
            type Value = Permissions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array of permission names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Permissions, A::Error> {
                let mut set = Permissions::empty();
                while let Some(p) = seq.next_element::<Permission>()? {
                    set |= p.flag();
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(TagsVisitor)
    }
}
