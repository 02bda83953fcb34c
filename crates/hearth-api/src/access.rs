//! Record loading and decision mapping for the permission gates.
//!
//! A gate loads an [`Access`] for the caller, asks it for a decision and turns
//! a denial into the matching [`HearthError`]. The loaded value is handed to
//! the handler through request extensions so nothing is fetched twice.

use hearth_common::error::{HearthError, HearthResult};
use hearth_common::models::{Channel, Member, Role};
use hearth_common::permissions::{Permission, Permissions};
use hearth_common::resolver::{self, Decision, DenyReason};
use hearth_db::RecordReader;
use uuid::Uuid;

/// Everything the resolver needs about one member of one server.
#[derive(Debug, Clone)]
pub struct ServerRecords {
    pub member: Member,
    /// Every role of the server, @everyone included.
    pub roles: Vec<Role>,
    /// The single default role, if the server has exactly one.
    pub everyone_role: Option<Role>,
    /// Why `everyone_role` is missing.
    pub misconfiguration: Option<String>,
}

impl ServerRecords {
    fn new(member: Member, roles: Vec<Role>) -> Self {
        let mut defaults = roles.iter().filter(|role| role.is_default);
        let (everyone_role, misconfiguration) = match (defaults.next(), defaults.next()) {
            (Some(role), None) => (Some(role.clone()), None),
            (None, _) => (None, Some("@everyone role not found".to_string())),
            (Some(_), Some(_)) => (None, Some("multiple @everyone roles".to_string())),
        };

        Self {
            member,
            roles,
            everyone_role,
            misconfiguration,
        }
    }

    pub fn server_id(&self) -> Uuid {
        self.member.server_id
    }

    pub fn find_role(&self, role_id: Uuid) -> Option<&Role> {
        self.roles.iter().find(|role| role.id == role_id)
    }

    fn resolve(&self, channel: Option<&Channel>) -> Permissions {
        resolver::resolve(&self.member, &self.roles, self.everyone_role.as_ref(), channel)
    }
}

#[derive(Debug, Clone)]
pub enum Scope {
    Server(ServerRecords),
    Channel {
        channel: Channel,
        records: ServerRecords,
    },
    Dm(Channel),
}

/// The caller's standing in a server, server channel or DM.
#[derive(Debug, Clone)]
pub struct Access {
    pub user_id: Uuid,
    pub scope: Scope,
}

impl Access {
    pub fn records(&self) -> Option<&ServerRecords> {
        match &self.scope {
            Scope::Server(records) | Scope::Channel { records, .. } => Some(records),
            Scope::Dm(_) => None,
        }
    }

    pub fn channel(&self) -> Option<&Channel> {
        match &self.scope {
            Scope::Channel { channel, .. } | Scope::Dm(channel) => Some(channel),
            Scope::Server(_) => None,
        }
    }

    /// Server records of a server-scoped gate.
    pub fn server_records(&self) -> HearthResult<&ServerRecords> {
        self.records()
            .ok_or_else(|| HearthError::bad_request("This action requires a server context"))
    }

    pub fn decide(&self, required: Permission) -> Decision {
        match &self.scope {
            Scope::Dm(channel) => resolver::authorize_dm(required, self.user_id, channel),
            Scope::Server(records) => resolver::authorize(
                required,
                &records.member,
                &records.roles,
                records.everyone_role.as_ref(),
                None,
            ),
            Scope::Channel { channel, records } => resolver::authorize(
                required,
                &records.member,
                &records.roles,
                records.everyone_role.as_ref(),
                Some(channel),
            ),
        }
    }

    /// Require `required` (or bare membership when `None`), mapping any denial
    /// to its error.
    pub fn require(&self, required: Option<Permission>) -> HearthResult<()> {
        let Some(required) = required else {
            return Ok(());
        };

        let server_id = self.records().map(ServerRecords::server_id);
        let channel_id = self.channel().map(|c| c.id);

        match self.decide(required) {
            Decision::Allowed => {
                tracing::debug!(
                    user_id = %self.user_id,
                    server_id = ?server_id,
                    channel_id = ?channel_id,
                    permission = %required,
                    "Permission granted"
                );
                Ok(())
            }
            Decision::Denied(reason) => {
                let err = self.denial(reason);
                match &err {
                    HearthError::ServerMisconfigured { server_id, reason } => tracing::error!(
                        %server_id,
                        user_id = %self.user_id,
                        reason = %reason,
                        "Server misconfigured, refusing authorization"
                    ),
                    _ => tracing::info!(
                        user_id = %self.user_id,
                        server_id = ?server_id,
                        channel_id = ?channel_id,
                        permission = %required,
                        reason = ?reason,
                        "Permission denied"
                    ),
                }
                Err(err)
            }
        }
    }

    fn denial(&self, reason: DenyReason) -> HearthError {
        match reason {
            DenyReason::MissingPermission(permission) | DenyReason::NotAllowedInDm(permission) => {
                HearthError::PermissionDenied { permission }
            }
            DenyReason::NotRecipient => HearthError::NotAMember,
            DenyReason::ChannelOutsideServer => {
                HearthError::bad_request("Channel does not belong to this server")
            }
            DenyReason::Misconfigured => self.misconfigured(),
        }
    }

    fn misconfigured(&self) -> HearthError {
        match self.records() {
            Some(records) => HearthError::ServerMisconfigured {
                server_id: records.server_id(),
                reason: records
                    .misconfiguration
                    .clone()
                    .unwrap_or_else(|| "@everyone role not found".to_string()),
            },
            None => HearthError::bad_request("Direct messages have no server configuration"),
        }
    }

    /// The caller's effective set in this scope.
    ///
    /// Fails for non-owners of a server without a usable @everyone role rather
    /// than reporting an empty set.
    pub fn effective_permissions(&self) -> HearthResult<Permissions> {
        match &self.scope {
            Scope::Dm(channel) => Ok(resolver::resolve_dm(self.user_id, channel)),
            Scope::Server(records) | Scope::Channel { records, .. } => {
                if !records.member.is_owner && records.everyone_role.is_none() {
                    return Err(self.misconfigured());
                }
                Ok(records.resolve(self.channel()))
            }
        }
    }

    pub fn is_owner(&self) -> bool {
        self.records().is_some_and(|records| records.member.is_owner)
    }
}

async fn load_records<R: RecordReader + ?Sized>(
    reader: &R,
    server_id: Uuid,
    user_id: Uuid,
) -> HearthResult<ServerRecords> {
    let member = reader
        .find_member(server_id, user_id)
        .await?
        .ok_or(HearthError::NotAMember)?;
    let roles = reader.list_server_roles(server_id).await?;
    Ok(ServerRecords::new(member, roles))
}

/// Load the caller's records for a server-scoped route.
pub async fn load_server_access<R: RecordReader + ?Sized>(
    reader: &R,
    user_id: Uuid,
    server_id: Uuid,
) -> HearthResult<Access> {
    let records = load_records(reader, server_id, user_id).await?;
    Ok(Access {
        user_id,
        scope: Scope::Server(records),
    })
}

/// Load the caller's records for a channel-scoped route.
///
/// DMs only need the channel itself. Server channels must belong to
/// `route_server` when the route names one.
pub async fn load_channel_access<R: RecordReader + ?Sized>(
    reader: &R,
    user_id: Uuid,
    channel_id: Uuid,
    route_server: Option<Uuid>,
) -> HearthResult<Access> {
    let channel = reader
        .find_channel(channel_id)
        .await?
        .ok_or(HearthError::ChannelNotFound)?;

    if channel.is_dm() {
        if route_server.is_some() {
            return Err(HearthError::bad_request(
                "Direct message channels do not belong to a server",
            ));
        }
        if !channel.is_recipient(user_id) {
            return Err(HearthError::NotAMember);
        }
        return Ok(Access {
            user_id,
            scope: Scope::Dm(channel),
        });
    }

    let server_id = channel
        .server_id
        .ok_or_else(|| HearthError::bad_request("Channel is not attached to a server"))?;
    if route_server.is_some_and(|route| route != server_id) {
        return Err(HearthError::bad_request(
            "Channel does not belong to this server",
        ));
    }

    let records = load_records(reader, server_id, user_id).await?;
    Ok(Access {
        user_id,
        scope: Scope::Channel { channel, records },
    })
}
