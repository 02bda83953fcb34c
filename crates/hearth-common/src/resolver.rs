//! Permission resolution: computes what a member may do in a server or channel.
//!
//! Everything here is a pure function of its arguments: no I/O, no globals, no
//! mutation of inputs. The authorization middleware loads records and calls in;
//! nothing in this module can fail, it only grants less.
//!
//! Algorithm:
//! 1. DM channels: recipients get the fixed DM allow-list, everyone else nothing
//! 2. Server owner gets every permission
//! 3. Start with @everyone role permissions (missing @everyone → empty set)
//! 4. OR in all assigned role permissions; ADMINISTRATOR → every permission
//! 5. Channel only: apply the @everyone override, then each held role's override
//!    in ascending (position, id) order, then the member's own override. Each
//!    layer removes its `deny` and then adds its `allow`.

use uuid::Uuid;

use crate::models::{Channel, Member, OverrideTarget, Role};
use crate::permissions::{Permission, Permissions};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Why an authorization check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The resolved set lacks the permission.
    MissingPermission(Permission),
    /// No usable @everyone role; the server's data is broken.
    Misconfigured,
    /// Caller is not a participant of the DM.
    NotRecipient,
    /// The permission can never be granted in a DM.
    NotAllowedInDm(Permission),
    /// The channel does not belong to the member's server.
    ChannelOutsideServer,
}

/// Effective permissions of `member`, server-wide or in `channel`.
///
/// `roles` should be every role of the member's server; roles from other servers
/// are ignored. `everyone_role` must be that server's default role, otherwise it
/// is treated as missing and the result is empty.
pub fn resolve(
    member: &Member,
    roles: &[Role],
    everyone_role: Option<&Role>,
    channel: Option<&Channel>,
) -> Permissions {
    if let Some(channel) = channel {
        if channel.is_dm() {
            return resolve_dm(member.user_id, channel);
        }
        if channel.server_id != Some(member.server_id) {
            return Permissions::empty();
        }
    }

    if member.is_owner {
        return Permissions::all();
    }

    let Some(everyone) = usable_everyone(member, everyone_role) else {
        return Permissions::empty();
    };

    let held = held_roles(member, roles, everyone);
    let base = held
        .iter()
        .fold(everyone.permissions, |acc, role| acc | role.permissions);

    if base.is_admin() {
        return Permissions::all();
    }

    match channel {
        None => base,
        Some(channel) => apply_overrides(base, member, everyone, &held, channel),
    }
}

/// Permissions of `user_id` in a DM: the allow-list for recipients, nothing otherwise.
pub fn resolve_dm(user_id: Uuid, channel: &Channel) -> Permissions {
    if channel.is_dm() && channel.is_recipient(user_id) {
        Permissions::dm()
    } else {
        Permissions::empty()
    }
}

/// Decide whether `member` may perform `required`, server-wide or in `channel`.
pub fn authorize(
    required: Permission,
    member: &Member,
    roles: &[Role],
    everyone_role: Option<&Role>,
    channel: Option<&Channel>,
) -> Decision {
    if let Some(channel) = channel {
        if channel.is_dm() {
            return authorize_dm(required, member.user_id, channel);
        }
        if channel.server_id != Some(member.server_id) {
            return Decision::Denied(DenyReason::ChannelOutsideServer);
        }
    }

    if member.is_owner {
        return Decision::Allowed;
    }

    if usable_everyone(member, everyone_role).is_none() {
        return Decision::Denied(DenyReason::Misconfigured);
    }

    let perms = resolve(member, roles, everyone_role, channel);
    if perms.grants(required) {
        Decision::Allowed
    } else {
        Decision::Denied(DenyReason::MissingPermission(required))
    }
}

/// Decide whether `user_id` may perform `required` in a DM.
pub fn authorize_dm(required: Permission, user_id: Uuid, channel: &Channel) -> Decision {
    if !channel.is_recipient(user_id) {
        return Decision::Denied(DenyReason::NotRecipient);
    }
    if resolve_dm(user_id, channel).contains(required.flag()) {
        Decision::Allowed
    } else {
        Decision::Denied(DenyReason::NotAllowedInDm(required))
    }
}

fn usable_everyone<'a>(member: &Member, everyone_role: Option<&'a Role>) -> Option<&'a Role> {
    everyone_role.filter(|role| role.is_default && role.server_id == member.server_id)
}

/// Roles the member holds, sorted ascending by (position, id).
fn held_roles<'a>(member: &Member, roles: &'a [Role], everyone: &Role) -> Vec<&'a Role> {
    let mut held: Vec<&Role> = roles
        .iter()
        .filter(|role| {
            role.server_id == member.server_id
                && role.id != everyone.id
                && !role.is_default
                && member.holds(role.id)
        })
        .collect();
    held.sort_by_key(|role| role.precedence());
    held.dedup_by_key(|role| role.id);
    held
}

fn apply_overrides(
    base: Permissions,
    member: &Member,
    everyone: &Role,
    held: &[&Role],
    channel: &Channel,
) -> Permissions {
    let overrides = &channel.permission_overrides;
    let layer = |perms: Permissions, target_type: OverrideTarget, target_id: Uuid| {
        overrides
            .iter()
            .filter(|ow| ow.targets(target_type, target_id))
            .fold(perms, |acc, ow| ow.apply(acc))
    };

    let mut perms = layer(base, OverrideTarget::Role, everyone.id);
    for role in held {
        perms = layer(perms, OverrideTarget::Role, role.id);
    }
    layer(perms, OverrideTarget::Member, member.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelType, PermissionOverride};

    struct Fixture {
        server_id: Uuid,
        everyone: Role,
        roles: Vec<Role>,
    }

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn role(server_id: Uuid, n: u128, position: i32, permissions: Permissions) -> Role {
        Role {
            id: id(n),
            server_id,
            name: format!("role-{n}"),
            color: None,
            position,
            permissions,
            is_default: false,
        }
    }

    fn fixture() -> Fixture {
        let server_id = id(1);
        let everyone = Role {
            id: id(100),
            server_id,
            name: "@everyone".into(),
            color: None,
            position: 0,
            permissions: Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY,
            is_default: true,
        };
        let roles = vec![everyone.clone()];
        Fixture {
            server_id,
            everyone,
            roles,
        }
    }

    fn member(server_id: Uuid, role_ids: Vec<Uuid>) -> Member {
        Member {
            user_id: id(500),
            server_id,
            role_ids,
            is_owner: false,
        }
    }

    fn text_channel(server_id: Uuid, overrides: Vec<PermissionOverride>) -> Channel {
        Channel {
            id: id(900),
            server_id: Some(server_id),
            channel_type: ChannelType::Text,
            name: Some("general".into()),
            recipients: vec![],
            permission_overrides: overrides,
        }
    }

    fn dm_channel(recipients: Vec<Uuid>) -> Channel {
        Channel {
            id: id(901),
            server_id: None,
            channel_type: ChannelType::Dm,
            name: None,
            recipients,
            permission_overrides: vec![],
        }
    }

    fn ow(target_type: OverrideTarget, target_id: Uuid, allow: Permissions, deny: Permissions) -> PermissionOverride {
        PermissionOverride {
            target_type,
            target_id,
            allow,
            deny,
        }
    }

    #[test]
    fn owner_is_allowed_everything_everywhere() {
        let f = fixture();
        let mut owner = member(f.server_id, vec![]);
        owner.is_owner = true;
        let locked = text_channel(
            f.server_id,
            vec![ow(OverrideTarget::Member, owner.user_id, Permissions::empty(), Permissions::all())],
        );

        for p in Permission::ALL {
            assert!(authorize(p, &owner, &f.roles, Some(&f.everyone), None).is_allowed());
            assert!(authorize(p, &owner, &f.roles, Some(&f.everyone), Some(&locked)).is_allowed());
            // Step 1 short-circuits before the @everyone lookup.
            assert!(authorize(p, &owner, &[], None, Some(&locked)).is_allowed());
        }
        assert_eq!(resolve(&owner, &f.roles, Some(&f.everyone), Some(&locked)), Permissions::all());
    }

    #[test]
    fn server_level_is_union_of_everyone_and_held_roles() {
        let mut f = fixture();
        let mods = role(f.server_id, 2, 1, Permissions::KICK_MEMBERS);
        let unheld = role(f.server_id, 3, 2, Permissions::BAN_MEMBERS);
        f.roles.extend([mods.clone(), unheld]);
        let m = member(f.server_id, vec![mods.id]);

        let perms = resolve(&m, &f.roles, Some(&f.everyone), None);
        assert_eq!(
            perms,
            Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY | Permissions::KICK_MEMBERS
        );
        assert_eq!(
            authorize(Permission::BanMembers, &m, &f.roles, Some(&f.everyone), None),
            Decision::Denied(DenyReason::MissingPermission(Permission::BanMembers))
        );
    }

    #[test]
    fn adding_a_role_never_removes_a_server_level_grant() {
        let mut f = fixture();
        let extra: Vec<Role> = (0..6u128)
            .map(|n| role(f.server_id, 10 + n, n as i32 + 1, Permission::ALL[n as usize + 4].flag()))
            .collect();
        f.roles.extend(extra.iter().cloned());

        let mut m = member(f.server_id, vec![]);
        let mut previous = resolve(&m, &f.roles, Some(&f.everyone), None);
        for r in &extra {
            m.role_ids.push(r.id);
            let next = resolve(&m, &f.roles, Some(&f.everyone), None);
            assert!(next.contains(previous), "grant lost after adding {}", r.name);
            previous = next;
        }
    }

    #[test]
    fn channel_overrides_do_not_apply_at_server_level() {
        let f = fixture();
        let m = member(f.server_id, vec![]);
        let _channel = text_channel(
            f.server_id,
            vec![ow(OverrideTarget::Role, f.everyone.id, Permissions::empty(), Permissions::VIEW_CHANNEL)],
        );
        assert!(authorize(Permission::ViewChannel, &m, &f.roles, Some(&f.everyone), None).is_allowed());
    }

    #[test]
    fn higher_position_role_override_wins() {
        let mut f = fixture();
        let r1 = role(f.server_id, 2, 1, Permissions::empty());
        let r2 = role(f.server_id, 3, 2, Permissions::empty());
        f.roles.extend([r1.clone(), r2.clone()]);
        let m = member(f.server_id, vec![r2.id, r1.id]);
        let channel = text_channel(
            f.server_id,
            vec![
                ow(OverrideTarget::Role, r2.id, Permissions::SEND_MESSAGES, Permissions::empty()),
                ow(OverrideTarget::Role, r1.id, Permissions::empty(), Permissions::SEND_MESSAGES),
            ],
        );

        assert_eq!(
            authorize(Permission::SendMessages, &m, &f.roles, Some(&f.everyone), Some(&channel)),
            Decision::Allowed
        );
    }

    #[test]
    fn member_override_beats_role_overrides() {
        let mut f = fixture();
        let r1 = role(f.server_id, 2, 1, Permissions::empty());
        let r2 = role(f.server_id, 3, 2, Permissions::empty());
        f.roles.extend([r1.clone(), r2.clone()]);
        let m = member(f.server_id, vec![r1.id, r2.id]);
        let channel = text_channel(
            f.server_id,
            vec![
                ow(OverrideTarget::Member, m.user_id, Permissions::empty(), Permissions::SEND_MESSAGES),
                ow(OverrideTarget::Role, r1.id, Permissions::empty(), Permissions::SEND_MESSAGES),
                ow(OverrideTarget::Role, r2.id, Permissions::SEND_MESSAGES, Permissions::empty()),
            ],
        );

        assert_eq!(
            authorize(Permission::SendMessages, &m, &f.roles, Some(&f.everyone), Some(&channel)),
            Decision::Denied(DenyReason::MissingPermission(Permission::SendMessages))
        );
    }

    #[test]
    fn everyone_override_is_the_lowest_layer() {
        let mut f = fixture();
        let helpers = role(f.server_id, 2, 1, Permissions::empty());
        f.roles.push(helpers.clone());
        let channel = text_channel(
            f.server_id,
            vec![
                ow(OverrideTarget::Role, helpers.id, Permissions::VIEW_CHANNEL, Permissions::empty()),
                ow(OverrideTarget::Role, f.everyone.id, Permissions::empty(), Permissions::VIEW_CHANNEL),
            ],
        );

        let outsider = member(f.server_id, vec![]);
        let helper = member(f.server_id, vec![helpers.id]);
        assert!(!resolve(&outsider, &f.roles, Some(&f.everyone), Some(&channel)).contains(Permissions::VIEW_CHANNEL));
        assert!(resolve(&helper, &f.roles, Some(&f.everyone), Some(&channel)).contains(Permissions::VIEW_CHANNEL));
    }

    #[test]
    fn allow_re_grants_over_the_same_layers_deny() {
        let f = fixture();
        let m = member(f.server_id, vec![]);
        let channel = text_channel(
            f.server_id,
            vec![ow(
                OverrideTarget::Member,
                m.user_id,
                Permissions::ADD_REACTIONS,
                Permissions::ADD_REACTIONS | Permissions::VIEW_CHANNEL,
            )],
        );
        let perms = resolve(&m, &f.roles, Some(&f.everyone), Some(&channel));
        assert!(perms.contains(Permissions::ADD_REACTIONS));
        assert!(!perms.contains(Permissions::VIEW_CHANNEL));
    }

    #[test]
    fn equal_positions_break_ties_by_role_id() {
        let f = fixture();
        let low_id = role(f.server_id, 20, 5, Permissions::empty());
        let high_id = role(f.server_id, 21, 5, Permissions::empty());
        let overrides = vec![
            ow(OverrideTarget::Role, high_id.id, Permissions::empty(), Permissions::SEND_MESSAGES),
            ow(OverrideTarget::Role, low_id.id, Permissions::SEND_MESSAGES, Permissions::empty()),
        ];
        let channel = text_channel(f.server_id, overrides);

        // Same decision no matter how roles and role ids are ordered on input.
        let orders = [
            (vec![low_id.clone(), high_id.clone()], vec![low_id.id, high_id.id]),
            (vec![high_id.clone(), low_id.clone()], vec![high_id.id, low_id.id]),
            (vec![high_id.clone(), low_id.clone()], vec![low_id.id, high_id.id]),
        ];
        for (role_order, id_order) in orders {
            let mut roles = f.roles.clone();
            roles.extend(role_order);
            let m = member(f.server_id, id_order);
            // The larger id is applied last, so its deny wins.
            assert_eq!(
                authorize(Permission::SendMessages, &m, &roles, Some(&f.everyone), Some(&channel)),
                Decision::Denied(DenyReason::MissingPermission(Permission::SendMessages))
            );
        }
    }

    #[test]
    fn administrator_survives_channel_denies() {
        let mut f = fixture();
        let admins = role(f.server_id, 2, 1, Permissions::ADMINISTRATOR);
        f.roles.push(admins.clone());
        let m = member(f.server_id, vec![admins.id]);
        let channel = text_channel(
            f.server_id,
            vec![
                ow(OverrideTarget::Role, admins.id, Permissions::empty(), Permissions::all()),
                ow(OverrideTarget::Member, m.user_id, Permissions::empty(), Permissions::all()),
            ],
        );

        for p in Permission::ALL {
            assert!(authorize(p, &m, &f.roles, Some(&f.everyone), Some(&channel)).is_allowed());
        }
    }

    #[test]
    fn overrides_cannot_grant_administrator() {
        let f = fixture();
        let m = member(f.server_id, vec![]);
        let channel = text_channel(
            f.server_id,
            vec![ow(OverrideTarget::Member, m.user_id, Permissions::ADMINISTRATOR, Permissions::empty())],
        );
        let perms = resolve(&m, &f.roles, Some(&f.everyone), Some(&channel));
        assert!(!perms.is_admin());
        assert!(!perms.grants(Permission::KickMembers));
    }

    #[test]
    fn dm_grants_only_the_allow_list_to_recipients() {
        let f = fixture();
        let mut m = member(f.server_id, vec![]);
        m.is_owner = true;
        let dm = dm_channel(vec![m.user_id, id(501)]);

        assert_eq!(
            authorize(Permission::KickMembers, &m, &f.roles, Some(&f.everyone), Some(&dm)),
            Decision::Denied(DenyReason::NotAllowedInDm(Permission::KickMembers))
        );
        assert!(authorize(Permission::SendMessages, &m, &f.roles, Some(&f.everyone), Some(&dm)).is_allowed());
        assert!(authorize_dm(Permission::SendMessages, m.user_id, &dm).is_allowed());

        let stranger = id(777);
        assert_eq!(
            authorize_dm(Permission::SendMessages, stranger, &dm),
            Decision::Denied(DenyReason::NotRecipient)
        );
        assert_eq!(resolve_dm(stranger, &dm), Permissions::empty());
        for p in Permission::ALL {
            let granted = authorize_dm(p, m.user_id, &dm).is_allowed();
            assert_eq!(granted, p.allowed_in_dm(), "{p}");
        }
    }

    #[test]
    fn missing_everyone_role_fails_closed() {
        let mut f = fixture();
        let admins = role(f.server_id, 2, 1, Permissions::ADMINISTRATOR);
        f.roles.push(admins.clone());
        let m = member(f.server_id, vec![admins.id]);
        let channel = text_channel(f.server_id, vec![]);

        assert_eq!(resolve(&m, &f.roles, None, None), Permissions::empty());
        assert_eq!(resolve(&m, &f.roles, None, Some(&channel)), Permissions::empty());
        assert_eq!(
            authorize(Permission::SendMessages, &m, &f.roles, None, Some(&channel)),
            Decision::Denied(DenyReason::Misconfigured)
        );

        // A role that is not flagged default is not an @everyone role.
        let impostor = role(f.server_id, 3, 0, Permissions::all());
        assert_eq!(resolve(&m, &f.roles, Some(&impostor), None), Permissions::empty());

        // Nor is another server's default role.
        let mut foreign = f.everyone.clone();
        foreign.server_id = id(2);
        assert_eq!(
            authorize(Permission::ViewChannel, &m, &f.roles, Some(&foreign), None),
            Decision::Denied(DenyReason::Misconfigured)
        );
    }

    #[test]
    fn channel_from_another_server_grants_nothing() {
        let f = fixture();
        let m = member(f.server_id, vec![]);
        let elsewhere = text_channel(id(2), vec![]);
        assert_eq!(resolve(&m, &f.roles, Some(&f.everyone), Some(&elsewhere)), Permissions::empty());
        assert_eq!(
            authorize(Permission::ViewChannel, &m, &f.roles, Some(&f.everyone), Some(&elsewhere)),
            Decision::Denied(DenyReason::ChannelOutsideServer)
        );
    }

    #[test]
    fn roles_from_other_servers_are_ignored() {
        let mut f = fixture();
        let foreign = role(id(2), 2, 1, Permissions::ADMINISTRATOR);
        f.roles.push(foreign.clone());
        let m = member(f.server_id, vec![foreign.id]);
        assert!(!resolve(&m, &f.roles, Some(&f.everyone), None).is_admin());
    }

    #[test]
    fn resolution_is_pure() {
        let mut f = fixture();
        let r1 = role(f.server_id, 2, 3, Permissions::MANAGE_MESSAGES);
        let r2 = role(f.server_id, 3, 1, Permissions::EMBED_LINKS);
        f.roles.extend([r1.clone(), r2.clone()]);
        let m = member(f.server_id, vec![r1.id, r2.id]);
        let channel = text_channel(
            f.server_id,
            vec![
                ow(OverrideTarget::Role, r1.id, Permissions::ATTACH_FILES, Permissions::EMBED_LINKS),
                ow(OverrideTarget::Role, r2.id, Permissions::EMBED_LINKS, Permissions::empty()),
            ],
        );
        let (roles_before, member_before, channel_before) = (f.roles.clone(), m.clone(), channel.clone());

        let first = resolve(&m, &f.roles, Some(&f.everyone), Some(&channel));
        let second = resolve(&m, &f.roles, Some(&f.everyone), Some(&channel));
        assert_eq!(first, second);
        assert_eq!(f.roles, roles_before);
        assert_eq!(m, member_before);
        assert_eq!(channel, channel_before);
        // r2 (position 1) re-allows EMBED_LINKS, then r1 (position 3) denies it.
        assert!(!first.contains(Permissions::EMBED_LINKS));
        assert!(first.contains(Permissions::ATTACH_FILES));
    }
}
