//! Role hierarchy checks for management actions.
//!
//! The owner bypasses every check here. Everyone else may only act on roles and
//! members strictly below their own highest role, and may only hand out
//! permissions they already hold.

use crate::error::{HearthError, HearthResult};
use crate::models::{Member, Role};
use crate::permissions::Permissions;

/// Highest position among the member's assigned roles; 0 with none.
pub fn highest_position(member: &Member, roles: &[Role]) -> i32 {
    roles
        .iter()
        .filter(|role| !role.is_default && role.server_id == member.server_id && member.holds(role.id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
        .max(0)
}

/// Check that `actor` may manage a role sitting at `target_position`.
pub fn check_role_hierarchy(actor: &Member, roles: &[Role], target_position: i32) -> HearthResult<()> {
    if actor.is_owner {
        return Ok(());
    }

    let actor_position = highest_position(actor, roles);
    if actor_position <= target_position {
        return Err(HearthError::forbidden(
            "You cannot manage a role with an equal or higher position than your own highest role",
        ));
    }
    Ok(())
}

/// Check that `actor` may moderate `target`.
pub fn check_member_hierarchy(actor: &Member, target: &Member, roles: &[Role]) -> HearthResult<()> {
    if target.is_owner {
        return Err(HearthError::forbidden("The server owner cannot be managed"));
    }
    if actor.is_owner {
        return Ok(());
    }

    if highest_position(actor, roles) <= highest_position(target, roles) {
        return Err(HearthError::forbidden(
            "You cannot manage a user with an equal or higher role position than your own",
        ));
    }
    Ok(())
}

/// Check that a non-owner only grants permissions they effectively hold.
pub fn check_escalation(
    actor_permissions: Permissions,
    actor_is_owner: bool,
    requested: Permissions,
) -> HearthResult<()> {
    if actor_is_owner || actor_permissions.is_admin() {
        return Ok(());
    }

    let escalation = requested - actor_permissions;
    if !escalation.is_empty() {
        let tags: Vec<&str> = escalation.tags().map(|p| p.as_str()).collect();
        return Err(HearthError::forbidden(format!(
            "You cannot grant permissions you do not have: {}",
            tags.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn role(n: u128, position: i32, is_default: bool) -> Role {
        Role {
            id: id(n),
            server_id: id(1),
            name: format!("r{n}"),
            color: None,
            position,
            permissions: Permissions::empty(),
            is_default,
        }
    }

    fn member(user: u128, role_ids: &[u128]) -> Member {
        Member {
            user_id: id(user),
            server_id: id(1),
            role_ids: role_ids.iter().map(|n| id(*n)).collect(),
            is_owner: false,
        }
    }

    fn roles() -> Vec<Role> {
        vec![role(100, 0, true), role(101, 1, false), role(102, 5, false), role(103, 9, false)]
    }

    #[test]
    fn highest_position_ignores_default_and_unheld_roles() {
        let roles = roles();
        assert_eq!(highest_position(&member(1, &[]), &roles), 0);
        assert_eq!(highest_position(&member(1, &[100, 101, 102]), &roles), 5);
    }

    #[test]
    fn roles_at_or_above_the_actor_are_off_limits() {
        let roles = roles();
        let actor = member(1, &[102]);
        assert!(check_role_hierarchy(&actor, &roles, 1).is_ok());
        assert!(check_role_hierarchy(&actor, &roles, 5).is_err());
        assert!(check_role_hierarchy(&actor, &roles, 9).is_err());

        let mut owner = member(2, &[]);
        owner.is_owner = true;
        assert!(check_role_hierarchy(&owner, &roles, 9).is_ok());
    }

    #[test]
    fn members_need_a_strictly_higher_role() {
        let roles = roles();
        let actor = member(1, &[102]);
        assert!(check_member_hierarchy(&actor, &member(2, &[101]), &roles).is_ok());
        assert!(check_member_hierarchy(&actor, &member(3, &[102]), &roles).is_err());
        assert!(check_member_hierarchy(&actor, &member(4, &[103]), &roles).is_err());

        let mut owner = member(5, &[]);
        owner.is_owner = true;
        assert!(check_member_hierarchy(&actor, &owner, &roles).is_err());
        assert!(check_member_hierarchy(&owner, &member(4, &[103]), &roles).is_ok());
    }

    #[test]
    fn escalation_is_blocked_for_non_admins() {
        let held = Permissions::SEND_MESSAGES | Permissions::MANAGE_ROLES;
        assert!(check_escalation(held, false, Permissions::SEND_MESSAGES).is_ok());
        let err = check_escalation(held, false, Permissions::BAN_MEMBERS).unwrap_err();
        assert!(err.to_string().contains("BAN_MEMBERS"));
        assert!(check_escalation(Permissions::ADMINISTRATOR, false, Permissions::all()).is_ok());
        assert!(check_escalation(Permissions::empty(), true, Permissions::all()).is_ok());
    }
}
