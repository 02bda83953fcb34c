//! Channel override normalization.
//!
//! A client submits the full replacement list for a channel's overrides. Before
//! anything is persisted the list is checked and reduced to a canonical form so
//! the resolver never sees an ambiguous override.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{HearthError, HearthResult};
use crate::models::{OverrideInput, OverrideTarget, PermissionOverride};
use crate::permissions::{Permission, Permissions};

/// Server facts the validator checks submissions against.
#[derive(Debug, Clone)]
pub struct OverrideRules<'a> {
    /// The server owner's user id. Overrides may not target the owner.
    pub owner_id: Option<Uuid>,
    /// The server's @everyone role id, sorted first in the output.
    pub everyone_role_id: Option<Uuid>,
    /// Ids of every role in the channel's server.
    pub role_ids: &'a HashSet<Uuid>,
    /// Upper bound on the number of submitted overrides.
    pub max_overrides: usize,
}

/// Validate and normalize a replacement override list.
///
/// - duplicate tags inside `allow`/`deny` are collapsed
/// - a tag in both `allow` and `deny` rejects the whole submission
/// - `ADMINISTRATOR` is rejected; it is not a channel-scoped permission
/// - two overrides for the same target reject the whole submission
/// - overrides targeting the owner or an unknown role are rejected
/// - overrides with nothing left in either set are dropped
pub fn normalize_overrides(
    submitted: &[OverrideInput],
    rules: &OverrideRules<'_>,
) -> HearthResult<Vec<PermissionOverride>> {
    if submitted.len() > rules.max_overrides {
        return Err(HearthError::validation(format!(
            "A channel can have at most {} overrides",
            rules.max_overrides
        )));
    }

    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(submitted.len());

    for input in submitted {
        if !seen.insert((input.target_type, input.target_id)) {
            return Err(HearthError::validation(format!(
                "Duplicate override for {} {}",
                target_label(input.target_type),
                input.target_id
            )));
        }

        match input.target_type {
            OverrideTarget::Member if Some(input.target_id) == rules.owner_id => {
                return Err(HearthError::validation(
                    "Overrides cannot target the server owner",
                ));
            }
            OverrideTarget::Role if !rules.role_ids.contains(&input.target_id) => {
                return Err(HearthError::validation(format!(
                    "Role {} does not belong to this server",
                    input.target_id
                )));
            }
            _ => {}
        }

        let allow: Permissions = input.allow.iter().copied().collect();
        let deny: Permissions = input.deny.iter().copied().collect();

        if (allow | deny).contains(Permission::Administrator.flag()) {
            return Err(HearthError::validation(
                "ADMINISTRATOR cannot be set on a channel override",
            ));
        }

        let conflict = allow & deny;
        if !conflict.is_empty() {
            let tags: Vec<&str> = conflict.tags().map(Permission::as_str).collect();
            return Err(HearthError::validation(format!(
                "Permissions both allowed and denied for {} {}: {}",
                target_label(input.target_type),
                input.target_id,
                tags.join(", ")
            )));
        }

        if allow.is_empty() && deny.is_empty() {
            continue;
        }

        normalized.push(PermissionOverride {
            target_type: input.target_type,
            target_id: input.target_id,
            allow,
            deny,
        });
    }

    normalized.sort_by_key(|ow| {
        let is_everyone = ow.target_type == OverrideTarget::Role
            && Some(ow.target_id) == rules.everyone_role_id;
        (!is_everyone, ow.target_type, ow.target_id)
    });

    Ok(normalized)
}

fn target_label(target_type: OverrideTarget) -> &'static str {
    match target_type {
        OverrideTarget::Role => "role",
        OverrideTarget::Member => "member",
    }
}
