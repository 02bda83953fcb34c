//! Channel permission override editor.
//!
//! `PUT` replaces the whole list. Submissions are normalized first, then
//! checked against the editor's own access so nobody can lock themselves out
//! of managing the channel.

use axum::{
    extract::{Extension, State},
    middleware,
    routing::{get, put},
    Json, Router,
};
use hearth_common::{
    error::{HearthError, HearthResult},
    models::{PermissionOverride, ReplaceOverridesRequest},
    overrides::{normalize_overrides, OverrideRules},
    permissions::Permission,
    resolver,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    access::{Access, Scope},
    middleware::{require_channel_permission, PermissionGate},
    AppState,
};

pub fn router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let gate = |permission| PermissionGate::new(state, Some(permission));

    let mut router = Router::new();
    for path in [
        "/channels/{channel_id}/overrides",
        "/servers/{server_id}/channels/{channel_id}/overrides",
    ] {
        router = router
            .route(
                path,
                get(list_overrides).route_layer(middleware::from_fn_with_state(
                    gate(Permission::ViewChannel),
                    require_channel_permission,
                )),
            )
            .route(
                path,
                put(replace_overrides).route_layer(middleware::from_fn_with_state(
                    gate(Permission::ManageChannel),
                    require_channel_permission,
                )),
            );
    }

    router.route_layer(middleware::from_fn_with_state(
        state.clone(),
        crate::middleware::auth_middleware,
    ))
}

/// GET /api/v1/channels/:channel_id/overrides
async fn list_overrides(Extension(access): Extension<Access>) -> Json<Vec<PermissionOverride>> {
    Json(
        access
            .channel()
            .map(|channel| channel.permission_overrides.clone())
            .unwrap_or_default(),
    )
}

/// PUT /api/v1/channels/:channel_id/overrides
async fn replace_overrides(
    State(state): State<Arc<AppState>>,
    Extension(access): Extension<Access>,
    Json(body): Json<ReplaceOverridesRequest>,
) -> HearthResult<Json<Vec<PermissionOverride>>> {
    let Scope::Channel { channel, records } = &access.scope else {
        return Err(HearthError::bad_request(
            "Overrides can only be set on server channels",
        ));
    };

    let owner_id = state
        .store
        .find_owner(records.server_id())
        .await?
        .map(|owner| owner.user_id);
    let role_ids: HashSet<Uuid> = records.roles.iter().map(|role| role.id).collect();
    let rules = OverrideRules {
        owner_id,
        everyone_role_id: records.everyone_role.as_ref().map(|role| role.id),
        role_ids: &role_ids,
        max_overrides: state.limits.max_overrides_per_channel as usize,
    };
    let normalized = normalize_overrides(&body.overrides, &rules)?;

    // Re-resolve the editor against the new list; owners and admins always pass.
    let mut preview = channel.clone();
    preview.permission_overrides = normalized.clone();
    let after = resolver::resolve(
        &records.member,
        &records.roles,
        records.everyone_role.as_ref(),
        Some(&preview),
    );
    if !after.grants(Permission::ManageChannel) {
        return Err(HearthError::forbidden(
            "This change would remove your own MANAGE_CHANNEL permission on this channel",
        ));
    }

    let updated = state
        .store
        .replace_channel_overrides(channel.id, normalized)
        .await?;

    tracing::info!(
        channel_id = %channel.id,
        server_id = %records.server_id(),
        editor = %access.user_id,
        overrides = updated.permission_overrides.len(),
        "Channel overrides replaced"
    );

    Ok(Json(updated.permission_overrides))
}
