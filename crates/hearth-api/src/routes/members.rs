//! Member management: role assignment and kicks.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, put},
    Json, Router,
};
use hearth_common::{
    error::{HearthError, HearthResult},
    hierarchy::{check_member_hierarchy, check_role_hierarchy},
    models::Member,
    permissions::Permission,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    access::{Access, ServerRecords},
    middleware::{require_server_permission, PermissionGate},
    AppState,
};

pub fn router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let gate = |permission| {
        middleware::from_fn_with_state(
            PermissionGate::new(state, Some(permission)),
            require_server_permission,
        )
    };

    Router::new()
        .route(
            "/servers/{server_id}/members/{user_id}/roles/{role_id}",
            put(assign_role).route_layer(gate(Permission::ManageRoles)),
        )
        .route(
            "/servers/{server_id}/members/{user_id}/roles/{role_id}",
            delete(unassign_role).route_layer(gate(Permission::ManageRoles)),
        )
        .route(
            "/servers/{server_id}/members/{user_id}",
            delete(kick_member).route_layer(gate(Permission::KickMembers)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth_middleware,
        ))
}

/// Hierarchy checks shared by assign and unassign: the actor must outrank
/// both the target member and the role.
async fn check_assignable(
    state: &AppState,
    records: &ServerRecords,
    user_id: Uuid,
    role_id: Uuid,
) -> HearthResult<()> {
    let target = state
        .store
        .find_member(records.server_id(), user_id)
        .await?
        .ok_or_else(|| HearthError::not_found("Member"))?;
    // Owners may edit their own roles; kicks still refuse an owner target.
    if !records.member.is_owner {
        check_member_hierarchy(&records.member, &target, &records.roles)?;
    }

    let role = records
        .find_role(role_id)
        .ok_or_else(|| HearthError::not_found("Role"))?;
    if role.is_default {
        return Err(HearthError::bad_request("The @everyone role is held implicitly"));
    }
    check_role_hierarchy(&records.member, &records.roles, role.position)
}

/// PUT /api/v1/servers/:server_id/members/:user_id/roles/:role_id
async fn assign_role(
    State(state): State<Arc<AppState>>,
    Extension(access): Extension<Access>,
    Path((_server_id, user_id, role_id)): Path<(Uuid, Uuid, Uuid)>,
) -> HearthResult<Json<Member>> {
    let records = access.server_records()?;
    check_assignable(&state, records, user_id, role_id).await?;

    let member = state
        .store
        .assign_role(records.server_id(), user_id, role_id)
        .await?;

    tracing::info!(server_id = %member.server_id, user_id = %user_id, role_id = %role_id, actor = %access.user_id, "Role assigned");
    Ok(Json(member))
}

/// DELETE /api/v1/servers/:server_id/members/:user_id/roles/:role_id
async fn unassign_role(
    State(state): State<Arc<AppState>>,
    Extension(access): Extension<Access>,
    Path((_server_id, user_id, role_id)): Path<(Uuid, Uuid, Uuid)>,
) -> HearthResult<Json<Member>> {
    let records = access.server_records()?;
    check_assignable(&state, records, user_id, role_id).await?;

    let member = state
        .store
        .unassign_role(records.server_id(), user_id, role_id)
        .await?;

    tracing::info!(server_id = %member.server_id, user_id = %user_id, role_id = %role_id, actor = %access.user_id, "Role unassigned");
    Ok(Json(member))
}

/// DELETE /api/v1/servers/:server_id/members/:user_id (kick)
async fn kick_member(
    State(state): State<Arc<AppState>>,
    Extension(access): Extension<Access>,
    Path((_server_id, user_id)): Path<(Uuid, Uuid)>,
) -> HearthResult<StatusCode> {
    let records = access.server_records()?;
    let server_id = records.server_id();

    let target = state
        .store
        .find_member(server_id, user_id)
        .await?
        .ok_or_else(|| HearthError::not_found("Member"))?;
    check_member_hierarchy(&records.member, &target, &records.roles)?;

    state.store.remove_member(server_id, user_id).await?;

    tracing::info!(server_id = %server_id, user_id = %user_id, actor = %access.user_id, "Member kicked");
    Ok(StatusCode::NO_CONTENT)
}
