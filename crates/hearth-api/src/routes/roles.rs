//! Role management: list, create, edit, reorder, delete.
//!
//! Every mutation is gated on MANAGE_ROLES and then checked against the role
//! hierarchy: non-owners only touch roles strictly below their highest role and
//! only grant permissions they hold themselves.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use hearth_common::{
    error::{HearthError, HearthResult},
    hierarchy::{check_escalation, check_role_hierarchy},
    models::{
        CreateRoleRequest, Role, RolePatch, UpdateRolePositionRequest, UpdateRoleRequest,
    },
    permissions::{Permission, Permissions},
    snowflake,
    validation::{validate_request, validate_role_name},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    access::{Access, ServerRecords},
    middleware::{require_server_permission, PermissionGate},
    AppState,
};

/// Role routes.
pub fn router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let manage_roles = || {
        middleware::from_fn_with_state(
            PermissionGate::new(state, Some(Permission::ManageRoles)),
            require_server_permission,
        )
    };

    Router::new()
        .route(
            "/servers/{server_id}/roles",
            get(list_roles).route_layer(middleware::from_fn_with_state(
                PermissionGate::new(state, None),
                require_server_permission,
            )),
        )
        .route(
            "/servers/{server_id}/roles",
            post(create_role).route_layer(manage_roles()),
        )
        .route(
            "/servers/{server_id}/roles/{role_id}",
            patch(update_role).route_layer(manage_roles()),
        )
        .route(
            "/servers/{server_id}/roles/{role_id}",
            delete(delete_role).route_layer(manage_roles()),
        )
        .route(
            "/servers/{server_id}/roles/{role_id}/position",
            put(move_role).route_layer(manage_roles()),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth_middleware,
        ))
}

fn target_role(records: &ServerRecords, role_id: Uuid) -> HearthResult<&Role> {
    records
        .find_role(role_id)
        .ok_or_else(|| HearthError::not_found("Role"))
}

/// GET /api/v1/servers/:server_id/roles, highest position first.
async fn list_roles(Extension(access): Extension<Access>) -> HearthResult<Json<Vec<Role>>> {
    Ok(Json(access.server_records()?.roles.clone()))
}

/// POST /api/v1/servers/:server_id/roles
async fn create_role(
    State(state): State<Arc<AppState>>,
    Extension(access): Extension<Access>,
    Json(body): Json<CreateRoleRequest>,
) -> HearthResult<(StatusCode, Json<Role>)> {
    validate_request(&body)?;
    validate_role_name(&body.name)?;

    let records = access.server_records()?;
    // @everyone does not count toward the limit.
    let max_roles = state.limits.max_roles_per_server as usize;
    let created = records.roles.iter().filter(|role| !role.is_default).count();
    if created >= max_roles {
        return Err(HearthError::LimitReached {
            message: format!("A server can have at most {max_roles} roles"),
        });
    }

    let requested: Permissions = body.permissions.iter().copied().collect();
    check_escalation(access.effective_permissions()?, records.member.is_owner, requested)?;

    let position = match body.position {
        Some(position) => position,
        None => records.roles.iter().map(|r| r.position).max().unwrap_or(0) + 1,
    };
    check_role_hierarchy(&records.member, &records.roles, position)?;

    let role = state
        .store
        .create_role(Role {
            id: snowflake::generate_id(),
            server_id: records.server_id(),
            name: body.name.trim().to_string(),
            color: body.color,
            position,
            permissions: requested,
            is_default: false,
        })
        .await?;

    tracing::info!(
        server_id = %role.server_id,
        role_id = %role.id,
        actor = %access.user_id,
        position = role.position,
        "Role created"
    );

    Ok((StatusCode::CREATED, Json(role)))
}

/// PATCH /api/v1/servers/:server_id/roles/:role_id
async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(access): Extension<Access>,
    Path((_server_id, role_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateRoleRequest>,
) -> HearthResult<Json<Role>> {
    validate_request(&body)?;

    let records = access.server_records()?;
    let target = target_role(records, role_id)?;
    check_role_hierarchy(&records.member, &records.roles, target.position)?;

    if let Some(name) = &body.name {
        if target.is_default {
            return Err(HearthError::bad_request("The @everyone role cannot be renamed"));
        }
        validate_role_name(name)?;
    }

    let permissions: Option<Permissions> = body
        .permissions
        .as_ref()
        .map(|tags| tags.iter().copied().collect());
    if let Some(permissions) = permissions {
        // Only newly added permissions count as a grant.
        check_escalation(
            access.effective_permissions()?,
            records.member.is_owner,
            permissions - target.permissions,
        )?;
    }

    let role = state
        .store
        .update_role(
            records.server_id(),
            role_id,
            RolePatch {
                name: body.name.map(|n| n.trim().to_string()),
                color: body.color,
                permissions,
            },
        )
        .await?;

    tracing::info!(server_id = %role.server_id, role_id = %role.id, actor = %access.user_id, "Role updated");
    Ok(Json(role))
}

/// PUT /api/v1/servers/:server_id/roles/:role_id/position
///
/// Fails with 409 if the role moved since the caller last read it.
async fn move_role(
    State(state): State<Arc<AppState>>,
    Extension(access): Extension<Access>,
    Path((_server_id, role_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateRolePositionRequest>,
) -> HearthResult<Json<Role>> {
    validate_request(&body)?;

    let records = access.server_records()?;
    let target = target_role(records, role_id)?;
    if target.is_default {
        return Err(HearthError::bad_request(
            "The @everyone role always stays at the bottom",
        ));
    }
    check_role_hierarchy(&records.member, &records.roles, target.position)?;
    check_role_hierarchy(&records.member, &records.roles, body.position)?;

    let role = state
        .store
        .set_role_position(records.server_id(), role_id, body.expected_position, body.position)
        .await?;

    tracing::info!(
        server_id = %role.server_id,
        role_id = %role.id,
        from = body.expected_position,
        to = role.position,
        "Role moved"
    );
    Ok(Json(role))
}

/// DELETE /api/v1/servers/:server_id/roles/:role_id
async fn delete_role(
    State(state): State<Arc<AppState>>,
    Extension(access): Extension<Access>,
    Path((_server_id, role_id)): Path<(Uuid, Uuid)>,
) -> HearthResult<StatusCode> {
    let records = access.server_records()?;
    let target = target_role(records, role_id)?;
    if target.is_default {
        return Err(HearthError::bad_request("The @everyone role cannot be deleted"));
    }
    check_role_hierarchy(&records.member, &records.roles, target.position)?;

    state.store.delete_role(records.server_id(), role_id).await?;

    tracing::info!(server_id = %records.server_id(), role_id = %role_id, actor = %access.user_id, "Role deleted");
    Ok(StatusCode::NO_CONTENT)
}
