//! Effective-permission queries for the calling user.

use axum::{extract::Extension, middleware, routing::get, Json, Router};
use hearth_common::{error::HearthResult, permissions::Permissions};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    access::Access,
    middleware::{require_channel_permission, require_server_permission, PermissionGate},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct EffectivePermissions {
    pub server_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub is_owner: bool,
    pub permissions: Permissions,
}

pub fn router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/servers/{server_id}/permissions/me",
            get(my_permissions).route_layer(middleware::from_fn_with_state(
                PermissionGate::new(state, None),
                require_server_permission,
            )),
        )
        .route(
            "/channels/{channel_id}/permissions/me",
            get(my_permissions).route_layer(middleware::from_fn_with_state(
                PermissionGate::new(state, None),
                require_channel_permission,
            )),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth_middleware,
        ))
}

/// GET /api/v1/servers/:server_id/permissions/me
/// GET /api/v1/channels/:channel_id/permissions/me
async fn my_permissions(
    Extension(access): Extension<Access>,
) -> HearthResult<Json<EffectivePermissions>> {
    let permissions = access.effective_permissions()?;
    Ok(Json(EffectivePermissions {
        server_id: access.records().map(|r| r.server_id()),
        channel_id: access.channel().map(|c| c.id),
        is_owner: access.is_owner(),
        permissions,
    }))
}
