//! Request middleware: bearer authentication and the permission gates.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use hearth_common::error::HearthError;
use hearth_common::permissions::Permission;
use uuid::Uuid;

use crate::access::{self, Access};
use crate::{AppState, auth};

/// Authentication context extracted from the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
}

impl AuthContext {
    pub fn from_request_extensions(extensions: &axum::http::Extensions) -> Result<&Self, HearthError> {
        extensions
            .get::<AuthContext>()
            .ok_or(HearthError::AuthenticationRequired)
    }
}

/// Extract and validate the JWT from the Authorization: Bearer <token> header.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, HearthError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(HearthError::AuthenticationRequired)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(HearthError::AuthenticationRequired)?;

    let claims = auth::validate_token(token, &state.jwt_secret)
        .map_err(|_| HearthError::InvalidToken)?;

    if claims.token_type != "access" {
        return Err(HearthError::InvalidToken);
    }

    let auth_ctx = AuthContext {
        user_id: claims.user_id()?,
    };

    request.extensions_mut().insert(auth_ctx);

    Ok(next.run(request).await)
}

// ── Permission gates ──────────────────────────────────────────────────────────

/// State for one gated route: which permission it needs, if any.
///
/// `permission: None` only checks that the caller belongs to the server (or is
/// a recipient of the DM).
#[derive(Clone)]
pub struct PermissionGate {
    pub state: Arc<AppState>,
    pub permission: Option<Permission>,
}

impl PermissionGate {
    pub fn new(state: &Arc<AppState>, permission: Option<Permission>) -> Self {
        Self {
            state: state.clone(),
            permission,
        }
    }
}

fn path_id(params: &HashMap<String, String>, key: &str) -> Result<Option<Uuid>, HearthError> {
    params
        .get(key)
        .map(|raw| {
            raw.parse::<Uuid>()
                .map_err(|_| HearthError::bad_request(format!("Invalid {key}")))
        })
        .transpose()
}

fn required_id(params: &HashMap<String, String>, key: &str) -> Result<Uuid, HearthError> {
    path_id(params, key)?.ok_or_else(|| HearthError::bad_request(format!("Missing {key}")))
}

/// Gate for routes under `/servers/{server_id}`.
pub async fn require_server_permission(
    State(gate): State<PermissionGate>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, HearthError> {
    let user_id = AuthContext::from_request_extensions(request.extensions())?.user_id;
    let server_id = required_id(&params, "server_id")?;

    let access = access::load_server_access(gate.state.store.as_ref(), user_id, server_id).await?;
    access.require(gate.permission)?;

    request.extensions_mut().insert::<Access>(access);
    Ok(next.run(request).await)
}

/// Gate for routes naming a `{channel_id}`, optionally nested under a server.
pub async fn require_channel_permission(
    State(gate): State<PermissionGate>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, HearthError> {
    let user_id = AuthContext::from_request_extensions(request.extensions())?.user_id;
    let channel_id = required_id(&params, "channel_id")?;
    let route_server = path_id(&params, "server_id")?;

    let access =
        access::load_channel_access(gate.state.store.as_ref(), user_id, channel_id, route_server)
            .await?;
    access.require(gate.permission)?;

    request.extensions_mut().insert::<Access>(access);
    Ok(next.run(request).await)
}

// ── Security headers ──────────────────────────────────────────────────────────

/// Add security headers to every HTTP response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let h = response.headers_mut();

    macro_rules! set {
        ($name:expr, $val:expr) => {
            if let Ok(v) = $val.parse::<axum::http::HeaderValue>() {
                h.insert($name, v);
            }
        };
    }

    set!(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    set!(header::X_FRAME_OPTIONS, "DENY");
    set!(header::REFERRER_POLICY, "no-referrer");
    set!(header::CACHE_CONTROL, "no-store");

    response
}
