//! Shared JWT authentication utilities.
//!
//! Claims and token validation live here so the API crate and tests agree on
//! the token shape. Token generation stays in hearth-api.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HearthError;

/// JWT claims embedded in access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Token type; only "access" is accepted by the API
    pub token_type: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, HearthError> {
        self.sub.parse().map_err(|_| HearthError::InvalidToken)
    }
}

/// Validate and decode a JWT token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
