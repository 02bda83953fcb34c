//! Authentication: JWT access tokens.
//!
//! Hearth does not own user accounts; an upstream identity service mints
//! tokens with the shared secret. Generation lives here for tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

pub use hearth_common::auth::{Claims, validate_token};

/// Generate a JWT access token.
pub fn generate_access_token(
    user_id: Uuid,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs as i64)).timestamp(),
        token_type: "access".to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_validate_with_the_same_secret_only() {
        let user_id = Uuid::from_u128(42);
        let token = generate_access_token(user_id, "secret", 60).unwrap();

        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.token_type, "access");

        assert!(validate_token(&token, "other-secret").is_err());
    }
}
