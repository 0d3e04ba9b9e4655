//! Bearer-token identity.
//!
//! Tokens are issued by the account service; this crate only resolves them.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, ShopError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { User, Admin }

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
}

/// The caller behind a verified token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, token: &str) -> Result<Principal>;
}

pub struct JwtIdentity {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtIdentity {
    pub fn new(secret: &[u8]) -> Self {
        Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret) }
    }

    /// Mints an HS256 token. Used by tooling and tests.
    pub fn issue(&self, user_id: Uuid, role: Role, ttl: Duration) -> Result<String> {
        let claims = Claims { sub: user_id, role, exp: (Utc::now() + ttl).timestamp() };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| ShopError::Internal(e.to_string()))
    }
}

impl IdentityProvider for JwtIdentity {
    fn resolve(&self, token: &str) -> Result<Principal> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            ShopError::Unauthorized
        })?;
        Ok(Principal { user_id: data.claims.sub, role: data.claims.role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-minimum-32-chars!!";

    #[test]
    fn test_issue_then_resolve() {
        let identity = JwtIdentity::new(SECRET);
        let user = Uuid::now_v7();
        let token = identity.issue(user, Role::Admin, Duration::hours(1)).unwrap();
        let principal = identity.resolve(&token).unwrap();
        assert_eq!(principal.user_id, user);
        assert!(principal.is_admin());
    }

    #[test]
    fn test_rejects_foreign_and_expired_tokens() {
        let identity = JwtIdentity::new(SECRET);
        let other = JwtIdentity::new(b"another-secret-key-minimum-32-chars");
        let forged = other.issue(Uuid::now_v7(), Role::Admin, Duration::hours(1)).unwrap();
        assert!(matches!(identity.resolve(&forged), Err(ShopError::Unauthorized)));

        let expired = identity.issue(Uuid::now_v7(), Role::User, Duration::hours(-2)).unwrap();
        assert!(matches!(identity.resolve(&expired), Err(ShopError::Unauthorized)));
        assert!(matches!(identity.resolve("not-a-token"), Err(ShopError::Unauthorized)));
    }
}
