pub mod extract;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Tokens are valid for 30 days from issuance.
pub const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token has been revoked")]
    Revoked,

    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("user not found")]
    UnknownAgent,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

/// Signs and verifies session tokens. Revocation state lives in
/// [`crate::store::RevokedTokens`]; the full check order is in [`validate`].
pub struct SessionValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Produces a signed token carrying the agent id and an absolute expiry
    /// 30 days out. No side effect on the revocation set.
    pub fn issue(&self, agent_id: Uuid) -> Result<String, AppError> {
        let claims = Claims {
            sub: agent_id,
            exp: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AppError::Internal(format!("failed to sign token: {err}")))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })
    }
}

/// Resolves a presented token to an agent id. Revocation is checked before
/// signature verification: a structurally valid token that was logged out
/// must still be rejected.
pub fn validate(state: &AppState, token: &str) -> Result<Uuid, AuthError> {
    if state.revoked_tokens.contains(token) {
        return Err(AuthError::Revoked);
    }

    let claims = state.sessions.decode(token)?;

    if !state.agents.contains_key(&claims.sub) {
        return Err(AuthError::UnknownAgent);
    }

    Ok(claims.sub)
}

/// Idempotently inserts the token into the revocation set. Revoking an
/// already-revoked or expired token is not an error. The entry is retained
/// until the token's natural expiry so the sweeper can evict it.
pub fn revoke(state: &AppState, token: &str) {
    let expires_at = match state.sessions.decode(token) {
        Ok(claims) => chrono::DateTime::from_timestamp(claims.exp, 0)
            .unwrap_or_else(|| Utc::now() + Duration::days(TOKEN_TTL_DAYS)),
        // Undecodable tokens still get blacklisted; hold them for a full TTL.
        Err(_) => Utc::now() + Duration::days(TOKEN_TTL_DAYS),
    };

    state.revoked_tokens.insert(token, expires_at);
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|err| AppError::Internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SessionValidator {
        SessionValidator::new("test-secret")
    }

    #[test]
    fn issued_token_decodes_to_same_agent() {
        let v = validator();
        let agent_id = Uuid::new_v4();
        let token = v.issue(agent_id).unwrap();
        let claims = v.decode(&token).unwrap();
        assert_eq!(claims.sub, agent_id);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn tampered_token_is_invalid() {
        let v = validator();
        let token = v.issue(Uuid::new_v4()).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert_eq!(v.decode(&tampered).unwrap_err(), AuthError::Invalid);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = SessionValidator::new("other-secret");
        let token = other.issue(Uuid::new_v4()).unwrap();
        assert_eq!(validator().decode(&token).unwrap_err(), AuthError::Invalid);
    }

    #[test]
    fn expired_token_is_rejected() {
        let v = validator();
        let claims = Claims {
            sub: Uuid::new_v4(),
            exp: (Utc::now() - Duration::days(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert_eq!(v.decode(&token).unwrap_err(), AuthError::Expired);
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }
}
