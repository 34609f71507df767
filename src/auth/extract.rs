use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Raw bearer token from the `Authorization` header. Used by logout, which
/// blacklists the token without requiring it to still validate.
pub struct Bearer(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Bearer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("expected bearer token".to_string()))?;

        Ok(Bearer(token.trim().to_string()))
    }
}

/// Validated session: resolves the bearer token to the agent id it was
/// issued for. Every mutating endpoint goes through this.
pub struct CurrentAgent(pub Uuid);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentAgent {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Bearer(token) = Bearer::from_request_parts(parts, state).await?;
        let agent_id = crate::auth::validate(state, &token)?;
        Ok(CurrentAgent(agent_id))
    }
}
