use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth;
use crate::auth::extract::{Bearer, CurrentAgent};
use crate::error::AppError;
use crate::models::agent::{Agent, AgentStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(profile))
        .route("/agent/status", patch(update_status))
        .route("/agent/location-status", patch(update_location_status))
        .route("/admin/agents", get(list_agents))
        .route("/admin/agents/:id", get(get_agent))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: u64,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AgentStatus,
}

#[derive(Deserialize)]
pub struct LocationToggleRequest {
    pub location_on: bool,
}

#[derive(Serialize)]
pub struct AgentResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: u64,
    pub status: AgentStatus,
    pub location_on: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Agent> for AgentResponse {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name.clone(),
            email: agent.email.clone(),
            phone: agent.phone,
            status: agent.status,
            location_on: agent.location_on,
            created_at: agent.created_at,
        }
    }
}

pub fn validate_phone(phone: u64) -> Result<(), AppError> {
    if !(100_000_000_000..=999_999_999_999).contains(&phone) {
        return Err(AppError::Validation(
            "phone number must be exactly 12 digits".to_string(),
        ));
    }
    Ok(())
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    validate_phone(payload.phone)?;

    if state.find_agent_by_email(&payload.email).is_some() {
        return Err(AppError::Validation("email already registered".to_string()));
    }
    if state.find_agent_by_phone(payload.phone).is_some() {
        return Err(AppError::Validation(
            "phone number already registered".to_string(),
        ));
    }

    let agent = Agent {
        id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email,
        password_hash: auth::hash_password(&payload.password)?,
        phone: payload.phone,
        status: AgentStatus::Inactive,
        location_on: false,
        created_at: Utc::now(),
    };

    let response = AgentResponse::from(&agent);
    state.agents.insert(agent.id, agent);
    Ok(Json(response))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let agent = state
        .find_agent_by_email(&payload.email)
        .ok_or_else(|| AppError::Unauthorized("invalid email or password".to_string()))?;

    if !auth::verify_password(&payload.password, &agent.password_hash) {
        return Err(AppError::Unauthorized(
            "invalid email or password".to_string(),
        ));
    }

    let token = state.sessions.issue(agent.id)?;

    Ok(Json(json!({
        "token": token,
        "agent": AgentResponse::from(&agent),
    })))
}

/// Returns 200 regardless of whether the token was already revoked or
/// expired; revocation is idempotent.
async fn logout(
    State(state): State<Arc<AppState>>,
    Bearer(token): Bearer,
) -> Json<Value> {
    auth::revoke(&state, &token);
    state
        .metrics
        .revoked_tokens
        .set(state.revoked_tokens.len() as i64);

    Json(json!({ "message": "successfully logged out" }))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    CurrentAgent(agent_id): CurrentAgent,
) -> Result<Json<AgentResponse>, AppError> {
    let agent = state
        .agents
        .get(&agent_id)
        .ok_or_else(|| AppError::NotFound("agent not found".to_string()))?;

    Ok(Json(AgentResponse::from(agent.value())))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    CurrentAgent(agent_id): CurrentAgent,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    let mut agent = state
        .agents
        .get_mut(&agent_id)
        .ok_or_else(|| AppError::NotFound("agent not found".to_string()))?;

    agent.status = payload.status;
    Ok(Json(AgentResponse::from(&*agent)))
}

async fn update_location_status(
    State(state): State<Arc<AppState>>,
    CurrentAgent(agent_id): CurrentAgent,
    Json(payload): Json<LocationToggleRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    let mut agent = state
        .agents
        .get_mut(&agent_id)
        .ok_or_else(|| AppError::NotFound("agent not found".to_string()))?;

    agent.location_on = payload.location_on;
    Ok(Json(AgentResponse::from(&*agent)))
}

async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentResponse>> {
    let agents = state
        .agents
        .iter()
        .map(|entry| AgentResponse::from(entry.value()))
        .collect();
    Json(agents)
}

async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentResponse>, AppError> {
    let agent = state
        .agents
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))?;

    Ok(Json(AgentResponse::from(agent.value())))
}
