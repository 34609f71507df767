use std::path::PathBuf;

use dashmap::DashMap;
use uuid::Uuid;

use crate::auth::SessionValidator;
use crate::models::agent::Agent;
use crate::observability::metrics::Metrics;
use crate::store::{OrderStore, PingLog, RevokedTokens};

pub struct AppState {
    pub agents: DashMap<Uuid, Agent>,
    pub orders: OrderStore,
    pub pings: PingLog,
    pub sessions: SessionValidator,
    pub revoked_tokens: RevokedTokens,
    pub upload_dir: PathBuf,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(jwt_secret: &str, upload_dir: PathBuf) -> Self {
        Self {
            agents: DashMap::new(),
            orders: OrderStore::new(),
            pings: PingLog::new(),
            sessions: SessionValidator::new(jwt_secret),
            revoked_tokens: RevokedTokens::new(),
            upload_dir,
            metrics: Metrics::new(),
        }
    }

    pub fn find_agent_by_email(&self, email: &str) -> Option<Agent> {
        self.agents
            .iter()
            .find(|entry| entry.email == email)
            .map(|entry| entry.value().clone())
    }

    pub fn find_agent_by_phone(&self, phone: u64) -> Option<Agent> {
        self.agents
            .iter()
            .find(|entry| entry.phone == phone)
            .map(|entry| entry.value().clone())
    }
}
