use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::extract::CurrentAgent;
use crate::engine::ingest;
use crate::models::order::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/location/track", post(track_location))
}

/// Request boundary carries latitude-first named fields; internally the
/// point is stored longitude-first. This handler is the conversion point.
#[derive(Deserialize)]
pub struct TrackRequest {
    pub latitude: f64,
    pub longitude: f64,
}

async fn track_location(
    State(state): State<Arc<AppState>>,
    CurrentAgent(agent_id): CurrentAgent,
    Json(payload): Json<TrackRequest>,
) -> Json<Value> {
    let position = GeoPoint {
        lng: payload.longitude,
        lat: payload.latitude,
    };

    let summary = ingest::ingest(&state, agent_id, position);

    Json(json!({
        "message": "location tracked successfully",
        "timestamp": summary.recorded_at,
        "updated_orders": summary.transitioned,
    }))
}
