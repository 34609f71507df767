use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::GeoPoint;

/// Append-only record of a position update. Never updated or deleted; only
/// the latest ping in an ingestion call drives geofence evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPing {
    pub agent_id: Uuid,
    pub location: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}
