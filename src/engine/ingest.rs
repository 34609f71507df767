use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::geofence::orders_within_reach;
use crate::engine::lifecycle;
use crate::models::order::{GeoPoint, OrderStatus};
use crate::models::ping::LocationPing;
use crate::state::AppState;

pub struct IngestSummary {
    pub recorded_at: DateTime<Utc>,
    pub transitioned: usize,
}

/// Records a ping, evaluates the geofence against the agent's open orders
/// and attempts a `reached` transition for each qualifying one. A per-order
/// failure (typically a write race with a concurrent manual update) is
/// logged and skipped; ingestion always succeeds once the ping is recorded.
pub fn ingest(state: &AppState, agent_id: Uuid, position: GeoPoint) -> IngestSummary {
    let start = Instant::now();

    let ping = LocationPing {
        agent_id,
        location: position,
        recorded_at: Utc::now(),
    };
    let recorded_at = ping.recorded_at;
    state.pings.append(ping);
    state.metrics.pings_total.inc();

    let mut transitioned = 0;
    for (order, distance) in orders_within_reach(state, agent_id, &position) {
        match lifecycle::transition(state, order.id, agent_id, OrderStatus::Reached, None) {
            Ok(_) => {
                transitioned += 1;
                info!(order_id = %order.id, distance_m = distance, "order reached destination");
            }
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "skipping geofence transition");
            }
        }
    }

    state
        .metrics
        .ingest_latency_seconds
        .observe(start.elapsed().as_secs_f64());

    IngestSummary {
        recorded_at,
        transitioned,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::order::Order;

    fn state() -> AppState {
        AppState::new("test-secret", std::env::temp_dir())
    }

    const DEST: GeoPoint = GeoPoint {
        lng: 77.5946,
        lat: 12.9716,
    };

    fn seed_order(state: &AppState, agent_id: Uuid, status: OrderStatus) -> Uuid {
        let order = Order {
            id: Uuid::new_v4(),
            customer_name: "Kiran".to_string(),
            customer_phone: 917766554433,
            delivery_address: "2 Church Street".to_string(),
            items: vec!["crate".to_string()],
            destination: DEST,
            status,
            agent_id: Some(agent_id),
            proof_image: None,
            created_at: Utc::now(),
            delivered_at: None,
        };
        let id = order.id;
        state.orders.insert(order);
        id
    }

    #[test]
    fn ping_within_radius_flips_order_to_reached() {
        let state = state();
        let agent = Uuid::new_v4();
        let id = seed_order(&state, agent, OrderStatus::InTransit);

        let summary = ingest(&state, agent, DEST);
        assert_eq!(summary.transitioned, 1);
        assert_eq!(state.orders.get(&id).unwrap().status, OrderStatus::Reached);
        assert_eq!(state.pings.count(), 1);
    }

    #[test]
    fn repeated_pings_fire_exactly_one_transition() {
        let state = state();
        let agent = Uuid::new_v4();
        seed_order(&state, agent, OrderStatus::InTransit);

        assert_eq!(ingest(&state, agent, DEST).transitioned, 1);
        assert_eq!(ingest(&state, agent, DEST).transitioned, 0);
        assert_eq!(ingest(&state, agent, DEST).transitioned, 0);
        assert_eq!(state.pings.count(), 3);
    }

    #[test]
    fn out_of_range_ping_records_but_transitions_nothing() {
        let state = state();
        let agent = Uuid::new_v4();
        let id = seed_order(&state, agent, OrderStatus::InTransit);

        let away = GeoPoint {
            lng: 77.6000,
            lat: 12.9800,
        };
        let summary = ingest(&state, agent, away);
        assert_eq!(summary.transitioned, 0);
        assert_eq!(
            state.orders.get(&id).unwrap().status,
            OrderStatus::InTransit
        );
        assert_eq!(state.pings.count(), 1);
    }
}
