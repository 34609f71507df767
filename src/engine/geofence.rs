use uuid::Uuid;

use crate::geo::haversine_m;
use crate::models::order::{GeoPoint, Order, OrderStatus};
use crate::state::AppState;

/// Fixed proximity radius that auto-triggers the `reached` transition.
pub const GEOFENCE_RADIUS_M: f64 = 100.0;

/// Orders of the given agent that a ping at `position` brings within the
/// geofence. Only `pending` and `in_transit` orders are candidates; orders
/// already `reached` or terminal never re-trigger, so repeated pings inside
/// the radius fire the transition exactly once. Evaluated fresh per ping,
/// no hysteresis.
pub fn orders_within_reach(
    state: &AppState,
    agent_id: Uuid,
    position: &GeoPoint,
) -> Vec<(Order, f64)> {
    state
        .orders
        .find_for_agent(agent_id, |order| {
            matches!(order.status, OrderStatus::Pending | OrderStatus::InTransit)
        })
        .into_iter()
        .filter_map(|(order, _version)| {
            let distance = haversine_m(position, &order.destination);
            (distance <= GEOFENCE_RADIUS_M).then_some((order, distance))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn state() -> AppState {
        AppState::new("test-secret", std::env::temp_dir())
    }

    fn seed_order(state: &AppState, agent_id: Uuid, status: OrderStatus, dest: GeoPoint) -> Uuid {
        let order = Order {
            id: Uuid::new_v4(),
            customer_name: "Meera".to_string(),
            customer_phone: 918877665544,
            delivery_address: "7 Residency Road".to_string(),
            items: vec!["envelope".to_string()],
            destination: dest,
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

    const DEST: GeoPoint = GeoPoint {
        lng: 77.5946,
        lat: 12.9716,
    };

    #[test]
    fn ping_at_destination_qualifies() {
        let state = state();
        let agent = Uuid::new_v4();
        let id = seed_order(&state, agent, OrderStatus::InTransit, DEST);

        let hits = orders_within_reach(&state, agent, &DEST);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, id);
        assert!(hits[0].1 <= GEOFENCE_RADIUS_M);
    }

    #[test]
    fn ping_a_kilometre_away_does_not_qualify() {
        let state = state();
        let agent = Uuid::new_v4();
        seed_order(&state, agent, OrderStatus::InTransit, DEST);

        let away = GeoPoint {
            lng: 77.6000,
            lat: 12.9800,
        };
        assert!(orders_within_reach(&state, agent, &away).is_empty());
    }

    #[test]
    fn settled_statuses_are_never_candidates() {
        let state = state();
        let agent = Uuid::new_v4();

        for status in [
            OrderStatus::Reached,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            seed_order(&state, agent, status, DEST);
        }

        assert!(orders_within_reach(&state, agent, &DEST).is_empty());
    }

    #[test]
    fn other_agents_orders_are_ignored() {
        let state = state();
        let agent = Uuid::new_v4();
        seed_order(&state, Uuid::new_v4(), OrderStatus::Pending, DEST);

        assert!(orders_within_reach(&state, agent, &DEST).is_empty());
    }
}
