use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

/// Legal moves, declared once. `delivered` and `cancelled` are terminal;
/// `delivered` is only reachable from `reached`. Everything else, including
/// no-op transitions and cancellation from any non-terminal state, is
/// permitted for manual updates.
fn guard(from: OrderStatus, to: OrderStatus) -> Result<(), AppError> {
    if from.is_terminal() {
        return Err(AppError::IllegalTransition(format!(
            "order is already {} and cannot change status",
            from.as_str()
        )));
    }

    if to == OrderStatus::Delivered && from != OrderStatus::Reached {
        return Err(AppError::IllegalTransition(
            "order must be 'reached' before it can be 'delivered'".to_string(),
        ));
    }

    Ok(())
}

/// Single authority over `status`, `delivered_at` and `proof_image`. Both
/// the geofence path and the manual-update path funnel through here; the
/// commit is a compare-and-swap on the version read, so a concurrent writer
/// surfaces as `Conflict` rather than a silent overwrite.
pub fn transition(
    state: &AppState,
    order_id: Uuid,
    agent_id: Uuid,
    target: OrderStatus,
    proof: Option<String>,
) -> Result<Order, AppError> {
    let (order, version) = state
        .orders
        .get_owned(&order_id, agent_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let result = apply(order, target, proof)
        .and_then(|updated| state.orders.commit(order_id, version, updated));

    let outcome = match &result {
        Ok(_) => "success",
        Err(AppError::Conflict(_)) => "conflict",
        Err(_) => "illegal",
    };
    state
        .metrics
        .transitions_total
        .with_label_values(&[target.as_str(), outcome])
        .inc();

    result
}

fn apply(mut order: Order, target: OrderStatus, proof: Option<String>) -> Result<Order, AppError> {
    guard(order.status, target)?;

    order.status = target;
    if target == OrderStatus::Delivered {
        order.delivered_at = Some(Utc::now());
        if proof.is_some() {
            order.proof_image = proof;
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::order::GeoPoint;
    use crate::state::AppState;

    fn state() -> AppState {
        AppState::new("test-secret", std::env::temp_dir())
    }

    fn seed_order(state: &AppState, agent_id: Uuid, status: OrderStatus) -> Uuid {
        let order = Order {
            id: Uuid::new_v4(),
            customer_name: "Ravi".to_string(),
            customer_phone: 919876543210,
            delivery_address: "4 Brigade Road".to_string(),
            items: vec!["box".to_string()],
            destination: GeoPoint {
                lng: 77.5946,
                lat: 12.9716,
            },
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
    fn delivered_from_pending_is_illegal() {
        let state = state();
        let agent = Uuid::new_v4();
        let id = seed_order(&state, agent, OrderStatus::Pending);

        let err = transition(&state, id, agent, OrderStatus::Delivered, None).unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition(_)));
    }

    #[test]
    fn delivered_from_in_transit_is_illegal() {
        let state = state();
        let agent = Uuid::new_v4();
        let id = seed_order(&state, agent, OrderStatus::InTransit);

        let err = transition(&state, id, agent, OrderStatus::Delivered, None).unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition(_)));
    }

    #[test]
    fn delivered_from_reached_sets_timestamp_and_proof() {
        let state = state();
        let agent = Uuid::new_v4();
        let id = seed_order(&state, agent, OrderStatus::Reached);

        let order = transition(
            &state,
            id,
            agent,
            OrderStatus::Delivered,
            Some("/uploads/proof.jpg".to_string()),
        )
        .unwrap();

        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.delivered_at.is_some());
        assert_eq!(order.proof_image.as_deref(), Some("/uploads/proof.jpg"));
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let state = state();
        let agent = Uuid::new_v4();

        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            let id = seed_order(&state, agent, terminal);
            let err = transition(&state, id, agent, OrderStatus::InTransit, None).unwrap_err();
            assert!(matches!(err, AppError::IllegalTransition(_)));
        }
    }

    #[test]
    fn cancel_from_any_non_terminal_state_is_allowed() {
        let state = state();
        let agent = Uuid::new_v4();

        for from in [
            OrderStatus::Pending,
            OrderStatus::InTransit,
            OrderStatus::Reached,
        ] {
            let id = seed_order(&state, agent, from);
            let order = transition(&state, id, agent, OrderStatus::Cancelled, None).unwrap();
            assert_eq!(order.status, OrderStatus::Cancelled);
        }
    }

    #[test]
    fn unowned_order_reads_as_not_found() {
        let state = state();
        let owner = Uuid::new_v4();
        let id = seed_order(&state, owner, OrderStatus::Pending);

        let stranger = Uuid::new_v4();
        let err = transition(&state, id, stranger, OrderStatus::InTransit, None).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn no_op_transition_is_permitted() {
        let state = state();
        let agent = Uuid::new_v4();
        let id = seed_order(&state, agent, OrderStatus::Pending);

        let order = transition(&state, id, agent, OrderStatus::Pending, None).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.delivered_at.is_none());
    }
}
