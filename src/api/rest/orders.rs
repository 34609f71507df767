use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::rest::agents::validate_phone;
use crate::auth::extract::CurrentAgent;
use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::agent::AgentStatus;
use crate::models::order::{GeoPoint, Order, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/current", get(current_orders))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/orders/:id/complete", post(complete_order))
        .route("/stats/orders", get(order_stats))
        .route("/admin/orders", post(create_order))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub customer_phone: u64,
    pub delivery_address: String,
    pub items: Vec<String>,
    pub agent_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub status: OrderStatus,
}

/// Boundary representation: latitude/longitude as named fields, converted
/// from the internal longitude-first pair here and nowhere else.
#[derive(Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_phone: u64,
    pub delivery_address: String,
    pub items: Vec<String>,
    pub status: OrderStatus,
    pub agent_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    pub proof_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone,
            delivery_address: order.delivery_address.clone(),
            items: order.items.clone(),
            status: order.status,
            agent_id: order.agent_id,
            latitude: order.destination.lat,
            longitude: order.destination.lng,
            proof_image: order.proof_image.clone(),
            created_at: order.created_at,
            delivered_at: order.delivered_at,
        }
    }
}

#[derive(Serialize)]
pub struct OrderStats {
    pub today: usize,
    pub this_week: usize,
    pub this_month: usize,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    validate_phone(payload.customer_phone)?;

    if payload.items.is_empty() {
        return Err(AppError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }

    if let Some(agent_id) = payload.agent_id {
        let agent = state
            .agents
            .get(&agent_id)
            .ok_or_else(|| AppError::NotFound(format!("agent {agent_id} not found")))?;

        if agent.status != AgentStatus::Active {
            return Err(AppError::Validation(
                "agent is inactive and cannot be assigned orders".to_string(),
            ));
        }
    }

    let order = Order {
        id: Uuid::new_v4(),
        customer_name: payload.customer_name,
        customer_phone: payload.customer_phone,
        delivery_address: payload.delivery_address,
        items: payload.items,
        destination: GeoPoint {
            lng: payload.longitude,
            lat: payload.latitude,
        },
        status: OrderStatus::Pending,
        agent_id: payload.agent_id,
        proof_image: None,
        created_at: Utc::now(),
        delivered_at: None,
    };

    let response = OrderResponse::from(&order);
    state.orders.insert(order);
    Ok(Json(response))
}

/// Open orders plus anything delivered within the last 24 hours.
async fn current_orders(
    State(state): State<Arc<AppState>>,
    CurrentAgent(agent_id): CurrentAgent,
) -> Json<Vec<OrderResponse>> {
    let cutoff = Utc::now() - Duration::hours(24);

    let orders = state
        .orders
        .find_for_agent(agent_id, |order| match order.status {
            OrderStatus::Pending | OrderStatus::InTransit | OrderStatus::Reached => true,
            OrderStatus::Delivered => order.delivered_at.is_some_and(|at| at >= cutoff),
            OrderStatus::Cancelled => false,
        })
        .iter()
        .map(|(order, _)| OrderResponse::from(order))
        .collect();

    Json(orders)
}

async fn order_stats(
    State(state): State<Arc<AppState>>,
    CurrentAgent(agent_id): CurrentAgent,
) -> Result<Json<OrderStats>, AppError> {
    let today = Utc::now().date_naive();
    let today_start = today.and_time(NaiveTime::MIN).and_utc();
    let week_start = (today
        - chrono::Days::new(u64::from(today.weekday().num_days_from_monday())))
    .and_time(NaiveTime::MIN)
    .and_utc();
    let month_start = today
        .with_day(1)
        .ok_or_else(|| AppError::Internal("failed to compute month start".to_string()))?
        .and_time(NaiveTime::MIN)
        .and_utc();

    let delivered = state.orders.find_for_agent(agent_id, |order| {
        order.status == OrderStatus::Delivered
    });

    let delivered_since = |since: DateTime<Utc>| {
        delivered
            .iter()
            .filter(|(order, _)| order.delivered_at.is_some_and(|at| at >= since))
            .count()
    };

    Ok(Json(OrderStats {
        today: delivered_since(today_start),
        this_week: delivered_since(week_start),
        this_month: delivered_since(month_start),
    }))
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    CurrentAgent(agent_id): CurrentAgent,
    Path(id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = lifecycle::transition(&state, id, agent_id, query.status, None)?;
    Ok(Json(OrderResponse::from(&order)))
}

async fn complete_order(
    State(state): State<Arc<AppState>>,
    CurrentAgent(agent_id): CurrentAgent,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    // Reject before touching the filesystem: the order must exist, be ours
    // and be reached. The transition below re-checks under the write lock.
    let (order, _version) = state
        .orders
        .get_owned(&id, agent_id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    if order.status != OrderStatus::Reached {
        return Err(AppError::IllegalTransition(
            "order must be 'reached' before completion".to_string(),
        ));
    }

    let mut proof: Option<(String, axum::body::Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::Validation(format!("invalid multipart payload: {err}")))?
    {
        if field.name() == Some("file") {
            let extension = field
                .file_name()
                .and_then(|name| name.rsplit('.').next())
                .unwrap_or("jpg")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::Validation(format!("failed to read proof: {err}")))?;
            proof = Some((extension, bytes));
        }
    }

    let (extension, bytes) =
        proof.ok_or_else(|| AppError::Validation("missing proof file".to_string()))?;

    let filename = format!("{id}_{}.{extension}", Utc::now().timestamp());
    let path = state.upload_dir.join(&filename);

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|err| AppError::Internal(format!("failed to create upload dir: {err}")))?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|err| AppError::Internal(format!("failed to store proof: {err}")))?;

    let proof_ref = format!("/uploads/{filename}");
    // The blob is written before the status commits. If the transition
    // conflicts with a concurrent writer, the file stays behind with no
    // `proof_image` referencing it; the uploads store is append-only and
    // never reclaimed, so an unreferenced blob is inert.
    let order = lifecycle::transition(
        &state,
        id,
        agent_id,
        OrderStatus::Delivered,
        Some(proof_ref),
    )?;

    Ok(Json(json!({
        "message": "order completed successfully",
        "proof_image": order.proof_image,
    })))
}
