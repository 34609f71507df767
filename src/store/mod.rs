use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::Order;
use crate::models::ping::LocationPing;

/// Orders keyed by id with a write version. All status mutations commit
/// through [`OrderStore::commit`], which compare-and-swaps on the version a
/// caller read, so a geofence-triggered transition and a concurrent manual
/// one cannot both silently apply.
#[derive(Default)]
pub struct OrderStore {
    records: DashMap<Uuid, VersionedOrder>,
}

struct VersionedOrder {
    order: Order,
    version: u64,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        self.records.insert(
            order.id,
            VersionedOrder { order, version: 0 },
        );
    }

    pub fn get(&self, order_id: &Uuid) -> Option<Order> {
        self.records.get(order_id).map(|entry| entry.order.clone())
    }

    /// Snapshot of an order owned by the given agent, with the version to
    /// pass back to [`commit`]. Ownership misses read as absent.
    pub fn get_owned(&self, order_id: &Uuid, agent_id: Uuid) -> Option<(Order, u64)> {
        self.records.get(order_id).and_then(|entry| {
            if entry.order.agent_id == Some(agent_id) {
                Some((entry.order.clone(), entry.version))
            } else {
                None
            }
        })
    }

    pub fn find_for_agent<F>(&self, agent_id: Uuid, filter: F) -> Vec<(Order, u64)>
    where
        F: Fn(&Order) -> bool,
    {
        self.records
            .iter()
            .filter(|entry| entry.order.agent_id == Some(agent_id) && filter(&entry.order))
            .map(|entry| (entry.order.clone(), entry.version))
            .collect()
    }

    /// Writes `updated` iff the stored version still matches `expected`.
    /// A mismatch means another writer committed in between.
    pub fn commit(
        &self,
        order_id: Uuid,
        expected_version: u64,
        updated: Order,
    ) -> Result<Order, AppError> {
        let mut entry = self
            .records
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if entry.version != expected_version {
            return Err(AppError::Conflict(format!(
                "order {order_id} was modified concurrently"
            )));
        }

        entry.order = updated.clone();
        entry.version += 1;
        Ok(updated)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Append-only log of position updates, grouped per agent. Records are never
/// updated or deleted.
#[derive(Default)]
pub struct PingLog {
    entries: DashMap<Uuid, Vec<LocationPing>>,
}

impl PingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, ping: LocationPing) {
        self.entries.entry(ping.agent_id).or_default().push(ping);
    }

    pub fn count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }
}

/// Tokens explicitly invalidated by logout, checked before signature
/// verification on every protected call. Each entry carries the token's
/// natural expiry so [`sweep`] can evict it once rejection would happen on
/// expiry grounds anyway.
#[derive(Default)]
pub struct RevokedTokens {
    entries: DashMap<String, DateTime<Utc>>,
}

impl RevokedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: &str, expires_at: DateTime<Utc>) {
        self.entries.insert(token.to_string(), expires_at);
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
