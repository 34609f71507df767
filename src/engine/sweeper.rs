use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::state::AppState;

/// Periodically evicts revoked tokens whose natural expiry has passed, so
/// the revocation set does not grow without bound. An expired token is
/// rejected by validation regardless of whether it is still in the set.
pub async fn run_revocation_sweeper(state: Arc<AppState>, interval_secs: u64) {
    info!(interval_secs, "revocation sweeper started");

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;

        let removed = state.revoked_tokens.sweep(Utc::now());
        state
            .metrics
            .revoked_tokens
            .set(state.revoked_tokens.len() as i64);

        if removed > 0 {
            info!(removed, "swept expired tokens from revocation set");
        }
    }
}
