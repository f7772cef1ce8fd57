use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::state::SharedState;

/// Periodically drop expired and withdrawn queue entries.
pub async fn run(state: SharedState) {
    let period = state.config().matchmaking.sweep_interval.max(Duration::from_millis(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = state.queue().sweep_expired().await;
        if removed > 0 {
            info!(removed, "swept stale queue entries");
        } else {
            debug!("queue sweep found nothing to remove");
        }
    }
}
