// =============================================================================
// Auto-refresh scheduler
// =============================================================================
//
// Runs one refresh cycle at startup, then one per refresh period. Cycles are
// spawned rather than awaited, so a slow cycle never delays the next tick and
// cycles may overlap; the epoch checks in AppState and ChartCache keep a late
// cycle from overwriting a newer one.
//
// Changing the period wakes the loop, which restarts the wait with the new
// period. No cycle is triggered or cancelled by the change itself.
// =============================================================================

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::symbol_aggregator::run_refresh_cycle;

pub fn spawn(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: Arc<AppState>) {
    info!(period_secs = state.refresh_interval().as_secs(), "auto-refresh scheduler starting");
    spawn_cycle(&state);

    loop {
        let period = state.refresh_interval();
        tokio::select! {
            _ = tokio::time::sleep(period) => {
                debug!(period_secs = period.as_secs(), "auto-refresh tick");
                spawn_cycle(&state);
            }
            _ = state.schedule_changed.notified() => {
                info!(
                    period_secs = state.refresh_interval().as_secs(),
                    "auto-refresh rescheduled"
                );
            }
        }
    }
}

fn spawn_cycle(state: &Arc<AppState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        run_refresh_cycle(&state).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests::test_state;
    use crate::market_data::source::testing::StaticSource;
    use std::time::Duration;

    #[tokio::test]
    async fn initial_cycle_runs_immediately() {
        let closes: Vec<f64> = (0..60).map(|i| 10.0 + i as f64).collect();
        let source = StaticSource::new().with_symbol("BTCUSDT", 70.0, &closes, &["1d", "4h", "1h", "15m"]);
        let state = Arc::new(test_state("scheduler", &["BTCUSDT"], source));

        let handle = spawn(Arc::clone(&state));
        let published = tokio::time::timeout(Duration::from_secs(5), async {
            while state.dashboard.read().epoch == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        handle.abort();

        assert!(published.is_ok(), "first cycle never published");
        let snap = state.build_snapshot();
        assert_eq!(snap.rows.len(), 1);
        assert!(!snap.rows[0].is_failed());
        assert!(state.chart_cache.get("BTCUSDT", "15m").is_some());
    }
}
