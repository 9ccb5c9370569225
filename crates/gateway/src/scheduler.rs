//! In-process scheduler: cleanup, presence, the quarterly trigger, then an
//! audit tick, all sharing one `Store` load/flush cycle and one
//! `BudgetedFetcher`.
//!
//! Narrowed from per-schedule fan-out to a single fixed job guarded by
//! one `AtomicBool` in-flight flag, since at most one invocation is ever
//! expected concurrently.

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use rosterwatch_engine::{audit, cleanup, presence, quarterly};
use rosterwatch_store::{BudgetedFetcher, Store};
use tracing::{info, warn};

use crate::state::AppState;

pub struct TickSummary {
    pub cleanup_deleted: usize,
    pub presence_transitioned: usize,
    pub quarterly_enqueued: bool,
    pub audit_processed: usize,
}

/// Run one scheduler tick. Returns `None` if a tick is already in flight.
pub async fn tick(state: &AppState) -> Option<TickSummary> {
    if state
        .tick_in_flight
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        info!("scheduler tick skipped: previous tick still in flight");
        return None;
    }

    let result = run_tick(state).await;
    state.tick_in_flight.store(false, Ordering::SeqCst);
    Some(result)
}

async fn run_tick(state: &AppState) -> TickSummary {
    let fetcher = BudgetedFetcher::new(&state.config.budget);
    let mut store = Store::new(state.transport.clone());

    if let Err(e) = store.load().await {
        warn!(error = %e, "scheduler tick: store load failed, aborting");
        return TickSummary {
            cleanup_deleted: 0,
            presence_transitioned: 0,
            quarterly_enqueued: false,
            audit_processed: 0,
        };
    }

    let now = Utc::now();

    let cleanup_deleted = if cleanup::is_due(&store, state.config.cleanup.interval_secs, now.timestamp())
    {
        cleanup::run(&mut store, &fetcher, now.timestamp())
            .await
            .unwrap_or(0)
    } else {
        0
    };

    let presence_transitioned = match presence::run(&mut store, state.feed.as_ref()).await {
        Ok(snapshot) => snapshot.transitioned,
        Err(e) => {
            warn!(error = %e, "presence pass failed this tick");
            0
        }
    };

    let quarterly_enqueued = match quarterly::run(&mut store, now).await {
        Ok(enqueued) => enqueued,
        Err(e) => {
            warn!(error = %e, "quarterly trigger failed this tick");
            false
        }
    };

    let audit_processed = match audit::run_tick(&mut store, state.feed.as_ref(), &fetcher, &state.config.audit)
        .await
    {
        Ok(Some(outcome)) => outcome.processed,
        Ok(None) => 0,
        Err(e) => {
            warn!(error = %e, "audit tick failed");
            0
        }
    };

    if let Err(e) = store.flush("scheduler tick", &state.config.budget).await {
        warn!(error = %e, "scheduler tick: store flush failed, work discarded");
    }

    info!(
        cleanup_deleted,
        presence_transitioned, quarterly_enqueued, audit_processed, "scheduler tick complete"
    );

    TickSummary {
        cleanup_deleted,
        presence_transitioned,
        quarterly_enqueued,
        audit_processed,
    }
}

/// Drive `tick` on a fixed interval until the process exits.
pub async fn run_forever(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(state.config.schedule.tick_interval_secs));
    loop {
        interval.tick().await;
        tick(&state).await;
    }
}
