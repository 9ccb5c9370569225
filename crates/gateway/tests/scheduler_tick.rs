//! Scheduler tick integration test: single-flight guard + store round-trip.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rosterwatch::scheduler;
use rosterwatch::state::AppState;
use rosterwatch_domain::config::Config;
use rosterwatch_engine::feed::fake::FakeDataFeed;
use rosterwatch_store::transport::memory::MemoryTransport;

fn test_state() -> AppState {
    AppState {
        config: Arc::new(Config::default()),
        transport: Arc::new(MemoryTransport::empty()),
        feed: Arc::new(FakeDataFeed::default()),
        tick_in_flight: Arc::new(AtomicBool::new(false)),
    }
}

#[tokio::test]
async fn tick_on_empty_store_completes_with_no_work() {
    let state = test_state();
    let summary = scheduler::tick(&state).await.expect("tick should run");
    assert_eq!(summary.cleanup_deleted, 0);
    assert_eq!(summary.presence_transitioned, 0);
    assert!(!summary.quarterly_enqueued);
    assert_eq!(summary.audit_processed, 0);
}

#[tokio::test]
async fn concurrent_tick_is_skipped_while_one_in_flight() {
    let state = test_state();
    state.tick_in_flight.store(true, std::sync::atomic::Ordering::SeqCst);
    let summary = scheduler::tick(&state).await;
    assert!(summary.is_none());
}
