//! Shared application state passed to every HTTP handler and to the
//! in-process scheduler.
//!
//! The store and the feed are held behind `Arc<dyn Trait>` rather than as
//! a live `Store`/connection — a `Store` is a per-invocation façade:
//! constructed, loaded, mutated, flushed, dropped. `AppState` only owns
//! what's cheap to share: the transport and the feed client. Each handler
//! and each scheduler tick builds its own `Store::new(state.transport.clone())`.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rosterwatch_domain::config::Config;
use rosterwatch_engine::feed::DataFeed;
use rosterwatch_store::ContentStoreTransport;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub transport: Arc<dyn ContentStoreTransport>,
    pub feed: Arc<dyn DataFeed>,
    /// Single-flight guard for the scheduler tick — at most one scheduled
    /// invocation is expected concurrently.
    pub tick_in_flight: Arc<AtomicBool>,
}
