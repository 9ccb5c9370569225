//! Per-invocation outbound-call budget.
//!
//! One `BudgetedFetcher` is constructed at tick/request entry and discarded
//! at exit, counting subrequests spent against the tick rather than
//! in-flight runs.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rosterwatch_domain::config::BudgetConfig;
use rosterwatch_domain::Error;
use tracing::warn;

pub struct BudgetedFetcher {
    subreqs: AtomicU32,
    budget: u32,
    deadline: Instant,
    fetch_timeout: Duration,
}

/// A fetch attempt refused before it was even launched, because the
/// remaining call or time budget couldn't cover it. Not an error — the
/// caller treats this exactly like a transient miss.
#[derive(Debug)]
pub struct BudgetExhausted;

impl BudgetedFetcher {
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            subreqs: AtomicU32::new(0),
            budget: config.subreq_budget_per_tick,
            deadline: Instant::now() + Duration::from_millis(config.tick_wall_clock_ms),
            fetch_timeout: Duration::from_millis(config.fetch_timeout_ms),
        }
    }

    pub fn subreqs_used(&self) -> u32 {
        self.subreqs.load(Ordering::SeqCst)
    }

    pub fn time_remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_tick_time_exhausted(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Reserve one subrequest slot. Returns `Err(BudgetExhausted)` without
    /// side effects if the budget or the remaining tick time can't cover
    /// a call bounded by `fetch_timeout`.
    fn try_reserve(&self) -> Result<(), BudgetExhausted> {
        if self.is_tick_time_exhausted() {
            return Err(BudgetExhausted);
        }
        if self.time_remaining() < self.fetch_timeout {
            return Err(BudgetExhausted);
        }
        let mut current = self.subreqs.load(Ordering::SeqCst);
        loop {
            if current >= self.budget {
                return Err(BudgetExhausted);
            }
            match self.subreqs.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Single-attempt data-plane fetch: no retry, just a timeout. Returns
    /// `None` on budget exhaustion or on any transport-level error, timeout
    /// included — the caller treats it as no data this tick.
    pub async fn fetch_once<F, Fut, T>(&self, op: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        if self.try_reserve().is_err() {
            return None;
        }
        match tokio::time::timeout(self.fetch_timeout, op()).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(error = %e, "data-plane fetch failed, treating as no data this tick");
                None
            }
            Err(_) => {
                warn!("data-plane fetch timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosterwatch_domain::config::BudgetConfig;

    fn config() -> BudgetConfig {
        BudgetConfig {
            subreq_budget_per_tick: 2,
            tick_wall_clock_ms: 5_000,
            fetch_timeout_ms: 10,
            store_write_max_attempts: 3,
            store_write_backoff_initial_ms: 1,
            store_write_backoff_cap_ms: 5,
        }
    }

    #[tokio::test]
    async fn exhausts_call_budget() {
        let fetcher = BudgetedFetcher::new(&config());
        let first = fetcher.fetch_once(|| async { Ok::<_, Error>(1) }).await;
        let second = fetcher.fetch_once(|| async { Ok::<_, Error>(2) }).await;
        let third = fetcher.fetch_once(|| async { Ok::<_, Error>(3) }).await;
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
        assert_eq!(third, None);
    }
}
