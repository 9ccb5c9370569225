use serde::{Deserialize, Serialize};

fn d_subreq_budget() -> u32 {
    120
}

fn d_tick_wall_clock_ms() -> u64 {
    12_000
}

fn d_fetch_timeout_ms() -> u64 {
    25_000
}

fn d_store_write_max_attempts() -> u32 {
    3
}

fn d_store_write_backoff_initial_ms() -> u64 {
    700
}

fn d_store_write_backoff_cap_ms() -> u64 {
    15_000
}

/// Per-tick budget discipline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "d_subreq_budget")]
    pub subreq_budget_per_tick: u32,
    #[serde(default = "d_tick_wall_clock_ms")]
    pub tick_wall_clock_ms: u64,
    #[serde(default = "d_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "d_store_write_max_attempts")]
    pub store_write_max_attempts: u32,
    #[serde(default = "d_store_write_backoff_initial_ms")]
    pub store_write_backoff_initial_ms: u64,
    #[serde(default = "d_store_write_backoff_cap_ms")]
    pub store_write_backoff_cap_ms: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            subreq_budget_per_tick: d_subreq_budget(),
            tick_wall_clock_ms: d_tick_wall_clock_ms(),
            fetch_timeout_ms: d_fetch_timeout_ms(),
            store_write_max_attempts: d_store_write_max_attempts(),
            store_write_backoff_initial_ms: d_store_write_backoff_initial_ms(),
            store_write_backoff_cap_ms: d_store_write_backoff_cap_ms(),
        }
    }
}
