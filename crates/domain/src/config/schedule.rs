use serde::{Deserialize, Serialize};

fn d_tick_interval_secs() -> u64 {
    300
}

fn d_cleanup_interval_secs() -> u64 {
    6 * 3600
}

/// In-process scheduler cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "d_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: d_tick_interval_secs(),
        }
    }
}

/// Store cleanup cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "d_cleanup_interval_secs")]
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: d_cleanup_interval_secs(),
        }
    }
}
