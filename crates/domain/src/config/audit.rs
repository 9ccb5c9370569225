use serde::{Deserialize, Serialize};

fn d_visiting_hours() -> f64 {
    10.0
}

fn d_local_hours() -> f64 {
    15.0
}

fn d_lookback_months() -> i64 {
    3
}

fn d_slice_size() -> usize {
    10
}

fn d_block_size() -> usize {
    4
}

fn d_s1_exempt_days() -> i64 {
    90
}

fn d_max_prog_edits() -> u32 {
    15
}

fn d_prog_edit_min_gap_ms() -> u64 {
    600
}

/// Audit job model constants.
///
/// The lookback window is 3 months for *both* scopes; only the required
/// hours differ (10h visiting, 15h local). See DESIGN.md for the reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "d_visiting_hours")]
    pub visiting_hours_required: f64,
    #[serde(default = "d_local_hours")]
    pub local_hours_required: f64,
    #[serde(default = "d_lookback_months")]
    pub lookback_months: i64,
    #[serde(default = "d_slice_size")]
    pub slice_size: usize,
    #[serde(default = "d_block_size")]
    pub block_size: usize,
    #[serde(default = "d_s1_exempt_days")]
    pub s1_exempt_days: i64,
    #[serde(default = "d_max_prog_edits")]
    pub max_prog_edits_per_tick: u32,
    #[serde(default = "d_prog_edit_min_gap_ms")]
    pub prog_edit_min_gap_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            visiting_hours_required: d_visiting_hours(),
            local_hours_required: d_local_hours(),
            lookback_months: d_lookback_months(),
            slice_size: d_slice_size(),
            block_size: d_block_size(),
            s1_exempt_days: d_s1_exempt_days(),
            max_prog_edits_per_tick: d_max_prog_edits(),
            prog_edit_min_gap_ms: d_prog_edit_min_gap_ms(),
        }
    }
}
