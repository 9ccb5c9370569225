//! The store document's key namespace as typed Rust values.
//!
//! The document on disk stays a flat `HashMap<String, serde_json::Value>`
//! (the store façade's contract); this module is the tagged-variant layer
//! on top of it — one typed shape per key prefix, with a key-builder
//! function alongside each type, so callers never hand-format a key string.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cid::Cid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// watchlist
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const KEY_WATCHLIST: &str = "watchlist";

/// One watchlist entry. `added_at` is the actual insertion time, captured
/// once at add and never recomputed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub cid: Cid,
    pub added_at: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// online_state — a single key holding the whole CID→state map
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const KEY_ONLINE_STATE: &str = "online_state";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnlineInfo {
    pub callsign: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub last_seen: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnlineState {
    pub online: bool,
    pub last_change: i64,
    pub last_info: OnlineInfo,
}

/// Keyed by canonical CID string — JSON object keys are always strings.
pub type OnlineStateMap = BTreeMap<String, OnlineState>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// audit:job, audit:partial:<scope>
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const KEY_AUDIT_JOB: &str = "audit:job";

pub fn key_audit_partial(scope: Scope) -> String {
    format!("audit:partial:{scope}")
}

pub fn key_archived_audit(scope: Scope, cid: &Cid) -> String {
    format!("audit:{scope}:{cid}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Visiting,
    Local,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Visiting => f.write_str("visiting"),
            Scope::Local => f.write_str("local"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub scope: Scope,
    pub cids: Vec<Cid>,
    pub cursor: usize,
    pub total: usize,
    pub created_at: i64,
}

impl Job {
    pub fn new(scope: Scope, cids: Vec<Cid>, created_at: i64) -> Self {
        let total = cids.len();
        Self {
            scope,
            cids,
            cursor: 0,
            total,
            created_at,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.total
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PartialResult {
    pub cid: Cid,
    pub hours: f64,
    pub flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_session: Option<DateTime<Utc>>,
    pub computed_at: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exempt: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// cached lookups
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn key_rating(cid: &Cid) -> String {
    format!("rating:{cid}")
}

pub fn key_division(cid: &Cid) -> String {
    format!("division:{cid}")
}

pub fn key_member(cid: &Cid) -> String {
    format!("member:{cid}")
}

pub fn key_membermeta(cid: &Cid) -> String {
    format!("membermeta:{cid}")
}

/// TTL (seconds) for `rating:`/`division:`/`membermeta:` cache entries.
pub const LOOKUP_CACHE_TTL_SECS: i64 = 24 * 3600;
/// TTL (seconds) for the `member:` existence cache — longer-lived than
/// the other lookup caches since membership rarely changes.
pub const MEMBER_EXISTENCE_TTL_SECS: i64 = 7 * 24 * 3600;
/// TTL (seconds) for archived `audit:<scope>:<cid>` entries.
pub const ARCHIVED_AUDIT_TTL_SECS: i64 = 24 * 3600;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RatingEntry {
    pub rating: String,
    pub cached_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DivisionEntry {
    pub division: String,
    pub cached_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberEntry {
    pub exists: bool,
    pub cached_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberMetaEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub cached_at: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// cooldowns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const COOLDOWN_ONLINE_SECS: i64 = 15 * 60;
pub const COOLDOWN_OFFLINE_SECS: i64 = 15 * 60;
pub const COOLDOWN_FLAG_SECS: i64 = 24 * 3600;

pub fn key_cooldown_online(cid: &Cid, callsign_upper: &str) -> String {
    format!("cooldown:online:{cid}:{callsign_upper}")
}

pub fn key_cooldown_offline(cid: &Cid) -> String {
    format!("cooldown:offline:{cid}")
}

pub fn key_cooldown_flag(cid: &Cid) -> String {
    format!("cooldown:flag:{cid}")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CooldownMarker {
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// quarterly auto-run marker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn key_quarter_auto(quarter_key: &str) -> String {
    format!("quarter:auto:{quarter_key}")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuarterMarker {
    pub done: bool,
    pub at: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// cleanup bookkeeping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const KEY_LAST_CLEANUP: &str = "_last_cleanup";
