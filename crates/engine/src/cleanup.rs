//! Store cleanup: periodic pruning of expired cache entries.

use chrono::Utc;
use rosterwatch_domain::schema::KEY_LAST_CLEANUP;
use rosterwatch_domain::Error;
use rosterwatch_store::{BudgetedFetcher, ContentStoreTransport, Store};
use serde_json::Value;
use tracing::info;

/// `true` iff a sweep is due: `now - _last_cleanup >= interval_secs`.
pub fn is_due<T: ContentStoreTransport>(store: &Store<T>, interval_secs: u64, now: i64) -> bool {
    let last = store
        .get(KEY_LAST_CLEANUP)
        .and_then(Value::as_i64)
        .unwrap_or(0);
    now - last >= interval_secs as i64
}

/// Sweep expired cache entries. Bounded by the tick's remaining budget —
/// entries are idempotent to delete, so a partial sweep is safe; it picks
/// up where it left off next time `is_due` fires.
pub async fn run<T: ContentStoreTransport>(
    store: &mut Store<T>,
    fetcher: &BudgetedFetcher,
    now: i64,
) -> Result<usize, Error> {
    let keys: Vec<String> = store.keys().cloned().collect();
    let mut deleted = 0usize;

    for key in keys {
        if fetcher.is_tick_time_exhausted() {
            break;
        }
        let Some(value) = store.get(&key).cloned() else {
            continue;
        };
        if should_delete(&key, &value, now) {
            store.del(&key);
            deleted += 1;
        }
    }

    store.set(KEY_LAST_CLEANUP, Value::from(now));
    info!(deleted, "store cleanup sweep complete");
    Ok(deleted)
}

fn should_delete(key: &str, value: &Value, now: i64) -> bool {
    if key == KEY_LAST_CLEANUP {
        return false;
    }
    if let Some(expires_at) = value.get("expiresAt").and_then(Value::as_i64) {
        return expires_at < now;
    }
    if let Some(cached_at) = value.get("cached_at").and_then(Value::as_i64) {
        let ttl = ttl_for_key(key);
        return cached_at + 2 * ttl < now;
    }
    false
}

fn ttl_for_key(key: &str) -> i64 {
    use rosterwatch_domain::schema::{
        ARCHIVED_AUDIT_TTL_SECS, LOOKUP_CACHE_TTL_SECS, MEMBER_EXISTENCE_TTL_SECS,
    };
    if key.starts_with("member:") {
        MEMBER_EXISTENCE_TTL_SECS
    } else if key.starts_with("audit:") && key.matches(':').count() == 2 {
        ARCHIVED_AUDIT_TTL_SECS
    } else {
        LOOKUP_CACHE_TTL_SECS
    }
}
