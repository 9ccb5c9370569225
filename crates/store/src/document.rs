//! The store façade: load/get/set/del/flush over one JSON document under
//! optimistic concurrency, plus TTL-aware cache helpers.
//!
//! Lifecycle is bounded to one invocation — created at tick/request entry,
//! flushed once at exit — rather than an ambient mutable module-level cache.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use rosterwatch_domain::config::BudgetConfig;
use rosterwatch_domain::Error;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::transport::{ContentStoreTransport, GetOutcome, PutOutcome};

pub struct Store<T: ContentStoreTransport> {
    transport: T,
    loaded: bool,
    version: Option<String>,
    doc: Map<String, Value>,
    dirty: bool,
    /// Local edits since load, `None` meaning "deleted". Replayed over the
    /// remote document on a 409, local-wins, as a shallow merge.
    touched: HashMap<String, Option<Value>>,
}

impl<T: ContentStoreTransport> Store<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            loaded: false,
            version: None,
            doc: Map::new(),
            dirty: false,
            touched: HashMap::new(),
        }
    }

    /// Idempotent within an invocation — a second call is a no-op.
    pub async fn load(&mut self) -> Result<(), Error> {
        if self.loaded {
            return Ok(());
        }
        match self.transport.get().await? {
            GetOutcome::Found { bytes, version } => {
                let value: Value = serde_json::from_slice(&bytes)?;
                self.doc = value.as_object().cloned().unwrap_or_default();
                self.version = Some(version);
            }
            GetOutcome::NotFound => {
                self.doc = Map::new();
                self.version = None;
            }
        }
        self.loaded = true;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }

    pub fn get_typed<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, Error> {
        match self.doc.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.doc.insert(key.clone(), value.clone());
        self.touched.insert(key, Some(value));
        self.dirty = true;
    }

    pub fn set_typed<V: Serialize>(&mut self, key: impl Into<String>, value: &V) -> Result<(), Error> {
        self.set(key, serde_json::to_value(value)?);
        Ok(())
    }

    pub fn del(&mut self, key: &str) {
        self.doc.remove(key);
        self.touched.insert(key.to_string(), None);
        self.dirty = true;
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.doc.keys()
    }

    /// Returns the cached entry iff `cached_at` is within `max_age_secs`.
    pub fn cache_get(&self, key: &str, max_age_secs: i64) -> Option<&Value> {
        let entry = self.doc.get(key)?;
        let cached_at = entry.get("cached_at")?.as_i64()?;
        let now = Utc::now().timestamp();
        if now - cached_at <= max_age_secs {
            Some(entry)
        } else {
            None
        }
    }

    pub fn cache_put(&mut self, key: impl Into<String>, mut obj: Value) {
        let now = Utc::now().timestamp();
        if let Some(map) = obj.as_object_mut() {
            map.insert("cached_at".to_string(), Value::from(now));
        }
        self.set(key, obj);
    }

    /// Flush dirty state, if any, retrying up to
    /// `budget.store_write_max_attempts` times with exponential backoff.
    /// On a version conflict (409/422), re-fetch and shallow-merge local
    /// edits over the remote document (local wins). On a transient failure
    /// (403/429/5xx), just retry the same write, honouring any
    /// `Retry-After` hint in place of the computed backoff.
    pub async fn flush(&mut self, message: &str, budget: &BudgetConfig) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }

        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(budget.store_write_backoff_initial_ms);
        let cap = Duration::from_millis(budget.store_write_backoff_cap_ms);

        loop {
            attempt += 1;
            let bytes = serde_json::to_vec(&Value::Object(self.doc.clone()))?;
            match self
                .transport
                .put_if_match(self.version.as_deref(), bytes, message)
                .await?
            {
                PutOutcome::Ok { version } => {
                    self.version = Some(version);
                    self.dirty = false;
                    self.touched.clear();
                    return Ok(());
                }
                PutOutcome::Conflict(conflict) => {
                    if attempt >= budget.store_write_max_attempts {
                        return Err(Error::StoreConflict(
                            "exhausted merge-retry attempts on store flush".into(),
                        ));
                    }
                    warn!(attempt, "store flush conflict, merging local edits over remote");
                    let remote: Value = serde_json::from_slice(&conflict.remote_bytes)?;
                    let mut merged = remote.as_object().cloned().unwrap_or_default();
                    for (key, value) in &self.touched {
                        match value {
                            Some(v) => {
                                merged.insert(key.clone(), v.clone());
                            }
                            None => {
                                merged.remove(key);
                            }
                        }
                    }
                    self.doc = merged;
                    self.version = Some(conflict.remote_version);
                    tokio::time::sleep(backoff.min(cap)).await;
                    backoff = (backoff * 2).min(cap);
                }
                PutOutcome::Retryable { retry_after } => {
                    if attempt >= budget.store_write_max_attempts {
                        return Err(Error::StoreFatal(
                            "exhausted retry attempts on transient store write failure".into(),
                        ));
                    }
                    let wait = retry_after.unwrap_or(backoff).min(cap);
                    warn!(attempt, ?wait, "store flush hit a transient failure, retrying");
                    tokio::time::sleep(wait).await;
                    backoff = (backoff * 2).min(cap);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryTransport;
    use serde_json::json;

    fn config() -> BudgetConfig {
        BudgetConfig {
            subreq_budget_per_tick: 120,
            tick_wall_clock_ms: 12_000,
            fetch_timeout_ms: 25_000,
            store_write_max_attempts: 3,
            store_write_backoff_initial_ms: 1,
            store_write_backoff_cap_ms: 5,
        }
    }

    #[tokio::test]
    async fn first_load_on_empty_store_is_empty_doc() {
        let mut store = Store::new(MemoryTransport::empty());
        store.load().await.unwrap();
        assert!(store.get("watchlist").is_none());
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn set_then_flush_then_reload_round_trips() {
        let transport = MemoryTransport::empty();
        let mut store = Store::new(transport);
        store.load().await.unwrap();
        store.set("watchlist", json!([{"cid": "123456", "added_at": 1}]));
        store.flush("test", &config()).await.unwrap();
        assert!(!store.is_dirty());
        assert_eq!(
            store.get("watchlist").unwrap(),
            &json!([{"cid": "123456", "added_at": 1}])
        );
    }

    #[tokio::test]
    async fn cache_get_respects_ttl() {
        let mut store = Store::new(MemoryTransport::empty());
        store.load().await.unwrap();
        store.cache_put("rating:123456", json!({"rating": "S1"}));
        assert!(store.cache_get("rating:123456", 3600).is_some());
        // An entry with a stale cached_at falls outside the window.
        let stale_at = Utc::now().timestamp() - 10_000;
        store.set("rating:999999", json!({"rating": "S2", "cached_at": stale_at}));
        assert!(store.cache_get("rating:999999", 3600).is_none());
    }

    #[tokio::test]
    async fn conflict_merges_local_over_remote() {
        let shared = std::sync::Arc::new(MemoryTransport::empty());

        let mut seeder = Store::new(shared.clone());
        seeder.load().await.unwrap();
        seeder.set("watchlist", json!([]));
        seeder.set("online_state", json!({"111111": {"online": true}}));
        seeder.flush("seed", &config()).await.unwrap();

        // Two loaders both start from the seeded version.
        let mut writer_a = Store::new(shared.clone());
        writer_a.load().await.unwrap();
        let mut writer_b = Store::new(shared.clone());
        writer_b.load().await.unwrap();

        // A flushes first, moving the remote version forward...
        writer_a.set("watchlist", json!([{"cid": "222222", "added_at": 1}]));
        writer_a.flush("a", &config()).await.unwrap();

        // ...so B's flush conflicts, but B's disjoint edit to a different
        // key survives the merge, and A's already-flushed edit is kept.
        writer_b.set("online_state", json!({"333333": {"online": true}}));
        writer_b.flush("b", &config()).await.unwrap();

        assert_eq!(
            writer_b.get("watchlist").unwrap(),
            &json!([{"cid": "222222", "added_at": 1}])
        );
        assert_eq!(
            writer_b.get("online_state").unwrap(),
            &json!({"333333": {"online": true}})
        );
    }

    #[tokio::test]
    async fn del_removes_key_and_marks_dirty() {
        let mut store = Store::new(MemoryTransport::empty());
        store.load().await.unwrap();
        store.set("cooldown:offline:123456", json!({"expiresAt": 1}));
        store.flush("seed", &config()).await.unwrap();
        store.del("cooldown:offline:123456");
        assert!(store.is_dirty());
        assert!(store.get("cooldown:offline:123456").is_none());
    }

    /// A transport that answers the first N `put_if_match` calls with a
    /// transient `Retryable` outcome, then delegates to a real `MemoryTransport`.
    struct FlakyTransport {
        inner: MemoryTransport,
        retryable_left: std::sync::atomic::AtomicU32,
        retry_after: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl ContentStoreTransport for FlakyTransport {
        async fn get(&self) -> Result<GetOutcome, Error> {
            self.inner.get().await
        }

        async fn put_if_match(
            &self,
            version: Option<&str>,
            bytes: Vec<u8>,
            message: &str,
        ) -> Result<PutOutcome, Error> {
            let mut left = self.retryable_left.load(std::sync::atomic::Ordering::SeqCst);
            loop {
                if left == 0 {
                    return self.inner.put_if_match(version, bytes, message).await;
                }
                match self.retryable_left.compare_exchange(
                    left,
                    left - 1,
                    std::sync::atomic::Ordering::SeqCst,
                    std::sync::atomic::Ordering::SeqCst,
                ) {
                    Ok(_) => {
                        return Ok(PutOutcome::Retryable {
                            retry_after: self.retry_after,
                        })
                    }
                    Err(actual) => left = actual,
                }
            }
        }
    }

    #[tokio::test]
    async fn flush_retries_transient_failure_then_succeeds() {
        let transport = FlakyTransport {
            inner: MemoryTransport::empty(),
            retryable_left: std::sync::atomic::AtomicU32::new(1),
            retry_after: Some(Duration::from_millis(1)),
        };
        let mut store = Store::new(transport);
        store.load().await.unwrap();
        store.set("watchlist", json!([]));
        store.flush("test", &config()).await.unwrap();
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn flush_gives_up_after_max_transient_retries() {
        let transport = FlakyTransport {
            inner: MemoryTransport::empty(),
            retryable_left: std::sync::atomic::AtomicU32::new(u32::MAX),
            retry_after: None,
        };
        let mut store = Store::new(transport);
        store.load().await.unwrap();
        store.set("watchlist", json!([]));
        assert!(store.flush("test", &config()).await.is_err());
    }
}
