//! Quarterly trigger: at quarter-start UTC instants, enqueue a
//! visiting-scope audit unless the quarter is already marked done.

use chrono::{DateTime, Datelike, Utc};
use rosterwatch_domain::schema::{
    key_audit_partial, key_quarter_auto, QuarterMarker, Scope, WatchlistEntry, KEY_AUDIT_JOB,
    KEY_WATCHLIST,
};
use rosterwatch_domain::Error;
use rosterwatch_store::{ContentStoreTransport, Store};
use tracing::info;

use crate::job::new_job;

/// `true` iff `now` falls on a quarter-start minute: Jan/Apr/Jul/Oct 1st, 00:00 UTC.
pub fn is_quarter_start(now: DateTime<Utc>) -> bool {
    matches!(now.month(), 1 | 4 | 7 | 10) && now.day() == 1 && now.hour() == 0
}

/// The previous quarter's key, e.g. `2025Q1` observed at the instant that
/// starts `2025Q2` — the quarter that's just ending.
pub fn previous_quarter_key(now: DateTime<Utc>) -> String {
    let (year, quarter) = match now.month() {
        1 => (now.year() - 1, 4),
        4 => (now.year(), 1),
        7 => (now.year(), 2),
        10 => (now.year(), 3),
        _ => (now.year(), (now.month() as i32 - 1) / 3 + 1),
    };
    format!("{year}Q{quarter}")
}

/// Run the trigger for one tick. Returns `true` if a job was enqueued.
pub async fn run<T: ContentStoreTransport>(
    store: &mut Store<T>,
    now: DateTime<Utc>,
) -> Result<bool, Error> {
    if !is_quarter_start(now) {
        return Ok(false);
    }
    let key = previous_quarter_key(now);
    let marker_key = key_quarter_auto(&key);
    if store.get(&marker_key).is_some() {
        return Ok(false);
    }

    if store.get(KEY_AUDIT_JOB).is_some() {
        // A job (manual or otherwise) is already active; the quarterly
        // trigger never preempts it. Mark the quarter done regardless so
        // we don't retry every tick for the rest of the hour.
        info!(quarter = %key, "quarterly trigger skipped: a job is already active");
        store.set_typed(&marker_key, &QuarterMarker { done: true, at: now.timestamp() })?;
        return Ok(false);
    }

    let entries: Vec<WatchlistEntry> = store.get_typed(KEY_WATCHLIST)?.unwrap_or_default();
    let mut cids: Vec<_> = entries.into_iter().map(|e| e.cid).collect();
    cids.sort_by_key(|c| c.numeric());

    let job = new_job(Scope::Visiting, cids, now.timestamp());
    store.set_typed(KEY_AUDIT_JOB, &job)?;
    store.del(&key_audit_partial(Scope::Visiting));
    store.set_typed(&marker_key, &QuarterMarker { done: true, at: now.timestamp() })?;

    info!(quarter = %key, total = job.total, "quarterly visiting audit enqueued");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rosterwatch_store::transport::memory::MemoryTransport;

    fn quarter_start(year: i32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn recognizes_quarter_start_instants() {
        assert!(is_quarter_start(quarter_start(2025, 4)));
        assert!(!is_quarter_start(quarter_start(2025, 5)));
        assert!(!is_quarter_start(Utc.with_ymd_and_hms(2025, 4, 1, 1, 0, 0).unwrap()));
    }

    #[test]
    fn previous_quarter_key_wraps_year_boundary() {
        assert_eq!(previous_quarter_key(quarter_start(2025, 1)), "2024Q4");
        assert_eq!(previous_quarter_key(quarter_start(2025, 4)), "2025Q1");
        assert_eq!(previous_quarter_key(quarter_start(2025, 7)), "2025Q2");
        assert_eq!(previous_quarter_key(quarter_start(2025, 10)), "2025Q3");
    }

    #[tokio::test]
    async fn enqueues_once_per_quarter() {
        let mut store = Store::new(MemoryTransport::empty());
        store.load().await.unwrap();
        store.set_typed(
            KEY_WATCHLIST,
            &vec![WatchlistEntry {
                cid: rosterwatch_domain::Cid::parse("123456").unwrap(),
                added_at: 1,
            }],
        )
        .unwrap();

        let now = quarter_start(2025, 4);
        let first = run(&mut store, now).await.unwrap();
        assert!(first);
        assert!(store.get(KEY_AUDIT_JOB).is_some());

        // Clear the job as if a tick completed it, then try again within
        // the same hour — the marker must still block a re-enqueue.
        store.del(KEY_AUDIT_JOB);
        let second = run(&mut store, now).await.unwrap();
        assert!(!second);
        assert!(store.get(KEY_AUDIT_JOB).is_none());
    }
}
