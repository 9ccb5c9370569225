//! Audit engine core: the tick-driven scheduler that advances a job through
//! its controller list in slices, computing per-controller audit verdicts
//! and persisting partial results.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Months, Utc};
use rosterwatch_domain::config::AuditConfig;
use rosterwatch_domain::schema::{
    key_archived_audit, key_audit_partial, key_cooldown_flag, key_member, key_rating, CooldownMarker,
    Job, MemberEntry, PartialResult, RatingEntry, Scope, WatchlistEntry, COOLDOWN_FLAG_SECS,
    KEY_AUDIT_JOB, KEY_WATCHLIST, MEMBER_EXISTENCE_TTL_SECS,
};
use rosterwatch_domain::{Cid, Error};
use rosterwatch_store::{BudgetedFetcher, ContentStoreTransport, Store};
use tracing::{debug, info};

use crate::feed::{DataFeed, Session};
use crate::job::next_slice;

#[derive(Debug, Clone, Copy)]
pub struct TickOutcome {
    pub scope: Scope,
    pub processed: usize,
    pub blocks_done: usize,
    pub job_complete: bool,
    /// Per-CID progress lines actually logged this tick, bounded by
    /// `max_prog_edits_per_tick` and spaced by `prog_edit_min_gap_ms` —
    /// distinct from `processed`, which counts every CID computed.
    pub progress_events_emitted: u32,
}

/// One engine tick: pull the active job, advance it block by block within
/// budget, persist partial results, and retire the job once complete.
pub async fn run_tick<T: ContentStoreTransport>(
    store: &mut Store<T>,
    feed: &dyn DataFeed,
    fetcher: &BudgetedFetcher,
    config: &AuditConfig,
) -> Result<Option<TickOutcome>, Error> {
    let mut job: Job = match store.get_typed::<Job>(KEY_AUDIT_JOB)? {
        Some(j) if !j.is_complete() => j,
        Some(_) => {
            store.del(KEY_AUDIT_JOB);
            return Ok(None);
        }
        None => return Ok(None),
    };

    let (hours_required, lookback_months) = crate::job::thresholds(job.scope, config);
    let now = Utc::now();
    let window_start = now
        .checked_sub_months(Months::new(lookback_months.max(0) as u32))
        .unwrap_or(now);
    let exempt_cutoff_days = config.s1_exempt_days;

    let partial_key = key_audit_partial(job.scope);
    let mut partials: Vec<PartialResult> = store.get_typed(&partial_key)?.unwrap_or_default();
    let watchlist_added_at = added_at_by_cid(store)?;

    let mut blocks_done = 0usize;
    let mut processed = 0usize;
    let mut progress_events_emitted = 0u32;
    let mut last_progress_emit: Option<Instant> = None;
    let min_gap = Duration::from_millis(config.prog_edit_min_gap_ms);

    'blocks: while job.cursor < job.total
        && blocks_done < config.block_size
        && !fetcher.is_tick_time_exhausted()
    {
        let slice: Vec<Cid> = next_slice(&job, config.slice_size).to_vec();
        if slice.is_empty() {
            break;
        }
        for cid in &slice {
            if fetcher.is_tick_time_exhausted() {
                break 'blocks;
            }
            let result = process_one(
                cid,
                job.scope,
                store,
                feed,
                fetcher,
                now,
                window_start,
                hours_required,
                exempt_cutoff_days,
                &watchlist_added_at,
            )
            .await?;

            if result.flagged && !arm_flag_cooldown(store, cid, now.timestamp())? {
                info!(cid = %result.cid, hours = result.hours, "controller flagged below required hours");
            }

            if progress_events_emitted < config.max_prog_edits_per_tick
                && last_progress_emit
                    .map(|t| t.elapsed() >= min_gap)
                    .unwrap_or(true)
            {
                debug!(
                    cid = %result.cid,
                    hours = result.hours,
                    flagged = result.flagged,
                    "audit progress"
                );
                progress_events_emitted += 1;
                last_progress_emit = Some(Instant::now());
            }

            upsert_partial(&mut partials, result);
            processed += 1;
        }
        job.cursor += slice.len();
        blocks_done += 1;
    }

    store.set_typed(&partial_key, &partials)?;
    let job_complete = job.is_complete();
    if job_complete {
        store.del(KEY_AUDIT_JOB);
        for result in &partials {
            store.cache_put(
                key_archived_audit(job.scope, &result.cid),
                serde_json::to_value(result)?,
            );
        }
    } else {
        store.set_typed(KEY_AUDIT_JOB, &job)?;
    }

    info!(
        scope = %job.scope,
        cursor = job.cursor,
        total = job.total,
        blocks_done,
        job_complete,
        "audit tick advanced"
    );

    Ok(Some(TickOutcome {
        scope: job.scope,
        processed,
        blocks_done,
        job_complete,
        progress_events_emitted,
    }))
}

fn added_at_by_cid<T: ContentStoreTransport>(
    store: &Store<T>,
) -> Result<HashMap<String, i64>, Error> {
    let entries: Vec<WatchlistEntry> = store.get_typed(KEY_WATCHLIST)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .map(|e| (e.cid.as_str().to_string(), e.added_at))
        .collect())
}

#[allow(clippy::too_many_arguments)]
async fn process_one<T: ContentStoreTransport>(
    cid: &Cid,
    scope: Scope,
    store: &mut Store<T>,
    feed: &dyn DataFeed,
    fetcher: &BudgetedFetcher,
    now: DateTime<Utc>,
    window_start: DateTime<Utc>,
    hours_required: f64,
    exempt_cutoff_days: i64,
    watchlist_added_at: &HashMap<String, i64>,
) -> Result<PartialResult, Error> {
    let computed_at = now.timestamp();

    if is_s1_exempt(store, cid, now, exempt_cutoff_days, watchlist_added_at) {
        return Ok(PartialResult {
            cid: cid.clone(),
            hours: 0.0,
            flagged: false,
            exempt: true,
            computed_at,
            ..Default::default()
        });
    }

    match member_exists(store, cid, feed, fetcher, now).await? {
        Some(false) => {
            return Ok(PartialResult {
                cid: cid.clone(),
                hours: 0.0,
                flagged: false,
                missing: true,
                computed_at,
                ..Default::default()
            });
        }
        // `None` means the existence check itself failed or the budget
        // was exhausted; proceed optimistically rather than flag a
        // controller as missing on an inconclusive check.
        Some(true) | None => {}
    }

    match fetcher.fetch_once(|| feed.sessions(cid)).await {
        Some(sessions) => {
            let (hours, last_session) = sum_sessions(&sessions, window_start, now);
            Ok(PartialResult {
                cid: cid.clone(),
                hours,
                flagged: hours < hours_required,
                last_session,
                computed_at,
                ..Default::default()
            })
        }
        None => Ok(PartialResult {
            cid: cid.clone(),
            hours: 0.0,
            flagged: false,
            incomplete: true,
            computed_at,
            ..Default::default()
        }),
    }
}

fn is_s1_exempt<T: ContentStoreTransport>(
    store: &Store<T>,
    cid: &Cid,
    now: DateTime<Utc>,
    exempt_cutoff_days: i64,
    watchlist_added_at: &HashMap<String, i64>,
) -> bool {
    let rating_key = key_rating(cid);
    let rating: Option<RatingEntry> = store.get_typed(&rating_key).ok().flatten();
    let is_s1 = rating.map(|r| r.rating == "S1").unwrap_or(false);
    if !is_s1 {
        return false;
    }
    let added_at = match watchlist_added_at.get(cid.as_str()) {
        Some(t) => *t,
        None => return false,
    };
    now.timestamp() - added_at < exempt_cutoff_days * 86_400
}

async fn member_exists<T: ContentStoreTransport>(
    store: &mut Store<T>,
    cid: &Cid,
    feed: &dyn DataFeed,
    fetcher: &BudgetedFetcher,
    now: DateTime<Utc>,
) -> Result<Option<bool>, Error> {
    let key = key_member(cid);
    if let Some(cached) = store.cache_get(&key, MEMBER_EXISTENCE_TTL_SECS) {
        let entry: MemberEntry = serde_json::from_value(cached.clone())?;
        return Ok(Some(entry.exists));
    }
    match fetcher.fetch_once(|| feed.member_exists(cid)).await {
        Some(exists) => {
            store.cache_put(
                key,
                serde_json::to_value(MemberEntry {
                    exists,
                    cached_at: now.timestamp(),
                })?,
            );
            Ok(Some(exists))
        }
        None => Ok(None),
    }
}

/// Check and (re)arm `cooldown:flag:<cid>`. Returns `true` the first time
/// a controller is seen flagged in a 24h window, `false` on every repeat
/// flag inside that window — the audit verdict itself is unaffected,
/// this only decides whether the flag is worth logging again.
fn arm_flag_cooldown<T: ContentStoreTransport>(
    store: &mut Store<T>,
    cid: &Cid,
    now: i64,
) -> Result<bool, Error> {
    let key = key_cooldown_flag(cid);
    let was_active = store
        .get_typed::<CooldownMarker>(&key)?
        .map(|marker| marker.expires_at > now)
        .unwrap_or(false);
    store.set_typed(&key, &CooldownMarker { expires_at: now + COOLDOWN_FLAG_SECS })?;
    Ok(!was_active)
}

/// Sum session durations falling in `[window_start, now]`, clipping
/// sessions that straddle the boundary.
fn sum_sessions(
    sessions: &[Session],
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (f64, Option<DateTime<Utc>>) {
    let mut total_secs = 0i64;
    let mut last_session = None;

    for session in sessions {
        let effective_start = session.start.max(window_start);
        let effective_end = session.end.min(now);
        if effective_end <= effective_start {
            continue;
        }
        total_secs += (effective_end - effective_start).num_seconds();
        last_session = Some(match last_session {
            Some(prev) if prev >= effective_end => prev,
            _ => effective_end,
        });
    }

    (total_secs as f64 / 3600.0, last_session)
}

fn upsert_partial(partials: &mut Vec<PartialResult>, result: PartialResult) {
    if let Some(existing) = partials.iter_mut().find(|p| p.cid == result.cid) {
        if result.computed_at >= existing.computed_at {
            *existing = result;
        }
    } else {
        partials.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rosterwatch_domain::config::BudgetConfig;
    use rosterwatch_store::transport::memory::MemoryTransport;

    use crate::feed::fake::FakeDataFeed;

    fn cid(n: &str) -> Cid {
        Cid::parse(n).unwrap()
    }

    fn cids(start: u64, n: u64) -> Vec<Cid> {
        (start..start + n)
            .map(|n| Cid::parse(&n.to_string()).unwrap())
            .collect()
    }

    #[test]
    fn sum_sessions_counts_full_session_in_window() {
        let now = Utc::now();
        let window_start = now - Duration::days(90);
        let sessions = vec![Session {
            callsign: "KJFK_TWR".into(),
            start: now - Duration::hours(3),
            end: now - Duration::hours(1),
        }];
        let (hours, last) = sum_sessions(&sessions, window_start, now);
        assert!((hours - 2.0).abs() < 1e-9);
        assert!(last.is_some());
    }

    #[test]
    fn sum_sessions_clips_session_straddling_window_start() {
        let now = Utc::now();
        let window_start = now - Duration::hours(5);
        let sessions = vec![Session {
            callsign: "KJFK_TWR".into(),
            start: now - Duration::hours(10),
            end: now - Duration::hours(3),
        }];
        let (hours, _) = sum_sessions(&sessions, window_start, now);
        // Only the 2 hours inside [window_start, now] count.
        assert!((hours - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sum_sessions_ignores_sessions_entirely_before_window() {
        let now = Utc::now();
        let window_start = now - Duration::hours(1);
        let sessions = vec![Session {
            callsign: "KJFK_TWR".into(),
            start: now - Duration::hours(10),
            end: now - Duration::hours(9),
        }];
        let (hours, last) = sum_sessions(&sessions, window_start, now);
        assert_eq!(hours, 0.0);
        assert!(last.is_none());
    }

    #[test]
    fn upsert_keeps_latest_computed_at() {
        let mut partials = vec![PartialResult {
            cid: cid("123456"),
            hours: 5.0,
            computed_at: 100,
            ..Default::default()
        }];
        upsert_partial(
            &mut partials,
            PartialResult {
                cid: cid("123456"),
                hours: 1.0,
                computed_at: 50,
                ..Default::default()
            },
        );
        // A stale verdict never overwrites a newer one.
        assert_eq!(partials[0].hours, 5.0);

        upsert_partial(
            &mut partials,
            PartialResult {
                cid: cid("123456"),
                hours: 9.0,
                computed_at: 200,
                ..Default::default()
            },
        );
        assert_eq!(partials[0].hours, 9.0);
    }

    /// 50 CIDs at the default `SLICE_SIZE=10`/`BLOCK_SIZE=4` ⇒ the first
    /// tick advances the cursor by exactly 40 (one block short of a
    /// partial fifth slice) and the job completes on the second tick.
    #[tokio::test]
    async fn tick_advances_one_block_then_completes_next_tick() {
        let job = Job::new(Scope::Visiting, cids(200_000, 50), Utc::now().timestamp());

        let mut store = Store::new(MemoryTransport::empty());
        store.load().await.unwrap();
        store.set_typed(KEY_AUDIT_JOB, &job).unwrap();

        let feed = FakeDataFeed::default();
        let config = AuditConfig::default();
        assert_eq!(config.slice_size, 10);
        assert_eq!(config.block_size, 4);

        let fetcher_one = BudgetedFetcher::new(&BudgetConfig::default());
        let first = run_tick(&mut store, &feed, &fetcher_one, &config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.processed, 40);
        assert_eq!(first.blocks_done, 4);
        assert!(!first.job_complete);
        let job_after_first: Job = store.get_typed(KEY_AUDIT_JOB).unwrap().unwrap();
        assert_eq!(job_after_first.cursor, 40);

        let fetcher_two = BudgetedFetcher::new(&BudgetConfig::default());
        let second = run_tick(&mut store, &feed, &fetcher_two, &config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.processed, 10);
        assert!(second.job_complete);
        assert!(store.get_typed::<Job>(KEY_AUDIT_JOB).unwrap().is_none());
    }

    #[tokio::test]
    async fn job_completion_archives_a_per_cid_record() {
        let job = Job::new(Scope::Local, cids(300_000, 2), Utc::now().timestamp());

        let mut store = Store::new(MemoryTransport::empty());
        store.load().await.unwrap();
        store.set_typed(KEY_AUDIT_JOB, &job).unwrap();

        let feed = FakeDataFeed::default();
        let config = AuditConfig::default();
        let fetcher = BudgetedFetcher::new(&BudgetConfig::default());

        let outcome = run_tick(&mut store, &feed, &fetcher, &config)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.job_complete);

        assert!(store.get(&key_archived_audit(Scope::Local, &cid("300000"))).is_some());
        assert!(store.get(&key_archived_audit(Scope::Local, &cid("300001"))).is_some());
    }

    #[tokio::test]
    async fn flagged_controller_arms_flag_cooldown() {
        let job = Job::new(Scope::Visiting, cids(400_000, 1), Utc::now().timestamp());
        let mut store = Store::new(MemoryTransport::empty());
        store.load().await.unwrap();
        store.set_typed(KEY_AUDIT_JOB, &job).unwrap();

        // No sessions recorded anywhere, so the lone CID falls short of
        // the required hours and gets flagged.
        let feed = FakeDataFeed::default();
        let config = AuditConfig::default();
        let fetcher = BudgetedFetcher::new(&BudgetConfig::default());

        run_tick(&mut store, &feed, &fetcher, &config)
            .await
            .unwrap();

        assert!(store.get(&key_cooldown_flag(&cid("400000"))).is_some());
    }
}
