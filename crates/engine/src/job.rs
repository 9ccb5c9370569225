//! Audit job model: job/slice/block records and their lifecycle.

use rosterwatch_domain::config::AuditConfig;
use rosterwatch_domain::schema::{Job, Scope};
use rosterwatch_domain::Cid;

/// A contiguous window of CIDs to process this slice.
pub fn next_slice<'a>(job: &'a Job, slice_size: usize) -> &'a [Cid] {
    let end = (job.cursor + slice_size).min(job.total);
    &job.cids[job.cursor..end]
}

/// Required hours and lookback (months) for a scope: both scopes share a
/// 3-month lookback, only the required hours differ.
pub fn thresholds(scope: Scope, config: &AuditConfig) -> (f64, i64) {
    let hours = match scope {
        Scope::Visiting => config.visiting_hours_required,
        Scope::Local => config.local_hours_required,
    };
    (hours, config.lookback_months)
}

pub fn new_job(scope: Scope, cids: Vec<Cid>, created_at: i64) -> Job {
    Job::new(scope, cids, created_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cids(n: u64) -> Vec<Cid> {
        (100_000..100_000 + n)
            .map(|n| Cid::parse(&n.to_string()).unwrap())
            .collect()
    }

    #[test]
    fn slice_windows_dont_overrun_total() {
        let job = new_job(Scope::Visiting, cids(5), 0);
        assert_eq!(next_slice(&job, 10).len(), 5);
    }

    #[test]
    fn slice_at_cursor_offset() {
        let mut job = new_job(Scope::Visiting, cids(25), 0);
        job.cursor = 20;
        assert_eq!(next_slice(&job, 10).len(), 5);
    }

    #[test]
    fn thresholds_differ_only_by_hours() {
        let config = AuditConfig::default();
        let (visiting_hours, visiting_months) = thresholds(Scope::Visiting, &config);
        let (local_hours, local_months) = thresholds(Scope::Local, &config);
        assert_eq!(visiting_months, local_months);
        assert!(local_hours > visiting_hours);
    }
}
