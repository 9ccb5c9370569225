//! Presence tracker: diff the live feed against `online_state`, emit
//! transitions, persist only if something changed.

use chrono::Utc;
use rosterwatch_domain::schema::{
    key_cooldown_offline, key_cooldown_online, CooldownMarker, OnlineInfo, OnlineState,
    OnlineStateMap, COOLDOWN_OFFLINE_SECS, COOLDOWN_ONLINE_SECS, KEY_ONLINE_STATE,
};
use rosterwatch_domain::{Cid, Error};
use rosterwatch_store::Store;
use rosterwatch_store::ContentStoreTransport;
use tracing::info;

use crate::feed::{DataFeed, OnlineController};

#[derive(Debug, Default, Clone)]
pub struct PresenceSnapshot {
    pub online: usize,
    pub offline: usize,
    pub transitioned: usize,
    /// Transitions that landed inside an active cooldown window for the
    /// same CID (and, for online transitions, the same callsign) — a
    /// reconnect blip rather than a fresh transition.
    pub debounced: usize,
    pub transitions: Vec<TransitionEvent>,
}

#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub cid: String,
    pub callsign: String,
    pub went_online: bool,
}

/// Run one presence pass: fetch the feed, diff, persist transitions, and
/// arm/consult the per-CID debounce cooldowns.
/// The budgeted-fetcher boundary lives in the caller — this function
/// assumes the caller already decided to spend the call.
pub async fn run<T: ContentStoreTransport>(
    store: &mut Store<T>,
    feed: &dyn DataFeed,
) -> Result<PresenceSnapshot, Error> {
    let now_online = feed.online_controllers().await?;
    let prev: OnlineStateMap = store.get_typed(KEY_ONLINE_STATE)?.unwrap_or_default();
    let now = Utc::now().timestamp();
    let (next, mut snapshot) = compute_transitions(&prev, &now_online, now);
    if snapshot.transitioned > 0 {
        store.set_typed(KEY_ONLINE_STATE, &next)?;
        for event in snapshot.transitions.clone() {
            let Ok(cid) = Cid::parse(&event.cid) else {
                continue;
            };
            let (key, cooldown_secs) = if event.went_online {
                let callsign_upper = event.callsign.to_uppercase();
                (key_cooldown_online(&cid, &callsign_upper), COOLDOWN_ONLINE_SECS)
            } else {
                (key_cooldown_offline(&cid), COOLDOWN_OFFLINE_SECS)
            };
            if !arm_cooldown(store, &key, cooldown_secs, now)? {
                snapshot.debounced += 1;
            }
        }
        info!(
            online = snapshot.online,
            offline = snapshot.offline,
            transitioned = snapshot.transitioned,
            debounced = snapshot.debounced,
            "presence transitions persisted"
        );
    }
    Ok(snapshot)
}

/// Check whether `key`'s cooldown is still active, then (re)arm it for
/// `cooldown_secs` from `now`. State correctness never depends on this —
/// the transition has already been written to `online_state` regardless;
/// this only decides whether the transition counts as a debounced bounce.
fn arm_cooldown<T: ContentStoreTransport>(
    store: &mut Store<T>,
    key: &str,
    cooldown_secs: i64,
    now: i64,
) -> Result<bool, Error> {
    let was_active = store
        .get_typed::<CooldownMarker>(key)?
        .map(|marker| marker.expires_at > now)
        .unwrap_or(false);
    store.set_typed(key, &CooldownMarker { expires_at: now + cooldown_secs })?;
    Ok(!was_active)
}

pub fn compute_transitions(
    prev: &OnlineStateMap,
    now_online: &[OnlineController],
    now: i64,
) -> (OnlineStateMap, PresenceSnapshot) {
    let mut by_cid = std::collections::HashMap::new();
    for c in now_online {
        by_cid.insert(c.cid.as_str().to_string(), c.clone());
    }

    let mut next = prev.clone();
    let mut snapshot = PresenceSnapshot::default();

    let mut all_cids: std::collections::BTreeSet<String> =
        prev.keys().cloned().collect();
    all_cids.extend(by_cid.keys().cloned());

    for cid in all_cids {
        let was_online = prev.get(&cid).map(|s| s.online).unwrap_or(false);
        match by_cid.get(&cid) {
            Some(info) => {
                snapshot.online += 1;
                if !was_online {
                    next.insert(
                        cid.clone(),
                        OnlineState {
                            online: true,
                            last_change: now,
                            last_info: to_info(info, now),
                        },
                    );
                    snapshot.transitioned += 1;
                    snapshot.transitions.push(TransitionEvent {
                        cid,
                        callsign: info.callsign.clone(),
                        went_online: true,
                    });
                }
                // steady-state online: no write.
            }
            None => {
                snapshot.offline += 1;
                if was_online {
                    if let Some(existing) = prev.get(&cid) {
                        let callsign = existing.last_info.callsign.clone();
                        next.insert(
                            cid.clone(),
                            OnlineState {
                                online: false,
                                last_change: now,
                                last_info: existing.last_info.clone(),
                            },
                        );
                        snapshot.transitioned += 1;
                        snapshot.transitions.push(TransitionEvent {
                            cid,
                            callsign,
                            went_online: false,
                        });
                    }
                }
                // steady-state offline: no write.
            }
        }
    }

    (next, snapshot)
}

fn to_info(c: &OnlineController, now: i64) -> OnlineInfo {
    OnlineInfo {
        callsign: c.callsign.clone(),
        frequency: c.frequency.clone(),
        name: c.name.clone(),
        last_seen: now,
    }
}
