//! Time-based retention pruning
//!
//! Aggregates are the only history kept, so storage is bounded by deleting
//! day buckets older than a retention cutoff across every rollup dimension.
//! The cutoff is derived from a retention-window length and an injected
//! clock value, never from wall-clock time directly.

use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::keys::{DayKey, TokenKey};
use crate::store::AccountStore;

/// Compute the earliest day bucket to retain.
///
/// `retention_days` is clamped to a minimum of 1, so a 1-day window keeps
/// only the current local day.
///
/// # Examples
/// ```
/// use relaystat::retention::retention_cutoff_day_key;
/// use chrono_tz::Tz;
///
/// // 2026-01-10T12:00:00Z, 7-day retention.
/// let cutoff = retention_cutoff_day_key(7, 1_768_046_400, Tz::UTC);
/// assert_eq!(cutoff.to_string(), "2026-01-04");
/// ```
pub fn retention_cutoff_day_key(retention_days: u32, now_unix_seconds: i64, tz: Tz) -> DayKey {
    let days = retention_days.max(1);
    DayKey::from_unix_seconds(now_unix_seconds, tz).minus_days(u64::from(days) - 1)
}

/// Drop day buckets older than the cutoff from a `key -> day -> value` map,
/// removing outer keys that end up empty.
fn prune_keyed_days<K: Ord, V>(map: &mut BTreeMap<K, BTreeMap<DayKey, V>>, cutoff: DayKey) {
    for per_key in map.values_mut() {
        per_key.retain(|day, _| *day >= cutoff);
    }
    map.retain(|_, per_key| !per_key.is_empty());
}

/// Same as [`prune_keyed_days`] for a doubly keyed `key -> key -> day -> value` map.
fn prune_doubly_keyed_days<K1: Ord, K2: Ord, V>(
    map: &mut BTreeMap<K1, BTreeMap<K2, BTreeMap<DayKey, V>>>,
    cutoff: DayKey,
) {
    for per_outer in map.values_mut() {
        prune_keyed_days(per_outer, cutoff);
    }
    map.retain(|_, per_outer| !per_outer.is_empty());
}

/// Prune one account's aggregates in place, removing every day bucket
/// strictly older than `cutoff` from every rollup dimension, then dropping
/// token labels that no longer have any retained aggregates.
///
/// Safe on an empty or already-pruned store.
pub fn prune_account_store(store: &mut AccountStore, cutoff: DayKey) {
    store.daily.retain(|day, _| *day >= cutoff);
    store.hourly.retain(|day, _| *day >= cutoff);
    prune_keyed_days(&mut store.daily_by_model, cutoff);
    prune_keyed_days(&mut store.daily_by_token, cutoff);
    prune_keyed_days(&mut store.hourly_by_token, cutoff);
    prune_doubly_keyed_days(&mut store.daily_by_token_by_model, cutoff);

    store.latency_daily.retain(|day, _| *day >= cutoff);
    prune_keyed_days(&mut store.latency_daily_by_model, cutoff);
    prune_keyed_days(&mut store.latency_daily_by_token, cutoff);
    prune_doubly_keyed_days(&mut store.latency_daily_by_token_by_model, cutoff);

    // Drop token labels that no longer have any retained aggregates.
    let retained: BTreeSet<&TokenKey> = store
        .daily_by_token
        .keys()
        .chain(store.hourly_by_token.keys())
        .chain(store.daily_by_token_by_model.keys())
        .chain(store.latency_daily_by_token.keys())
        .chain(store.latency_daily_by_token_by_model.keys())
        .collect();
    let stale: Vec<TokenKey> = store
        .token_names_by_id
        .keys()
        .filter(|token| !retained.contains(token))
        .cloned()
        .collect();
    for token in stale {
        store.token_names_by_id.remove(&token);
    }
}
