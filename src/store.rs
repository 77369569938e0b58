//! Per-account rollup store
//!
//! The store holds everything persisted for one account: the incremental
//! cursor, the sync status, and the nested rollup maps (totals, by-model,
//! by-token, by-token-by-model, plus the latency variants). The persistence
//! layer saves and loads the whole store as one serializable value; field
//! names stay camelCase for compatibility with the persisted schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::keys::{DayKey, HourKey, ModelKey, TokenKey};
use crate::types::{Cursor, DailyAggregate, LatencyAggregate, LogRecord};

/// Persisted store schema version.
///
/// Recognized by the persistence layer; older schemas are treated as absent
/// and the system starts with an empty store. This engine does not migrate.
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Sync lifecycle state for an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No sync has ever completed
    #[default]
    Never,
    /// The last attempt succeeded
    Success,
    /// The last attempt failed
    Error,
    /// The account's log endpoint looks unsupported; retry after a cooldown
    Unsupported,
}

/// Outcome bookkeeping for the last sync attempts on an account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncStatus {
    /// Current lifecycle state
    pub state: SyncState,
    /// Last time a sync attempt finished (success or failure), unix millis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<i64>,
    /// Last time a sync attempt succeeded, unix millis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<i64>,
    /// Sanitized warning summary (non-fatal) from the last attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_warning: Option<String>,
    /// Sanitized error summary from the last failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When set, the account is considered unsupported until this time (unix millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsupported_until: Option<i64>,
}

/// Day-keyed rollup map
pub type DailyMap = BTreeMap<DayKey, DailyAggregate>;
/// Day-then-hour-keyed rollup map
pub type HourlyMap = BTreeMap<DayKey, BTreeMap<HourKey, DailyAggregate>>;
/// Day-keyed latency rollup map
pub type LatencyDailyMap = BTreeMap<DayKey, LatencyAggregate>;

/// Per-account usage-history store
///
/// Created on the first sync for an account, mutated by every ingestion and
/// prune, deleted when the account is removed. Callers must not run two
/// ingestions (or an ingestion and a prune) concurrently for the same
/// account; different accounts are fully independent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountStore {
    /// Incremental-sync cursor
    pub cursor: Cursor,
    /// Sync health, persisted for reporting surfaces
    pub status: SyncStatus,
    /// Totals keyed by local day bucket
    pub daily: DailyMap,
    /// Totals keyed by day bucket, then hour bucket
    pub hourly: HourlyMap,
    /// Per-model totals keyed by model, then day bucket
    pub daily_by_model: BTreeMap<ModelKey, DailyMap>,
    /// Token display labels keyed by token id (labels only, never secrets)
    pub token_names_by_id: BTreeMap<TokenKey, String>,
    /// Per-token totals keyed by token id, then day bucket
    pub daily_by_token: BTreeMap<TokenKey, DailyMap>,
    /// Per-token totals keyed by token id, then day bucket, then hour bucket
    pub hourly_by_token: BTreeMap<TokenKey, HourlyMap>,
    /// Per-token per-model totals keyed by token id, then model, then day bucket
    pub daily_by_token_by_model: BTreeMap<TokenKey, BTreeMap<ModelKey, DailyMap>>,
    /// Response-speed aggregates keyed by day bucket
    pub latency_daily: LatencyDailyMap,
    /// Per-model response-speed aggregates keyed by model, then day bucket
    pub latency_daily_by_model: BTreeMap<ModelKey, LatencyDailyMap>,
    /// Per-token response-speed aggregates keyed by token id, then day bucket
    pub latency_daily_by_token: BTreeMap<TokenKey, LatencyDailyMap>,
    /// Per-token per-model response-speed aggregates
    pub latency_daily_by_token_by_model: BTreeMap<TokenKey, BTreeMap<ModelKey, LatencyDailyMap>>,
}

impl AccountStore {
    /// Fold one accepted consume record into every rollup dimension.
    ///
    /// Counters are added, never overwritten; `total_tokens` is computed at
    /// increment time. The caller has already bucketed the timestamp and is
    /// responsible for dedup; this method unconditionally accumulates.
    pub(crate) fn fold_consume(&mut self, record: &LogRecord, day_key: DayKey, hour_key: HourKey) {
        let delta = DailyAggregate::from_record(record);
        let model_key = ModelKey::from_raw(&record.model_name);
        let token_key = TokenKey::from_raw(record.token_id);

        *self.daily.entry(day_key).or_default() += delta;
        *self
            .hourly
            .entry(day_key)
            .or_default()
            .entry(hour_key)
            .or_default() += delta;

        *self
            .daily_by_model
            .entry(model_key.clone())
            .or_default()
            .entry(day_key)
            .or_default() += delta;

        let token_name = record.token_name.trim();
        if !token_key.is_unknown() && !token_name.is_empty() {
            // Last write wins; labels can be renamed upstream.
            self.token_names_by_id
                .insert(token_key.clone(), token_name.to_string());
        }

        *self
            .daily_by_token
            .entry(token_key.clone())
            .or_default()
            .entry(day_key)
            .or_default() += delta;

        *self
            .hourly_by_token
            .entry(token_key.clone())
            .or_default()
            .entry(day_key)
            .or_default()
            .entry(hour_key)
            .or_default() += delta;

        *self
            .daily_by_token_by_model
            .entry(token_key.clone())
            .or_default()
            .entry(model_key.clone())
            .or_default()
            .entry(day_key)
            .or_default() += delta;

        match record.latency_seconds() {
            Some(seconds) => {
                self.latency_daily.entry(day_key).or_default().observe(seconds);
                self.latency_daily_by_model
                    .entry(model_key.clone())
                    .or_default()
                    .entry(day_key)
                    .or_default()
                    .observe(seconds);
                self.latency_daily_by_token
                    .entry(token_key.clone())
                    .or_default()
                    .entry(day_key)
                    .or_default()
                    .observe(seconds);
                self.latency_daily_by_token_by_model
                    .entry(token_key)
                    .or_default()
                    .entry(model_key)
                    .or_default()
                    .entry(day_key)
                    .or_default()
                    .observe(seconds);
            }
            None => {
                self.latency_daily
                    .entry(day_key)
                    .or_default()
                    .observe_unknown();
                self.latency_daily_by_model
                    .entry(model_key.clone())
                    .or_default()
                    .entry(day_key)
                    .or_default()
                    .observe_unknown();
                self.latency_daily_by_token
                    .entry(token_key.clone())
                    .or_default()
                    .entry(day_key)
                    .or_default()
                    .observe_unknown();
                self.latency_daily_by_token_by_model
                    .entry(token_key)
                    .or_default()
                    .entry(model_key)
                    .or_default()
                    .entry(day_key)
                    .or_default()
                    .observe_unknown();
            }
        }
    }
}

/// Root usage-history store: schema version plus one [`AccountStore`] per
/// tracked account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryStore {
    /// Persisted schema version, checked by the persistence layer
    pub schema_version: u32,
    /// Per-account stores, keyed by the caller's account id
    pub accounts: BTreeMap<String, AccountStore>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self {
            schema_version: STORE_SCHEMA_VERSION,
            accounts: BTreeMap::new(),
        }
    }
}

impl HistoryStore {
    /// Get the store for an account, creating an empty one when missing
    pub fn account_mut(&mut self, account_id: &str) -> &mut AccountStore {
        self.accounts.entry(account_id.to_string()).or_default()
    }

    /// Get the store for an account, if any
    pub fn account(&self, account_id: &str) -> Option<&AccountStore> {
        self.accounts.get(account_id)
    }

    /// Drop an account's store entirely
    pub fn remove_account(&mut self, account_id: &str) -> Option<AccountStore> {
        self.accounts.remove(account_id)
    }
}
