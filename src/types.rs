//! Core domain types for relaystat
//!
//! This module contains the fundamental types used throughout the relaystat
//! library: the upstream log record shape, the rollup aggregate counters,
//! the bounded latency histogram, and the incremental-sync cursor.

use serde::{Deserialize, Serialize};

/// Fixed latency histogram bucket upper bounds (seconds).
///
/// Buckets are computed as:
/// - bucket 0: `[0, bounds[0])`
/// - bucket i: `[bounds[i-1], bounds[i])` for `1 <= i < bounds.len()`
/// - last bucket: `[bounds[last], +inf)`
pub const LATENCY_BUCKET_UPPER_BOUNDS_SECONDS: [f64; 10] =
    [0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0];

/// Number of histogram bins, including the open-ended final bin.
pub const LATENCY_BUCKET_COUNT: usize = LATENCY_BUCKET_UPPER_BOUNDS_SECONDS.len() + 1;

/// Fixed latency threshold (seconds) for "slow" outcomes.
///
/// Slow-focused analytics must work from aggregates alone, so the threshold
/// is fixed at ingestion time rather than derived from raw logs later.
pub const SLOW_THRESHOLD_SECONDS: f64 = 5.0;

/// Upstream record kind, as reported by the gateway's log endpoint.
///
/// Only [`RecordKind::Consume`] records are aggregated; every other kind is
/// skipped. Unknown numeric values deserialize into [`RecordKind::Other`] so
/// a newer upstream never fails a whole page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum RecordKind {
    /// Balance top-up
    Topup,
    /// A completed API call that consumed quota
    Consume,
    /// Administrative adjustment
    Manage,
    /// System-generated entry (e.g. check-in rewards)
    System,
    /// Upstream-side error entry
    Error,
    /// Any kind this library does not recognize
    Other(i64),
}

impl From<i64> for RecordKind {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::Topup,
            2 => Self::Consume,
            3 => Self::Manage,
            4 => Self::System,
            5 => Self::Error,
            other => Self::Other(other),
        }
    }
}

impl From<RecordKind> for i64 {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Topup => 1,
            RecordKind::Consume => 2,
            RecordKind::Manage => 3,
            RecordKind::System => 4,
            RecordKind::Error => 5,
            RecordKind::Other(other) => other,
        }
    }
}

impl Default for RecordKind {
    fn default() -> Self {
        Self::Other(0)
    }
}

/// One upstream log entry, in the wire shape of the gateway's log endpoint.
///
/// All fields except `created_at` default when absent: the upstream schema
/// varies across gateway forks, and a missing field must degrade rather than
/// fail deserialization of a whole page.
///
/// `created_at` has second granularity, so multiple records routinely share
/// a value; dedup therefore relies on [`crate::fingerprint::fingerprint`]
/// rather than on the timestamp alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unix seconds (coarse; multiple records may share a value)
    pub created_at: i64,
    /// Record kind; only `Consume` is aggregated
    #[serde(rename = "type", default)]
    pub kind: RecordKind,
    /// Model name; may be blank
    #[serde(default)]
    pub model_name: String,
    /// Token (API key) id; absent on some forks
    #[serde(default)]
    pub token_id: Option<i64>,
    /// Token display label
    #[serde(default)]
    pub token_name: String,
    /// Prompt token count
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion token count
    #[serde(default)]
    pub completion_tokens: u64,
    /// Quota consumed by this call, in the gateway's cost unit
    #[serde(default)]
    pub quota: f64,
    /// Upstream channel id
    #[serde(default)]
    pub channel_id: i64,
    /// Request latency in seconds; absent, negative, or non-finite are all invalid
    #[serde(default)]
    pub use_time: Option<f64>,
}

impl LogRecord {
    /// The record's latency in seconds, when valid.
    ///
    /// Valid means finite and non-negative. Invalid latencies are counted
    /// as unknown and never touch the numeric latency aggregates.
    pub fn latency_seconds(&self) -> Option<f64> {
        match self.use_time {
            Some(v) if v.is_finite() && v >= 0.0 => Some(v),
            _ => None,
        }
    }
}

/// Summable rollup counters for one bucket (a day, or an hour within a day).
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyAggregate {
    /// Number of requests folded into this bucket
    pub requests: u64,
    /// Prompt tokens
    pub prompt_tokens: u64,
    /// Completion tokens
    pub completion_tokens: u64,
    /// Prompt + completion tokens, computed at increment time
    pub total_tokens: u64,
    /// Quota consumed
    pub quota_consumed: f64,
}

impl DailyAggregate {
    /// Build the single-record delta that gets added into every dimension.
    pub fn from_record(record: &LogRecord) -> Self {
        Self {
            requests: 1,
            prompt_tokens: record.prompt_tokens,
            completion_tokens: record.completion_tokens,
            total_tokens: record.prompt_tokens + record.completion_tokens,
            quota_consumed: record.quota,
        }
    }
}

impl std::ops::Add for DailyAggregate {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            requests: self.requests + other.requests,
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
            quota_consumed: self.quota_consumed + other.quota_consumed,
        }
    }
}

impl std::ops::AddAssign for DailyAggregate {
    fn add_assign(&mut self, other: Self) {
        self.requests += other.requests;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.quota_consumed += other.quota_consumed;
    }
}

/// Bounded response-speed aggregate (no raw per-request timings retained).
///
/// `count`, `sum`, `max`, `slow_count` and `buckets` describe valid-latency
/// records only; records with invalid latency increment `unknown_count` and
/// nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LatencyAggregate {
    /// Valid-latency record count
    pub count: u64,
    /// Sum of valid latencies, seconds
    pub sum: f64,
    /// Maximum valid latency, seconds
    pub max: f64,
    /// Valid-latency records at or above [`SLOW_THRESHOLD_SECONDS`]
    pub slow_count: u64,
    /// Records whose latency was absent or invalid
    pub unknown_count: u64,
    /// Histogram bins per [`LATENCY_BUCKET_UPPER_BOUNDS_SECONDS`]
    pub buckets: Vec<u64>,
}

impl Default for LatencyAggregate {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            max: 0.0,
            slow_count: 0,
            unknown_count: 0,
            buckets: vec![0; LATENCY_BUCKET_COUNT],
        }
    }
}

impl LatencyAggregate {
    /// Fold a valid latency value (seconds) into the aggregate.
    pub fn observe(&mut self, seconds: f64) {
        // Stores loaded from an older persisted shape may carry short vectors.
        if self.buckets.len() < LATENCY_BUCKET_COUNT {
            self.buckets.resize(LATENCY_BUCKET_COUNT, 0);
        }

        self.count += 1;
        self.sum += seconds;
        if seconds > self.max {
            self.max = seconds;
        }
        if seconds >= SLOW_THRESHOLD_SECONDS {
            self.slow_count += 1;
        }
        self.buckets[latency_bucket_index(seconds)] += 1;
    }

    /// Record one request whose latency is absent or invalid.
    pub fn observe_unknown(&mut self) {
        self.unknown_count += 1;
    }
}

/// Resolve the histogram bin for a latency value in seconds.
///
/// Returns the first bin whose upper bound exceeds the value, or the final
/// open-ended bin when none does.
pub fn latency_bucket_index(seconds: f64) -> usize {
    for (index, bound) in LATENCY_BUCKET_UPPER_BOUNDS_SECONDS.iter().enumerate() {
        if seconds < *bound {
            return index;
        }
    }
    LATENCY_BUCKET_UPPER_BOUNDS_SECONDS.len()
}

/// Incremental-sync position for one account.
///
/// The upstream masks log ids, so the cursor is the highest ingested
/// `created_at` plus the set of fingerprints observed at exactly that
/// timestamp. That keeps cursor size bounded regardless of history length,
/// at the cost of only deduplicating within one timestamp tick.
///
/// Invariant: every record with `created_at <= last_seen_created_at` has been
/// folded into the store, and `fingerprints_at_last_seen_created_at` is the
/// complete fingerprint set for records at `last_seen_created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cursor {
    /// Highest `created_at` (unix seconds) ingested for this account
    pub last_seen_created_at: i64,
    /// Dedupe fingerprints for records at `last_seen_created_at`
    pub fingerprints_at_last_seen_created_at: Vec<String>,
}

impl Cursor {
    /// Advance the cursor candidate with one accepted record.
    ///
    /// A higher timestamp resets the fingerprint set; an equal timestamp
    /// appends the fingerprint (without duplicates); a lower timestamp is a
    /// no-op, since such records are either already covered or arrive out of
    /// order within the same batch.
    pub fn observe(&mut self, created_at: i64, fingerprint: String) {
        if created_at > self.last_seen_created_at {
            self.last_seen_created_at = created_at;
            self.fingerprints_at_last_seen_created_at = vec![fingerprint];
        } else if created_at == self.last_seen_created_at
            && !self
                .fingerprints_at_last_seen_created_at
                .contains(&fingerprint)
        {
            self.fingerprints_at_last_seen_created_at.push(fingerprint);
        }
    }

    /// Cap the boundary fingerprint set, keeping the newest entries.
    pub fn trim_fingerprints(&mut self, max: usize) {
        let len = self.fingerprints_at_last_seen_created_at.len();
        if len > max {
            self.fingerprints_at_last_seen_created_at.drain(..len - max);
        }
    }
}
