//! relaystat - deduplicated usage-history aggregation for API gateway accounts
//!
//! This library ingests per-account streams of consumption log records from
//! OpenAI-compatible gateway deployments (New-API and friends) and turns
//! them into rolling aggregates by day, hour, model, token, and
//! token-by-model, plus bounded latency histograms, without ever storing
//! raw logs. The upstream delivers at-least-once with second-granularity
//! timestamps, so ingestion dedupes against a cursor carrying fingerprints
//! at the boundary timestamp, and retention pruning bounds storage.
//!
//! Fetching (HTTP), persistence, and scheduling stay with the embedding
//! application: it implements [`sync::LogSource`], stores the
//! [`store::HistoryStore`] however it likes, and decides when to call
//! [`sync::sync_account`].
//!
//! # Examples
//!
//! ```
//! use chrono_tz::Tz;
//! use relaystat::ingest::ingest_consume_records;
//! use relaystat::retention::{prune_account_store, retention_cutoff_day_key};
//! use relaystat::store::AccountStore;
//! use relaystat::types::{Cursor, LogRecord, RecordKind};
//!
//! let mut store = AccountStore::default();
//! let records = vec![LogRecord {
//!     created_at: 1_768_046_400, // 2026-01-10T12:00:00Z
//!     kind: RecordKind::Consume,
//!     model_name: "gpt-4".to_string(),
//!     token_id: Some(7),
//!     token_name: "team-key".to_string(),
//!     prompt_tokens: 10,
//!     completion_tokens: 5,
//!     quota: 2.0,
//!     channel_id: 1,
//!     use_time: Some(1.2),
//! }];
//!
//! let start_cursor = store.cursor.clone();
//! let outcome = ingest_consume_records(
//!     &mut store,
//!     &records,
//!     &start_cursor,
//!     start_cursor.clone(),
//!     Tz::UTC,
//! );
//! assert_eq!(outcome.ingested_count, 1);
//! store.cursor = outcome.cursor_candidate;
//!
//! let cutoff = retention_cutoff_day_key(7, 1_768_046_400, Tz::UTC);
//! prune_account_store(&mut store, cutoff);
//! assert_eq!(store.daily.len(), 1);
//! ```

pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod keys;
pub mod retention;
pub mod store;
pub mod sync;
pub mod timezone;
pub mod types;

// Re-export commonly used types
pub use error::{RelaystatError, Result};
pub use keys::{DayKey, HourKey, ModelKey, TokenKey};
pub use store::{AccountStore, HistoryStore, SyncState, SyncStatus, STORE_SCHEMA_VERSION};
pub use sync::{sync_account, LogPage, LogSource, SyncLimits, SyncSummary};
pub use timezone::TimezoneConfig;
pub use types::{Cursor, DailyAggregate, LatencyAggregate, LogRecord, RecordKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
