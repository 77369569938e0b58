//! Incremental sync driver
//!
//! Orchestrates one sync run for one account: determine the fetch window
//! from the cursor and retention settings, page through the caller-provided
//! [`LogSource`] from the oldest page to the newest, ingest with boundary
//! dedup, prune, and stamp the sync status. Scheduling (deciding *when* to
//! run) stays with the caller; this driver always runs when invoked, and
//! takes the current time as a parameter so runs are reproducible in tests.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{RelaystatError, Result};
use crate::ingest::ingest_consume_records;
use crate::retention::{prune_account_store, retention_cutoff_day_key};
use crate::store::{AccountStore, SyncState};
use crate::timezone::TimezoneConfig;
use crate::types::LogRecord;

/// How long an account stays on the unsupported cooldown after its log
/// endpoint answers 404/405/500.
pub const UNSUPPORTED_COOLDOWN_MS: i64 = 6 * 60 * 60 * 1000;

/// One page of log records from the upstream
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    /// Records on this page, in upstream order
    pub items: Vec<LogRecord>,
    /// Total matching records reported by the upstream (0 when unknown)
    pub total: u64,
}

/// Caller-implemented access to the upstream log endpoint.
///
/// The HTTP client, auth, and site-variant quirks live behind this trait;
/// the driver only asks for numbered pages of a time window.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch one page of consume logs for `[start_timestamp, end_timestamp]`
    /// (unix seconds). Pages are 1-based.
    async fn fetch_page(
        &self,
        page: u32,
        start_timestamp: i64,
        end_timestamp: i64,
    ) -> Result<LogPage>;
}

/// Safety caps for one sync run.
///
/// A freshly added account with a long history could otherwise fetch
/// unbounded pages; hitting a cap ends the run early and marks it partial,
/// and the next run continues from the committed cursor.
#[derive(Debug, Clone)]
pub struct SyncLimits {
    /// Upstream page size used to derive the page count from a total
    pub page_size: u32,
    /// Maximum pages fetched per run
    pub max_pages: u32,
    /// Maximum records ingested per run
    pub max_items: usize,
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 50,
            max_items: 5000,
        }
    }
}

/// Outcome of one sync run for one account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Records newly folded into the store
    pub ingested_count: usize,
    /// Pages fetched from the source
    pub pages_fetched: u32,
    /// Records received from the source (before dedup)
    pub items_fetched: usize,
    /// Whether a safety cap cut the run short
    pub partial: bool,
}

/// Derive the page count from an upstream total, falling back to a single
/// page when the total is missing but the first page had items.
fn resolve_total_pages(first_page: &LogPage, page_size: u32) -> u32 {
    if first_page.total > 0 {
        // An absurd upstream total saturates; max_pages bounds the run.
        first_page
            .total
            .div_ceil(u64::from(page_size))
            .try_into()
            .unwrap_or(u32::MAX)
    } else if first_page.items.is_empty() {
        0
    } else {
        1
    }
}

/// Stamp a failed attempt on the store's status.
fn stamp_failure(store: &mut AccountStore, now_ms: i64, error: &RelaystatError) {
    let unsupported = error.is_unsupported_log_endpoint();
    store.status.state = if unsupported {
        SyncState::Unsupported
    } else {
        SyncState::Error
    };
    store.status.last_sync_at = Some(now_ms);
    store.status.last_warning = None;
    store.status.last_error = Some(error.to_string());
    if unsupported {
        store.status.unsupported_until = Some(now_ms + UNSUPPORTED_COOLDOWN_MS);
    }
}

/// Run one incremental sync for one account.
///
/// On success the cursor candidate is committed, aggregates outside the
/// retention window are pruned, and the status records the attempt (with a
/// warning when safety caps made the run partial). On failure the status
/// records the error, plus a cooldown timestamp when the endpoint looks
/// unsupported, and the store's aggregates and cursor are left as the last
/// committed state.
///
/// A zero `page_size` in `limits` is a configuration error; the store is
/// left untouched, not stamped.
///
/// The caller must not run two syncs concurrently for the same account.
pub async fn sync_account(
    store: &mut AccountStore,
    source: &dyn LogSource,
    now_unix_seconds: i64,
    timezone: TimezoneConfig,
    retention_days: u32,
    limits: &SyncLimits,
) -> Result<SyncSummary> {
    if limits.page_size == 0 {
        return Err(RelaystatError::Config(
            "sync limits: page_size must be at least 1".to_string(),
        ));
    }

    let now_ms = now_unix_seconds * 1000;
    let retention_days = retention_days.max(1);
    let retention_start = (now_unix_seconds - i64::from(retention_days) * 86_400).max(0);

    let start_timestamp = store.cursor.last_seen_created_at.max(retention_start);
    let end_timestamp = now_unix_seconds;
    let cutoff = retention_cutoff_day_key(retention_days, now_unix_seconds, timezone.tz);

    let first_page = match source.fetch_page(1, start_timestamp, end_timestamp).await {
        Ok(page) => page,
        Err(error) => {
            stamp_failure(store, now_ms, &error);
            return Err(error);
        }
    };

    let total_pages = resolve_total_pages(&first_page, limits.page_size);
    debug!(
        total_pages,
        start_timestamp, end_timestamp, "starting sync run"
    );

    let start_cursor = store.cursor.clone();
    let mut cursor_candidate = start_cursor.clone();
    let mut summary = SyncSummary::default();

    // Oldest page first: the upstream orders newest-first, so the highest
    // page number holds the oldest records. That way the cursor only ever
    // advances past fully ingested timestamps, even when a cap stops us.
    let mut first_page = Some(first_page);
    for page in (1..=total_pages).rev() {
        if summary.pages_fetched >= limits.max_pages {
            summary.partial = true;
            break;
        }

        let page_data = if page == 1 {
            match first_page.take() {
                Some(page_data) => page_data,
                None => break,
            }
        } else {
            match source.fetch_page(page, start_timestamp, end_timestamp).await {
                Ok(page_data) => page_data,
                Err(error) => {
                    stamp_failure(store, now_ms, &error);
                    return Err(error);
                }
            }
        };
        summary.pages_fetched += 1;

        if summary.items_fetched >= limits.max_items {
            summary.partial = true;
            break;
        }
        let remaining = limits.max_items - summary.items_fetched;
        let truncated = page_data.items.len() > remaining;
        let items = &page_data.items[..page_data.items.len().min(remaining)];
        summary.items_fetched += items.len();

        let outcome =
            ingest_consume_records(store, items, &start_cursor, cursor_candidate, timezone.tz);
        cursor_candidate = outcome.cursor_candidate;
        summary.ingested_count += outcome.ingested_count;

        if truncated {
            summary.partial = true;
            break;
        }
    }

    store.cursor = cursor_candidate;
    prune_account_store(store, cutoff);

    store.status.state = SyncState::Success;
    store.status.last_sync_at = Some(now_ms);
    store.status.last_success_at = Some(now_ms);
    store.status.last_error = None;
    store.status.unsupported_until = None;
    store.status.last_warning = if summary.partial {
        let message = format!(
            "Reached safety limits (max_pages={}, max_items={}); history may be incomplete for this run.",
            limits.max_pages, limits.max_items
        );
        warn!("{message}");
        Some(message)
    } else {
        None
    };

    Ok(summary)
}
