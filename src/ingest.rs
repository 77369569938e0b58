//! Ingestion pipeline: boundary dedup + aggregation fold
//!
//! The upstream delivers at-least-once: pages overlap on re-fetch and the
//! same record can be observed across sync runs, keyed only by a
//! second-granularity timestamp. This module turns that into exactly-once
//! aggregation by filtering batches against the cursor's boundary
//! fingerprints before folding records into the account store.

use chrono_tz::Tz;
use tracing::debug;

use crate::fingerprint::fingerprint;
use crate::keys::{DayKey, HourKey};
use crate::store::AccountStore;
use crate::types::{Cursor, LogRecord, RecordKind};

/// Cap on the boundary fingerprint set carried by the cursor.
///
/// A single busy second can, in principle, hold more records than this; the
/// trim keeps the newest entries, which are the ones the next fetch window
/// can overlap with.
pub const MAX_CURSOR_FINGERPRINTS: usize = 200;

/// Result of one ingestion call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// How many records were newly folded into the store
    pub ingested_count: usize,
    /// Cursor candidate carrying the highest accepted timestamp and its fingerprints
    pub cursor_candidate: Cursor,
}

/// Ingest a batch of consume records into an account store.
///
/// `start_cursor` is the cursor as of the start of the sync run and is used
/// only for duplicate testing; `cursor_candidate` accumulates across batches
/// within the same run and is advanced by every accepted record. The caller
/// must keep `start_cursor` fixed for the whole run, even across pages.
///
/// Per record, in whatever order records arrive:
/// - non-consume kinds are skipped;
/// - `created_at` below the start cursor is skipped (covered by a prior run);
/// - `created_at` equal to the start cursor is skipped only when its
///   fingerprint is already known at that boundary;
/// - anything newer is accepted unconditionally.
///
/// Re-running with the boundary-timestamp subset of an already-ingested
/// batch yields `ingested_count == 0` and an unchanged store, which is the
/// idempotence contract re-syncs rely on.
pub fn ingest_consume_records(
    store: &mut AccountStore,
    items: &[LogRecord],
    start_cursor: &Cursor,
    mut cursor_candidate: Cursor,
    tz: Tz,
) -> IngestOutcome {
    let mut ingested_count = 0;

    for item in items {
        if item.kind != RecordKind::Consume {
            continue;
        }

        if item.created_at < start_cursor.last_seen_created_at {
            // Already covered by a prior sync. A source that emits records
            // below its own window would lose them here.
            debug!(
                created_at = item.created_at,
                cursor = start_cursor.last_seen_created_at,
                "skipping record below start cursor"
            );
            continue;
        }

        let fp = fingerprint(item);

        if item.created_at == start_cursor.last_seen_created_at
            && start_cursor
                .fingerprints_at_last_seen_created_at
                .contains(&fp)
        {
            continue;
        }

        let day_key = DayKey::from_unix_seconds(item.created_at, tz);
        let hour_key = HourKey::from_unix_seconds(item.created_at, tz);
        store.fold_consume(item, day_key, hour_key);
        ingested_count += 1;

        cursor_candidate.observe(item.created_at, fp);
    }

    cursor_candidate.trim_fingerprints(MAX_CURSOR_FINGERPRINTS);

    IngestOutcome {
        ingested_count,
        cursor_candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::DayKey;
    use chrono::NaiveDate;

    fn consume(created_at: i64, quota: f64) -> LogRecord {
        LogRecord {
            created_at,
            kind: RecordKind::Consume,
            model_name: "gpt-4".to_string(),
            token_id: Some(1),
            token_name: "default".to_string(),
            prompt_tokens: 2,
            completion_tokens: 3,
            quota,
            channel_id: 1,
            use_time: Some(0.0),
        }
    }

    #[test]
    fn test_ingest_advances_cursor_to_max_timestamp() {
        let mut store = AccountStore::default();
        let items = vec![consume(100, 1.0), consume(300, 2.0), consume(200, 3.0)];

        let outcome = ingest_consume_records(
            &mut store,
            &items,
            &Cursor::default(),
            Cursor::default(),
            Tz::UTC,
        );

        assert_eq!(outcome.ingested_count, 3);
        assert_eq!(outcome.cursor_candidate.last_seen_created_at, 300);
        assert_eq!(
            outcome
                .cursor_candidate
                .fingerprints_at_last_seen_created_at
                .len(),
            1
        );
        let day = DayKey::new(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        assert_eq!(store.daily[&day].requests, 3);
    }

    #[test]
    fn test_non_consume_records_are_skipped() {
        let mut store = AccountStore::default();
        let mut topup = consume(100, 1.0);
        topup.kind = RecordKind::Topup;
        let mut unknown = consume(200, 1.0);
        unknown.kind = RecordKind::Other(42);

        let outcome = ingest_consume_records(
            &mut store,
            &[topup, unknown],
            &Cursor::default(),
            Cursor::default(),
            Tz::UTC,
        );

        assert_eq!(outcome.ingested_count, 0);
        assert!(store.daily.is_empty());
        assert_eq!(outcome.cursor_candidate, Cursor::default());
    }

    #[test]
    fn test_records_below_start_cursor_are_skipped() {
        let mut store = AccountStore::default();
        let start = Cursor {
            last_seen_created_at: 200,
            fingerprints_at_last_seen_created_at: vec![],
        };

        let outcome = ingest_consume_records(
            &mut store,
            &[consume(100, 1.0)],
            &start,
            start.clone(),
            Tz::UTC,
        );

        assert_eq!(outcome.ingested_count, 0);
        assert!(store.daily.is_empty());
    }

    #[test]
    fn test_boundary_duplicate_is_skipped_new_record_accepted() {
        let mut store = AccountStore::default();
        let known = consume(200, 1.0);
        let new_at_boundary = consume(200, 9.0);

        let start = Cursor {
            last_seen_created_at: 200,
            fingerprints_at_last_seen_created_at: vec![fingerprint(&known)],
        };

        let outcome = ingest_consume_records(
            &mut store,
            &[known.clone(), new_at_boundary.clone()],
            &start,
            start.clone(),
            Tz::UTC,
        );

        assert_eq!(outcome.ingested_count, 1);
        assert_eq!(outcome.cursor_candidate.last_seen_created_at, 200);
        // Both fingerprints now live at the boundary timestamp.
        assert_eq!(
            outcome.cursor_candidate.fingerprints_at_last_seen_created_at,
            vec![fingerprint(&known), fingerprint(&new_at_boundary)]
        );
    }

    #[test]
    fn test_reingesting_boundary_subset_is_idempotent() {
        let mut store = AccountStore::default();
        let items = vec![consume(100, 1.0), consume(200, 2.0), consume(200, 3.0)];

        let first = ingest_consume_records(
            &mut store,
            &items,
            &Cursor::default(),
            Cursor::default(),
            Tz::UTC,
        );
        assert_eq!(first.ingested_count, 3);
        let cursor = first.cursor_candidate;
        let store_snapshot = store.clone();

        // Second run only sees the records at the boundary timestamp.
        let boundary_items: Vec<_> = items
            .iter()
            .filter(|item| item.created_at == cursor.last_seen_created_at)
            .cloned()
            .collect();
        assert_eq!(boundary_items.len(), 2);

        let second =
            ingest_consume_records(&mut store, &boundary_items, &cursor, cursor.clone(), Tz::UTC);

        assert_eq!(second.ingested_count, 0);
        assert_eq!(second.cursor_candidate, cursor);
        assert_eq!(store, store_snapshot);
    }

    #[test]
    fn test_cursor_candidate_carries_across_batches() {
        let mut store = AccountStore::default();
        let start = Cursor::default();

        let first = ingest_consume_records(
            &mut store,
            &[consume(100, 1.0)],
            &start,
            start.clone(),
            Tz::UTC,
        );
        let second = ingest_consume_records(
            &mut store,
            &[consume(100, 2.0), consume(150, 3.0)],
            &start,
            first.cursor_candidate,
            Tz::UTC,
        );

        assert_eq!(second.ingested_count, 2);
        assert_eq!(second.cursor_candidate.last_seen_created_at, 150);
    }

    #[test]
    fn test_fingerprint_set_is_trimmed_to_cap() {
        let mut store = AccountStore::default();
        let items: Vec<_> = (0..(MAX_CURSOR_FINGERPRINTS + 50))
            .map(|i| consume(500, i as f64))
            .collect();

        let outcome = ingest_consume_records(
            &mut store,
            &items,
            &Cursor::default(),
            Cursor::default(),
            Tz::UTC,
        );

        assert_eq!(outcome.ingested_count, MAX_CURSOR_FINGERPRINTS + 50);
        assert_eq!(
            outcome
                .cursor_candidate
                .fingerprints_at_last_seen_created_at
                .len(),
            MAX_CURSOR_FINGERPRINTS
        );
        // The newest fingerprints survive the trim.
        assert!(
            outcome
                .cursor_candidate
                .fingerprints_at_last_seen_created_at
                .contains(&fingerprint(items.last().unwrap()))
        );
    }
}
