//! Record fingerprinting for cursor boundary dedup
//!
//! The upstream masks log ids on its per-user log endpoint, so records have
//! no durable primary key. The fingerprint is a deterministic identity
//! string over the semantically relevant fields, used only to deduplicate
//! records that share the cursor's boundary timestamp.

use crate::types::LogRecord;

/// Version prefix baked into every fingerprint.
///
/// Bump this when the field list changes; old fingerprints then never match
/// and the boundary records are at worst re-deduplicated by timestamp.
pub const FINGERPRINT_VERSION: &str = "v1";

/// Build the dedup fingerprint for a log record.
///
/// Pure and total: any field values produce a fingerprint, and the same
/// values always produce the same string across process restarts.
///
/// The latency part is the numeric value when `use_time` is a finite number,
/// and the literal `unknown` otherwise. The distinction matters: a record
/// with a real zero-second latency and an otherwise identical record with no
/// latency at all must not collapse into one identity, or re-syncs would
/// silently drop one of them at the boundary.
///
/// # Examples
/// ```
/// use relaystat::fingerprint::fingerprint;
/// use relaystat::types::{LogRecord, RecordKind};
///
/// let record = LogRecord {
///     created_at: 100,
///     kind: RecordKind::Consume,
///     model_name: "gpt-4".to_string(),
///     token_id: Some(7),
///     token_name: String::new(),
///     prompt_tokens: 2,
///     completion_tokens: 3,
///     quota: 1.0,
///     channel_id: 4,
///     use_time: None,
/// };
/// assert_eq!(fingerprint(&record), "v1|100|2|gpt-4|1|2|3|4|7|unknown");
/// ```
pub fn fingerprint(record: &LogRecord) -> String {
    let latency_part = match record.use_time {
        Some(value) if value.is_finite() => value.to_string(),
        _ => "unknown".to_string(),
    };

    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        FINGERPRINT_VERSION,
        record.created_at,
        i64::from(record.kind),
        record.model_name,
        record.quota,
        record.prompt_tokens,
        record.completion_tokens,
        record.channel_id,
        record.token_id.unwrap_or(0),
        latency_part,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordKind;

    fn base_record() -> LogRecord {
        LogRecord {
            created_at: 1000,
            kind: RecordKind::Consume,
            model_name: "gpt-4".to_string(),
            token_id: Some(1),
            token_name: "default".to_string(),
            prompt_tokens: 10,
            completion_tokens: 5,
            quota: 2.5,
            channel_id: 3,
            use_time: Some(0.0),
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let record = base_record();
        assert_eq!(fingerprint(&record), fingerprint(&record.clone()));
        assert_eq!(fingerprint(&record), "v1|1000|2|gpt-4|2.5|10|5|3|1|0");
    }

    #[test]
    fn test_fingerprint_changes_with_relevant_fields() {
        let record = base_record();
        let base = fingerprint(&record);

        let mut changed = record.clone();
        changed.created_at += 1;
        assert_ne!(fingerprint(&changed), base);

        let mut changed = record.clone();
        changed.model_name = "gpt-4o".to_string();
        assert_ne!(fingerprint(&changed), base);

        let mut changed = record.clone();
        changed.quota = 2.6;
        assert_ne!(fingerprint(&changed), base);

        let mut changed = record;
        changed.token_id = Some(2);
        assert_ne!(fingerprint(&changed), base);
    }

    #[test]
    fn test_latency_validity_changes_fingerprint() {
        let zero_latency = base_record();

        let mut missing_latency = zero_latency.clone();
        missing_latency.use_time = None;

        let mut nan_latency = zero_latency.clone();
        nan_latency.use_time = Some(f64::NAN);

        assert_ne!(fingerprint(&zero_latency), fingerprint(&missing_latency));
        assert_eq!(fingerprint(&missing_latency), fingerprint(&nan_latency));
        assert!(fingerprint(&missing_latency).ends_with("|unknown"));
        assert!(fingerprint(&zero_latency).ends_with("|0"));
    }

    #[test]
    fn test_missing_token_id_renders_as_zero() {
        let mut record = base_record();
        record.token_id = None;
        assert_eq!(fingerprint(&record), "v1|1000|2|gpt-4|2.5|10|5|3|0|0");
    }
}
