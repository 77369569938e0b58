//! Common test utilities and helpers for relaystat tests
//!
//! Provides a fully populated consume record builder so individual tests
//! only spell out the fields they care about.

// Each integration test binary compiles this module separately and uses a
// different subset of the helpers.
#![allow(dead_code)]

use relaystat::types::{LogRecord, RecordKind};

/// A consume record with sensible defaults, to be tweaked per test
#[derive(Debug, Clone)]
pub struct ConsumeRecordBuilder {
    record: LogRecord,
}

impl ConsumeRecordBuilder {
    pub fn new(created_at: i64) -> Self {
        Self {
            record: LogRecord {
                created_at,
                kind: RecordKind::Consume,
                model_name: "gpt-4".to_string(),
                token_id: Some(1),
                token_name: "default".to_string(),
                prompt_tokens: 2,
                completion_tokens: 3,
                quota: 1.0,
                channel_id: 1,
                use_time: Some(0.0),
            },
        }
    }

    pub fn kind(mut self, kind: RecordKind) -> Self {
        self.record.kind = kind;
        self
    }

    pub fn model_name(mut self, model_name: &str) -> Self {
        self.record.model_name = model_name.to_string();
        self
    }

    pub fn token_id(mut self, token_id: Option<i64>) -> Self {
        self.record.token_id = token_id;
        self
    }

    pub fn token_name(mut self, token_name: &str) -> Self {
        self.record.token_name = token_name.to_string();
        self
    }

    pub fn tokens(mut self, prompt: u64, completion: u64) -> Self {
        self.record.prompt_tokens = prompt;
        self.record.completion_tokens = completion;
        self
    }

    pub fn quota(mut self, quota: f64) -> Self {
        self.record.quota = quota;
        self
    }

    pub fn use_time(mut self, use_time: Option<f64>) -> Self {
        self.record.use_time = use_time;
        self
    }

    pub fn build(self) -> LogRecord {
        self.record
    }
}

/// Shorthand for a consume record distinguished only by timestamp and quota
pub fn consume(created_at: i64, quota: f64) -> LogRecord {
    ConsumeRecordBuilder::new(created_at).quota(quota).build()
}
