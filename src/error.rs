//! Error types for relaystat
//!
//! This module defines the error types used throughout the relaystat library.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! # Example
//!
//! ```
//! use relaystat::error::{RelaystatError, Result};
//!
//! fn example_function() -> Result<()> {
//!     let _value: serde_json::Value = serde_json::from_str("{}")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Main error type for relaystat operations
///
/// This enum encompasses all possible errors that can occur while syncing
/// and aggregating usage history, from serialization failures to errors
/// surfaced by the caller-provided log source.
#[derive(Error, Debug)]
pub enum RelaystatError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid timezone
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The upstream log endpoint answered with a non-success status
    #[error("Log endpoint returned status {status}: {message}")]
    Api {
        /// HTTP status code reported by the upstream
        status: u16,
        /// Upstream error message, sanitized by the fetch layer
        message: String,
    },

    /// Fetch-layer failure that is not an HTTP status (transport, decode)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelaystatError {
    /// Whether this error indicates the account's log endpoint is unsupported.
    ///
    /// Gateways that do not expose a per-user log endpoint answer 404/405, and
    /// some older deployments crash with 500. Such accounts are put on a
    /// cooldown instead of being retried on every run.
    pub fn is_unsupported_log_endpoint(&self) -> bool {
        matches!(
            self,
            Self::Api {
                status: 404 | 405 | 500,
                ..
            }
        )
    }
}

/// Convenience type alias for Results in relaystat
///
/// This type alias makes it easier to work with Results throughout
/// the codebase by providing a default error type.
///
/// # Example
///
/// ```
/// use relaystat::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, RelaystatError>;
