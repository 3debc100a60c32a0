//! Error types for the medir benchmark harness
//!
//! One enum covers the whole pipeline so that every stage can propagate with
//! `?` and the CLI can render a single actionable message. Failures that
//! belong to one test case (`ExecutionFailed`, `MissingStat`) carry that
//! case's identity so a failed batch reports *which* case broke, not just
//! that something did.

use thiserror::Error;

/// Errors produced by trace synthesis, execution, collection and aggregation
#[derive(Debug, Error)]
pub enum MedirError {
    /// Trace synthesis was asked for an access kind other than read or write
    #[error("invalid access kind '{kind}': expected 'r' or 'w'")]
    InvalidAccessKind {
        /// The rejected access-kind string
        kind: String,
    },

    /// A configuration value or argument combination was rejected
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Filesystem operation failed
    #[error("I/O error: {message}")]
    IoError {
        /// What failed and the underlying OS error
        message: String,
    },

    /// The simulator subprocess for one test case failed to launch, exited
    /// non-zero, or was killed after exceeding its deadline
    #[error("test case '{name}' failed to execute: {reason}")]
    ExecutionFailed {
        /// Name of the failing test case
        name: String,
        /// Launch error, exit status, or timeout description
        reason: String,
    },

    /// A mandatory field was absent from the simulator's captured stdout
    #[error("missing mandatory field '{field}' in {path}")]
    MissingStat {
        /// The stdout pattern that did not match
        field: String,
        /// Path of the stdout capture that was searched
        path: String,
    },

    /// A stat file or stdout line could not be parsed
    #[error("failed to parse {context}: {reason}")]
    ParseFailure {
        /// What was being parsed
        context: String,
        /// Why it was rejected
        reason: String,
    },

    /// A result row's key set diverges from the schema established by row 0
    #[error("schema mismatch at result row {row}: {detail}")]
    SchemaMismatch {
        /// Zero-based index of the offending row
        row: usize,
        /// Missing and unexpected keys relative to row 0
        detail: String,
    },

    /// Concurrent writers raced on a trace cache entry and publication failed
    /// for a reason other than the benign "someone else won" case
    #[error("cache publication race on {path}")]
    CacheRace {
        /// The contested cache entry
        path: String,
    },
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, MedirError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_identity() {
        let err = MedirError::ExecutionFailed {
            name: "bandwidth\t(Pattern: read)".to_string(),
            reason: "exit status: 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bandwidth"));
        assert!(msg.contains("exit status: 1"));
    }

    #[test]
    fn test_missing_stat_names_field_and_path() {
        let err = MedirError::MissingStat {
            field: "Total clock".to_string(),
            path: "/tmp/out/vans_dump/stdout".to_string(),
        };
        assert!(err.to_string().contains("Total clock"));
        assert!(err.to_string().contains("vans_dump/stdout"));
    }

    #[test]
    fn test_invalid_access_kind_message() {
        let err = MedirError::InvalidAccessKind {
            kind: "rw".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid access kind 'rw': expected 'r' or 'w'"
        );
    }
}
