//! Error types for the interoperability runner
//!
//! Protocol-step failures (a shape application missing a milestone) are never
//! errors; they classify as [`ReturnCode`](crate::harness::ReturnCode) values.
//! This type covers configuration, IO and report problems, all of which abort
//! the suite run.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the interoperability runner
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "Test case '{case}': {apps} entity spec(s) but {expected} expected code(s). \
         Each entity needs exactly one expected code"
    )]
    LengthMismatch {
        case: String,
        apps: usize,
        expected: usize,
    },

    #[error("Entity parameters '{0}' select neither publisher (-P) nor subscriber (-S)")]
    RoleNotRecognized(String),

    #[error("Test case '{case}' not contained in test suite '{suite}'")]
    TestCaseNotFound { case: String, suite: String },

    #[error("Test suite '{0}' is neither a builtin suite nor a readable suite file")]
    SuiteNotFound(String),

    #[error("Failed to parse test suite file '{path}': {error}")]
    SuiteParse { path: String, error: String },

    // === Case Execution Errors ===
    #[error("Test case '{case}' exceeded the {seconds}s wall-clock cap")]
    CaseHung { case: String, seconds: u64 },

    // === Report Errors ===
    #[error("Failed to serialize report: {0}")]
    ReportSerialize(String),

    #[error("Failed to write report '{path}': {error}")]
    ReportWrite { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a suite parse error
    pub fn suite_parse(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::SuiteParse {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a report write error
    pub fn report_write(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::ReportWrite {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}
