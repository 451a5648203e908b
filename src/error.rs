//! Error types and handling infrastructure for chanlog.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types. The binary layers `anyhow` on top for start-up failures.
//!
//! ## Design Principles
//!
//! - **One status line per error**: the `Display` text of every user-facing
//!   variant is exactly the line shown to the user
//! - **Context preservation**: Include relevant information for debugging
//! - **Consistency**: Standardized Result type across all modules

use crate::scope::ScopeKind;
use thiserror::Error;

/// The main error type for chanlog operations.
#[derive(Error, Debug)]
pub enum ChanlogError {
    /// Scope name contains a path separator; the query is aborted before
    /// any file is resolved
    #[error("Invalid {kind} name")]
    InvalidName { kind: ScopeKind, name: String },

    /// Resolution yielded zero log files
    #[error("No log files found for {scope}")]
    NoLogsFound { scope: String },

    /// The matching mechanism could not be invoked at all
    #[error("ERROR: search backend unavailable ({message})")]
    SearchUnavailable { message: String },

    /// A matched line does not follow the `[<time>] <message>` grammar.
    /// Never shown to users; such lines are dropped.
    #[error("Malformed log line: {line:?}")]
    MalformedLine { line: String },

    /// The query is not a valid regular expression
    #[error("ERROR: invalid query: {message}")]
    QueryError { message: String },

    /// File system related errors
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

/// Standard Result type for chanlog operations.
pub type Result<T> = std::result::Result<T, ChanlogError>;

impl ChanlogError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a SearchUnavailable error with a descriptive message
    pub fn search_unavailable(message: impl Into<String>) -> Self {
        Self::SearchUnavailable {
            message: message.into(),
        }
    }

    /// Create a QueryError carrying the matcher's diagnostic
    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a MalformedLine error for the offending line
    pub fn malformed(line: impl Into<String>) -> Self {
        Self::MalformedLine { line: line.into() }
    }
}

impl From<std::io::Error> for ChanlogError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}
