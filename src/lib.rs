//! # chanlog - Chat Log Search
//!
//! A query engine for line-oriented chat-log archives laid out as
//! `<root>/<channel-or-user>/<YYYY-MM-DD>.log`, one `[HH:MM:SS] message` per line.
//!
//! ## Features
//!
//! - **Safe scope resolution**: channel/user globs never leave the log root
//! - **Streaming search**: case-insensitive regex matching with date-group
//!   early termination and cooperative cancellation
//! - **Two backends**: in-process ripgrep core libraries or an external `grep`
//! - **Deterministic output**: newest-first budget truncation, then
//!   channel/date/time display order
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`config`] - Engine configuration
//! - [`scope`] - Scope selectors (`*`, `#channel`, `@user`)
//! - [`resolver`] - Scope to log file resolution
//! - [`search`] - Line matchers and the search executor
//! - [`record`] - Parsing matches into records
//! - [`ranker`] - Budget truncation and ordering
//! - [`dispatch`] - Command handling and output rendering

// Core modules
pub mod config;
pub mod error;

// Pipeline stages
pub mod dispatch;
pub mod ranker;
pub mod record;
pub mod resolver;
pub mod scope;
pub mod search;

// Re-export commonly used types for convenience
pub use error::{ChanlogError, Result};

// Public API surface for external usage
pub use config::{Backend, SearchConfig};
pub use dispatch::{QueryDispatcher, Response};
pub use ranker::SearchOutcome;
pub use record::SearchRecord;
pub use resolver::{LogFileRef, LogRoot};
pub use scope::ScopeSelector;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
