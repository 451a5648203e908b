//! Query engine configuration.
//!
//! `SearchConfig` replaces the fixed module-level constants of a chat-log
//! search (result budget, matcher, timeout) with a value handed to the
//! dispatcher at construction. With the `config` feature it can also be read
//! from a TOML file.

use crate::error::{ChanlogError, Result};
use std::time::Duration;

/// Maximum number of records shown per query unless configured otherwise.
pub const DEFAULT_BUDGET: usize = 30;

/// Line matching mechanism used by the search executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum Backend {
    /// In-process regex engine (ripgrep core libraries)
    #[default]
    Native,
    /// External `grep -i -E` process
    Grep,
}

impl std::str::FromStr for Backend {
    type Err = ChanlogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "native" => Ok(Backend::Native),
            "grep" => Ok(Backend::Grep),
            other => Err(ChanlogError::config(format!("unknown backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Records kept per query before older ones are omitted
    pub budget: usize,
    pub backend: Backend,
    /// Program spawned by [`Backend::Grep`]
    pub grep_program: String,
    /// Wall-clock budget per query; results gathered so far are returned
    /// as truncated once it expires
    pub timeout: Option<Duration>,
    /// Files scanned concurrently by the native backend
    pub workers: usize,
    /// Bound of the match channel between scanner and consumer
    pub stream_capacity: usize,
    /// Lower-case scope names before resolving them against directories
    pub fold_scope_case: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            backend: Backend::Native,
            grep_program: "grep".to_string(),
            timeout: Some(Duration::from_secs(30)),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            stream_capacity: 256,
            fold_scope_case: true,
        }
    }
}

impl SearchConfig {
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_grep_program(mut self, program: impl Into<String>) -> Self {
        self.grep_program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_fold_scope_case(mut self, fold: bool) -> Self {
        self.fold_scope_case = fold;
        self
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.budget == 0 {
            return Err(ChanlogError::config("budget must be at least 1"));
        }
        if self.workers == 0 {
            return Err(ChanlogError::config("workers must be at least 1"));
        }
        if self.stream_capacity == 0 {
            return Err(ChanlogError::config("stream_capacity must be at least 1"));
        }
        if self.grep_program.trim().is_empty() {
            return Err(ChanlogError::config("grep_program must not be empty"));
        }
        Ok(())
    }
}

#[cfg(feature = "config")]
mod file {
    use super::{Backend, SearchConfig};
    use crate::error::{ChanlogError, Result};
    use serde::Deserialize;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    /// On-disk representation; every key is optional and falls back to the
    /// built-in default.
    #[derive(Debug, Default, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    struct ConfigFile {
        budget: Option<usize>,
        backend: Option<Backend>,
        grep_program: Option<String>,
        timeout_ms: Option<u64>,
        workers: Option<usize>,
        stream_capacity: Option<usize>,
        fold_scope_case: Option<bool>,
    }

    impl SearchConfig {
        /// Default config file location: `<config_dir>/chanlog/config.toml`
        pub fn default_path() -> Option<PathBuf> {
            dirs::config_dir().map(|dir| dir.join("chanlog").join("config.toml"))
        }

        pub fn from_toml_str(contents: &str) -> Result<Self> {
            let file: ConfigFile = toml::from_str(contents)
                .map_err(|e| ChanlogError::config(format!("invalid config file: {e}")))?;
            let defaults = SearchConfig::default();
            let config = SearchConfig {
                budget: file.budget.unwrap_or(defaults.budget),
                backend: file.backend.unwrap_or(defaults.backend),
                grep_program: file.grep_program.unwrap_or(defaults.grep_program),
                timeout: match file.timeout_ms {
                    Some(0) => None,
                    Some(ms) => Some(Duration::from_millis(ms)),
                    None => defaults.timeout,
                },
                workers: file.workers.unwrap_or(defaults.workers),
                stream_capacity: file.stream_capacity.unwrap_or(defaults.stream_capacity),
                fold_scope_case: file.fold_scope_case.unwrap_or(defaults.fold_scope_case),
            };
            config.validate()?;
            Ok(config)
        }

        pub fn load(path: &Path) -> Result<Self> {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                ChanlogError::file_error(
                    format!("Failed to read config file: {}", path.display()),
                    e,
                )
            })?;
            Self::from_toml_str(&contents)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SearchConfig::default();
        assert_eq!(config.budget, DEFAULT_BUDGET);
        assert_eq!(config.backend, Backend::Native);
        assert!(config.workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = SearchConfig::default().with_budget(0).validate().unwrap_err();
        assert!(matches!(err, ChanlogError::ConfigError { .. }));
    }

    #[test]
    fn backend_from_str() {
        assert_eq!("grep".parse::<Backend>().unwrap(), Backend::Grep);
        assert_eq!("native".parse::<Backend>().unwrap(), Backend::Native);
        assert!("ripgrep".parse::<Backend>().is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_overrides_defaults() {
        let config = SearchConfig::from_toml_str(
            r#"
            budget = 5
            backend = "grep"
            timeout_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.budget, 5);
        assert_eq!(config.backend, Backend::Grep);
        assert_eq!(config.timeout, None);
        assert_eq!(config.grep_program, "grep");
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_rejects_unknown_keys_and_bad_values() {
        assert!(SearchConfig::from_toml_str("colour = true").is_err());
        assert!(SearchConfig::from_toml_str("budget = 0").is_err());
    }
}
