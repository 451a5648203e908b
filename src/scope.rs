//! Scope selectors restricting a search to all logs, a channel, or a user.
//!
//! The name carried by a selector doubles as a glob pattern: `#znc*` selects
//! every channel starting with `znc`, `@*` every private conversation.

use crate::error::{ChanlogError, Result};
use std::fmt;

/// Whether a named scope refers to a channel or to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Channel,
    User,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Channel => f.write_str("channel"),
            ScopeKind::User => f.write_str("user"),
        }
    }
}

/// Restriction applied to a single query.
///
/// `Channel` names keep their leading `#` (log directories are named after the
/// channel including the prefix). `User` names are stored without the `@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSelector {
    All,
    Channel(String),
    User(String),
}

impl ScopeSelector {
    /// Parse the scope token of a command (`*`, `#chan`, `@user`).
    ///
    /// Returns `Ok(None)` when the token is not a scope at all and
    /// `InvalidName` when the name contains a path separator.
    pub fn parse(token: &str) -> Result<Option<Self>> {
        let selector = if token == "*" {
            ScopeSelector::All
        } else if token.starts_with('#') {
            ScopeSelector::Channel(token.to_string())
        } else if let Some(user) = token.strip_prefix('@') {
            ScopeSelector::User(user.to_string())
        } else {
            return Ok(None);
        };
        selector.validate()?;
        Ok(Some(selector))
    }

    pub fn kind(&self) -> Option<ScopeKind> {
        match self {
            ScopeSelector::All => None,
            ScopeSelector::Channel(_) => Some(ScopeKind::Channel),
            ScopeSelector::User(_) => Some(ScopeKind::User),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ScopeSelector::All => None,
            ScopeSelector::Channel(name) | ScopeSelector::User(name) => Some(name),
        }
    }

    /// Reject names that could address anything outside a single directory
    /// level below the log root.
    pub fn validate(&self) -> Result<()> {
        if let (Some(kind), Some(name)) = (self.kind(), self.name()) {
            if name.chars().any(std::path::is_separator) {
                return Err(ChanlogError::InvalidName {
                    kind,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Lower-cased copy used for resolution against on-disk directory names.
    pub fn folded(&self) -> Self {
        match self {
            ScopeSelector::All => ScopeSelector::All,
            ScopeSelector::Channel(name) => ScopeSelector::Channel(name.to_lowercase()),
            ScopeSelector::User(name) => ScopeSelector::User(name.to_lowercase()),
        }
    }

    /// Human-readable description used in status lines.
    pub fn describe(&self) -> String {
        match self {
            ScopeSelector::All => "any channel or user".to_string(),
            ScopeSelector::Channel(name) => format!("channel '{name}'"),
            ScopeSelector::User(name) => format!("user '@{name}'"),
        }
    }
}

impl fmt::Display for ScopeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeSelector::All => f.write_str("*"),
            ScopeSelector::Channel(name) => f.write_str(name),
            ScopeSelector::User(name) => write!(f, "@{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_scope_form() {
        assert_eq!(ScopeSelector::parse("*").unwrap(), Some(ScopeSelector::All));
        assert_eq!(
            ScopeSelector::parse("#znc*").unwrap(),
            Some(ScopeSelector::Channel("#znc*".to_string()))
        );
        assert_eq!(
            ScopeSelector::parse("@NickServ").unwrap(),
            Some(ScopeSelector::User("NickServ".to_string()))
        );
        assert_eq!(ScopeSelector::parse("hello").unwrap(), None);
        assert_eq!(ScopeSelector::parse("*x").unwrap(), None);
    }

    #[test]
    fn rejects_path_separators() {
        for token in ["#../etc", "@a/b", "#a/"] {
            match ScopeSelector::parse(token) {
                Err(ChanlogError::InvalidName { name, .. }) => assert!(name.contains('/')),
                other => panic!("expected InvalidName for {token}, got {other:?}"),
            }
        }
    }

    #[test]
    fn folding_keeps_kind() {
        let folded = ScopeSelector::Channel("#ZNC".to_string()).folded();
        assert_eq!(folded, ScopeSelector::Channel("#znc".to_string()));
        assert_eq!(ScopeSelector::User("Bob".to_string()).to_string(), "@Bob");
    }
}
