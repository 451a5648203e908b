//! Query orchestration: command text in, display lines out.
//!
//! A command is `<scope> <query>` where scope is `*`, `#<channel>` or
//! `@<user>`. The dispatcher resolves the scope to files, searches them,
//! parses and ranks the matches and renders either a single status line or
//! the ranked records followed by a footer when results were withheld.

use crate::config::SearchConfig;
use crate::error::{ChanlogError, Result};
use crate::ranker::{ResultRanker, SearchOutcome};
use crate::record::RecordParser;
use crate::resolver::{LogRoot, PathResolver};
use crate::scope::ScopeSelector;
use crate::search::SearchExecutor;
use log::{debug, info};
use tokio::time::Instant;
use unicode_normalization::UnicodeNormalization;

const HELP: &[&str] = &[
    "The channel/user portion of a command is a glob (\"*\" matches anything).",
    "The query is a case-insensitive extended regular expression (\".*\" matches anything).",
];

const COMMANDS: &[(&str, &str)] = &[
    ("?/help", "Shows the help text"),
    ("* <query>", "Search all logs for <query>"),
    ("#<channel> <query>", "Search logs in <channel> for <query>"),
    ("@<user> <query>", "Search logs to/from <user> for <query>"),
];

const EXAMPLES: &[(&str, &str)] = &[
    ("#hi hi", "Messages in the #hi channel saying \"hi\""),
    ("@NickServ .*", "Any private messages to/from NickServ"),
    ("@* hello", "Any private messages saying \"hello\""),
    ("#* znc", "Mentions of ZNC in any channel"),
    ("#znc* testing", "Messages in channels starting with \"znc\" saying \"testing\""),
    ("* znc", "Mentions of ZNC in any logs (channel or private message)"),
    ("* ] \\* .* dances", "Dancing users in any logs"),
    ("* .*", "Any messages in any logs"),
];

/// Help listing for hosts that display it.
pub fn help_lines() -> Vec<String> {
    let width = COMMANDS
        .iter()
        .chain(EXAMPLES)
        .map(|(command, _)| command.len())
        .max()
        .unwrap_or(0);

    let mut lines: Vec<String> = HELP.iter().map(|line| line.to_string()).collect();
    lines.push(String::new());
    lines.push("Commands:".to_string());
    lines.extend(
        COMMANDS
            .iter()
            .map(|(command, text)| format!("  {command:<width$}  {text}")),
    );
    lines.push(String::new());
    lines.push("Examples:".to_string());
    lines.extend(
        EXAMPLES
            .iter()
            .map(|(command, text)| format!("  {command:<width$}  {text}")),
    );
    lines
}

/// A command split into its scope token and query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCommand {
    pub scope: String,
    pub query: String,
}

impl QueryCommand {
    /// Split raw command text. `None` means the help listing should be shown.
    ///
    /// The text is NFKC-normalised and trimmed first. A bare `*` only selects
    /// all logs when followed by a space and a query.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw.nfkc().collect();
        let command = normalized.trim();

        if command.is_empty() || command == "?" || command == "help" {
            return None;
        }
        if !command.starts_with(['*', '#', '@']) {
            return None;
        }
        if command.starts_with('*') && !command.starts_with("* ") {
            return None;
        }

        let (scope, query) = command.split_once(' ')?;
        Some(Self {
            scope: scope.to_string(),
            query: query.to_string(),
        })
    }
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The host should display its help listing
    ShowHelp,
    /// A single status line (errors, no logs, no matches, timeouts)
    Status(String),
    Results {
        header: String,
        outcome: SearchOutcome,
    },
}

impl Response {
    /// Display lines for this response; help comes from [`help_lines`].
    pub fn lines(&self) -> Vec<String> {
        match self {
            Response::ShowHelp => help_lines(),
            Response::Status(status) => vec![status.clone()],
            Response::Results { header, outcome } => {
                let mut lines = Vec::with_capacity(outcome.records.len() + 2);
                lines.push(header.clone());
                lines.extend(outcome.records.iter().map(|record| record.to_string()));
                if outcome.truncated {
                    lines.push(truncation_footer(outcome.omitted));
                }
                lines
            }
        }
    }
}

fn truncation_footer(omitted: usize) -> String {
    if omitted > 0 {
        format!("{omitted} earlier results not shown")
    } else {
        "Some earlier results not shown".to_string()
    }
}

/// Top-level entry point tying resolution, search, parsing and ranking together.
#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    config: SearchConfig,
    roots: Vec<LogRoot>,
    resolver: PathResolver,
    executor: SearchExecutor,
    ranker: ResultRanker,
}

impl QueryDispatcher {
    /// Dispatcher searching `roots` with the backend chosen in `config`.
    ///
    /// # Errors
    /// * `ConfigError` if `config` fails validation
    pub fn new(config: SearchConfig, roots: Vec<LogRoot>) -> Result<Self> {
        let executor = SearchExecutor::from_config(&config);
        Self::with_executor(config, roots, executor)
    }

    /// Dispatcher using a caller-provided executor (custom matchers).
    pub fn with_executor(
        config: SearchConfig,
        roots: Vec<LogRoot>,
        executor: SearchExecutor,
    ) -> Result<Self> {
        config.validate()?;
        let ranker = ResultRanker::new(config.budget);
        Ok(Self {
            config,
            roots,
            resolver: PathResolver::new(),
            executor,
            ranker,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run one raw command. Never fails: errors become status lines.
    pub async fn execute(&self, raw_command: &str) -> Response {
        let Some(command) = QueryCommand::parse(raw_command) else {
            return Response::ShowHelp;
        };

        match self.run(&command).await {
            Ok(response) => response,
            Err(err) => {
                info!("query '{}' on {} failed: {err}", command.query, command.scope);
                Response::Status(err.to_string())
            }
        }
    }

    /// [`QueryDispatcher::execute`] rendered to display lines.
    pub async fn execute_lines(&self, raw_command: &str) -> Vec<String> {
        self.execute(raw_command).await.lines()
    }

    async fn run(&self, command: &QueryCommand) -> Result<Response> {
        let Some(selector) = ScopeSelector::parse(&command.scope)? else {
            return Ok(Response::ShowHelp);
        };

        let outcome = self.search(&selector, &command.query).await?;
        if outcome.records.is_empty() {
            // Only the deadline can cut a search short before anything matched
            let status = if outcome.truncated {
                "No matches found before the search timed out"
            } else {
                "No matches found"
            };
            return Ok(Response::Status(status.to_string()));
        }

        let header = match selector.kind() {
            None => format!("Results of searching all logs for '{}':", command.query),
            Some(kind) => format!(
                "Results of searching the logs of {kind}s matching '{}' for '{}':",
                command.scope, command.query
            ),
        };
        Ok(Response::Results { header, outcome })
    }

    /// Search `selector` for `query` and rank the results.
    ///
    /// # Errors
    /// * `InvalidName` for names containing a path separator
    /// * `NoLogsFound` when the scope resolves to no files
    /// * `QueryError` for invalid patterns
    /// * `SearchUnavailable` when the matcher cannot run
    pub async fn search(&self, selector: &ScopeSelector, query: &str) -> Result<SearchOutcome> {
        selector.validate()?;
        let resolved = if self.config.fold_scope_case {
            selector.folded()
        } else {
            selector.clone()
        };

        let files = self.resolver.resolve_all(&self.roots, &resolved)?;
        if files.is_empty() {
            return Err(ChanlogError::NoLogsFound {
                scope: selector.describe(),
            });
        }

        let deadline = self.config.timeout.map(|timeout| Instant::now() + timeout);
        let collected = self.executor.run(files, query, deadline).await?;
        debug!(
            "{} matches from {} files ({} unreadable), truncated: {}",
            collected.matches.len(),
            collected.stats.files_scanned,
            collected.stats.files_unreadable,
            collected.truncated
        );

        let mut parser = RecordParser::new();
        let records = parser.parse_all(&collected.matches);
        let mut outcome = self.ranker.rank(records, collected.truncated);
        outcome.skipped_lines = parser.skipped();
        Ok(outcome)
    }
}
