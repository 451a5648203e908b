//! chanlog - Chat Log Search
//!
//! Runs a single command given on the command line, or one command per line
//! read from stdin, and prints the resulting display lines.

use anyhow::{Context, Result};
use chanlog::{Backend, LogRoot, QueryDispatcher, SearchConfig};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

fn cli() -> Command {
    let command = Command::new("chanlog")
        .version(chanlog::VERSION)
        .about("Search chat logs by channel or user")
        .long_about(
            "chanlog searches logs stored as <root>/<channel-or-user>/<YYYY-MM-DD>.log. \
             Commands look like '* <query>', '#<channel> <query>' or '@<user> <query>'; \
             without a command, one command per line is read from stdin.",
        )
        .arg(
            Arg::new("root")
                .long("root")
                .short('r')
                .value_name("DIR")
                .help("Log root directory (repeatable)")
                .action(ArgAction::Append)
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("budget")
                .long("budget")
                .short('n')
                .value_name("N")
                .help("Maximum number of results shown")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("backend")
                .long("backend")
                .value_name("BACKEND")
                .help("Line matcher to use")
                .value_parser(["native", "grep"]),
        )
        .arg(
            Arg::new("grep-program")
                .long("grep-program")
                .value_name("PATH")
                .help("grep executable used by the grep backend"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MS")
                .help("Wall-clock budget per query, 0 disables it")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("command")
                .help("Search command, e.g. '#hi hello'")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        );

    #[cfg(feature = "config")]
    let command = command.arg(
        Arg::new("config")
            .long("config")
            .short('c')
            .value_name("FILE")
            .help("TOML configuration file")
            .value_parser(value_parser!(PathBuf)),
    );

    command
}

#[cfg(feature = "config")]
fn base_config(matches: &ArgMatches) -> Result<SearchConfig> {
    if let Some(path) = matches.get_one::<PathBuf>("config") {
        return SearchConfig::load(path).context("loading configuration");
    }
    match SearchConfig::default_path() {
        Some(path) if path.is_file() => SearchConfig::load(&path).context("loading configuration"),
        _ => Ok(SearchConfig::default()),
    }
}

#[cfg(not(feature = "config"))]
fn base_config(_matches: &ArgMatches) -> Result<SearchConfig> {
    Ok(SearchConfig::default())
}

fn build_config(matches: &ArgMatches) -> Result<SearchConfig> {
    let mut config = base_config(matches)?;
    if let Some(budget) = matches.get_one::<usize>("budget") {
        config = config.with_budget(*budget);
    }
    if let Some(backend) = matches.get_one::<String>("backend") {
        config = config.with_backend(backend.parse::<Backend>()?);
    }
    if let Some(program) = matches.get_one::<String>("grep-program") {
        config = config.with_grep_program(program.clone());
    }
    if let Some(ms) = matches.get_one::<u64>("timeout-ms") {
        let timeout = (*ms > 0).then(|| Duration::from_millis(*ms));
        config = config.with_timeout(timeout);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = cli().get_matches();
    let config = build_config(&matches)?;
    let roots: Vec<LogRoot> = matches
        .get_many::<PathBuf>("root")
        .into_iter()
        .flatten()
        .map(LogRoot::new)
        .collect();

    let dispatcher = QueryDispatcher::new(config, roots)?;

    let words: Vec<&String> = matches
        .get_many::<String>("command")
        .into_iter()
        .flatten()
        .collect();
    if !words.is_empty() {
        let command = words
            .iter()
            .map(|word| word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        for line in dispatcher.execute_lines(&command).await {
            println!("{line}");
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(command) = lines.next_line().await.context("reading stdin")? {
        for line in dispatcher.execute_lines(&command).await {
            println!("{line}");
        }
    }

    Ok(())
}
