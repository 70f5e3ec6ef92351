use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::config::{self, SyncConfig};
use crate::providers;
use crate::runner;
use crate::setup;
use crate::sync::{push, reconcile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Pull, push, then run the tests.
    Full,
    Get,
    Patch,
    Help,
}

/// Parse the arguments after the program name.
pub fn parse_args(args: &[String]) -> Result<Command> {
    match args {
        [] => Ok(Command::Full),
        [cmd] => match cmd.as_str() {
            "get" => Ok(Command::Get),
            "patch" => Ok(Command::Patch),
            "help" | "-h" | "--help" => Ok(Command::Help),
            other => bail!("Unknown command '{other}'\n\n{}", usage()),
        },
        _ => bail!("Too many arguments\n\n{}", usage()),
    }
}

pub async fn run(command: Command) -> Result<()> {
    if command == Command::Help {
        print_help();
        return Ok(());
    }

    let config = load_or_setup()?;
    let service = providers::create_service(&config)?;

    if matches!(command, Command::Full | Command::Get) {
        let report = reconcile::pull(service.as_ref(), &config).await?;
        debug!(report = %serde_json::to_string(&report)?, "pull report");
        if !report.failed.is_empty() {
            warn!(ids = ?report.failed, "some test cases could not be pulled");
        }
        println!(
            "Pulled {} new test case(s) from {}",
            report.pulled.len(),
            service.name()
        );
    }

    if matches!(command, Command::Full | Command::Patch) {
        let report = push::push(service.as_ref(), &config).await?;
        debug!(report = %serde_json::to_string(&report)?, "push report");
        if !report.failed.is_empty() {
            warn!(ids = ?report.failed, "some test cases could not be updated");
        }
        println!(
            "Updated {} test case(s), {} ignored, {} skipped",
            report.patched.len(),
            report.ignored,
            report.skipped
        );
    }

    if command == Command::Full {
        runner::run_tests(&config).await?;
    }
    Ok(())
}

/// Loads the configuration, running the interactive setup on first use.
fn load_or_setup() -> Result<SyncConfig> {
    if config::find_config().is_some() {
        return Ok(config::load_config()?);
    }

    let target = config::config_candidates()
        .into_iter()
        .next()
        .unwrap_or_else(|| PathBuf::from(config::CONFIG_FILE_NAME));
    let stdin = io::stdin();
    let config = setup::run_setup(stdin.lock(), io::stdout())?;
    config::save_config(&config, &target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    info!(file = %target.display(), "configuration saved");
    Ok(config)
}

fn usage() -> &'static str {
    "USAGE:\n  testsync          Pull new test cases, push local edits, run the tests\n  testsync get      Pull new test cases only\n  testsync patch    Push local edits only\n  testsync help     Show this message"
}

pub fn print_help() {
    println!("testsync: keep local test cases and Azure DevOps test cases in sync\n");
    println!("{}", usage());
    println!();
    println!("ENVIRONMENT:");
    println!("  {}      Path of the configuration file", config::CONFIG_ENV);
    println!("  TESTSYNC_LOG         Log filter (default: testsync=info,warn)");
    println!("  TESTSYNC_LOG_FORMAT  compact (default) or json");
}
