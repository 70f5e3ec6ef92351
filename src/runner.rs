use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::SyncConfig;

/// Configured runner arguments followed by the corpus root.
pub fn runner_args(config: &SyncConfig) -> Vec<String> {
    let mut args = config.runner.args.clone();
    args.push(config.path.clone());
    args
}

/// Runs the external test runner over the corpus, streaming its output.
pub async fn run_tests(config: &SyncConfig) -> Result<()> {
    let command = &config.runner.command;
    let args = runner_args(config);
    info!(command = %command, args = ?args, "running tests");

    let status = tokio::process::Command::new(command)
        .args(&args)
        .status()
        .await
        .with_context(|| format!("Failed to run {command}"))?;

    if !status.success() {
        match status.code() {
            Some(code) => bail!("{command} exited with status {code}"),
            None => bail!("{command} was terminated by a signal"),
        }
    }
    Ok(())
}
