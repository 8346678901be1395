//! CLI command execution.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::debug;

use childproc::{
    exec, exec_file, exec_file_sync, exec_sync, fork, spawn, spawn_sync, Failure, Outcome,
};

use super::args::{Cli, Commands};

/// Run the selected operation and report it. Returns the process exit code.
pub async fn execute(cli: Cli) -> Result<i32> {
    let json = cli.json;
    let result = match cli.command {
        Commands::Exec { command, launch } => exec(&command, &launch.to_options()).await,
        Commands::ExecFile { file, args, launch } => {
            exec_file(&file, args, &launch.to_options()).await
        }
        Commands::Fork {
            module,
            args,
            exec_path,
            exec_argv,
            silent,
            launch,
        } => {
            let mut options = launch.to_options();
            options.exec_path = exec_path;
            options.exec_argv = exec_argv;
            options.silent = silent;
            fork(&module, args, &options).await
        }
        Commands::Spawn {
            command,
            args,
            launch,
        } => spawn(&command, args, &launch.to_options()).await,
        Commands::ExecSync { command, launch } => {
            blocking(move || exec_sync(&command, &launch.to_options())).await?
        }
        Commands::ExecFileSync { file, args, launch } => {
            blocking(move || exec_file_sync(&file, args, &launch.to_options())).await?
        }
        Commands::SpawnSync {
            command,
            args,
            launch,
        } => blocking(move || spawn_sync(&command, args, &launch.to_options())).await?,
    };

    match result {
        Ok(outcome) => {
            debug!(cmd = %outcome.cmd, code = ?outcome.code, "command succeeded");
            report_outcome(&outcome, json)?;
            Ok(0)
        }
        Err(failure) => {
            debug!(cmd = %failure.cmd, error = %failure.error, "command failed");
            report_failure(&failure, json)?;
            Ok(exit_code(&failure))
        }
    }
}

async fn blocking<F>(operation: F) -> Result<Result<Outcome, Failure>>
where
    F: FnOnce() -> Result<Outcome, Failure> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .context("blocking operation panicked")
}

fn report_outcome(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(outcome.stdout.as_bytes())?;
    stdout.flush()?;
    eprint!("{}", outcome.stderr);
    Ok(())
}

fn report_failure(failure: &Failure, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(failure)?);
        return Ok(());
    }

    print!("{}", failure.stdout);
    eprint!("{}", failure.stderr);
    eprintln!("childproc: {failure}");
    if let Some(code) = failure.error_code() {
        eprintln!("  error code: {code}");
    }
    Ok(())
}

/// The child's own code when it has one, 1 otherwise.
fn exit_code(failure: &Failure) -> i32 {
    failure.code.filter(|&code| code != 0).unwrap_or(1)
}
