//! `exec_sync`, `exec_file_sync` and `spawn_sync`: the calling thread waits.
//!
//! These return the same [`Outcome`] / [`Failure`] shapes as the async
//! operations. Encoding defaults to UTF-8.

use crate::error::ProcessError;
use crate::process::blocking::{self, SpawnSyncRecord};
use crate::process::{CommandLine, Encoding, ExecOptions, Shell, StdioConfig};

use super::collect_args;
use super::outcome::{Failure, Outcome};

/// Run a command line through a shell and wait for it.
pub fn exec_sync(command: &str, options: &ExecOptions) -> Result<Outcome, Failure> {
    let shell = match options.shell {
        Shell::None => Shell::Default,
        ref configured => configured.clone(),
    };
    let line = CommandLine::resolve(command, &[], &shell)
        .map_err(|error| Failure::new(error, command))?;
    run(&line, options, Some(options.max_buffer_or_default()))
}

/// Run an executable with arguments and wait for it.
pub fn exec_file_sync<I, S>(file: &str, args: I, options: &ExecOptions) -> Result<Outcome, Failure>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = collect_args(args);
    let line = CommandLine::resolve(file, &args, &options.shell)
        .map_err(|error| Failure::new(error, file))?;
    run(&line, options, Some(options.max_buffer_or_default()))
}

/// Launch a command, wait for it and classify the result record.
///
/// Output is unbounded unless `max_buffer` is set. A non-zero status is a
/// [`Failure`], matching [`spawn`](super::spawn); use
/// [`process::spawn_blocking`](crate::process::spawn_blocking) for the raw
/// record.
pub fn spawn_sync<I, S>(command: &str, args: I, options: &ExecOptions) -> Result<Outcome, Failure>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = collect_args(args);
    let line = CommandLine::resolve(command, &args, &options.shell)
        .map_err(|error| Failure::new(error, command))?;
    run(&line, options, options.max_buffer)
}

fn run(line: &CommandLine, options: &ExecOptions, limit: Option<usize>) -> Result<Outcome, Failure> {
    let mut options = options.clone();
    options.encoding = Some(options.encoding.unwrap_or(Encoding::Utf8));

    let stdio = options.stdio_or(StdioConfig::default());
    let record = blocking::run(line, &options, stdio, limit);
    settle(record, line.display.clone())
}

fn settle(record: SpawnSyncRecord, cmd: String) -> Result<Outcome, Failure> {
    let SpawnSyncRecord {
        status,
        signal,
        stdout,
        stderr,
        killed,
        error,
        ..
    } = record;

    let error = error.or_else(|| match (status, &signal) {
        (Some(0), _) => None,
        (Some(code), _) => Some(ProcessError::NonZeroExit { code }),
        (None, signal) => Some(ProcessError::Signaled {
            signal: signal.clone().unwrap_or_else(|| "unknown".to_owned()),
        }),
    });

    match error {
        None => Ok(Outcome {
            cmd,
            stdout,
            stderr,
            code: status,
            signal,
        }),
        Some(error) => Err(Failure {
            error,
            cmd,
            stdout,
            stderr,
            code: status,
            signal,
            killed,
        }),
    }
}
