//! Signal names, delivery and exit-status inspection.

use std::process::ExitStatus;

use crate::error::ProcessError;

/// Parse a signal given as `SIGTERM`, `TERM` or a number.
#[cfg(unix)]
pub fn parse(name: &str) -> Result<nix::sys::signal::Signal, ProcessError> {
    use nix::sys::signal::Signal;

    let invalid = || ProcessError::InvalidArgument(format!("unknown signal: {name}"));

    if let Ok(number) = name.parse::<i32>() {
        return Signal::try_from(number).map_err(|_| invalid());
    }
    let upper = name.to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    full.parse::<Signal>().map_err(|_| invalid())
}

/// Check that `name` is a signal this platform can deliver.
pub fn validate(name: &str) -> Result<(), ProcessError> {
    #[cfg(unix)]
    {
        parse(name).map(|_| ())
    }

    #[cfg(not(unix))]
    {
        match name.to_ascii_uppercase().as_str() {
            "SIGTERM" | "SIGKILL" | "SIGINT" | "TERM" | "KILL" | "INT" => Ok(()),
            _ => Err(ProcessError::InvalidArgument(format!("unknown signal: {name}"))),
        }
    }
}

/// Send the named signal to a running async child.
///
/// Platforms without signals fall back to forced termination.
pub fn deliver(child: &mut tokio::process::Child, name: &str) -> Result<(), ProcessError> {
    #[cfg(unix)]
    {
        match child.id() {
            Some(pid) => send(pid, name),
            // Already reaped.
            None => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        validate(name)?;
        child.start_kill().map_err(ProcessError::from)
    }
}

/// Send the named signal to a running blocking child.
pub fn deliver_blocking(child: &mut std::process::Child, name: &str) -> Result<(), ProcessError> {
    #[cfg(unix)]
    {
        send(child.id(), name)
    }

    #[cfg(not(unix))]
    {
        validate(name)?;
        child.kill().map_err(ProcessError::from)
    }
}

#[cfg(unix)]
fn send(pid: u32, name: &str) -> Result<(), ProcessError> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let signal = parse(name)?;
    let pid = i32::try_from(pid)
        .map_err(|_| ProcessError::InvalidArgument(format!("pid out of range: {pid}")))?;
    kill(Pid::from_raw(pid), signal).map_err(|errno| ProcessError::Io(errno.into()))
}

/// Name of the signal that terminated the process, if any.
pub fn describe(status: &ExitStatus) -> Option<String> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        status.signal().map(|number| {
            nix::sys::signal::Signal::try_from(number)
                .map_or_else(|_| number.to_string(), |signal| signal.as_str().to_owned())
        })
    }

    #[cfg(not(unix))]
    {
        let _ = status;
        None
    }
}
