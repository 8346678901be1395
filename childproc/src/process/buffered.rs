//! Async launch that buffers output and reports once, on completion.

use std::io;

use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tracing::debug;

use super::command::CommandLine;
use super::decode::Encoding;
use super::handle::ChildHandle;
use super::options::{ExecOptions, StdioConfig};
use super::streaming::{self, LiveChild, StreamReader};
use crate::error::{OutputStream, ProcessError};

/// Completion record of a buffered launch.
///
/// `error` is `None` only when the child exited with code 0 and no limit
/// was hit.
#[derive(Debug, Default)]
pub struct Completion {
    /// Why the run failed, if it did.
    pub error: Option<ProcessError>,
    /// Captured stdout, at most `max_buffer` bytes before decoding.
    pub stdout: String,
    /// Captured stderr, at most `max_buffer` bytes before decoding.
    pub stderr: String,
    /// Exit code, `None` if the child never ran or was signalled.
    pub code: Option<i32>,
    /// Terminating signal name.
    pub signal: Option<String>,
    /// Whether a signal was delivered to the child.
    pub killed: bool,
}

/// A buffered child: its handle now, its completion later.
#[derive(Debug)]
pub struct BufferedChild {
    /// Control handle, usable before completion.
    pub handle: ChildHandle,
    /// Sent once the child is reaped and both streams are done.
    pub completion: oneshot::Receiver<Completion>,
}

/// Launch `line`, capturing up to `max_buffer` bytes per stream.
///
/// Launch failures are reported through `completion` like any other error.
/// Must be called from within a Tokio runtime.
pub fn launch(line: &CommandLine, options: &ExecOptions) -> BufferedChild {
    let (tx, rx) = oneshot::channel();
    let stdio = options.stdio_or(StdioConfig::default());

    match streaming::launch(line, options, stdio) {
        Ok(live) => {
            let handle = live.handle.clone();
            let limit = options.max_buffer_or_default();
            let encoding = options.encoding_or_default();
            let kill_signal = options.kill_signal_name().to_owned();
            let timeout = options.timeout;

            tokio::spawn(async move {
                let completion = buffer(live, limit, encoding, &kill_signal, timeout).await;
                let _ = tx.send(completion);
            });

            BufferedChild {
                handle,
                completion: rx,
            }
        }
        Err(error) => {
            let _ = tx.send(Completion {
                error: Some(error),
                ..Completion::default()
            });
            BufferedChild {
                handle: ChildHandle::unlaunched(),
                completion: rx,
            }
        }
    }
}

struct Captured {
    bytes: Vec<u8>,
    overflowed: bool,
    read_error: Option<io::Error>,
}

async fn capture<R>(
    source: Option<R>,
    limit: usize,
    handle: &ChildHandle,
    kill_signal: &str,
) -> Captured
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured {
        bytes: Vec::new(),
        overflowed: false,
        read_error: None,
    };
    let Some(source) = source else {
        return captured;
    };

    let mut reader = StreamReader::new(source, handle.clone());
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                captured.bytes.extend_from_slice(&buf[..n]);
                if captured.bytes.len() > limit {
                    captured.bytes.truncate(limit);
                    captured.overflowed = true;
                    debug!(pid = ?handle.pid(), limit, "max buffer exceeded, killing child");
                    let _ = handle.kill_for_limit(kill_signal);
                    break;
                }
            }
            Err(e) => {
                captured.read_error = Some(e);
                break;
            }
        }
    }
    captured
}

async fn buffer(
    live: LiveChild,
    limit: usize,
    encoding: Encoding,
    kill_signal: &str,
    timeout: Option<std::time::Duration>,
) -> Completion {
    let LiveChild {
        handle,
        stdout,
        stderr,
        exit,
    } = live;

    let (out, err, exit) = tokio::join!(
        capture(stdout, limit, &handle, kill_signal),
        capture(stderr, limit, &handle, kill_signal),
        exit.wait(),
    );

    let mut completion = Completion {
        stdout: encoding.decode(&out.bytes),
        stderr: encoding.decode(&err.bytes),
        killed: handle.killed(),
        ..Completion::default()
    };

    let exit = match exit {
        Ok(exit) => exit,
        Err(error) => {
            completion.error = Some(error);
            return completion;
        }
    };
    completion.code = exit.code;
    completion.signal.clone_from(&exit.signal);
    completion.killed = exit.killed;

    completion.error = if out.overflowed {
        Some(ProcessError::MaxBufferExceeded {
            stream: OutputStream::Stdout,
            limit,
        })
    } else if err.overflowed {
        Some(ProcessError::MaxBufferExceeded {
            stream: OutputStream::Stderr,
            limit,
        })
    } else if let Some(e) = out.read_error.or(err.read_error) {
        Some(ProcessError::Io(e))
    } else {
        exit.condition(timeout)
    };
    completion
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process::options::Shell;
    use std::time::Duration;

    fn sh(script: &str) -> CommandLine {
        CommandLine::resolve(script, &[], &Shell::Default).unwrap()
    }

    #[tokio::test]
    async fn test_completion_on_success() {
        let child = launch(&sh("echo test"), &ExecOptions::new());
        assert!(child.handle.pid().is_some());

        let completion = child.completion.await.unwrap();

        assert!(completion.error.is_none());
        assert_eq!(completion.stdout, "test\n");
        assert_eq!(completion.code, Some(0));
        assert!(!completion.killed);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_an_error() {
        let completion = launch(&sh("echo nope >&2; exit 5"), &ExecOptions::new())
            .completion
            .await
            .unwrap();

        assert!(matches!(
            completion.error,
            Some(ProcessError::NonZeroExit { code: 5 })
        ));
        assert_eq!(completion.stderr, "nope\n");
        assert_eq!(completion.code, Some(5));
    }

    #[tokio::test]
    async fn test_launch_failure_completes_immediately() {
        let line = CommandLine::resolve("nonexistent_command_12345", &[], &Shell::None).unwrap();
        let child = launch(&line, &ExecOptions::new());

        assert_eq!(child.handle.pid(), None);
        let completion = child.completion.await.unwrap();
        assert!(completion.error.is_some_and(|e| e.is_not_found()));
        assert_eq!(completion.stderr, "");
    }

    #[tokio::test]
    async fn test_max_buffer_overflow() {
        let completion = launch(
            &sh("echo err >&2; printf 0123456789"),
            &ExecOptions::new().max_buffer(6),
        )
        .completion
        .await
        .unwrap();

        assert!(matches!(
            completion.error,
            Some(ProcessError::MaxBufferExceeded {
                stream: OutputStream::Stdout,
                limit: 6
            })
        ));
        assert_eq!(completion.stdout, "012345");
        assert_eq!(completion.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_timeout_settles_while_grandchild_holds_pipes() {
        let started = std::time::Instant::now();
        let completion = launch(
            &sh("echo early; sleep 3; echo late"),
            &ExecOptions::new().timeout(Duration::from_millis(200)),
        )
        .completion
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(completion.error, Some(ProcessError::TimedOut { .. })));
        assert!(completion.killed);
        assert_eq!(completion.stdout, "early\n");
    }

    #[tokio::test]
    async fn test_overflow_settles_while_grandchild_holds_stderr() {
        let started = std::time::Instant::now();
        let completion = launch(
            &sh("printf 0123456789; sleep 3 >/dev/null"),
            &ExecOptions::new().max_buffer(4),
        )
        .completion
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(
            completion.error,
            Some(ProcessError::MaxBufferExceeded {
                stream: OutputStream::Stdout,
                ..
            })
        ));
        assert_eq!(completion.stdout, "0123");
    }

    #[tokio::test]
    async fn test_timeout() {
        let completion = launch(
            &sh("exec sleep 10"),
            &ExecOptions::new().timeout(Duration::from_millis(100)),
        )
        .completion
        .await
        .unwrap();

        assert!(matches!(completion.error, Some(ProcessError::TimedOut { .. })));
        assert!(completion.killed);
        assert_eq!(completion.signal.as_deref(), Some("SIGTERM"));
        assert_eq!(completion.code, None);
    }
}
