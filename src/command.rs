//! External command execution.
//!
//! The update workflow never spawns processes itself; it hands shell command
//! strings to a [`CommandExecutor`] and classifies the captured lines. The
//! production executor is [`ShellExecutor`], tests substitute scripted ones.

use crate::constants::{COMMAND_POLL_MS, command_timeout};
use crate::error::UpdateError;
use colored::Colorize;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// Lines captured from one command, in the order the command printed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub info_lines: Vec<String>,
    pub error_lines: Vec<String>,
}

impl CommandOutcome {
    pub fn info(lines: &[&str]) -> Self {
        Self {
            info_lines: lines.iter().map(|l| l.to_string()).collect(),
            error_lines: Vec::new(),
        }
    }
}

/// A failed command. The partial output is kept so it still reaches the transcript.
#[derive(Debug)]
pub struct CommandFailure {
    pub outcome: CommandOutcome,
    pub error: UpdateError,
}

impl CommandFailure {
    pub fn new(outcome: CommandOutcome, error: UpdateError) -> Self {
        Self { outcome, error }
    }
}

/// Shared flag that asks running and future commands to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the executor needs to know about the package a command runs for.
#[derive(Debug, Clone, Copy)]
pub struct ExecContext<'a> {
    pub package: &'a str,
    pub cwd: &'a Path,
    pub cancel: &'a CancellationToken,
}

pub trait CommandExecutor: Send + Sync {
    /// Runs `command` and returns its captured output.
    ///
    /// Fails when the process cannot start, exits non-zero, is cancelled or
    /// times out. The failure carries whatever output was captured.
    fn execute(&self, command: &str, ctx: &ExecContext<'_>)
    -> Result<CommandOutcome, CommandFailure>;
}

/// Logger type for echoing commands before they run.
/// Arguments are the package name and the command line.
pub type CommandLogger = fn(&str, &str);

pub fn verbose_logger(package: &str, command: &str) {
    eprintln!(
        "  {} {}",
        format!("[{}]", package).dimmed(),
        format!("$ {}", command).dimmed()
    );
}

pub fn no_op_logger(_package: &str, _command: &str) {}

/// Quotes `value` as a single shell word.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Runs commands through `sh -c` in the package directory.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    logger: CommandLogger,
    timeout: Duration,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(no_op_logger)
    }
}

impl ShellExecutor {
    pub fn new(logger: CommandLogger) -> Self {
        Self {
            logger,
            timeout: command_timeout(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn wait(
        &self,
        child: &mut Child,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus, UpdateError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if cancel.is_cancelled() {
                kill(child);
                return Err(UpdateError::Cancelled {
                    command: command.to_string(),
                });
            }
            if started.elapsed() >= self.timeout {
                warn!(command, timeout_secs = self.timeout.as_secs(), "command timed out");
                kill(child);
                return Err(UpdateError::TimedOut {
                    command: command.to_string(),
                    after: self.timeout,
                });
            }
            thread::sleep(Duration::from_millis(COMMAND_POLL_MS));
        }
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(
        &self,
        command: &str,
        ctx: &ExecContext<'_>,
    ) -> Result<CommandOutcome, CommandFailure> {
        if ctx.cancel.is_cancelled() {
            return Err(CommandFailure::new(
                CommandOutcome::default(),
                UpdateError::Cancelled {
                    command: command.to_string(),
                },
            ));
        }

        (self.logger)(ctx.package, command);
        debug!(package = ctx.package, command, cwd = %ctx.cwd.display(), "running command");

        let mut shell = Command::new("sh");
        shell
            .arg("-c")
            .arg(command)
            .current_dir(ctx.cwd)
            // Nobody can answer a credential prompt; fail instead of waiting for the timeout.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a kill also reaches whatever the shell or git forked.
        #[cfg(unix)]
        shell.process_group(0);

        let mut child = shell.spawn().map_err(|e| {
                CommandFailure::new(
                    CommandOutcome::default(),
                    UpdateError::CommandFailed {
                        command: command.to_string(),
                        message: format!("failed to start: {e}"),
                    },
                )
            })?;

        let stdout = Drain::spawn(child.stdout.take());
        let stderr = Drain::spawn(child.stderr.take());
        let status = self.wait(&mut child, command, ctx.cancel);

        // After a kill, a descendant that escaped the process group may still hold
        // the pipes open, so only a clean exit waits for them to close.
        let (stdout, stderr) = if status.is_ok() {
            (stdout.finish(), stderr.finish())
        } else {
            (stdout.abandon(), stderr.abandon())
        };

        match status {
            // git reports progress on stderr, so a successful command keeps all of it as info.
            Ok(status) if status.success() => Ok(CommandOutcome {
                info_lines: stdout.into_iter().chain(stderr).collect(),
                error_lines: Vec::new(),
            }),
            Ok(status) => {
                let message = stderr
                    .iter()
                    .rev()
                    .find(|line| !line.trim().is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("exited with {status}"));
                Err(CommandFailure::new(
                    CommandOutcome {
                        info_lines: stdout,
                        error_lines: stderr,
                    },
                    UpdateError::CommandFailed {
                        command: command.to_string(),
                        message,
                    },
                ))
            }
            Err(error) => Err(CommandFailure::new(
                CommandOutcome {
                    info_lines: stdout,
                    error_lines: stderr,
                },
                error,
            )),
        }
    }
}

fn kill(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pgid) = i32::try_from(child.id()) {
        // ESRCH when the group already exited between polls.
        let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Reads one pipe line by line on its own thread.
struct Drain {
    lines: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let handle = pipe.map(|pipe| {
            let sink = Arc::clone(&lines);
            thread::spawn(move || {
                for line in BufReader::new(pipe).lines().map_while(|line| line.ok()) {
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(line);
                }
            })
        });
        Self { lines, handle }
    }

    /// Waits for the pipe to close and returns everything it carried.
    fn finish(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.take()
    }

    /// Returns the lines read so far. The reader thread is detached.
    fn abandon(mut self) -> Vec<String> {
        self.handle = None;
        self.take()
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
