//! Process execution with captured output, a deadline, and an external kill
//! switch.

use crate::error::{BinwrapError, Result};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared slot holding the child of an in-flight run.
///
/// Clones refer to the same slot, so a clone handed to another thread can
/// terminate the process while `run` is blocked waiting on it.
#[derive(Debug, Clone, Default)]
pub struct ProcessHandle {
    slot: Arc<Mutex<Option<Child>>>,
}

impl ProcessHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forcibly terminate the running process and anything it spawned.
    /// No-op when nothing runs.
    pub fn kill(&self) -> Result<()> {
        if let Some(child) = self.lock().as_mut() {
            tracing::debug!(pid = child.id(), "killing process");
            kill_tree(child)?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    fn install(&self, child: Child) {
        *self.lock() = Some(child);
    }

    fn release(&self) {
        self.lock().take();
    }

    fn try_wait(&self) -> io::Result<Option<ExitStatus>> {
        match self.lock().as_mut() {
            Some(child) => child.try_wait(),
            None => Err(io::Error::other("process handle released while waiting")),
        }
    }

    fn kill_and_reap(&self) -> io::Result<()> {
        if let Some(child) = self.lock().as_mut() {
            kill_tree(child)?;
            child.wait()?;
        }
        Ok(())
    }
}

/// SIGKILL the process group led by `child`, so descendants holding the
/// output pipes die with it.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    let pgid = child.id() as libc::pid_t;

    // SAFETY: kill(2) only sends a signal; the negative pid addresses the
    // group created for this child in `build_command`.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // group already gone
        Some(libc::ESRCH) => Ok(()),
        _ => Err(err),
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    match child.kill() {
        Ok(()) => Ok(()),
        // already exited
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
        Err(e) => Err(e),
    }
}

/// Bytes captured from the last run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunOutput {
    /// Stdout followed by stderr.
    pub fn combined(&self) -> Vec<u8> {
        let mut combined = Vec::with_capacity(self.stdout.len() + self.stderr.len());
        combined.extend_from_slice(&self.stdout);
        combined.extend_from_slice(&self.stderr);
        combined
    }

    pub fn clear(&mut self) {
        self.stdout.clear();
        self.stderr.clear();
    }
}

/// One launch of a program.
pub struct Invocation<'a> {
    pub program: &'a Path,
    pub args: &'a [String],
    /// `NAME=value` entries replacing the inherited environment.
    pub env: Option<&'a [String]>,
    pub timeout: Option<Duration>,
    pub stdin: Option<Box<dyn Read + Send>>,
    /// Streams stdout here instead of capturing it.
    pub stdout: Option<&'a mut (dyn Write + Send)>,
}

impl<'a> Invocation<'a> {
    pub fn new(program: &'a Path, args: &'a [String]) -> Self {
        Self {
            program,
            args,
            env: None,
            timeout: None,
            stdin: None,
            stdout: None,
        }
    }
}

enum Exit {
    Status(ExitStatus),
    TimedOut,
}

fn build_command(invocation: &Invocation<'_>) -> Result<Command> {
    let mut command = Command::new(invocation.program);
    command.args(invocation.args);

    if let Some(env) = invocation.env {
        command.env_clear();
        for entry in env {
            match entry.split_once('=') {
                Some((name, value)) if !name.is_empty() => {
                    command.env(name, value);
                }
                _ => {
                    return Err(BinwrapError::InvalidEnvironment {
                        entry: entry.clone(),
                    })
                }
            }
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    command
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    Ok(command)
}

fn wait_for_exit(handle: &ProcessHandle, deadline: Option<Instant>) -> io::Result<Exit> {
    loop {
        if let Some(status) = handle.try_wait()? {
            return Ok(Exit::Status(status));
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                handle.kill_and_reap()?;
                return Ok(Exit::TimedOut);
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
}

/// Run the program to completion, or until the deadline or an external kill.
///
/// Captured bytes are stored in `output` even when the process fails.
pub fn run(
    invocation: Invocation<'_>,
    handle: &ProcessHandle,
    output: &mut RunOutput,
) -> Result<()> {
    output.clear();

    let mut command = build_command(&invocation)?;
    let mut child = command.spawn().map_err(|source| BinwrapError::Spawn {
        path: invocation.program.to_path_buf(),
        source,
    })?;

    tracing::debug!(pid = child.id(), program = %invocation.program.display(), "started");

    let child_stdin = child.stdin.take();
    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();
    handle.install(child);

    let timeout = invocation.timeout;
    let deadline = timeout.map(|t| Instant::now() + t);
    let stdin_source = invocation.stdin;
    let sink = invocation.stdout;

    // Detached: a stdin source that never reaches EOF must not block the run.
    if let (Some(mut source), Some(mut pipe)) = (stdin_source, child_stdin) {
        thread::spawn(move || {
            if let Err(e) = io::copy(&mut source, &mut pipe) {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    tracing::debug!(error = %e, "failed to feed stdin");
                }
            }
        });
    }

    let (exit, stdout, stderr) = thread::scope(|scope| {
        let stdout_reader = child_stdout.map(|mut pipe| {
            scope.spawn(move || -> io::Result<Vec<u8>> {
                let mut captured = Vec::new();
                match sink {
                    Some(sink) => {
                        io::copy(&mut pipe, &mut *sink)?;
                        sink.flush()?;
                    }
                    None => {
                        pipe.read_to_end(&mut captured)?;
                    }
                }
                Ok(captured)
            })
        });

        let stderr_reader = child_stderr.map(|mut pipe| {
            scope.spawn(move || -> io::Result<Vec<u8>> {
                let mut captured = Vec::new();
                pipe.read_to_end(&mut captured)?;
                Ok(captured)
            })
        });

        let exit = wait_for_exit(handle, deadline);
        if exit.is_err() {
            let _ = handle.kill_and_reap();
        }

        let stdout = stdout_reader.map(join).unwrap_or_else(|| Ok(Vec::new()));
        let stderr = stderr_reader.map(join).unwrap_or_else(|| Ok(Vec::new()));
        (exit, stdout, stderr)
    });

    handle.release();

    let exit = exit?;
    output.stdout = stdout?;
    output.stderr = stderr?;

    match exit {
        Exit::TimedOut => {
            let timeout = timeout.unwrap_or_default();
            tracing::debug!(?timeout, "deadline exceeded");
            Err(BinwrapError::DeadlineExceeded { timeout })
        }
        Exit::Status(status) if status.success() => Ok(()),
        Exit::Status(status) => {
            tracing::debug!(%status, "process failed");
            Err(BinwrapError::ProcessFailed { status })
        }
    }
}
