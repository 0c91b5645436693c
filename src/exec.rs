//! Bounded invocation of external tools.
//!
//! Every external call is resolved on `PATH` first so a missing tool is a
//! distinct outcome rather than a spawn error, then polled against a deadline.
use anyhow::{Context, Result};
use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const COLLECT_GRACE: Duration = Duration::from_millis(500);
const MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// Program plus arguments, kept separate so nothing goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Shell-quoted rendering for logs and operator messages.
    pub fn display(&self) -> String {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.as_str());
        argv.extend(self.args.iter().map(String::as_str));
        shell_words::join(argv)
    }
}

/// How a bounded invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The program could not be located or spawned because it does not exist.
    NotFound,
    /// The deadline passed; the child was killed.
    TimedOut { after: Duration },
    Exited {
        /// `None` when the child was terminated by a signal.
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, RunOutcome::Exited { code: Some(0), .. })
    }
}

/// Run `spec` to completion or until `timeout` elapses.
///
/// Errors are reserved for spawn and wait failures other than a missing
/// program; exit status and timeouts are reported through [`RunOutcome`].
/// On timeout the child's whole process group is killed, so wrapper scripts
/// that fork their real tool cannot hold the caller past the deadline.
pub fn run_bounded(spec: &CommandSpec, timeout: Duration) -> Result<RunOutcome> {
    let resolved = match which::which(&spec.program) {
        Ok(path) => path,
        Err(err) => {
            tracing::debug!(program = %spec.program, error = %err, "program not on PATH");
            return Ok(RunOutcome::NotFound);
        }
    };

    let mut cmd = Command::new(&resolved);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let start = Instant::now();
    let deadline = start + timeout;
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(RunOutcome::NotFound),
        Err(err) => {
            return Err(err).with_context(|| format!("spawn {}", resolved.display()));
        }
    };
    // drained concurrently so a chatty tool never blocks on a full pipe
    let stdout_rx = drain(child.stdout.take());
    let stderr_rx = drain(child.stderr.take());

    let status = loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("check status of {}", spec.program))?
        {
            break Some(status);
        }
        if Instant::now() >= deadline {
            kill_group(&mut child);
            child
                .wait()
                .with_context(|| format!("reap {}", spec.program))?;
            break None;
        }
        std::thread::sleep(POLL_INTERVAL);
    };
    let elapsed_ms = start.elapsed().as_millis();

    let Some(status) = status else {
        tracing::info!(command = %spec.display(), elapsed_ms, "external command timed out");
        return Ok(RunOutcome::TimedOut { after: timeout });
    };

    // a background grandchild may still hold the pipes; wait no longer than
    // the remaining budget plus a short grace
    let collect = deadline.saturating_duration_since(Instant::now()) + COLLECT_GRACE;
    let stdout = stdout_rx.recv_timeout(collect).unwrap_or_default();
    let stderr = stderr_rx.recv_timeout(COLLECT_GRACE).unwrap_or_default();

    tracing::info!(
        command = %spec.display(),
        elapsed_ms,
        exit_code = ?status.code(),
        "external command finished"
    );

    Ok(RunOutcome::Exited {
        code: status.code(),
        stdout: lossy_capped(&stdout),
        stderr: lossy_capped(&stderr),
    })
}

/// Read `pipe` to EOF on a background thread, keeping the first
/// [`MAX_CAPTURE_BYTES`] and discarding the rest.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut captured = Vec::new();
        if let Some(mut pipe) = pipe {
            let mut buf = [0u8; 8192];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let room = MAX_CAPTURE_BYTES.saturating_sub(captured.len());
                        captured.extend_from_slice(&buf[..n.min(room)]);
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        }
        let _ = tx.send(captured);
    });
    rx
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    // process_group(0) made the child its group leader, so pgid == pid
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg takes plain integers; the group leader is not yet reaped
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

/// Decode captured bytes, dropping a trailing partial UTF-8 sequence left by
/// the capture cap.
fn lossy_capped(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if bytes.len() < MAX_CAPTURE_BYTES {
        return text.into_owned();
    }
    text.trim_end_matches(char::REPLACEMENT_CHARACTER).to_string()
}
