//! Generation subprocesses: prompt on stdin, bounded capture, hard timeout.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long a killed call waits for its output pipes to close.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// What a finished (or killed) child left behind.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
}

/// One output stream, capped at the configured byte limit.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    /// Bytes read past the cap and discarded.
    pub dropped: u64,
}

impl Captured {
    pub fn lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Spawn `cmd`, write `input` to its stdin and wait at most `timeout`.
///
/// Both output streams are drained on their own threads while the child runs.
/// On unix the child leads its own process group, and at the deadline the
/// whole group is killed, so helpers it started cannot hold the call open.
/// The result is reported with `timed_out`.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), limit = output_limit_bytes))]
pub fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

    debug!(program = ?cmd.get_program(), "spawning generation process");
    let mut child = cmd.spawn().map_err(|err| {
        error!(%err, "failed to spawn generation process");
        anyhow!(err).context("spawn command")
    })?;

    let limit = output_limit_bytes as u64;
    let stdout = drain(child.stdout.take(), limit, "stdout")?;
    let stderr = drain(child.stderr.take(), limit, "stderr")?;
    let writer = feed(&mut child, input.to_vec())?;

    let (status, timed_out) = wait_or_kill(&mut child, timeout)?;

    // After a kill, anything still blocked on the pipes is abandoned.
    let grace = timed_out.then_some(KILL_GRACE);
    match collect(&writer, grace, "stdin")? {
        Some(Ok(())) => {}
        // Not fatal: the child may exit or be killed before reading everything.
        Some(Err(err)) => warn!(%err, "child did not take the whole prompt"),
        None => warn!("stdin writer still blocked after kill"),
    }
    let stdout = collect(&stdout, grace, "stdout")?
        .transpose()
        .context("read stdout")?
        .unwrap_or_default();
    let stderr = collect(&stderr, grace, "stderr")?
        .transpose()
        .context("read stderr")?
        .unwrap_or_default();

    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(stdout_dropped = stdout.dropped, stderr_dropped = stderr.dropped, "output capped");
    }
    debug!(exit_code = ?status.code(), timed_out, "generation process finished");

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "generation process timed out, killing");
    kill_tree(child)?;
    let status = child.wait().context("reap killed command")?;
    Ok((status, true))
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) -> Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pid = i32::try_from(child.id()).context("child pid out of range")?;
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) => Ok(()),
        // The group can be gone already if the child exited right at the deadline.
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(err) => {
            warn!(%err, "killpg failed, killing direct child only");
            child.kill().context("kill command")
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

fn feed(child: &mut Child, input: Vec<u8>) -> Result<Receiver<io::Result<()>>> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin is not piped"))?;
    // Dropping `stdin` after the write closes the pipe so the child sees EOF.
    Ok(spawn_worker(move || stdin.write_all(&input)))
}

fn drain<R>(stream: Option<R>, limit: u64, name: &str) -> Result<Receiver<io::Result<Captured>>>
where
    R: Read + Send + 'static,
{
    let mut stream = stream.ok_or_else(|| anyhow!("{name} is not piped"))?;
    Ok(spawn_worker(move || {
        let mut bytes = Vec::new();
        (&mut stream).take(limit).read_to_end(&mut bytes)?;
        let dropped = io::copy(&mut stream, &mut io::sink())?;
        Ok(Captured { bytes, dropped })
    }))
}

/// Run `work` on a detached thread and hand its result back over a channel.
fn spawn_worker<T, F>(work: F) -> Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(work());
    });
    rx
}

/// Wait for a worker result; with `grace`, give up after that long and return `None`.
fn collect<T>(rx: &Receiver<T>, grace: Option<Duration>, name: &str) -> Result<Option<T>> {
    let Some(grace) = grace else {
        return rx
            .recv()
            .map(Some)
            .map_err(|_| anyhow!("{name} thread panicked"));
    };
    match rx.recv_timeout(grace) {
        Ok(value) => Ok(Some(value)),
        Err(RecvTimeoutError::Timeout) => {
            warn!(stream = name, "pipe still open after kill, output abandoned");
            Ok(None)
        }
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("{name} thread panicked")),
    }
}
