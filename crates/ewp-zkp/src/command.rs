//! # External Command Backend
//!
//! Runs an external prover program once per job. The request is written to
//! the child's stdin as a single JSON document:
//!
//! ```json
//! {"kind": "claim", "nonce": "8121…", "is_prover": true, "input": { … }}
//! ```
//!
//! and the child's stdout is parsed as the [`ProofArtifact`]. A non-zero
//! exit status becomes [`ProofError::Failed`] carrying the child's stderr.
//!
//! ## Cancellation
//!
//! The child runs in its own process group (unix). Every wait, on the child
//! itself and on the threads draining its pipes, polls the [`CancelSignal`].
//! When the signal is raised the whole group is killed, so a helper process
//! the prover left behind holding stdout cannot pin the worker thread.
//!
//! ## Output limits
//!
//! stdout is captured up to a configurable limit (see
//! [`CommandBackend::with_max_output`]); anything beyond it is discarded and
//! the job fails with [`ProofError::MalformedOutput`]. stderr is only ever
//! kept up to the excerpt attached to a failure.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use ewp_core::ProofKind;
use serde::Serialize;

use crate::backend::{CancelSignal, ProofArtifact, ProofBackend, ProofError, Witness};

/// Longest stderr excerpt attached to a failure.
const MAX_STDERR_EXCERPT: usize = 2048;

/// Default cap on captured stdout (16 MiB).
pub const DEFAULT_MAX_OUTPUT: usize = 16 * 1024 * 1024;

#[derive(Serialize)]
struct CommandRequest<'a> {
    kind: ProofKind,
    nonce: &'a str,
    is_prover: bool,
    input: &'a Witness,
}

/// Backend that shells out to an external prover.
///
/// The program and its arguments are passed to the OS as-is; no shell is
/// involved, so arguments may contain spaces or quotes.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: PathBuf,
    args: Vec<String>,
    poll_interval: Duration,
    max_output: usize,
}

impl CommandBackend {
    /// Build a backend invoking `program` with `args`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            poll_interval: Duration::from_millis(25),
            max_output: DEFAULT_MAX_OUTPUT,
        }
    }

    /// Override how often the child is polled for exit and cancellation.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Cap the number of stdout bytes kept from one run.
    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output = bytes;
        self
    }

    /// The program this backend runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn spawn(&self) -> Result<Child, ProofError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command.spawn().map_err(|e| {
            ProofError::Failed(format!(
                "failed to start prover {}: {e}",
                self.program.display()
            ))
        })
    }

    /// Poll the child until it exits. Kills the group on cancel.
    fn wait_child(
        &self,
        child: &mut Child,
        cancel: &CancelSignal,
    ) -> Result<ExitStatus, ProofError> {
        loop {
            if cancel.is_cancelled() {
                terminate(child);
                return Err(ProofError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    terminate(child);
                    return Err(ProofError::Failed(format!("failed to poll prover: {e}")));
                }
            }
        }
    }

    /// Wait for the result of a pipe thread. `Ok(None)` means the thread
    /// went away without reporting.
    fn await_thread<T>(
        &self,
        rx: &Receiver<T>,
        cancel: &CancelSignal,
    ) -> Result<Option<T>, ProofError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ProofError::Cancelled);
            }
            match rx.recv_timeout(self.poll_interval) {
                Ok(value) => return Ok(Some(value)),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}

/// Bytes read from one pipe, up to a limit.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Drain a pipe on its own thread, keeping at most `limit` bytes.
fn capture<R: Read + Send + 'static>(pipe: Option<R>, limit: usize) -> Receiver<Captured> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut captured = Captured::default();
        if let Some(mut pipe) = pipe {
            let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
            let _ = pipe.by_ref().take(cap).read_to_end(&mut captured.bytes);
            if captured.bytes.len() > limit {
                captured.bytes.truncate(limit);
                captured.truncated = true;
                // Keep reading so the child never blocks on a full pipe.
                let _ = io::copy(&mut pipe, &mut io::sink());
            }
        }
        let _ = tx.send(captured);
    });
    rx
}

/// Write the request to the child's stdin on its own thread.
fn feed(stdin: Option<ChildStdin>, request: Vec<u8>) -> Receiver<io::Result<()>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = match stdin {
            Some(mut stdin) => stdin.write_all(&request),
            None => Ok(()),
        };
        let _ = tx.send(result);
    });
    rx
}

/// Kill the child's process group, then the child, and reap it.
fn terminate(child: &mut Child) {
    kill_group(child.id());
    if let Err(e) = child.kill() {
        tracing::debug!(error = %e, "prover child already exited");
    }
    let _ = child.wait();
}

/// SIGKILL every process in group `pgid`, through the shell's `kill`
/// builtin.
///
/// The group id stays reserved while any member is alive, so this is safe to
/// call after the leader has been reaped.
#[cfg(unix)]
fn kill_group(pgid: u32) {
    let result = Command::new("sh")
        .arg("-c")
        .arg("kill -KILL -- \"-$0\"")
        .arg(pgid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::debug!(pgid, %status, "prover process group already gone"),
        Err(e) => tracing::warn!(pgid, error = %e, "failed to signal prover process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

fn excerpt(captured: &Captured) -> String {
    let text = String::from_utf8_lossy(&captured.bytes);
    let trimmed = text.trim();
    if captured.truncated {
        format!("{trimmed}…")
    } else {
        trimmed.to_string()
    }
}

impl ProofBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    fn generate_proof(
        &self,
        kind: ProofKind,
        nonce: &str,
        is_prover: bool,
        witness: &Witness,
        cancel: &CancelSignal,
    ) -> Result<ProofArtifact, ProofError> {
        let request = serde_json::to_vec(&CommandRequest {
            kind,
            nonce,
            is_prover,
            input: witness,
        })
        .map_err(|e| ProofError::InvalidWitness(e.to_string()))?;

        let mut child = self.spawn()?;
        let pgid = child.id();

        let writer = feed(child.stdin.take(), request);
        let stdout = capture(child.stdout.take(), self.max_output);
        let stderr = capture(child.stderr.take(), MAX_STDERR_EXCERPT);

        let status = self.wait_child(&mut child, cancel)?;

        // The child is gone but anything it spawned may still hold the pipes.
        let collected = self.await_thread(&writer, cancel).and_then(|written| {
            let out = self.await_thread(&stdout, cancel)?.unwrap_or_default();
            let err = self.await_thread(&stderr, cancel)?.unwrap_or_default();
            Ok((written, out, err))
        });
        let (written, stdout, stderr) = match collected {
            Ok(parts) => parts,
            Err(e) => {
                kill_group(pgid);
                return Err(e);
            }
        };

        // A child that exits without reading stdin breaks the pipe; its exit
        // status is the meaningful signal, so the write error is only logged.
        match written {
            Some(Err(e)) => tracing::debug!(error = %e, "prover closed stdin early"),
            None => tracing::warn!("prover stdin writer exited without reporting"),
            Some(Ok(())) => {}
        }

        if !status.success() {
            return Err(ProofError::Failed(format!(
                "prover exited with {status}: {}",
                excerpt(&stderr)
            )));
        }

        if stdout.truncated {
            return Err(ProofError::MalformedOutput(format!(
                "stdout exceeded the {} byte limit",
                self.max_output
            )));
        }

        serde_json::from_slice(&stdout.bytes)
            .map(ProofArtifact::new)
            .map_err(|e| ProofError::MalformedOutput(format!("stdout is not JSON: {e}")))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> CommandBackend {
        CommandBackend::new("sh", vec!["-c".to_string(), script.to_string()])
            .with_poll_interval(Duration::from_millis(5))
    }

    fn run(backend: &CommandBackend, cancel: &CancelSignal) -> Result<ProofArtifact, ProofError> {
        let mut input = Witness::new();
        input.insert("a".into(), serde_json::json!(1));
        backend.generate_proof(ProofKind::Claim, "42", true, &input, cancel)
    }

    fn cancel_after(delay: Duration) -> CancelSignal {
        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            trigger.cancel();
        });
        cancel
    }

    #[test]
    fn echoes_stdin_back_as_artifact() {
        let artifact = run(&sh("cat"), &CancelSignal::new()).unwrap();
        let value = artifact.into_value();
        assert_eq!(value["kind"], "claim");
        assert_eq!(value["nonce"], "42");
        assert_eq!(value["is_prover"], true);
        assert_eq!(value["input"]["a"], 1);
    }

    #[test]
    fn args_with_spaces_reach_the_child_intact() {
        let backend = CommandBackend::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"cat >/dev/null; printf '{"arg":"%s"}' "$1""#.to_string(),
                "sh".to_string(),
                "/srv/my circuits/claim.zkey".to_string(),
            ],
        );
        assert_eq!(backend.args().len(), 4);
        let artifact = run(&backend, &CancelSignal::new()).unwrap();
        assert_eq!(artifact.as_value()["arg"], "/srv/my circuits/claim.zkey");
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let err = run(&sh("echo 'witness too short' >&2; exit 3"), &CancelSignal::new())
            .unwrap_err();
        match err {
            ProofError::Failed(msg) => assert!(msg.contains("witness too short"), "got: {msg}"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn non_json_stdout_is_malformed() {
        let err = run(&sh("cat >/dev/null; echo not-json"), &CancelSignal::new()).unwrap_err();
        assert!(matches!(err, ProofError::MalformedOutput(_)), "got {err:?}");
    }

    #[test]
    fn missing_program_is_failure() {
        let backend = CommandBackend::new("/nonexistent/prover-binary", vec![]);
        let err = run(&backend, &CancelSignal::new()).unwrap_err();
        assert!(matches!(err, ProofError::Failed(_)));
    }

    #[test]
    fn cancel_kills_child() {
        let backend = sh("exec sleep 30");
        let cancel = cancel_after(Duration::from_millis(50));
        let start = Instant::now();
        let err = run(&backend, &cancel).unwrap_err();
        assert_eq!(err, ProofError::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn cancel_is_honoured_while_a_leftover_process_holds_stdout() {
        // The child exits at once; the backgrounded sleep keeps stdout open.
        let backend = sh("sleep 3 & echo '{}'");
        let cancel = cancel_after(Duration::from_millis(50));
        let start = Instant::now();
        let result = run(&backend, &cancel);
        let elapsed = start.elapsed();
        assert_eq!(result, Err(ProofError::Cancelled));
        assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
    }

    #[test]
    fn leftover_process_group_is_killed_on_cancel() {
        let marker = std::env::temp_dir().join(format!("ewp-cmd-{}", std::process::id()));
        let _ = std::fs::remove_file(&marker);
        let script = format!("(sleep 1; touch '{}') & echo '{{}}'", marker.display());
        let cancel = cancel_after(Duration::from_millis(50));
        assert_eq!(run(&sh(&script), &cancel), Err(ProofError::Cancelled));
        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists(), "background process survived the cancel");
    }

    #[test]
    fn oversized_stdout_is_malformed() {
        let backend = sh("cat >/dev/null; yes x | head -c 100000").with_max_output(1024);
        let err = run(&backend, &CancelSignal::new()).unwrap_err();
        match err {
            ProofError::MalformedOutput(msg) => assert!(msg.contains("1024"), "got: {msg}"),
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }

    #[test]
    fn noisy_stderr_is_capped() {
        let backend = sh("cat >/dev/null; yes error | head -c 1000000 >&2; exit 1");
        let err = run(&backend, &CancelSignal::new()).unwrap_err();
        match err {
            ProofError::Failed(msg) => {
                assert!(msg.len() < MAX_STDERR_EXCERPT + 64, "len {}", msg.len());
                assert!(msg.ends_with('…'));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn excerpt_marks_truncation() {
        let full = Captured {
            bytes: b"  short  ".to_vec(),
            truncated: false,
        };
        assert_eq!(excerpt(&full), "short");
        let cut = Captured {
            bytes: b"xxxx".to_vec(),
            truncated: true,
        };
        assert_eq!(excerpt(&cut), "xxxx…");
    }
}
