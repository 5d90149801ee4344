//! Spawn and supervise one `codex exec` process per invocation.
//!
//! Three channels race to describe how a run ends: stdout reaching EOF, the
//! exit status, and I/O failures in the helper tasks. They all report into a
//! single [`ProcessState`] and [`ProcessHandle::next_line`] consults it
//! before and after every read, so a recorded error always wins over output
//! still buffered in the pipe.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::Split;
use tokio::process::ChildStdout;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::types::CliError;
use super::types::InvocationRequest;

/// Shown with [`CliError::BinaryNotFound`].
pub const INSTALL_HINT: &str =
    "Install the Codex CLI with `npm install -g @openai/codex` or point binary_path at the codex executable.";

/// Terminal-state holder shared by the monitor, stdin writer and reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// A process-level failure. Sticky: later exits do not replace it.
    ErrorObserved(String),
    /// Exit code, `-1` when the process was killed by a signal.
    Exited(i32),
}

#[derive(Debug, Clone)]
struct SharedState(Arc<Mutex<ProcessState>>);

impl SharedState {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(ProcessState::Running)))
    }

    fn get(&self) -> ProcessState {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record_error(&self, message: String) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, ProcessState::ErrorObserved(_)) {
            *state = ProcessState::ErrorObserved(message);
        }
    }

    fn record_exit(&self, code: i32) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == ProcessState::Running {
            *state = ProcessState::Exited(code);
        }
    }
}

/// Arguments for the main invocation, in the order the CLI documents them.
pub fn build_args(request: &InvocationRequest) -> Vec<String> {
    let mut args = vec!["exec".to_string(), "--json".to_string()];

    if let Some(model) = request.model_id.as_deref().map(str::trim)
        && !model.is_empty()
    {
        args.push("--model".to_string());
        args.push(model.to_string());
    }
    if let Some(schema) = &request.output_schema {
        args.push("--output-schema".to_string());
        args.push(schema.display().to_string());
    }
    if let Some(sandbox) = request.sandbox {
        args.push("--sandbox".to_string());
        args.push(sandbox.as_str().to_string());
    }
    if request.full_auto {
        args.push("--full-auto".to_string());
    }

    args
}

/// Map a spawn failure. A missing binary gets the install hint.
pub(crate) fn spawn_error(binary: &str, err: std::io::Error) -> CliError {
    if err.kind() == ErrorKind::NotFound {
        CliError::BinaryNotFound {
            binary: binary.to_string(),
            install_hint: INSTALL_HINT.to_string(),
        }
    } else {
        CliError::Internal {
            message: format!("Failed to spawn {binary}: {err}"),
        }
    }
}

/// Base command for any Codex CLI call: inherited environment with
/// `extra_env` applied on top, and the child killed if its handle is dropped.
pub(crate) fn codex_command(binary: &str, extra_env: &HashMap<String, String>) -> Command {
    let mut cmd = Command::new(binary);
    cmd.envs(extra_env).kill_on_drop(true);
    cmd
}

pub struct ProcessRunner;

impl ProcessRunner {
    /// Spawn the CLI and start feeding it the prompt.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(request: &InvocationRequest) -> Result<ProcessHandle, CliError> {
        let wire = request.payload.to_wire()?;
        let args = build_args(request);
        tracing::debug!("Spawning {} {}", request.binary_path, args.join(" "));

        let mut child = codex_command(&request.binary_path, &request.extra_env)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&request.binary_path, e))?;

        let pid = child.id();
        let pipe_error = |name: &str| CliError::Internal {
            message: format!("Failed to capture {name} of Codex CLI process"),
        };
        let mut stdin = child.stdin.take().ok_or_else(|| pipe_error("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| pipe_error("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| pipe_error("stderr"))?;

        let state = SharedState::new();
        let cancel = CancellationToken::new();
        let stderr_buf = Arc::new(Mutex::new(String::new()));

        let stdin_task = tokio::spawn({
            let state = state.clone();
            let cancel = cancel.clone();
            async move {
                let result = async {
                    stdin.write_all(wire.as_bytes()).await?;
                    stdin.shutdown().await
                }
                .await;
                drop(stdin);

                match result {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                        tracing::debug!("Codex CLI closed stdin before the prompt was written: {e}");
                    }
                    Err(e) => {
                        state.record_error(format!("Failed to write prompt to stdin: {e}"));
                        cancel.cancel();
                    }
                }
            }
        });

        let stderr_task = tokio::spawn({
            let stderr_buf = Arc::clone(&stderr_buf);
            async move {
                let mut buf = [0u8; 4096];
                loop {
                    match stderr.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => stderr_buf
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push_str(&String::from_utf8_lossy(&buf[..n])),
                        Err(e) => {
                            tracing::debug!("Stopped reading Codex CLI stderr: {e}");
                            break;
                        }
                    }
                }
            }
        });

        let monitor = tokio::spawn({
            let state = state.clone();
            let cancel = cancel.clone();
            async move {
                let status = tokio::select! {
                    status = child.wait() => status,
                    () = cancel.cancelled() => {
                        if let Err(e) = child.start_kill() {
                            tracing::debug!("Failed to kill Codex CLI process: {e}");
                        }
                        child.wait().await
                    }
                };

                match status {
                    Ok(status) => state.record_exit(status.code().unwrap_or(-1)),
                    Err(e) => state.record_error(format!("Failed to wait for Codex CLI process: {e}")),
                }
            }
        });

        Ok(ProcessHandle {
            lines: BufReader::new(stdout).split(b'\n'),
            state,
            stderr: stderr_buf,
            cancel,
            pid,
            stdin_task: Some(stdin_task),
            stderr_task: Some(stderr_task),
            monitor: Some(monitor),
            finished: false,
        })
    }
}

/// A live `codex exec` process.
///
/// Dropping the handle kills the process if it is still running.
pub struct ProcessHandle {
    lines: Split<BufReader<ChildStdout>>,
    state: SharedState,
    stderr: Arc<Mutex<String>>,
    cancel: CancellationToken,
    pid: Option<u32>,
    stdin_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
    finished: bool,
}

impl ProcessHandle {
    /// Next raw stdout line, or `None` once stdout is closed and the process
    /// exited successfully. Lines that are not valid UTF-8 are skipped.
    ///
    /// Not restartable: after `None` or an error every call returns `None`.
    pub async fn next_line(&mut self) -> Result<Option<String>, CliError> {
        if self.finished {
            return Ok(None);
        }
        self.check_runtime_error()?;

        let line = loop {
            match self.lines.next_segment().await {
                Ok(Some(mut raw)) => {
                    if raw.last() == Some(&b'\r') {
                        raw.pop();
                    }
                    match String::from_utf8(raw) {
                        Ok(line) => break Some(line),
                        Err(e) => {
                            tracing::debug!("Skipping non-UTF-8 Codex CLI output line: {e}");
                        }
                    }
                }
                Ok(None) => break None,
                Err(e) => {
                    self.state
                        .record_error(format!("Failed to read Codex CLI stdout: {e}"));
                    break None;
                }
            }
        };

        self.check_runtime_error()?;
        match line {
            Some(line) => Ok(Some(line)),
            None => self.finish().await.map(|()| None),
        }
    }

    /// Standard error captured so far.
    pub fn stderr(&self) -> String {
        self.stderr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> ProcessState {
        self.state.get()
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Force-terminate the process if it is still running.
    pub fn kill(&self) {
        self.cancel.cancel();
    }

    fn check_runtime_error(&mut self) -> Result<(), CliError> {
        if let ProcessState::ErrorObserved(message) = self.state.get() {
            self.finished = true;
            self.cancel.cancel();
            return Err(CliError::ProcessRuntime { message });
        }
        Ok(())
    }

    /// Wait for the helper tasks and turn the terminal state into a result.
    async fn finish(&mut self) -> Result<(), CliError> {
        self.finished = true;

        for task in [
            self.stdin_task.take(),
            self.monitor.take(),
            self.stderr_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            if let Err(e) = task.await {
                self.state
                    .record_error(format!("Codex CLI supervisor task failed: {e}"));
            }
        }

        match self.state.get() {
            ProcessState::ErrorObserved(message) => Err(CliError::ProcessRuntime { message }),
            ProcessState::Exited(0) => Ok(()),
            ProcessState::Exited(code) => {
                let stderr = self.stderr();
                tracing::error!("Codex CLI exited with code {code}: {}", stderr.trim());
                Err(CliError::ProcessExit { code, stderr })
            }
            ProcessState::Running => Err(CliError::Internal {
                message: "Codex CLI process finished without an exit status".to_string(),
            }),
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // The monitor kills and reaps the child; kill_on_drop covers a
        // runtime that is already shutting down.
        self.cancel.cancel();
        if let Some(task) = self.stdin_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}
