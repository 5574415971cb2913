//! Isolated executor: one disposable worker process per invocation.
//!
//! Each invocation spawns a fresh worker, hands it the wrapped script and
//! races the worker's message stream against a deadline. Whichever resolves
//! first decides the outcome; the worker is then killed and reaped exactly
//! once. Cancellation never asks the script to stop.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::Instrument;

use super::error::{SandboxError, SandboxResult};
use super::outcome::{
    Completion, CompletionValue, Failure, Invocation, InvocationId, Outcome, DEFAULT_TIMEOUT_MS,
};
use super::protocol::{Envelope, WorkerMessage, WorkerRequest};
use super::state::ExecutionState;
use crate::console::{ConsoleCapture, LogEntry};
use crate::locate::{first_frame, ErrorLocator};
use crate::metrics::METRICS;
use crate::obs;
use crate::transform::TransformedSource;

/// How to launch a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Re-launch the running executable with `args`, e.g. `jsbox worker`.
    pub fn current_exe_with<I, S>(args: I) -> std::io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::new(std::env::current_exe()?).args(args))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Executor-wide knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Default wall-clock budget per invocation (milliseconds).
    pub timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Runs snippets, each in its own isolated context.
///
/// Cheap to share behind an `Arc`; invocations may run concurrently and only
/// share the id counter and the live-context gauge.
#[derive(Debug)]
pub struct Executor {
    worker: WorkerCommand,
    config: ExecutorConfig,
    next_id: AtomicU64,
    live_contexts: Arc<AtomicUsize>,
}

impl Executor {
    pub fn new(worker: WorkerCommand, config: ExecutorConfig) -> Self {
        Self {
            worker,
            config,
            next_id: AtomicU64::new(1),
            live_contexts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn worker(&self) -> &WorkerCommand {
        &self.worker
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// Contexts currently alive. Zero whenever no `run` is in flight.
    pub fn live_contexts(&self) -> usize {
        self.live_contexts.load(Ordering::SeqCst)
    }

    /// Run `code` with the configured timeout.
    pub async fn run(&self, code: &str) -> SandboxResult<Outcome> {
        self.run_with_timeout(code, self.default_timeout()).await
    }

    pub async fn run_with_timeout(&self, code: &str, timeout: Duration) -> SandboxResult<Outcome> {
        self.run_observed(code, timeout, None).await
    }

    /// Run `code`, streaming each log entry to `observer` as it arrives.
    ///
    /// `Err` is reserved for infrastructure failures, chiefly being unable
    /// to spawn a worker. Everything the snippet does, including running out
    /// of time, is reported through the returned [`Outcome`].
    pub async fn run_observed(
        &self,
        code: &str,
        timeout: Duration,
        observer: Option<UnboundedSender<LogEntry>>,
    ) -> SandboxResult<Outcome> {
        let id = InvocationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let invocation = Invocation::new(id, code, timeout);
        self.execute(invocation, observer)
            .instrument(obs::invocation_span(id))
            .await
    }

    async fn execute(
        &self,
        invocation: Invocation,
        observer: Option<UnboundedSender<LogEntry>>,
    ) -> SandboxResult<Outcome> {
        let started = Instant::now();
        let id = invocation.id();
        let source = TransformedSource::new(invocation.code());
        obs::emit_invocation_started(&invocation);
        METRICS.inc_invocations_started();

        let mut state = ExecutionState::default();
        let mut context =
            match IsolatedContext::spawn(&self.worker, id, Arc::clone(&self.live_contexts)) {
                Ok(context) => context,
                Err(e) => {
                    obs::emit_infrastructure_error(id, &e);
                    return Err(e);
                }
            };
        state.start();

        let mut capture = ConsoleCapture::new(id);
        if let Some(observer) = observer {
            capture = capture.with_observer(observer);
        }

        let deadline = tokio::time::Instant::now() + invocation.timeout();
        let request = WorkerRequest {
            id,
            script: source.script().to_string(),
        };
        let resolution =
            match tokio::time::timeout_at(deadline, context.send_request(&request)).await {
                Err(_elapsed) => Ok(Resolution::TimedOut),
                Ok(()) => context.pump(id, &mut capture, deadline).await,
            };

        // Teardown happens before the result is inspected so a pipe failure
        // still releases the context.
        context.teardown().await;
        let resolution = match resolution {
            Ok(resolution) => resolution,
            Err(e) => {
                obs::emit_infrastructure_error(id, &e);
                return Err(e);
            }
        };

        if !state.finish(resolution.terminal_state()) {
            tracing::warn!(state = ?state, "ignoring second terminal transition");
        }

        let outcome = resolution.into_outcome(&source, capture.into_entries());
        METRICS.record_outcome(&outcome);
        obs::emit_invocation_finished(
            id,
            outcome.status_label(),
            started.elapsed().as_millis() as u64,
            outcome.logs().len(),
        );
        Ok(outcome)
    }
}

/// Whatever won the race between the worker and the deadline.
#[derive(Debug)]
enum Resolution {
    Done {
        json: Option<String>,
        text: Option<String>,
    },
    Error {
        message: String,
        stack: Option<String>,
    },
    Crashed(String),
    TimedOut,
}

impl Resolution {
    fn terminal_state(&self) -> ExecutionState {
        match self {
            Resolution::Done { .. } => ExecutionState::Completed,
            Resolution::Error { .. } | Resolution::Crashed(_) => ExecutionState::Failed,
            Resolution::TimedOut => ExecutionState::TimedOut,
        }
    }

    fn into_outcome(self, source: &TransformedSource, logs: Vec<LogEntry>) -> Outcome {
        match self {
            Resolution::Done { json, text } => {
                let value = match (json, text) {
                    (Some(json), _) => serde_json::from_str(&json)
                        .map(CompletionValue::Json)
                        .unwrap_or(CompletionValue::Opaque(json)),
                    (None, Some(text)) => CompletionValue::Opaque(text),
                    (None, None) => CompletionValue::Undefined,
                };
                Outcome::Completed(Completion { value, logs })
            }
            Resolution::Error { message, stack } => {
                let location = ErrorLocator::new(source).locate(&message, stack.as_deref());
                let frame = first_frame(stack.as_deref());
                let mut failure = Failure::fault(message, logs);
                failure.stack = stack;
                failure.frame = frame;
                if let Some(location) = location {
                    failure.line = Some(location.line);
                    failure.line_content = location.line_content;
                }
                Outcome::Failed(failure)
            }
            Resolution::Crashed(status) => Outcome::Failed(Failure::fault(
                format!("isolated context exited unexpectedly ({status})"),
                logs,
            )),
            Resolution::TimedOut => Outcome::Failed(Failure::timeout(logs)),
        }
    }
}

/// One live worker process. Torn down exactly once.
struct IsolatedContext {
    id: InvocationId,
    child: Child,
    stderr_drain: Option<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
    released: bool,
}

impl IsolatedContext {
    fn spawn(
        worker: &WorkerCommand,
        id: InvocationId,
        live: Arc<AtomicUsize>,
    ) -> SandboxResult<Self> {
        let mut child =
            worker
                .command()
                .spawn()
                .map_err(|source| SandboxError::ContextUnavailable {
                    program: worker.program.clone(),
                    source,
                })?;

        let stderr_drain = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_stderr(id, stderr)));

        live.fetch_add(1, Ordering::SeqCst);
        METRICS.inc_contexts_created();
        tracing::debug!(pid = ?child.id(), "isolated context created");

        Ok(Self {
            id,
            child,
            stderr_drain,
            live,
            released: false,
        })
    }

    /// Write the request and close stdin. A worker that died early shows up
    /// later as a crash, so write failures are only logged here.
    async fn send_request(&mut self, request: &WorkerRequest) {
        let Some(mut stdin) = self.child.stdin.take() else {
            return;
        };
        let payload = match serde_json::to_vec(request) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode worker request");
                return;
            }
        };
        if let Err(e) = stdin.write_all(&payload).await {
            tracing::warn!(error = %e, "failed to deliver request to worker");
            return;
        }
        if let Err(e) = stdin.shutdown().await {
            tracing::debug!(error = %e, "failed to close worker stdin");
        }
    }

    /// Pump worker messages until a terminal message, a crash, or the deadline.
    async fn pump(
        &mut self,
        id: InvocationId,
        capture: &mut ConsoleCapture,
        deadline: tokio::time::Instant,
    ) -> SandboxResult<Resolution> {
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdout is not piped"))?;
        let mut lines = BufReader::new(stdout).lines();

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(Resolution::TimedOut),
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(resolution) = handle_line(id, &line, capture) {
                            return Ok(resolution);
                        }
                    }
                    Ok(None) => return Ok(self.after_close(sleep.as_mut()).await),
                    Err(e) => {
                        tracing::warn!(error = %e, "worker stdout failed");
                        return Ok(self.after_close(sleep.as_mut()).await);
                    }
                },
            }
        }
    }

    /// The stream closed without a terminal message. A clean exit means the
    /// script is waiting on something that will never settle, so the deadline
    /// decides; anything else is a crash.
    async fn after_close(&mut self, mut sleep: std::pin::Pin<&mut Sleep>) -> Resolution {
        tokio::select! {
            _ = &mut sleep => Resolution::TimedOut,
            status = self.child.wait() => match status {
                Ok(status) if status.success() => {
                    sleep.await;
                    Resolution::TimedOut
                }
                Ok(status) => Resolution::Crashed(status.to_string()),
                Err(e) => Resolution::Crashed(e.to_string()),
            },
        }
    }

    async fn teardown(mut self) {
        let already_exited = matches!(self.child.try_wait(), Ok(Some(_)));
        if !already_exited {
            if let Err(e) = self.child.start_kill() {
                tracing::debug!(error = %e, "kill failed");
            }
            if let Err(e) = self.child.wait().await {
                tracing::warn!(error = %e, "failed to reap isolated context");
            }
        }
        self.release();
        tracing::debug!(invocation_id = %self.id, killed = !already_exited, "isolated context destroyed");
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(drain) = self.stderr_drain.take() {
            drain.abort();
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
        METRICS.inc_contexts_destroyed();
    }
}

impl Drop for IsolatedContext {
    fn drop(&mut self) {
        // Reached without teardown only when the caller's future is dropped;
        // kill_on_drop takes care of the process itself.
        self.release();
    }
}

fn handle_line(id: InvocationId, line: &str, capture: &mut ConsoleCapture) -> Option<Resolution> {
    if line.trim().is_empty() {
        return None;
    }
    let envelope = match Envelope::from_line(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed worker line");
            return None;
        }
    };
    if envelope.id != id {
        tracing::warn!(expected = %id, got = %envelope.id, "discarding message for another invocation");
        return None;
    }
    match envelope.message {
        WorkerMessage::Log { level, text } => {
            capture.push(LogEntry { level, text });
            None
        }
        WorkerMessage::Done { json, text } => Some(Resolution::Done { json, text }),
        WorkerMessage::Error { message, stack } => Some(Resolution::Error { message, stack }),
    }
}

async fn drain_stderr(id: InvocationId, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "jsbox::worker", invocation_id = %id, "{line}");
    }
}
