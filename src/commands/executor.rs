//! Async command execution with output streaming, timeout and cancellation

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::errors::RunError;
use crate::constants::READER_DRAIN_TIMEOUT_SECS;

/// Which stream a line arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of process output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Receives each output line as it arrives
pub type LineSink<'a> = &'a (dyn Fn(&OutputLine) + Send + Sync);

/// A command to execute
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            timeout: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program name for log messages
    pub fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Everything a finished process produced
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    /// Lines in arrival order across both streams
    pub lines: Vec<OutputLine>,
    /// Exit code, or -1 when the process was terminated by a signal
    pub exit_code: i32,
}

impl CapturedOutput {
    /// All output joined with newlines
    pub fn combined(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes external programs
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion, forwarding each output line to `sink`.
    ///
    /// The process is killed and reaped if `cancel` fires or the timeout
    /// elapses first.
    async fn run(
        &self,
        spec: &CommandSpec,
        sink: Option<LineSink<'_>>,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput, RunError>;
}

/// Runs commands as real OS processes
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        sink: Option<LineSink<'_>>,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput, RunError> {
        let name = spec.display_name();
        if cancel.is_cancelled() {
            tracing::info!("Not starting {}: already cancelled", name);
            return Err(RunError::Cancelled);
        }
        tracing::info!("Running command: {} {:?}", spec.program.display(), spec.args);

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| RunError::SpawnFailed {
            program: name.clone(),
            reason: e.to_string(),
        })?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<OutputLine>();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, OutputStream::Stdout, line_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, OutputStream::Stderr, line_tx.clone());
        }
        drop(line_tx);

        let mut captured = CapturedOutput::default();
        let mut record = |line: OutputLine| {
            if let Some(sink) = sink {
                sink(&line);
            }
            captured.lines.push(line);
        };

        let deadline = async {
            match spec.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Cancelling command: {}", name);
                    terminate(&mut child, &name).await;
                    return Err(RunError::Cancelled);
                }
                _ = &mut deadline => {
                    // The match arm is only reachable with a timeout set
                    let limit = spec.timeout.unwrap_or_default();
                    tracing::warn!("Command timed out after {}s: {}", limit.as_secs(), name);
                    terminate(&mut child, &name).await;
                    return Err(RunError::TimedOut(limit));
                }
                Some(line) = line_rx.recv() => record(line),
                status = child.wait() => break status?,
            }
        };

        // Readers finish once the pipes close; bounded in case a grandchild
        // inherited them
        let drain = async {
            while let Some(line) = line_rx.recv().await {
                record(line);
            }
        };
        if tokio::time::timeout(Duration::from_secs(READER_DRAIN_TIMEOUT_SECS), drain)
            .await
            .is_err()
        {
            tracing::warn!("Output readers timed out for command: {}", name);
        }

        captured.exit_code = status.code().unwrap_or(-1);
        tracing::info!("Command {} exited with code {}", name, captured.exit_code);
        Ok(captured)
    }
}

fn spawn_reader<R>(reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(text)) => {
                    if tx.send(OutputLine { stream, text }).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read {:?}: {}", stream, e);
                    break;
                }
            }
        }
    });
}

/// Forcefully kill and reap a child
async fn terminate(child: &mut tokio::process::Child, name: &str) {
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill {}: {}", name, e);
    }
}
