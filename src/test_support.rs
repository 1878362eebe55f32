//! Test doubles shared by the workflow tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::commands::errors::{ProvisionError, RunError};
use crate::commands::executor::{
    CapturedOutput, CommandRunner, CommandSpec, LineSink, OutputLine, OutputStream,
};
use crate::commands::provision::{ArchiveFetcher, ProgressSink};
use crate::commands::DownloadProgress;

/// What a faked command does
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Emit lines then exit with the given code
    Exit {
        lines: Vec<(OutputStream, String)>,
        exit_code: i32,
    },
    /// Emit lines then block until cancelled
    BlockUntilCancelled { lines: Vec<(OutputStream, String)> },
    /// Fail to launch
    SpawnFailure,
}

impl FakeBehavior {
    pub fn stdout(text: &str, exit_code: i32) -> Self {
        FakeBehavior::Exit {
            lines: text
                .lines()
                .map(|l| (OutputStream::Stdout, l.to_string()))
                .collect(),
            exit_code,
        }
    }
}

/// Scripted [`CommandRunner`] that records every invocation
#[derive(Default)]
pub struct FakeRunner {
    rules: Vec<(String, FakeBehavior)>,
    calls: Mutex<Vec<CommandSpec>>,
    script_bodies: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands whose "program args" text contains `pattern` behave as given.
    /// The first matching rule wins; unmatched commands exit 0 silently.
    pub fn on(mut self, pattern: &str, behavior: FakeBehavior) -> Self {
        self.rules.push((pattern.to_string(), behavior));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn called_with(&self, needle: &str) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|spec| command_text(spec).contains(needle))
    }

    /// Contents of script files passed as the last argument, read while the
    /// fake process was "running"
    pub fn script_bodies(&self) -> Vec<String> {
        self.script_bodies.lock().clone()
    }

    /// Poll until at least `n` commands were started
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..500 {
            if self.call_count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} command(s)", n);
    }
}

fn command_text(spec: &CommandSpec) -> String {
    format!("{} {}", spec.program.display(), spec.args.join(" "))
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        sink: Option<LineSink<'_>>,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput, RunError> {
        self.calls.lock().push(spec.clone());
        if let Some(last) = spec.args.last() {
            if let Ok(body) = std::fs::read_to_string(last) {
                self.script_bodies.lock().push(body);
            }
        }

        let text = command_text(spec);
        let behavior = self
            .rules
            .iter()
            .find(|(pattern, _)| text.contains(pattern.as_str()))
            .map(|(_, b)| b.clone())
            .unwrap_or(FakeBehavior::Exit {
                lines: Vec::new(),
                exit_code: 0,
            });

        let emit = |lines: &[(OutputStream, String)], captured: &mut CapturedOutput| {
            for (stream, text) in lines {
                let line = OutputLine {
                    stream: *stream,
                    text: text.clone(),
                };
                if let Some(sink) = sink {
                    sink(&line);
                }
                captured.lines.push(line);
            }
        };

        let mut captured = CapturedOutput::default();
        match behavior {
            FakeBehavior::Exit { lines, exit_code } => {
                emit(&lines, &mut captured);
                captured.exit_code = exit_code;
                Ok(captured)
            }
            FakeBehavior::BlockUntilCancelled { lines } => {
                emit(&lines, &mut captured);
                cancel.cancelled().await;
                Err(RunError::Cancelled)
            }
            FakeBehavior::SpawnFailure => Err(RunError::SpawnFailed {
                program: spec.display_name(),
                reason: "No such file or directory (os error 2)".to_string(),
            }),
        }
    }
}

/// How the fake fetcher responds
#[derive(Debug, Clone)]
pub enum FetchBehavior {
    Serve(Vec<u8>),
    Fail(String),
    /// Write part of the payload then wait for cancellation
    StallUntilCancelled(Vec<u8>),
}

/// [`ArchiveFetcher`] serving canned bytes and counting calls
pub struct FakeFetcher {
    behavior: FetchBehavior,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(behavior: FetchBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn serving_tools(marker: &str) -> Self {
        Self::new(FetchBehavior::Serve(tools_zip(marker)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Poll until at least `n` fetches were started
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..500 {
            if self.calls() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} fetch(es)", n);
    }
}

#[async_trait]
impl ArchiveFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _url: &str,
        dest: &Path,
        progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, ProvisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            FetchBehavior::Serve(bytes) => {
                let total = bytes.len() as u64;
                let half = bytes.len() / 2;
                std::fs::write(dest, &bytes[..half])?;
                progress(DownloadProgress {
                    received: half as u64,
                    total: Some(total),
                });
                std::fs::write(dest, bytes)?;
                progress(DownloadProgress {
                    received: total,
                    total: Some(total),
                });
                Ok(total)
            }
            FetchBehavior::Fail(reason) => Err(ProvisionError::NetworkFailure(reason.clone())),
            FetchBehavior::StallUntilCancelled(bytes) => {
                std::fs::write(dest, bytes)?;
                cancel.cancelled().await;
                Err(ProvisionError::Cancelled)
            }
        }
    }
}

/// A platform-tools style archive with `platform-tools/<marker>` inside
pub fn tools_zip(marker: &str) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        zip.add_directory("platform-tools/", options).unwrap();
        zip.start_file(format!("platform-tools/{}", marker), options)
            .unwrap();
        zip.write_all(b"#!/bin/sh\necho fake adb\n").unwrap();
        zip.start_file("platform-tools/NOTICE.txt", options).unwrap();
        zip.write_all(b"notice").unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}
