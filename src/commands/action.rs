//! Scripted action execution
//!
//! Resolves a script by name, points its hard-coded install location at the
//! working directory, and runs the rewritten copy through the interpreter
//! while streaming its output into the activity log.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::errors::{ExecError, RunError};
use super::executor::{CommandRunner, CommandSpec, OutputLine, OutputStream};
use super::reporter::Reporter;
use crate::config::ScriptsConfig;
use crate::constants::WORK_DIR_ENV;
use crate::system::scripts::{rewrite_script, ScriptBundle};
use crate::system::workdir::WorkDir;
use crate::system::ScopedPath;

/// How a script run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Succeeded,
    /// The script ran to completion but exited non-zero
    CompletedWithWarnings(i32),
    Cancelled,
}

/// Runs the PowerShell scripts that perform the actual device work
pub struct ActionExecutor {
    runner: Arc<dyn CommandRunner>,
    interpreter: PathBuf,
    interpreter_args: Vec<String>,
    bundle: ScriptBundle,
    timeout: Option<Duration>,
    reporter: Reporter,
}

impl ActionExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        scripts: &ScriptsConfig,
        bundle: ScriptBundle,
        timeout: Option<Duration>,
        reporter: Reporter,
    ) -> Self {
        Self {
            runner,
            interpreter: PathBuf::from(&scripts.interpreter),
            interpreter_args: scripts.interpreter_args.clone(),
            bundle,
            timeout,
            reporter,
        }
    }

    /// Run `script_name` against `work_dir`.
    ///
    /// Non-zero exits are reported as [`ExitOutcome::CompletedWithWarnings`];
    /// only launch failures and timeouts are errors.
    pub async fn run_script(
        &self,
        script_name: &str,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExitOutcome, ExecError> {
        if cancel.is_cancelled() {
            self.reporter.warning(format!("{} cancelled before start", script_name));
            self.reporter.status("Process cancelled.");
            return Ok(ExitOutcome::Cancelled);
        }
        let source = self.resolve(script_name, work_dir)?;

        self.reporter.info(format!("Starting {}...", script_name));
        self.reporter.status(format!("Running {}...", script_name));

        let body = std::fs::read_to_string(&source).map_err(|e| ExecError::Io {
            path: source.clone(),
            source: e,
        })?;
        let temp = ScopedPath::new(WorkDir::new(work_dir).temp_script(script_name));
        std::fs::write(temp.path(), rewrite_script(&body, work_dir)).map_err(|e| {
            ExecError::Io {
                path: temp.path().to_path_buf(),
                source: e,
            }
        })?;

        let spec = CommandSpec::new(&self.interpreter)
            .args(self.interpreter_args.iter().cloned())
            .args([temp.path().display().to_string()])
            .current_dir(work_dir)
            .env(WORK_DIR_ENV, work_dir.display().to_string())
            .timeout(self.timeout);

        let reporter = self.reporter.clone();
        let sink = move |line: &OutputLine| {
            if line.text.is_empty() {
                return;
            }
            match line.stream {
                OutputStream::Stdout => reporter.info(line.text.clone()),
                OutputStream::Stderr => reporter.warning(line.text.clone()),
            }
        };

        let output = match self.runner.run(&spec, Some(&sink), cancel).await {
            Ok(output) => output,
            Err(RunError::Cancelled) => {
                self.reporter.warning(format!("{} cancelled", script_name));
                self.reporter.status("Process cancelled.");
                return Ok(ExitOutcome::Cancelled);
            }
            Err(e) => {
                self.reporter
                    .error(format!("Error running script: {}", e));
                self.reporter.status("Error running script. Check log for details.");
                return Err(e.into());
            }
        };

        if output.success() {
            self.reporter
                .success(format!("{} completed successfully!", script_name));
            self.reporter.status("Process completed successfully!");
            Ok(ExitOutcome::Succeeded)
        } else {
            self.reporter.warning(format!(
                "{} exited with code: {}",
                script_name, output.exit_code
            ));
            self.reporter
                .status("Process completed with warnings. Check log for details.");
            Ok(ExitOutcome::CompletedWithWarnings(output.exit_code))
        }
    }

    /// Locate the script in the working directory, materializing the bundled
    /// copy there if needed
    fn resolve(&self, script_name: &str, work_dir: &Path) -> Result<PathBuf, ExecError> {
        let path = WorkDir::new(work_dir).script(script_name);
        if path.is_file() {
            return Ok(path);
        }

        let found = self
            .bundle
            .materialize(script_name, &path)
            .map_err(|e| ExecError::Io {
                path: path.clone(),
                source: e,
            })?;
        if found {
            tracing::debug!("Copied bundled {} into {}", script_name, work_dir.display());
            Ok(path)
        } else {
            self.reporter
                .error(format!("Script not found: {}", script_name));
            Err(ExecError::ScriptNotFound(script_name.to_string()))
        }
    }
}
