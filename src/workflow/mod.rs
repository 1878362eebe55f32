//! Workflow orchestration
//!
//! [`WorkflowController`] owns the device view and the platform-tools
//! dependency, and runs at most one long operation at a time. Presentation
//! layers drive it through its async methods and observe it through the
//! [`WorkflowEvent`](crate::commands::WorkflowEvent) channel.

pub mod state;

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commands::action::{ActionExecutor, ExitOutcome};
use crate::commands::errors::{ExecError, ProbeError, RunError, WorkflowError};
use crate::commands::executor::CommandRunner;
use crate::commands::probe::{DeviceProbe, ProbeReport};
use crate::commands::provision::{ArchiveFetcher, ToolProvisioner};
use crate::commands::reporter::Reporter;
use crate::commands::{DownloadProgress, WorkflowEvent};
use crate::config::{AppConfig, ScriptsConfig};
use crate::constants::{APP_NAME, APP_VERSION, PLATFORM_TOOLS_DIR};
use crate::system::scripts::ScriptBundle;
use crate::system::workdir::WorkDir;
use state::{
    ActionKind, ControllerSnapshot, DeviceState, FirmwareInfo, JobState, RiskAcknowledgement,
    ScriptJob, ToolDependency, WorkflowState,
};

/// External collaborators the controller drives
pub struct Collaborators {
    pub runner: Arc<dyn CommandRunner>,
    pub fetcher: Arc<dyn ArchiveFetcher>,
    pub bundle: ScriptBundle,
}

struct Shared {
    state: WorkflowState,
    device: DeviceState,
    firmware: Option<FirmwareInfo>,
    tools: ToolDependency,
    job: Option<ScriptJob>,
    cancel: Option<CancellationToken>,
}

struct Inner {
    shared: Mutex<Shared>,
    work: WorkDir,
    resource_dirs: Vec<PathBuf>,
    scripts: ScriptsConfig,
    reporter: Reporter,
    provisioner: ToolProvisioner,
    probe: DeviceProbe,
    executor: ActionExecutor,
}

/// Single-flight controller for detect, root, debloat and cleanup
#[derive(Clone)]
pub struct WorkflowController {
    inner: Arc<Inner>,
}

impl WorkflowController {
    pub fn new(
        config: &AppConfig,
        parts: Collaborators,
        events: Option<mpsc::UnboundedSender<WorkflowEvent>>,
    ) -> Self {
        let work = WorkDir::new(config.work_dir());
        let reporter = match events {
            Some(tx) => Reporter::new(work.log_file(), tx),
            None => Reporter::detached(work.log_file()),
        };

        let mut tools = ToolDependency::new(
            PLATFORM_TOOLS_DIR,
            work.platform_tools(),
            config.tools.platform_tools_url.clone(),
            config.tools.adb_binary.clone(),
        );
        tools.refresh();

        let resource_dirs = parts.bundle.dirs().to_vec();
        let provisioner =
            ToolProvisioner::new(parts.fetcher, work.downloads(), reporter.clone());
        let probe = DeviceProbe::new(
            parts.runner.clone(),
            config.timeouts.probe(),
            reporter.clone(),
        );
        let executor = ActionExecutor::new(
            parts.runner,
            &config.scripts,
            parts.bundle,
            config.timeouts.script(),
            reporter.clone(),
        );

        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    state: WorkflowState::Idle,
                    device: DeviceState::Unknown,
                    firmware: None,
                    tools,
                    job: None,
                    cancel: None,
                }),
                work,
                resource_dirs,
                scripts: config.scripts.clone(),
                reporter,
                provisioner,
                probe,
                executor,
            }),
        }
    }

    /// Prepare the working directory and report what is already in place
    pub fn startup(&self) -> Result<(), WorkflowError> {
        let reporter = &self.inner.reporter;
        reporter.info(format!("{} v{} started", APP_NAME, APP_VERSION));
        reporter.debug(format!("Working directory: {}", self.work_dir().display()));

        self.inner.work.ensure_layout().map_err(WorkflowError::Setup)?;
        self.stage_resources();

        let (present, adb) = {
            let mut shared = self.inner.shared.lock();
            (shared.tools.refresh(), shared.tools.entry_point())
        };
        if present {
            reporter.success(format!("Platform-tools found at: {}", adb.display()));
        } else {
            reporter.warning("Platform-tools not found. Will download on first use.");
        }

        reporter.info("Ready! Connect your CAT S22 Flip and enable USB debugging.");
        reporter.status("Ready");
        Ok(())
    }

    /// Probe the attached device, installing platform-tools first if needed
    pub async fn detect(&self) -> Result<ProbeReport, WorkflowError> {
        let op = self.begin(WorkflowState::Provisioning)?;

        let result = self.detect_with(&op).await;
        match &result {
            Ok(report) => self.apply_report(report),
            Err(e) => self.record_failure("Device detection", e),
        }
        result
    }

    async fn detect_with(&self, op: &ActiveOperation<'_>) -> Result<ProbeReport, WorkflowError> {
        let adb = self.ensure_tools(op).await?;
        if op.token().is_cancelled() {
            return Err(ProbeError::Run(RunError::Cancelled).into());
        }

        op.transition(WorkflowState::Detecting);
        self.inner.reporter.info("Detecting device...");
        self.inner.reporter.status("Detecting device...");

        Ok(self.inner.probe.detect(&adb, op.token()).await?)
    }

    fn apply_report(&self, report: &ProbeReport) {
        {
            let mut shared = self.inner.shared.lock();
            shared.device = report.state;
            shared.firmware = report.firmware.clone();
        }
        self.inner
            .reporter
            .device(report.state, report.firmware.clone());

        let status = match report.state {
            DeviceState::Connected => "Device detected! Ready to proceed.",
            DeviceState::Unauthorized => "Please accept the USB debugging prompt on your phone!",
            _ => "No device detected. Check USB connection and enable USB debugging.",
        };
        self.inner.reporter.status(status);
    }

    /// Run the script for `kind` once its risk notice was accepted
    pub async fn run_action(
        &self,
        kind: ActionKind,
        acknowledgement: RiskAcknowledgement,
    ) -> Result<ExitOutcome, WorkflowError> {
        if !acknowledgement.permits(kind) {
            tracing::info!("{} not confirmed", kind);
            return Err(WorkflowError::NotConfirmed);
        }
        let op = self.begin(WorkflowState::Provisioning)?;

        let result = self.run_action_with(&op, kind).await;
        match &result {
            Ok(ExitOutcome::Cancelled) => self.reset_device(),
            Ok(_) => {}
            Err(e) => self.record_failure(kind.label(), e),
        }
        result
    }

    async fn run_action_with(
        &self,
        op: &ActiveOperation<'_>,
        kind: ActionKind,
    ) -> Result<ExitOutcome, WorkflowError> {
        self.stage_resources();
        self.ensure_tools(op).await?;
        if op.token().is_cancelled() {
            self.inner.reporter.warning(format!("{} cancelled", kind));
            self.inner.reporter.status("Process cancelled.");
            return Ok(ExitOutcome::Cancelled);
        }

        let script = self.script_for(kind).to_string();
        op.transition(WorkflowState::RunningAction);
        self.set_job(Some(ScriptJob::new(kind, &script)), JobState::Running);

        let outcome = self
            .inner
            .executor
            .run_script(&script, self.inner.work.root(), op.token())
            .await;

        let job_state = match &outcome {
            Ok(ExitOutcome::Succeeded) => JobState::Succeeded,
            Ok(ExitOutcome::CompletedWithWarnings(code)) => JobState::Failed(*code),
            Ok(ExitOutcome::Cancelled) => JobState::Cancelled,
            Err(_) => JobState::Failed(-1),
        };
        self.set_job(None, job_state);

        Ok(outcome?)
    }

    /// Request cancellation of the operation in flight.
    ///
    /// Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let shared = self.inner.shared.lock();
        match &shared.cancel {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                self.inner
                    .reporter
                    .warning(format!("Cancelling: {}...", shared.state.describe()));
                true
            }
            _ => false,
        }
    }

    /// Wipe and recreate the working directory
    pub fn cleanup(&self) -> Result<(), WorkflowError> {
        // Held throughout so nothing can start while files are removed
        let mut shared = self.inner.shared.lock();
        if !shared.state.is_idle() {
            return Err(WorkflowError::Busy(shared.state));
        }

        let reporter = &self.inner.reporter;
        reporter.suspend();
        let result = self.inner.work.reset();
        reporter.reopen();

        shared.tools.refresh();
        shared.device = DeviceState::Unknown;
        shared.firmware = None;
        shared.job = None;
        reporter.device(DeviceState::Unknown, None);

        match result {
            Ok(()) => {
                reporter.success("Cleanup complete. Resources will be re-extracted on next action.");
                reporter.status("Temporary files removed.");
                Ok(())
            }
            Err(e) => {
                reporter.error(format!("Cleanup failed: {}", e));
                reporter.status("Cleanup failed. Check log for details.");
                Err(WorkflowError::Cleanup(e))
            }
        }
    }

    /// Consistent copy of the observable state
    pub fn snapshot(&self) -> ControllerSnapshot {
        let shared = self.inner.shared.lock();
        ControllerSnapshot {
            state: shared.state,
            device: shared.device,
            firmware: shared.firmware.clone(),
            tools: vec![shared.tools.clone()],
            job: shared.job.clone(),
            work_dir: self.inner.work.root().to_path_buf(),
            log_path: self.inner.reporter.log_path(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.inner.shared.lock().state
    }

    pub fn work_dir(&self) -> &Path {
        self.inner.work.root()
    }

    pub fn script_for(&self, kind: ActionKind) -> &str {
        match kind {
            ActionKind::Root => &self.inner.scripts.root_script,
            ActionKind::Debloat => &self.inner.scripts.debloat_script,
        }
    }

    fn begin(&self, first: WorkflowState) -> Result<ActiveOperation<'_>, WorkflowError> {
        let mut shared = self.inner.shared.lock();
        if !shared.state.is_idle() {
            tracing::debug!("Rejected {:?} while {}", first, shared.state);
            return Err(WorkflowError::Busy(shared.state));
        }

        let token = CancellationToken::new();
        shared.state = first;
        shared.cancel = Some(token.clone());
        self.inner.reporter.state_changed(first);
        self.inner.reporter.debug(format!("Workflow: {}", first));

        Ok(ActiveOperation {
            inner: &self.inner,
            token,
        })
    }

    async fn ensure_tools(&self, op: &ActiveOperation<'_>) -> Result<PathBuf, WorkflowError> {
        self.inner.reporter.status("Checking platform tools...");

        // Cloned out so the lock is not held across the download
        let mut tools = self.inner.shared.lock().tools.clone();
        let reporter = self.inner.reporter.clone();
        let progress = move |p: DownloadProgress| {
            reporter.progress(p);
            match p.percent() {
                Some(percent) => reporter.status(format!("Downloading Platform Tools: {}%", percent)),
                None => reporter.status(format!(
                    "Downloading Platform Tools: {} KB",
                    p.received / 1024
                )),
            }
        };

        let result = self
            .inner
            .provisioner
            .ensure(&mut tools, &progress, op.token())
            .await;
        let adb = tools.entry_point();
        self.inner.shared.lock().tools = tools;

        result?;
        Ok(adb)
    }

    fn stage_resources(&self) {
        for dir in &self.inner.resource_dirs {
            match self.inner.work.stage_resources(dir) {
                Ok(staged) if !staged.is_empty() => {
                    for name in &staged {
                        self.inner.reporter.debug(format!("Copied: {}", name));
                    }
                    self.inner.reporter.success("Resources extracted successfully");
                }
                Ok(_) => {}
                Err(e) => self
                    .inner
                    .reporter
                    .error(format!("Error extracting resources: {}", e)),
            }
        }
    }

    fn set_job(&self, job: Option<ScriptJob>, state: JobState) {
        let mut shared = self.inner.shared.lock();
        if let Some(job) = job {
            shared.job = Some(job);
        }
        if let Some(job) = shared.job.as_mut() {
            job.state = state;
        }
    }

    fn reset_device(&self) {
        {
            let mut shared = self.inner.shared.lock();
            shared.device = DeviceState::Unknown;
            shared.firmware = None;
        }
        self.inner.reporter.device(DeviceState::Unknown, None);
    }

    fn record_failure(&self, operation: &str, err: &WorkflowError) {
        self.reset_device();
        let reporter = &self.inner.reporter;

        if err.is_cancelled() {
            reporter.warning(format!("{} cancelled", operation));
            reporter.status("Operation cancelled.");
            return;
        }

        match err {
            // Already reported by the executor
            WorkflowError::Exec(ExecError::ScriptNotFound(_) | ExecError::Run(_)) => {}
            WorkflowError::Provision(e) => {
                reporter.error(format!("Failed to download Platform Tools: {}", e));
                reporter.status("Failed to prepare platform tools. Check log for details.");
            }
            other => {
                reporter.error(format!("{} failed: {}", operation, other));
                reporter.status(format!("{} failed. Check log for details.", operation));
            }
        }
    }
}

/// Marks an operation in flight; returns the controller to Idle when dropped
struct ActiveOperation<'a> {
    inner: &'a Inner,
    token: CancellationToken,
}

impl ActiveOperation<'_> {
    fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn transition(&self, next: WorkflowState) {
        let mut shared = self.inner.shared.lock();
        shared.state = next;
        self.inner.reporter.state_changed(next);
        self.inner.reporter.debug(format!("Workflow: {}", next));
    }
}

impl Drop for ActiveOperation<'_> {
    fn drop(&mut self) {
        let mut shared = self.inner.shared.lock();
        shared.state = WorkflowState::Idle;
        shared.cancel = None;
        self.inner.reporter.state_changed(WorkflowState::Idle);
        self.inner.reporter.debug("Workflow: idle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::executor::OutputStream;
    use crate::commands::LogLevel;
    use crate::constants::{ADB_BINARY, ROOT_SCRIPT};
    use crate::test_support::{FakeBehavior, FakeFetcher, FakeRunner, FetchBehavior};

    const CONNECTED: &str = "List of devices attached\n0123456789ABCDEF\tdevice\n";
    const V30: &str = "Cat/S22FLIP/S22Flip:11/RKQ1/S22FLIP_0.030.01:user/release-keys";

    struct Harness {
        _dir: tempfile::TempDir,
        controller: WorkflowController,
        runner: Arc<FakeRunner>,
        fetcher: Arc<FakeFetcher>,
        rx: mpsc::UnboundedReceiver<WorkflowEvent>,
    }

    fn harness(runner: FakeRunner) -> Harness {
        harness_with(runner, FakeFetcher::serving_tools(ADB_BINARY))
    }

    fn harness_with(runner: FakeRunner, fetcher: FakeFetcher) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.paths.work_dir = Some(dir.path().join("CAT_S22_Root"));

        let runner = Arc::new(runner);
        let fetcher = Arc::new(fetcher);
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = WorkflowController::new(
            &config,
            Collaborators {
                runner: runner.clone(),
                fetcher: fetcher.clone(),
                bundle: ScriptBundle::new().with_embedded(ROOT_SCRIPT, "Write-Host rooting"),
            },
            Some(tx),
        );
        controller.startup().unwrap();

        Harness {
            _dir: dir,
            controller,
            runner,
            fetcher,
            rx,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn temp_scripts(work: &Path) -> usize {
        std::fs::read_dir(work)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("temp_"))
            .count()
    }

    fn root_ack() -> RiskAcknowledgement {
        RiskAcknowledgement::accepted(ActionKind::Root)
    }

    #[tokio::test]
    async fn test_startup_reports_missing_tools() {
        let mut h = harness(FakeRunner::new());
        let events = drain(&mut h.rx);

        let warned = events.iter().any(|e| {
            matches!(e, WorkflowEvent::Log(line)
                if line.level == LogLevel::Warning && line.message.contains("Will download on first use"))
        });
        assert!(warned);
        assert!(h.controller.work_dir().join("downloads").is_dir());
        assert!(h.controller.work_dir().join("boot_images").is_dir());
        assert!(!h.controller.snapshot().tools_installed());
    }

    #[tokio::test]
    async fn test_detect_provisions_then_probes() {
        let mut h = harness(
            FakeRunner::new()
                .on("devices", FakeBehavior::stdout(CONNECTED, 0))
                .on("getprop", FakeBehavior::stdout(V30, 0)),
        );

        let report = h.controller.detect().await.unwrap();

        assert_eq!(report.state, DeviceState::Connected);
        assert_eq!(h.fetcher.calls(), 1);
        let snap = h.controller.snapshot();
        assert_eq!(snap.state, WorkflowState::Idle);
        assert_eq!(snap.device, DeviceState::Connected);
        assert!(snap.tools_installed());
        assert_eq!(
            snap.firmware.and_then(|f| f.version_tag).as_deref(),
            Some("v30")
        );

        let states: Vec<WorkflowState> = drain(&mut h.rx)
            .into_iter()
            .filter_map(|e| match e {
                WorkflowEvent::StateChanged(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                WorkflowState::Provisioning,
                WorkflowState::Detecting,
                WorkflowState::Idle
            ]
        );

        // Second detect reuses the installed tools
        h.controller.detect().await.unwrap();
        assert_eq!(h.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_download_resets_device_and_returns_idle() {
        let h = harness_with(
            FakeRunner::new(),
            FakeFetcher::new(FetchBehavior::Fail("dns error".to_string())),
        );

        let err = h.controller.detect().await.unwrap_err();

        assert!(matches!(err, WorkflowError::Provision(_)));
        let snap = h.controller.snapshot();
        assert_eq!(snap.state, WorkflowState::Idle);
        assert_eq!(snap.device, DeviceState::Unknown);
        assert!(!snap.tools_installed());
        assert_eq!(h.runner.call_count(), 0);

        let log = std::fs::read_to_string(&snap.log_path).unwrap();
        assert!(log.contains("[Error] Failed to download Platform Tools: download failed: dns error"));
    }

    #[tokio::test]
    async fn test_action_failure_resets_stale_device() {
        let h = harness(
            FakeRunner::new()
                .on("devices", FakeBehavior::stdout(CONNECTED, 0))
                .on("getprop", FakeBehavior::stdout(V30, 0))
                .on("-File", FakeBehavior::SpawnFailure),
        );
        h.controller.detect().await.unwrap();
        assert_eq!(h.controller.snapshot().device, DeviceState::Connected);

        let err = h
            .controller
            .run_action(ActionKind::Root, root_ack())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Exec(ExecError::Run(_))));
        let snap = h.controller.snapshot();
        assert_eq!(snap.state, WorkflowState::Idle);
        assert_eq!(snap.device, DeviceState::Unknown);
        assert_eq!(snap.firmware, None);
    }

    #[tokio::test]
    async fn test_unclassified_listing_fails_detect() {
        let h = harness(FakeRunner::new().on("devices", FakeBehavior::stdout("error: boom", 1)));
        let err = h.controller.detect().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Probe(_)));
        assert_eq!(h.controller.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn test_unconfirmed_action_starts_nothing() {
        let h = harness(FakeRunner::new());

        let err = h
            .controller
            .run_action(ActionKind::Root, RiskAcknowledgement::declined(ActionKind::Root))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotConfirmed));

        // Acknowledging the wrong notice does not count either
        let err = h
            .controller
            .run_action(
                ActionKind::Root,
                RiskAcknowledgement::accepted(ActionKind::Debloat),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotConfirmed));

        assert_eq!(h.runner.call_count(), 0);
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_completes_with_warnings() {
        let h = harness(FakeRunner::new().on("-File", FakeBehavior::stdout("partial", 1)));

        let outcome = h
            .controller
            .run_action(ActionKind::Root, root_ack())
            .await
            .unwrap();

        assert_eq!(outcome, ExitOutcome::CompletedWithWarnings(1));
        let snap = h.controller.snapshot();
        assert_eq!(snap.state, WorkflowState::Idle);
        assert_eq!(snap.job.map(|j| j.state), Some(JobState::Failed(1)));
        assert!(h.runner.script_bodies()[0].contains("Write-Host rooting"));
    }

    #[tokio::test]
    async fn test_second_start_rejected_and_cancel_returns_idle() {
        let h = harness(FakeRunner::new().on(
            "-File",
            FakeBehavior::BlockUntilCancelled {
                lines: vec![(OutputStream::Stdout, "Waiting for fastboot".to_string())],
            },
        ));

        let running = {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.run_action(ActionKind::Root, root_ack()).await })
        };
        h.runner.wait_for_calls(1).await;
        assert_eq!(h.controller.state(), WorkflowState::RunningAction);

        let err = h
            .controller
            .run_action(ActionKind::Root, root_ack())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Busy(WorkflowState::RunningAction)));
        assert!(matches!(
            h.controller.detect().await,
            Err(WorkflowError::Busy(_))
        ));
        assert!(matches!(
            h.controller.cleanup(),
            Err(WorkflowError::Busy(WorkflowState::RunningAction))
        ));
        assert!(h.controller.work_dir().join("platform-tools").exists());

        assert!(h.controller.cancel());
        let outcome = running.await.unwrap().unwrap();

        assert_eq!(outcome, ExitOutcome::Cancelled);
        assert_eq!(h.runner.call_count(), 1);
        assert_eq!(temp_scripts(h.controller.work_dir()), 0);
        let snap = h.controller.snapshot();
        assert_eq!(snap.state, WorkflowState::Idle);
        assert_eq!(snap.device, DeviceState::Unknown);
        assert_eq!(snap.job.map(|j| j.state), Some(JobState::Cancelled));
        assert!(!h.controller.cancel());
    }

    #[tokio::test]
    async fn test_cleanup_when_idle_wipes_work_dir() {
        let h = harness(
            FakeRunner::new()
                .on("devices", FakeBehavior::stdout(CONNECTED, 0))
                .on("getprop", FakeBehavior::stdout(V30, 0)),
        );
        h.controller.detect().await.unwrap();
        let work = h.controller.work_dir().to_path_buf();
        std::fs::write(work.join("downloads/Magisk.apk"), b"apk").unwrap();
        assert!(h.controller.snapshot().tools_installed());

        h.controller.cleanup().unwrap();

        assert!(!work.join("platform-tools").exists());
        assert!(!work.join("downloads/Magisk.apk").exists());
        assert!(!work.join(ROOT_SCRIPT).exists());
        let snap = h.controller.snapshot();
        assert!(!snap.tools_installed());
        assert_eq!(snap.device, DeviceState::Unknown);

        // Log file was reopened and only holds post-cleanup lines
        let log = std::fs::read_to_string(&snap.log_path).unwrap();
        assert!(log.contains("Cleanup complete"));
        assert!(!log.contains("Device connected via ADB"));
    }

    #[tokio::test]
    async fn test_cancel_after_provisioning_skips_probe() {
        let h = harness(
            FakeRunner::new()
                .on("devices", FakeBehavior::stdout(CONNECTED, 0))
                .on("getprop", FakeBehavior::stdout(V30, 0)),
        );
        h.controller.detect().await.unwrap();
        assert_eq!(h.runner.call_count(), 2);

        let op = h.controller.begin(WorkflowState::Provisioning).unwrap();
        assert!(h.controller.cancel());
        let err = h.controller.detect_with(&op).await.unwrap_err();
        drop(op);

        assert!(err.is_cancelled());
        assert_eq!(h.runner.call_count(), 2);
        assert_eq!(h.controller.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_after_provisioning_never_launches_script() {
        let h = harness(
            FakeRunner::new()
                .on("devices", FakeBehavior::stdout(CONNECTED, 0))
                .on("getprop", FakeBehavior::stdout(V30, 0)),
        );
        h.controller.detect().await.unwrap();
        let op = h.controller.begin(WorkflowState::Provisioning).unwrap();
        assert!(h.controller.cancel());

        let outcome = h
            .controller
            .run_action_with(&op, ActionKind::Root)
            .await
            .unwrap();
        drop(op);

        assert_eq!(outcome, ExitOutcome::Cancelled);
        assert_eq!(h.runner.call_count(), 2);
        assert_eq!(temp_scripts(h.controller.work_dir()), 0);
        let snap = h.controller.snapshot();
        assert_eq!(snap.state, WorkflowState::Idle);
        assert!(snap.job.is_none());
    }

    #[tokio::test]
    async fn test_cancel_during_download_returns_idle() {
        let h = harness_with(
            FakeRunner::new(),
            FakeFetcher::new(FetchBehavior::StallUntilCancelled(b"partial".to_vec())),
        );

        let running = {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.detect().await })
        };
        h.fetcher.wait_for_calls(1).await;
        assert_eq!(h.controller.state(), WorkflowState::Provisioning);

        assert!(h.controller.cancel());
        let err = running.await.unwrap().unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Provision(crate::commands::errors::ProvisionError::Cancelled)
        ));
        let snap = h.controller.snapshot();
        assert_eq!(snap.state, WorkflowState::Idle);
        assert_eq!(snap.device, DeviceState::Unknown);
        assert!(!snap.tools_installed());
        assert_eq!(h.runner.call_count(), 0);
        assert!(!h.controller.work_dir().join("downloads/platform-tools.zip").exists());
    }

    #[tokio::test]
    async fn test_cancel_during_detection_returns_idle() {
        let h = harness(FakeRunner::new().on(
            "devices",
            FakeBehavior::BlockUntilCancelled { lines: Vec::new() },
        ));

        let running = {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.detect().await })
        };
        h.runner.wait_for_calls(1).await;
        assert_eq!(h.controller.state(), WorkflowState::Detecting);

        assert!(h.controller.cancel());
        let err = running.await.unwrap().unwrap_err();

        assert!(err.is_cancelled());
        let snap = h.controller.snapshot();
        assert_eq!(snap.state, WorkflowState::Idle);
        assert_eq!(snap.device, DeviceState::Unknown);
        assert!(!h.runner.called_with("getprop"));
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_noop() {
        let h = harness(FakeRunner::new());
        assert!(!h.controller.cancel());
    }
}
