//! Workflow state types

use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;

/// Connectivity of the handset as seen by the last probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    #[default]
    Unknown,
    NotDetected,
    Unauthorized,
    Connected,
}

impl DeviceState {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceState::Unknown => "Not checked",
            DeviceState::NotDetected => "Not detected",
            DeviceState::Unauthorized => "Unauthorized",
            DeviceState::Connected => "Connected",
        }
    }
}

/// Firmware identity derived from the build fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub device_model_matches: bool,
    pub version_tag: Option<String>,
}

impl FirmwareInfo {
    pub fn label(&self) -> String {
        match (self.device_model_matches, &self.version_tag) {
            (true, Some(tag)) => format!("{} detected", tag),
            (true, None) => "CAT S22 Flip (version unknown)".to_string(),
            (false, _) => "Non-CAT S22 device detected".to_string(),
        }
    }
}

/// Controller state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    Provisioning,
    Detecting,
    RunningAction,
}

impl WorkflowState {
    pub fn is_idle(&self) -> bool {
        matches!(self, WorkflowState::Idle)
    }

    /// Human-readable description of what is happening
    pub fn describe(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Provisioning => "preparing platform tools",
            WorkflowState::Detecting => "detecting device",
            WorkflowState::RunningAction => "a script is running",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Destructive scripted actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Root,
    Debloat,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Root => "Root Device",
            ActionKind::Debloat => "Debloat Device",
        }
    }

    /// Warning the operator must accept before the action runs
    pub fn risk_notice(&self) -> &'static [&'static str] {
        match self {
            ActionKind::Root => &[
                "This will start the rooting process for your CAT S22 Flip.",
                "",
                "WARNING:",
                "- This will VOID your warranty",
                "- Unlocking bootloader ERASES ALL DATA",
                "- Your phone may become bricked if interrupted",
                "",
                "Make sure you have:",
                "- Backed up all important data",
                "- Phone charged above 50%",
                "- USB debugging enabled",
            ],
            ActionKind::Debloat => &[
                "This will run the debloat tool to remove bloatware and install privacy-focused apps.",
                "",
                "Requirements:",
                "- Device must already be rooted (run Root Device first if needed)",
                "- USB debugging must be enabled",
                "- Device must be connected",
                "",
                "This will:",
                "- Remove T-Mobile/Google bloatware",
                "- Offer to install alternative apps (F-Droid, etc.)",
            ],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The operator's answer to an action's risk notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskAcknowledgement {
    kind: ActionKind,
    accepted: bool,
}

impl RiskAcknowledgement {
    pub fn accepted(kind: ActionKind) -> Self {
        Self {
            kind,
            accepted: true,
        }
    }

    pub fn declined(kind: ActionKind) -> Self {
        Self {
            kind,
            accepted: false,
        }
    }

    /// True only for an affirmative answer to `kind`'s notice
    pub fn permits(&self, kind: ActionKind) -> bool {
        self.accepted && self.kind == kind
    }
}

/// An external tool set that must exist locally before use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDependency {
    pub name: String,
    pub local_path: PathBuf,
    pub source_url: String,
    /// Entry binary relative to `local_path`
    pub marker: PathBuf,
    pub installed: bool,
}

impl ToolDependency {
    pub fn new(
        name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        source_url: impl Into<String>,
        marker: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
            source_url: source_url.into(),
            marker: marker.into(),
            installed: false,
        }
    }

    /// Full path of the entry binary
    pub fn entry_point(&self) -> PathBuf {
        self.local_path.join(&self.marker)
    }

    /// Whether the entry binary is present on disk
    pub fn is_present(&self) -> bool {
        self.entry_point().is_file()
    }

    /// Refresh `installed` from disk
    pub fn refresh(&mut self) -> bool {
        self.installed = self.is_present();
        self.installed
    }
}

/// Lifecycle of a script run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed(i32),
    Cancelled,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed(_) | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => f.write_str("pending"),
            JobState::Running => f.write_str("running"),
            JobState::Succeeded => f.write_str("succeeded"),
            JobState::Failed(code) => write!(f, "exited with code {}", code),
            JobState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// One invocation of a scripted action
#[derive(Debug, Clone)]
pub struct ScriptJob {
    pub kind: ActionKind,
    pub script_name: String,
    pub state: JobState,
    pub started_at: DateTime<Local>,
}

impl ScriptJob {
    pub fn new(kind: ActionKind, script_name: impl Into<String>) -> Self {
        Self {
            kind,
            script_name: script_name.into(),
            state: JobState::Pending,
            started_at: Local::now(),
        }
    }

    /// One-line description for status displays
    pub fn summary(&self) -> String {
        if self.state.is_finished() {
            format!(
                "{} {} ({})",
                self.kind,
                self.state,
                self.started_at.format("%H:%M:%S")
            )
        } else {
            format!("{} {}", self.kind, self.state)
        }
    }
}

/// Consistent copy of the controller's observable state
#[derive(Debug, Clone)]
pub struct ControllerSnapshot {
    pub state: WorkflowState,
    pub device: DeviceState,
    pub firmware: Option<FirmwareInfo>,
    pub tools: Vec<ToolDependency>,
    pub job: Option<ScriptJob>,
    pub work_dir: PathBuf,
    pub log_path: PathBuf,
}

impl ControllerSnapshot {
    pub fn tools_installed(&self) -> bool {
        self.tools.iter().all(|t| t.installed)
    }
}
