//! Device detection over adb

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::errors::ProbeError;
use super::executor::{CommandRunner, CommandSpec};
use super::reporter::Reporter;
use crate::constants::{
    ADB_DEVICES_BANNER, DEVICE_MARKER, FINGERPRINT_PROPERTY, FIRMWARE_VERSIONS, MODEL_MARKER,
    UNAUTHORIZED_MARKER,
};
use crate::workflow::state::{DeviceState, FirmwareInfo};

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub state: DeviceState,
    /// Only populated for a connected device
    pub firmware: Option<FirmwareInfo>,
}

/// Queries the attached handset through adb
pub struct DeviceProbe {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    reporter: Reporter,
}

impl DeviceProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration, reporter: Reporter) -> Self {
        Self {
            runner,
            timeout,
            reporter,
        }
    }

    /// Classify the attached device and, when connected, read its firmware.
    ///
    /// `adb` is the path of the adb executable.
    pub async fn detect(
        &self,
        adb: &Path,
        cancel: &CancellationToken,
    ) -> Result<ProbeReport, ProbeError> {
        let devices = CommandSpec::new(adb)
            .args(["devices"])
            .timeout(Some(self.timeout));
        let output = self.runner.run(&devices, None, cancel).await?;
        let listing = output.combined();
        tracing::debug!("adb devices (exit {}): {}", output.exit_code, listing);

        let state = classify_devices(&listing);
        if !output.success() && state == DeviceState::NotDetected {
            return Err(ProbeError::Unclassified {
                exit_code: output.exit_code,
                output: listing.trim().to_string(),
            });
        }

        match state {
            DeviceState::Connected => {
                self.reporter.success("Device connected via ADB");
            }
            DeviceState::Unauthorized => {
                self.reporter
                    .warning("Device connected but unauthorized - accept prompt on phone");
                return Ok(ProbeReport {
                    state,
                    firmware: None,
                });
            }
            _ => {
                self.reporter.warning("No device detected");
                return Ok(ProbeReport {
                    state,
                    firmware: None,
                });
            }
        }

        let getprop = CommandSpec::new(adb)
            .args(["shell", "getprop", FINGERPRINT_PROPERTY])
            .timeout(Some(self.timeout));
        let output = self.runner.run(&getprop, None, cancel).await?;
        let fingerprint = output.combined();
        tracing::debug!("{}: {}", FINGERPRINT_PROPERTY, fingerprint.trim());

        let firmware = classify_fingerprint(&fingerprint);
        match (&firmware.version_tag, firmware.device_model_matches) {
            (Some(tag), true) => self.reporter.success(format!("Firmware {} detected", tag)),
            (None, true) => self.reporter.info("CAT S22 Flip detected (firmware version unknown)"),
            (_, false) => self
                .reporter
                .warning("Warning: Device may not be a CAT S22 Flip"),
        }

        Ok(ProbeReport {
            state,
            firmware: Some(firmware),
        })
    }
}

/// Classify `adb devices` output by substring.
///
/// The banner line is dropped first since it contains the device marker
/// itself. Any "unauthorized" entry wins over authorized ones.
pub fn classify_devices(listing: &str) -> DeviceState {
    let entries: String = listing
        .lines()
        .filter(|line| !line.contains(ADB_DEVICES_BANNER))
        .collect::<Vec<_>>()
        .join("\n");

    if entries.contains(UNAUTHORIZED_MARKER) {
        DeviceState::Unauthorized
    } else if entries.contains(DEVICE_MARKER) {
        DeviceState::Connected
    } else {
        DeviceState::NotDetected
    }
}

/// Derive firmware identity from a build fingerprint
pub fn classify_fingerprint(fingerprint: &str) -> FirmwareInfo {
    if !fingerprint.contains(MODEL_MARKER) {
        return FirmwareInfo {
            device_model_matches: false,
            version_tag: None,
        };
    }

    let version_tag = FIRMWARE_VERSIONS
        .iter()
        .find(|(needle, _)| fingerprint.contains(needle))
        .map(|(_, tag)| tag.to_string());

    FirmwareInfo {
        device_model_matches: true,
        version_tag,
    }
}
