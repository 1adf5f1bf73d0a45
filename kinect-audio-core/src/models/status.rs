use serde::Serialize;

use super::audio_models::{BridgeDiagnostics, DeviceAttributes, Subdevices};
use super::error::CaptureError;
use super::session_metadata::SessionMetadata;
use super::state::BridgeState;

/// Read-only snapshot answering a status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub devices: Vec<DeviceAttributes>,
    pub subdevices: Subdevices,
    pub state: String,
    pub buffered_samples: usize,
    pub capacity: usize,
    pub ready: bool,
    pub diagnostics: BridgeDiagnostics,
    pub driver_fault: Option<String>,
    pub session: Option<SessionMetadata>,
}

impl StatusReport {
    pub fn new(devices: Vec<DeviceAttributes>, subdevices: Subdevices, state: BridgeState) -> Self {
        Self {
            devices,
            subdevices,
            state: state.as_str().to_string(),
            buffered_samples: 0,
            capacity: 0,
            ready: false,
            diagnostics: BridgeDiagnostics::default(),
            driver_fault: None,
            session: None,
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Human-readable diagnostic lines, one fact per line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Number of devices found: {}", self.device_count())];
        for (i, device) in self.devices.iter().enumerate() {
            lines.push(format!("Device {} serial: {}", i, device.camera_serial));
        }
        for name in self.subdevices.names() {
            lines.push(format!(
                "driver supports {} subdevice ({})",
                name,
                self.subdevices.bits()
            ));
        }
        lines.push(format!("bridge state: {}", self.state));
        lines.push(format!(
            "buffered samples: {} / {}{}",
            self.buffered_samples,
            self.capacity,
            if self.ready { " (ready)" } else { "" }
        ));
        lines.push(format!(
            "estimated samplingrate: {:.1} Hz",
            self.diagnostics.estimated_rate
        ));
        lines.push(format!(
            "average samplingrate: {:.1} Hz",
            self.diagnostics.average_rate
        ));
        if self.diagnostics.overflow_count > 0 {
            lines.push(format!(
                "overflows: {} ({} samples dropped)",
                self.diagnostics.overflow_count, self.diagnostics.samples_dropped
            ));
        }
        if let Some(ref fault) = self.driver_fault {
            lines.push(format!("driver fault: {}", fault));
        }
        lines
    }

    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::Unknown(format!("failed to serialize status: {}", e)))
    }
}
