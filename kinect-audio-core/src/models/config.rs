use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed sample rate of the Kinect microphone array in Hz.
pub const SOURCE_SAMPLE_RATE: u32 = 16_000;

/// Default buffer length in milliseconds.
pub const DEFAULT_BUFFER_DURATION_MS: u32 = 5_000;

/// Which device a bridge should open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSelector {
    /// Position in the driver's device list.
    Index(u32),
    /// Camera serial number as reported by the driver.
    Serial(String),
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl FromStr for DeviceSelector {
    type Err = std::convert::Infallible;

    /// Numeric arguments select by index, anything else is treated as a serial.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        match trimmed.parse::<u32>() {
            Ok(index) => Ok(Self::Index(index)),
            Err(_) => Ok(Self::Serial(trimmed.to_string())),
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "device #{}", index),
            Self::Serial(serial) => write!(f, "device with serial {}", serial),
        }
    }
}

/// Configuration for a capture bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Device to open (default: index 0).
    pub device: DeviceSelector,

    /// Length of the per-channel buffer in milliseconds (default: 5000).
    pub buffer_duration_ms: u32,

    /// Rate at which the driver delivers samples in Hz (default: 16000).
    pub source_sample_rate: u32,

    /// Host processing rate in Hz. Only recorded as `conversion_rate`;
    /// drained samples are never resampled.
    pub target_sample_rate: f64,
}

impl BridgeConfig {
    pub fn with_device(device: DeviceSelector) -> Self {
        Self {
            device,
            ..Self::default()
        }
    }

    /// Samples per channel the buffer holds.
    pub fn capacity(&self) -> usize {
        (self.buffer_duration_ms as u64 * self.source_sample_rate as u64 / 1000) as usize
    }

    /// Ratio of the host rate to the device rate.
    pub fn conversion_rate(&self) -> f64 {
        self.target_sample_rate / self.source_sample_rate as f64
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_duration_ms == 0 {
            return Err("buffer duration must be positive".into());
        }
        if self.source_sample_rate == 0 {
            return Err("source sample rate must be positive".into());
        }
        if !self.target_sample_rate.is_finite() || self.target_sample_rate <= 0.0 {
            return Err(format!(
                "unsupported target sample rate: {}",
                self.target_sample_rate
            ));
        }
        if self.capacity() == 0 {
            return Err(format!(
                "buffer of {} ms at {} Hz holds no samples",
                self.buffer_duration_ms, self.source_sample_rate
            ));
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device: DeviceSelector::default(),
            buffer_duration_ms: DEFAULT_BUFFER_DURATION_MS,
            source_sample_rate: SOURCE_SAMPLE_RATE,
            target_sample_rate: SOURCE_SAMPLE_RATE as f64,
        }
    }
}
