use thiserror::Error;

/// Errors that can occur while opening, running or tearing down a capture bridge.
///
/// Setup failures are fatal for the bridge being built. Driver failures on the
/// capture thread are recorded and reported through `CaptureBridge::driver_fault`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("driver initialization failed: {0}")]
    DriverInitFailed(String),

    #[error("driver does not support the audio subdevice (capabilities {0:#x})")]
    AudioNotSupported(u32),

    #[error("could not open device: {0}")]
    DeviceOpenFailed(String),

    #[error("could not start audio transfer: {0}")]
    StreamStartFailed(String),

    #[error("driver event processing failed with status {0}")]
    DriverStatus(i32),

    #[error("invalid bridge state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
