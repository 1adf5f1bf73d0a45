//! # kinect-audio-core
//!
//! Driver-agnostic capture core for the Kinect four-microphone array.
//!
//! A driver thread delivers planar int32 batches at its own pace; a host
//! tick drains whatever arrived since the previous tick. The two meet in a
//! single mutex-guarded `SampleBuffer` owned by a `CaptureBridge`. Driver
//! backends (libfreenect, simulated) implement `AudioDriver` and
//! `DeviceSession` and plug into the bridge.
//!
//! ## Architecture
//!
//! ```text
//! kinect-audio-core (this crate)
//! ├── traits/       ← AudioDriver, DeviceSession, SampleCallback, FlushSink
//! ├── models/       ← CaptureError, BridgeState, BridgeConfig, StatusReport, etc.
//! ├── processing/   ← SampleBuffer, RawFrames + normalization, RateMeter
//! └── session/      ← CaptureBridge (thread lifecycle, callback, flush)
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{
    BridgeDiagnostics, DeviceAttributes, MicChannel, Subdevices, CHANNEL_COUNT,
};
pub use models::config::{BridgeConfig, DeviceSelector, DEFAULT_BUFFER_DURATION_MS, SOURCE_SAMPLE_RATE};
pub use models::error::CaptureError;
pub use models::session_metadata::SessionMetadata;
pub use models::state::BridgeState;
pub use models::status::StatusReport;
pub use processing::rate_meter::RateMeter;
pub use processing::sample_buffer::{DrainedSamples, SampleBuffer};
pub use processing::sample_format::{normalize_i32, RawFrames};
pub use session::bridge::CaptureBridge;
pub use traits::audio_driver::{AudioDriver, DeviceSession, SampleCallback};
pub use traits::flush_sink::{FlushEvent, FlushSink};
