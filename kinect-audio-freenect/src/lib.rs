//! # kinect-audio-freenect
//!
//! Driver backends for kinect-audio-core.
//!
//! Provides:
//! - `SimulatedDriver` - in-process Kinect that generates synthetic four-channel
//!   batches on a timer, for tests and hardware-free hosts
//! - `FreenectDriver` - libfreenect audio subdevice (feature `libfreenect`)
//! - `DriverLogLevel` - driver verbosity, forwarded into the `log` facade
//!
//! ## Platform Requirements
//! - The `libfreenect` feature links the system libfreenect built with
//!   `BUILD_AUDIO`, and the Kinect audio firmware must be loadable.
//!
//! ## Usage
//! ```ignore
//! use kinect_audio_core::{BridgeConfig, CaptureBridge};
//! use kinect_audio_freenect::SimulatedDriver;
//!
//! let driver = SimulatedDriver::new();
//! let mut bridge = CaptureBridge::open(&driver, BridgeConfig::default())?;
//! bridge.flush()?;
//! ```

pub mod log_level;
pub mod simulated;

#[cfg(feature = "libfreenect")]
mod ffi;
#[cfg(feature = "libfreenect")]
pub mod freenect_driver;

pub use log_level::DriverLogLevel;
pub use simulated::{SimulatedDriver, SimulatedSession, SimulatedStats, Waveform};

#[cfg(feature = "libfreenect")]
pub use freenect_driver::{FreenectDriver, FreenectSession};
