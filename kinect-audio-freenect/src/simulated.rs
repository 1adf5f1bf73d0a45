//! Synthetic Kinect audio device.
//!
//! Produces deterministic four-channel int32 batches at a fixed cadence
//! without hardware. `process_events` sleeps for one tick and then delivers
//! one batch, the same blocking shape as the real driver's event loop.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use kinect_audio_core::models::audio_models::{DeviceAttributes, Subdevices, CHANNEL_COUNT};
use kinect_audio_core::models::config::{DeviceSelector, SOURCE_SAMPLE_RATE};
use kinect_audio_core::models::error::CaptureError;
use kinect_audio_core::processing::sample_format::RawFrames;
use kinect_audio_core::traits::audio_driver::{AudioDriver, DeviceSession, SampleCallback};

/// libusb's generic I/O error, reported when an injected failure fires.
pub const SIMULATED_FAILURE_STATUS: i32 = -1;

/// Signal generated on every channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Silence,
    /// Same raw value on every sample.
    Constant(i32),
    /// Sine at `frequency_hz`, `amplitude` in `[0, 1]` of full scale.
    /// Channel `k` is phase-shifted by `k · π/2`.
    Sine { frequency_hz: f64, amplitude: f64 },
    /// Running frame counter, channel `k` offset by `k`.
    Ramp,
}

impl Waveform {
    fn sample(self, frame: u64, channel: usize, sample_rate: u32) -> i32 {
        match self {
            Self::Silence => 0,
            Self::Constant(value) => value,
            Self::Sine {
                frequency_hz,
                amplitude,
            } => {
                let t = frame as f64 / sample_rate as f64;
                let phase = TAU * frequency_hz * t + channel as f64 * FRAC_PI_2;
                (phase.sin() * amplitude.clamp(0.0, 1.0) * i32::MAX as f64) as i32
            }
            Self::Ramp => (frame as i64 + channel as i64) as i32,
        }
    }
}

/// Counters shared by a `SimulatedDriver` and the sessions it opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedStats {
    pub sessions_opened: u32,
    pub sessions_closed: u32,
    pub streaming: bool,
    pub events_processed: u64,
    pub frames_delivered: u64,
}

/// Driver backed by a synthetic device list.
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    serials: Vec<String>,
    subdevices: Subdevices,
    batch_frames: usize,
    tick: Duration,
    waveform: Waveform,
    fail_after: Option<u64>,
    stats: Arc<Mutex<SimulatedStats>>,
}

impl SimulatedDriver {
    /// One audio-capable device delivering 256-frame batches of a 440 Hz sine
    /// every 16 ms (16 kHz).
    pub fn new() -> Self {
        Self {
            serials: vec!["SIM0000000000001".into()],
            subdevices: Subdevices::MOTOR | Subdevices::CAMERA | Subdevices::AUDIO,
            batch_frames: 256,
            tick: Duration::from_millis(16),
            waveform: Waveform::Sine {
                frequency_hz: 440.0,
                amplitude: 0.5,
            },
            fail_after: None,
            stats: Arc::new(Mutex::new(SimulatedStats::default())),
        }
    }

    pub fn with_serials<I, S>(mut self, serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.serials = serials.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subdevices(mut self, subdevices: Subdevices) -> Self {
        self.subdevices = subdevices;
        self
    }

    pub fn with_batch_frames(mut self, frames: usize) -> Self {
        self.batch_frames = frames;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    /// Make `process_events` fail once a session has handled `events` events.
    pub fn failing_after(mut self, events: u64) -> Self {
        self.fail_after = Some(events);
        self
    }

    pub fn stats(&self) -> SimulatedStats {
        self.stats.lock().clone()
    }

    fn find(&self, selector: &DeviceSelector) -> Option<&str> {
        match selector {
            DeviceSelector::Index(index) => self.serials.get(*index as usize).map(String::as_str),
            DeviceSelector::Serial(serial) => self
                .serials
                .iter()
                .find(|s| *s == serial)
                .map(String::as_str),
        }
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDriver for SimulatedDriver {
    fn list_device_attributes(&self) -> Result<Vec<DeviceAttributes>, CaptureError> {
        Ok(self
            .serials
            .iter()
            .map(|serial| DeviceAttributes {
                camera_serial: serial.clone(),
            })
            .collect())
    }

    fn supported_subdevices(&self) -> Subdevices {
        self.subdevices
    }

    fn open_device(&self, selector: &DeviceSelector) -> Result<Box<dyn DeviceSession>, CaptureError> {
        let serial = self
            .find(selector)
            .ok_or_else(|| CaptureError::DeviceOpenFailed(format!("no simulated {}", selector)))?;

        self.stats.lock().sessions_opened += 1;
        log::debug!("Opened simulated device {}", serial);

        Ok(Box::new(SimulatedSession {
            serial: serial.to_string(),
            batch_frames: self.batch_frames,
            tick: self.tick,
            waveform: self.waveform,
            fail_after: self.fail_after,
            callback: None,
            streaming: false,
            frame_index: 0,
            events: 0,
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// An open simulated device. Counts itself closed when dropped.
pub struct SimulatedSession {
    serial: String,
    batch_frames: usize,
    tick: Duration,
    waveform: Waveform,
    fail_after: Option<u64>,
    callback: Option<SampleCallback>,
    streaming: bool,
    frame_index: u64,
    events: u64,
    stats: Arc<Mutex<SimulatedStats>>,
}

impl SimulatedSession {
    fn next_batch(&mut self) -> [Vec<i32>; CHANNEL_COUNT] {
        let start = self.frame_index;
        let batch = std::array::from_fn(|channel| {
            (0..self.batch_frames as u64)
                .map(|i| self.waveform.sample(start + i, channel, SOURCE_SAMPLE_RATE))
                .collect()
        });
        self.frame_index += self.batch_frames as u64;
        batch
    }
}

impl DeviceSession for SimulatedSession {
    fn set_sample_callback(&mut self, callback: SampleCallback) {
        self.callback = Some(callback);
    }

    fn start_streaming(&mut self) -> Result<(), CaptureError> {
        self.streaming = true;
        self.stats.lock().streaming = true;
        Ok(())
    }

    fn process_events(&mut self) -> Result<(), CaptureError> {
        if self.fail_after.is_some_and(|limit| self.events >= limit) {
            return Err(CaptureError::DriverStatus(SIMULATED_FAILURE_STATUS));
        }

        thread::sleep(self.tick);
        self.events += 1;
        self.stats.lock().events_processed += 1;

        if !self.streaming || self.batch_frames == 0 {
            return Ok(());
        }

        let mics = self.next_batch();
        if let Some(ref mut callback) = self.callback {
            callback(RawFrames::new(&mics[0], &mics[1], &mics[2], &mics[3]));
            self.stats.lock().frames_delivered += self.batch_frames as u64;
        }
        Ok(())
    }

    fn stop_streaming(&mut self) -> Result<(), CaptureError> {
        self.streaming = false;
        self.stats.lock().streaming = false;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), CaptureError> {
        log::debug!("Closing simulated device {}", self.serial);
        Ok(())
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        let mut stats = self.stats.lock();
        stats.streaming = false;
        stats.sessions_closed += 1;
    }
}
