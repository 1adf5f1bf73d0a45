use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;

use crate::models::audio_models::{BridgeDiagnostics, MicChannel, Subdevices};
use crate::models::config::BridgeConfig;
use crate::models::error::CaptureError;
use crate::models::session_metadata::SessionMetadata;
use crate::models::state::BridgeState;
use crate::models::status::StatusReport;
use crate::processing::rate_meter::RateMeter;
use crate::processing::sample_buffer::{DrainedSamples, SampleBuffer};
use crate::processing::sample_format::RawFrames;
use crate::traits::audio_driver::{AudioDriver, DeviceSession, SampleCallback};
use crate::traits::flush_sink::{FlushEvent, FlushSink};

/// Hand-off slot for the session between `start` and the capture thread.
///
/// The thread takes the session out on entry. If the thread never runs, the
/// session is still in the slot and `start` shuts it down itself.
type SessionSlot = Arc<Mutex<Option<Box<dyn DeviceSession>>>>;

/// Internal mutable bridge state, protected by `parking_lot::Mutex`.
///
/// Kept apart from the sample buffer so that status queries never contend
/// with the buffer lock for longer than a counter update.
struct BridgeShared {
    state: BridgeState,
    diagnostics: BridgeDiagnostics,
    rate: RateMeter,
    driver_fault: Option<CaptureError>,
}

impl BridgeShared {
    fn new() -> Self {
        Self {
            state: BridgeState::Uninitialized,
            diagnostics: BridgeDiagnostics::default(),
            rate: RateMeter::default(),
            driver_fault: None,
        }
    }
}

/// Producer half of the bridge, owned by the installed sample callback.
struct SampleWriter {
    buffer: Arc<Mutex<SampleBuffer>>,
    shared: Arc<Mutex<BridgeShared>>,
    running: Arc<AtomicBool>,
}

impl SampleWriter {
    /// Store one driver batch. A no-op once the bridge has stopped running.
    fn on_samples(&self, frames: RawFrames<'_>) {
        if frames.is_empty() || !self.running.load(Ordering::Acquire) {
            return;
        }

        // Non-zero exactly when the write overflowed.
        let dropped = self.buffer.lock().write(&frames);

        let mut s = self.shared.lock();
        s.diagnostics.callback_count += 1;
        s.diagnostics.samples_received += frames.len() as u64;
        if dropped > 0 {
            s.diagnostics.overflow_count += 1;
            s.diagnostics.samples_dropped += dropped as u64;
        }
        s.rate.record(frames.len(), Instant::now());
        s.diagnostics.estimated_rate = s.rate.estimated();
        s.diagnostics.average_rate = s.rate.average();
        drop(s);

        if dropped > 0 {
            log::debug!("Sample buffer overflow: dropped {} unread samples per channel", dropped);
        }
    }

    fn into_callback(self) -> SampleCallback {
        Box::new(move |frames: RawFrames<'_>| self.on_samples(frames))
    }
}

/// Bridge between a device session's capture thread and a host tick.
///
/// Data flow:
/// ```text
/// [driver event loop] → on_samples → [SampleBuffer] ← flush ← [host tick]
///     capture thread          (one mutex)              host thread
/// ```
///
/// The capture thread owns the `DeviceSession` while the bridge runs and
/// hands it back through its join handle, so the session is only ever
/// touched by one thread and is closed after the thread has exited.
pub struct CaptureBridge {
    config: BridgeConfig,
    shared: Arc<Mutex<BridgeShared>>,
    sink: Option<Arc<dyn FlushSink>>,
    metadata: Option<SessionMetadata>,

    // Allocated on start, released on stop
    buffer: Option<Arc<Mutex<SampleBuffer>>>,

    // Capture thread control
    running: Arc<AtomicBool>,
    capture_handle: Option<thread::JoinHandle<Option<Box<dyn DeviceSession>>>>,
}

impl CaptureBridge {
    /// Create an idle bridge. Nothing is allocated until `start`.
    pub fn new(config: BridgeConfig) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            config,
            shared: Arc::new(Mutex::new(BridgeShared::new())),
            sink: None,
            metadata: None,
            buffer: None,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: None,
        })
    }

    /// Open the configured device on `driver` and start capturing from it.
    ///
    /// Lists the attached devices, checks that the driver supports audio,
    /// opens the device by index or serial and starts the bridge. Any
    /// failure is logged once and returned; no bridge is produced.
    pub fn open<D: AudioDriver + ?Sized>(driver: &D, config: BridgeConfig) -> Result<Self, CaptureError> {
        let mut bridge = Self::new(config)?;

        let devices = driver.list_device_attributes().map_err(|e| {
            log::error!("Failed to list devices: {}", e);
            e
        })?;
        log::info!("Number of devices found: {}", devices.len());
        for (i, device) in devices.iter().enumerate() {
            log::info!("Device {} serial: {}", i, device.camera_serial);
        }

        let subdevices = driver.supported_subdevices();
        if !subdevices.contains(Subdevices::AUDIO) {
            log::error!("Driver doesn't support the audio subdevice ({})", subdevices.bits());
            return Err(CaptureError::AudioNotSupported(subdevices.bits()));
        }

        log::info!("Trying to open {}", bridge.config.device);
        let session = driver.open_device(&bridge.config.device).map_err(|e| {
            log::error!("Could not open {}: {}", bridge.config.device, e);
            e
        })?;
        log::info!("Opened {}", bridge.config.device);

        bridge.start(session)?;
        Ok(bridge)
    }

    /// Deliver flush output to `sink` from now on.
    pub fn set_sink(&mut self, sink: Arc<dyn FlushSink>) {
        self.sink = Some(sink);
    }

    pub fn state(&self) -> BridgeState {
        self.shared.lock().state
    }

    pub fn diagnostics(&self) -> BridgeDiagnostics {
        self.shared.lock().diagnostics.clone()
    }

    /// The error that ended the capture thread, if any.
    pub fn driver_fault(&self) -> Option<CaptureError> {
        self.shared.lock().driver_fault.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Ratio of host rate to device rate. Recorded only; `flush` never resamples.
    pub fn conversion_rate(&self) -> f64 {
        self.config.conversion_rate()
    }

    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }

    /// Samples per channel waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.as_ref().map(|b| b.lock().available()).unwrap_or(0)
    }

    /// Advisory: more than half the buffer is waiting to be flushed.
    pub fn is_ready(&self) -> bool {
        self.buffer.as_ref().map(|b| b.lock().is_ready()).unwrap_or(false)
    }

    /// Allocate the buffer, hook the session up and spawn the capture thread.
    /// Transitions: uninitialized → running.
    ///
    /// On failure the session is closed and the buffer released.
    pub fn start(&mut self, mut session: Box<dyn DeviceSession>) -> Result<(), CaptureError> {
        let state = self.state();
        if state != BridgeState::Uninitialized {
            close_quietly(session);
            return Err(CaptureError::InvalidState(format!(
                "can only start an uninitialized bridge, bridge is {}",
                state.as_str()
            )));
        }

        let buffer = Arc::new(Mutex::new(SampleBuffer::new(self.config.capacity())));

        self.running.store(true, Ordering::SeqCst);
        let writer = SampleWriter {
            buffer: Arc::clone(&buffer),
            shared: Arc::clone(&self.shared),
            running: Arc::clone(&self.running),
        };
        session.set_sample_callback(writer.into_callback());

        if let Err(e) = session.start_streaming() {
            log::error!("Couldn't start audio transfer: {}", e);
            self.running.store(false, Ordering::SeqCst);
            close_quietly(session);
            return Err(e);
        }

        self.set_state(BridgeState::Running);

        let slot: SessionSlot = Arc::new(Mutex::new(Some(session)));
        let thread_slot = Arc::clone(&slot);
        let running = Arc::clone(&self.running);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("kinect-audio-events".into())
            .spawn(move || {
                let session = thread_slot.lock().take();
                session.map(|session| capture_loop(session, running, shared))
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to spawn capture thread: {}", e);
                self.running.store(false, Ordering::SeqCst);
                release_unstarted(&slot);
                self.set_state(BridgeState::Uninitialized);
                return Err(CaptureError::Unknown(format!(
                    "failed to spawn capture thread: {}",
                    e
                )));
            }
        };

        let metadata = SessionMetadata::new(&self.config);
        log::info!(
            "Capture session {} started: {} samples per channel at {} Hz",
            metadata.id,
            metadata.capacity,
            metadata.source_sample_rate
        );

        self.buffer = Some(buffer);
        self.capture_handle = Some(handle);
        self.metadata = Some(metadata);
        Ok(())
    }

    /// Drain everything buffered since the last flush and emit it to the sink.
    ///
    /// Emits one `SampleCount` event, then one `Channel` event per microphone
    /// in `MicChannel::FLUSH_ORDER`. An empty buffer yields a zero count and
    /// four empty channels. Rejected before `start` and after `stop`.
    pub fn flush(&self) -> Result<DrainedSamples, CaptureError> {
        let state = self.state();
        let buffer = match (&self.buffer, state.can_flush()) {
            (Some(buffer), true) => buffer,
            _ => {
                return Err(CaptureError::InvalidState(format!(
                    "cannot flush a {} bridge",
                    state.as_str()
                )))
            }
        };

        let drained = buffer.lock().drain();

        {
            let mut s = self.shared.lock();
            s.diagnostics.flush_count += 1;
            s.diagnostics.samples_flushed += drained.count as u64;
        }

        if let Some(ref sink) = self.sink {
            sink.on_flush_event(&FlushEvent::SampleCount {
                count: drained.count,
            });
            for channel in MicChannel::FLUSH_ORDER {
                sink.on_flush_event(&FlushEvent::Channel {
                    channel,
                    samples: drained.channel(channel),
                });
            }
        }

        Ok(drained)
    }

    /// Describe the driver's devices and this bridge's buffer and rates.
    ///
    /// Read-only: the buffer is inspected, never drained. Each report line is
    /// also logged at info level.
    pub fn query_status<D: AudioDriver + ?Sized>(&self, driver: &D) -> Result<StatusReport, CaptureError> {
        let devices = driver.list_device_attributes()?;
        let mut report = StatusReport::new(devices, driver.supported_subdevices(), self.state());

        if let Some(ref buffer) = self.buffer {
            let b = buffer.lock();
            report.buffered_samples = b.available();
            report.capacity = b.capacity();
            report.ready = b.is_ready();
        }
        {
            let s = self.shared.lock();
            report.diagnostics = s.diagnostics.clone();
            report.driver_fault = s.driver_fault.as_ref().map(|e| e.to_string());
        }
        report.session = self.metadata.clone();

        for line in report.lines() {
            log::info!("{}", line);
        }
        Ok(report)
    }

    /// Stop the capture thread, close the session and release the buffer.
    /// Transitions: running/stopping → stopping → stopped.
    ///
    /// Teardown always runs to completion; the first error met on the way is
    /// returned. Calling `stop` on a bridge that is not started is rejected.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        let state = self.state();
        if !state.can_flush() {
            return Err(CaptureError::InvalidState(format!(
                "cannot stop a {} bridge",
                state.as_str()
            )));
        }

        self.set_state(BridgeState::Stopping);
        self.running.store(false, Ordering::SeqCst);

        let result = self.teardown();
        self.set_state(BridgeState::Stopped);
        result
    }

    // --- Internal helpers ---

    fn set_state(&self, new_state: BridgeState) {
        let old = {
            let mut s = self.shared.lock();
            std::mem::replace(&mut s.state, new_state)
        };
        if old != new_state {
            log::debug!("Capture bridge {} → {}", old.as_str(), new_state.as_str());
        }
    }

    /// Join the capture thread, then close its session and free the buffer.
    fn teardown(&mut self) -> Result<(), CaptureError> {
        let mut result = Ok(());

        if let Some(handle) = self.capture_handle.take() {
            match handle.join() {
                Ok(None) => {}
                Ok(Some(mut session)) => {
                    if let Err(e) = session.stop_streaming() {
                        log::warn!("Failed to stop audio transfer: {}", e);
                        result = Err(e);
                    }
                    if let Err(e) = session.close() {
                        log::warn!("Failed to close device: {}", e);
                        if result.is_ok() {
                            result = Err(e);
                        }
                    }
                }
                Err(_) => {
                    log::error!("Capture thread panicked");
                    result = Err(CaptureError::Unknown("capture thread panicked".into()));
                }
            }
        }

        self.buffer = None;
        result
    }
}

impl Drop for CaptureBridge {
    fn drop(&mut self) {
        if self.state().can_flush() {
            if let Err(e) = self.stop() {
                log::warn!("Error while tearing down capture bridge: {}", e);
            }
        }
    }
}

/// Body of the capture thread. Returns the session for the tearing-down thread.
fn capture_loop(
    mut session: Box<dyn DeviceSession>,
    running: Arc<AtomicBool>,
    shared: Arc<Mutex<BridgeShared>>,
) -> Box<dyn DeviceSession> {
    while running.load(Ordering::Acquire) {
        if let Err(e) = session.process_events() {
            log::error!("Driver event loop ended: {}", e);
            running.store(false, Ordering::Release);
            let mut s = shared.lock();
            s.driver_fault = Some(e);
            if s.state.is_running() {
                s.state = BridgeState::Stopping;
            }
            break;
        }
    }
    session
}

/// Stop and close a session whose capture thread never took it.
fn release_unstarted(slot: &SessionSlot) {
    let session = slot.lock().take();
    if let Some(mut session) = session {
        if let Err(e) = session.stop_streaming() {
            log::warn!("Failed to stop audio transfer: {}", e);
        }
        close_quietly(session);
    }
}

fn close_quietly(session: Box<dyn DeviceSession>) {
    if let Err(e) = session.close() {
        log::warn!("Failed to close device: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use approx::assert_abs_diff_eq;

    use crate::models::audio_models::DeviceAttributes;
    use crate::models::config::DeviceSelector;

    enum Step {
        Batch([Vec<i32>; 4]),
        Fail(i32),
    }

    type Script = Arc<Mutex<VecDeque<Step>>>;
    type EventLog = Arc<Mutex<Vec<&'static str>>>;

    struct ScriptedSession {
        callback: Option<SampleCallback>,
        script: Script,
        log: EventLog,
        fail_start: bool,
    }

    impl DeviceSession for ScriptedSession {
        fn set_sample_callback(&mut self, callback: SampleCallback) {
            self.callback = Some(callback);
        }

        fn start_streaming(&mut self) -> Result<(), CaptureError> {
            self.log.lock().push("start");
            if self.fail_start {
                return Err(CaptureError::StreamStartFailed("isochronous transfer refused".into()));
            }
            Ok(())
        }

        fn process_events(&mut self) -> Result<(), CaptureError> {
            let step = self.script.lock().pop_front();
            match step {
                Some(Step::Batch(mics)) => {
                    if let Some(ref mut callback) = self.callback {
                        callback(RawFrames::new(&mics[0], &mics[1], &mics[2], &mics[3]));
                    }
                    Ok(())
                }
                Some(Step::Fail(code)) => Err(CaptureError::DriverStatus(code)),
                None => {
                    thread::sleep(Duration::from_millis(1));
                    Ok(())
                }
            }
        }

        fn stop_streaming(&mut self) -> Result<(), CaptureError> {
            self.log.lock().push("stop");
            Ok(())
        }

        fn close(self: Box<Self>) -> Result<(), CaptureError> {
            self.log.lock().push("close");
            Ok(())
        }
    }

    struct ScriptedDriver {
        serials: Vec<&'static str>,
        subdevices: Subdevices,
        script: Script,
        log: EventLog,
        fail_start: bool,
    }

    impl ScriptedDriver {
        fn new() -> Self {
            Self {
                serials: vec!["A00362A07761047A"],
                subdevices: Subdevices::MOTOR | Subdevices::CAMERA | Subdevices::AUDIO,
                script: Arc::new(Mutex::new(VecDeque::new())),
                log: Arc::new(Mutex::new(Vec::new())),
                fail_start: false,
            }
        }

        fn push_same(&self, values: Vec<i32>) {
            self.script
                .lock()
                .push_back(Step::Batch([values.clone(), values.clone(), values.clone(), values]));
        }

        fn push(&self, step: Step) {
            self.script.lock().push_back(step);
        }

        fn script_done(&self) -> bool {
            self.script.lock().is_empty()
        }

        fn log(&self) -> Vec<&'static str> {
            self.log.lock().clone()
        }
    }

    impl AudioDriver for ScriptedDriver {
        fn list_device_attributes(&self) -> Result<Vec<DeviceAttributes>, CaptureError> {
            Ok(self
                .serials
                .iter()
                .map(|s| DeviceAttributes {
                    camera_serial: s.to_string(),
                })
                .collect())
        }

        fn supported_subdevices(&self) -> Subdevices {
            self.subdevices
        }

        fn open_device(&self, selector: &DeviceSelector) -> Result<Box<dyn DeviceSession>, CaptureError> {
            let found = match selector {
                DeviceSelector::Index(i) => (*i as usize) < self.serials.len(),
                DeviceSelector::Serial(s) => self.serials.contains(&s.as_str()),
            };
            if !found {
                return Err(CaptureError::DeviceOpenFailed(selector.to_string()));
            }
            Ok(Box::new(ScriptedSession {
                callback: None,
                script: Arc::clone(&self.script),
                log: Arc::clone(&self.log),
                fail_start: self.fail_start,
            }))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(Option<MicChannel>, usize)>>,
    }

    impl FlushSink for RecordingSink {
        fn on_flush_event(&self, event: &FlushEvent<'_>) {
            let entry = match event {
                FlushEvent::SampleCount { count } => (None, *count),
                FlushEvent::Channel { channel, samples } => (Some(*channel), samples.len()),
            };
            self.events.lock().push(entry);
        }
    }

    fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn small_config() -> BridgeConfig {
        BridgeConfig {
            buffer_duration_ms: 5,
            ..BridgeConfig::default()
        }
    }

    #[test]
    fn open_requires_audio_support() {
        let mut driver = ScriptedDriver::new();
        driver.subdevices = Subdevices::MOTOR | Subdevices::CAMERA;

        let result = CaptureBridge::open(&driver, BridgeConfig::default());
        assert_eq!(result.err(), Some(CaptureError::AudioNotSupported(3)));
        assert!(driver.log().is_empty());
    }

    #[test]
    fn open_unknown_device_fails() {
        let driver = ScriptedDriver::new();
        let by_index = CaptureBridge::open(&driver, BridgeConfig::with_device(DeviceSelector::Index(3)));
        assert!(matches!(by_index.err(), Some(CaptureError::DeviceOpenFailed(_))));

        let by_serial = CaptureBridge::open(
            &driver,
            BridgeConfig::with_device(DeviceSelector::Serial("nope".into())),
        );
        assert!(matches!(by_serial.err(), Some(CaptureError::DeviceOpenFailed(_))));
    }

    #[test]
    fn open_by_serial() {
        let driver = ScriptedDriver::new();
        let config = BridgeConfig::with_device(DeviceSelector::Serial("A00362A07761047A".into()));
        let bridge = CaptureBridge::open(&driver, config).unwrap();
        assert_eq!(bridge.state(), BridgeState::Running);
    }

    #[test]
    fn failed_stream_start_closes_session() {
        let mut driver = ScriptedDriver::new();
        driver.fail_start = true;

        let result = CaptureBridge::open(&driver, BridgeConfig::default());
        assert!(matches!(result.err(), Some(CaptureError::StreamStartFailed(_))));
        assert_eq!(driver.log(), vec!["start", "close"]);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = BridgeConfig {
            source_sample_rate: 0,
            ..BridgeConfig::default()
        };
        assert!(matches!(
            CaptureBridge::new(config).err(),
            Some(CaptureError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn flush_before_start_is_rejected() {
        let bridge = CaptureBridge::new(BridgeConfig::default()).unwrap();
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
        assert!(matches!(bridge.flush(), Err(CaptureError::InvalidState(_))));
        assert_eq!(bridge.buffered(), 0);
    }

    #[test]
    fn batches_reach_flush_in_order() {
        let driver = ScriptedDriver::new();
        let mut bridge = CaptureBridge::open(&driver, BridgeConfig::default()).unwrap();
        let sink = Arc::new(RecordingSink::default());
        bridge.set_sink(sink.clone());

        driver.push(Step::Batch([
            vec![1 << 20, 2 << 20],
            vec![3 << 20, 4 << 20],
            vec![5 << 20, 6 << 20],
            vec![7 << 20, 8 << 20],
        ]));
        driver.push_same(vec![9 << 20]);
        wait_until("two batches", || bridge.buffered() == 3);

        let drained = bridge.flush().unwrap();
        assert_eq!(drained.count, 3);
        let units = |ch: MicChannel| -> Vec<i32> {
            drained.channel(ch).iter().map(|v| (v * 2048.0).round() as i32).collect()
        };
        assert_eq!(units(MicChannel::Mic1), vec![1, 2, 9]);
        assert_eq!(units(MicChannel::Mic2), vec![3, 4, 9]);
        assert_eq!(units(MicChannel::Mic3), vec![5, 6, 9]);
        assert_eq!(units(MicChannel::Mic4), vec![7, 8, 9]);

        assert_eq!(
            *sink.events.lock(),
            vec![
                (None, 3),
                (Some(MicChannel::Mic4), 3),
                (Some(MicChannel::Mic3), 3),
                (Some(MicChannel::Mic2), 3),
                (Some(MicChannel::Mic1), 3),
            ]
        );

        let diagnostics = bridge.diagnostics();
        assert_eq!(diagnostics.callback_count, 2);
        assert_eq!(diagnostics.samples_received, 3);
        assert_eq!(diagnostics.flush_count, 1);
        assert_eq!(diagnostics.samples_flushed, 3);
    }

    #[test]
    fn empty_flush_emits_zero_count() {
        let driver = ScriptedDriver::new();
        let mut bridge = CaptureBridge::open(&driver, BridgeConfig::default()).unwrap();
        let sink = Arc::new(RecordingSink::default());
        bridge.set_sink(sink.clone());

        let drained = bridge.flush().unwrap();
        assert!(drained.is_empty());
        assert!(drained.channels.iter().all(Vec::is_empty));
        assert_eq!(sink.events.lock().len(), 5);
        assert_eq!(sink.events.lock()[0], (None, 0));
        assert!(bridge.flush().unwrap().is_empty());
    }

    #[test]
    fn full_scale_samples_end_to_end() {
        let driver = ScriptedDriver::new();
        let bridge = CaptureBridge::open(&driver, BridgeConfig::default()).unwrap();
        assert_eq!(bridge.config().capacity(), 80_000);

        driver.push_same(vec![i32::MAX; 100]);
        wait_until("batch", || bridge.buffered() == 100);

        let drained = bridge.flush().unwrap();
        assert_eq!(drained.count, 100);
        for channel in &drained.channels {
            assert_eq!(channel.len(), 100);
            for &sample in channel {
                assert!(sample <= 1.0);
                assert_abs_diff_eq!(sample, 1.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn overflow_is_counted_not_raised() {
        let driver = ScriptedDriver::new();
        let bridge = CaptureBridge::open(&driver, small_config()).unwrap();
        assert_eq!(bridge.config().capacity(), 80);

        driver.push_same(vec![0; 60]);
        driver.push_same(vec![0; 30]);
        wait_until("both batches", || bridge.diagnostics().callback_count == 2);

        assert_eq!(bridge.buffered(), 30);
        let diagnostics = bridge.diagnostics();
        assert_eq!(diagnostics.overflow_count, 1);
        assert_eq!(diagnostics.samples_dropped, 60);
        assert_eq!(bridge.flush().unwrap().count, 30);
    }

    #[test]
    fn driver_failure_moves_to_stopping() {
        let driver = ScriptedDriver::new();
        let mut bridge = CaptureBridge::open(&driver, BridgeConfig::default()).unwrap();

        driver.push_same(vec![0; 10]);
        driver.push(Step::Fail(-1));
        driver.push_same(vec![0; 10]);
        wait_until("driver failure", || bridge.state() == BridgeState::Stopping);

        assert_eq!(bridge.driver_fault(), Some(CaptureError::DriverStatus(-1)));
        // The batch after the failure is never processed.
        assert_eq!(bridge.flush().unwrap().count, 10);
        assert!(bridge.flush().unwrap().is_empty());

        bridge.stop().unwrap();
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert_eq!(driver.log(), vec!["start", "stop", "close"]);
    }

    #[test]
    fn stop_joins_then_closes_and_rejects_repeat() {
        let driver = ScriptedDriver::new();
        let mut bridge = CaptureBridge::open(&driver, BridgeConfig::default()).unwrap();
        driver.push_same(vec![0; 5]);
        wait_until("batch", || driver.script_done());

        bridge.stop().unwrap();
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert_eq!(driver.log(), vec!["start", "stop", "close"]);
        assert_eq!(bridge.buffered(), 0);

        assert!(matches!(bridge.stop(), Err(CaptureError::InvalidState(_))));
        assert!(matches!(bridge.flush(), Err(CaptureError::InvalidState(_))));
        assert_eq!(driver.log().len(), 3);
    }

    #[test]
    fn start_twice_is_rejected_and_closes_extra_session() {
        let driver = ScriptedDriver::new();
        let mut bridge = CaptureBridge::open(&driver, BridgeConfig::default()).unwrap();
        let extra = driver.open_device(&DeviceSelector::Index(0)).unwrap();

        assert!(matches!(bridge.start(extra), Err(CaptureError::InvalidState(_))));
        assert_eq!(driver.log(), vec!["start", "close"]);
        assert_eq!(bridge.state(), BridgeState::Running);
    }

    #[test]
    fn dropping_running_bridge_tears_down() {
        let driver = ScriptedDriver::new();
        let bridge = CaptureBridge::open(&driver, BridgeConfig::default()).unwrap();
        drop(bridge);
        assert_eq!(driver.log(), vec!["start", "stop", "close"]);
    }

    #[test]
    fn writer_ignores_batches_once_not_running() {
        let buffer = Arc::new(Mutex::new(SampleBuffer::new(16)));
        let running = Arc::new(AtomicBool::new(false));
        let writer = SampleWriter {
            buffer: Arc::clone(&buffer),
            shared: Arc::new(Mutex::new(BridgeShared::new())),
            running: Arc::clone(&running),
        };
        let batch = [1, 2, 3];

        writer.on_samples(RawFrames::new(&batch, &batch, &batch, &batch));
        assert!(buffer.lock().is_empty());

        running.store(true, Ordering::SeqCst);
        writer.on_samples(RawFrames::new(&batch, &batch, &batch, &batch));
        assert_eq!(buffer.lock().available(), 3);
    }

    #[test]
    fn oversized_batch_is_counted_as_overflow() {
        let buffer = Arc::new(Mutex::new(SampleBuffer::new(4)));
        let shared = Arc::new(Mutex::new(BridgeShared::new()));
        let writer = SampleWriter {
            buffer: Arc::clone(&buffer),
            shared: Arc::clone(&shared),
            running: Arc::new(AtomicBool::new(true)),
        };
        let batch = [1, 2, 3, 4, 5, 6, 7];

        writer.on_samples(RawFrames::new(&batch, &batch, &batch, &batch));

        let flushed = buffer.lock().drain().count as u64;
        let diagnostics = shared.lock().diagnostics.clone();
        assert_eq!(flushed, 4);
        assert_eq!(diagnostics.samples_received, 7);
        assert_eq!(diagnostics.overflow_count, 1);
        assert_eq!(diagnostics.samples_dropped, 3);
        assert_eq!(flushed + diagnostics.samples_dropped, diagnostics.samples_received);
    }

    #[test]
    fn unstarted_session_is_stopped_and_closed() {
        let driver = ScriptedDriver::new();
        let mut session = driver.open_device(&DeviceSelector::Index(0)).unwrap();
        session.start_streaming().unwrap();
        let slot: SessionSlot = Arc::new(Mutex::new(Some(session)));

        release_unstarted(&slot);
        assert!(slot.lock().is_none());
        assert_eq!(driver.log(), vec!["start", "stop", "close"]);

        // A slot the capture thread already emptied is left alone.
        release_unstarted(&slot);
        assert_eq!(driver.log().len(), 3);
    }

    #[test]
    fn status_reports_devices_and_buffer() {
        let driver = ScriptedDriver::new();
        let bridge = CaptureBridge::open(&driver, small_config()).unwrap();
        driver.push_same(vec![0; 50]);
        wait_until("batch", || bridge.buffered() == 50);

        let report = bridge.query_status(&driver).unwrap();
        assert_eq!(report.device_count(), 1);
        assert_eq!(report.state, "running");
        assert_eq!(report.buffered_samples, 50);
        assert_eq!(report.capacity, 80);
        assert!(report.ready);
        assert!(report.session.is_some());
        assert!(report
            .lines()
            .contains(&"Device 0 serial: A00362A07761047A".to_string()));

        // Querying does not drain.
        assert_eq!(bridge.buffered(), 50);
    }

    #[test]
    fn concurrent_writes_and_flushes_stay_consistent() {
        const BATCHES: i32 = 1000;
        const BATCH_LEN: i32 = 10;
        let total = (BATCHES * BATCH_LEN) as u64;

        let driver = ScriptedDriver::new();
        let bridge = CaptureBridge::open(&driver, small_config()).unwrap();
        let capacity = bridge.config().capacity();

        // Channel k of sample n carries 4n + k, scaled to stay exact in f32.
        for b in 0..BATCHES {
            let mics: [Vec<i32>; 4] = std::array::from_fn(|k| {
                (0..BATCH_LEN)
                    .map(|i| ((b * BATCH_LEN + i) * 4 + k as i32) << 12)
                    .collect()
            });
            driver.push(Step::Batch(mics));
        }

        let decode = |v: f32| (v as f64 * (1 << 19) as f64).round() as i64;
        let mut flushed = 0u64;
        let mut check = |drained: DrainedSamples| {
            assert!(drained.count <= capacity);
            for channel in &drained.channels {
                assert_eq!(channel.len(), drained.count);
            }
            for i in 0..drained.count {
                let base = decode(drained.channels[0][i]);
                assert_eq!(base % 4, 0);
                for k in 1..4 {
                    assert_eq!(decode(drained.channels[k][i]), base + k as i64);
                }
                if i > 0 {
                    assert_eq!(base, decode(drained.channels[0][i - 1]) + 4);
                }
            }
            flushed += drained.count as u64;
        };

        let deadline = Instant::now() + Duration::from_secs(10);
        while bridge.diagnostics().samples_received < total {
            assert!(Instant::now() < deadline, "producer did not finish");
            check(bridge.flush().unwrap());
        }
        check(bridge.flush().unwrap());

        let diagnostics = bridge.diagnostics();
        assert_eq!(diagnostics.callback_count, BATCHES as u64);
        assert_eq!(flushed + diagnostics.samples_dropped, total);
    }
}
