use crate::models::audio_models::{DeviceAttributes, Subdevices};
use crate::models::config::DeviceSelector;
use crate::models::error::CaptureError;
use crate::processing::sample_format::RawFrames;

/// Callback invoked by a device session whenever a batch of samples is ready.
///
/// Fires on the thread that is inside `DeviceSession::process_events`.
/// Keep the work bounded: the driver cannot service its own I/O meanwhile.
pub type SampleCallback = Box<dyn FnMut(RawFrames<'_>) + Send + 'static>;

/// A driver context able to enumerate and open devices.
///
/// Implemented by:
/// - `FreenectDriver` (libfreenect, behind the `libfreenect` feature)
/// - `SimulatedDriver` (deterministic synthetic device)
pub trait AudioDriver: Send + Sync {
    /// Attributes of every device currently attached.
    fn list_device_attributes(&self) -> Result<Vec<DeviceAttributes>, CaptureError>;

    /// Subdevices the driver was built to support.
    fn supported_subdevices(&self) -> Subdevices;

    /// Open the audio subdevice of the selected device.
    fn open_device(&self, selector: &DeviceSelector) -> Result<Box<dyn DeviceSession>, CaptureError>;
}

/// An open device whose audio stream feeds a `SampleCallback`.
///
/// Owned by exactly one thread at a time: the capture thread while the
/// bridge runs, the tearing-down thread afterwards.
pub trait DeviceSession: Send {
    /// Install the batch callback. Must be called before `start_streaming`.
    fn set_sample_callback(&mut self, callback: SampleCallback);

    /// Begin isochronous audio transfer.
    fn start_streaming(&mut self) -> Result<(), CaptureError>;

    /// Block until the driver has handled pending events, invoking the
    /// sample callback for any batches completed meanwhile.
    ///
    /// A negative driver status is reported as `CaptureError::DriverStatus`.
    fn process_events(&mut self) -> Result<(), CaptureError>;

    /// End audio transfer. The callback is not invoked afterwards.
    fn stop_streaming(&mut self) -> Result<(), CaptureError>;

    /// Close the device and release the callback.
    fn close(self: Box<Self>) -> Result<(), CaptureError>;
}
