//! libfreenect audio backend.
//!
//! `FreenectDriver` owns a driver context; every `FreenectSession` it opens
//! keeps the context alive through an `Arc`, so the context is shut down
//! only after the last device is closed.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use kinect_audio_core::models::audio_models::{DeviceAttributes, Subdevices};
use kinect_audio_core::models::config::DeviceSelector;
use kinect_audio_core::models::error::CaptureError;
use kinect_audio_core::processing::sample_format::RawFrames;
use kinect_audio_core::traits::audio_driver::{AudioDriver, DeviceSession, SampleCallback};

use crate::ffi;
use crate::log_level::{self, DriverLogLevel};

/// Owned `freenect_context`, shut down on drop.
struct Context {
    raw: *mut ffi::freenect_context,
}

// SAFETY: libfreenect serializes access to a context through libusb's own
// locking. The pointer is only freed in `Drop`, after every session holding
// an `Arc<Context>` is gone.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe {
            ffi::freenect_shutdown(self.raw);
        }
    }
}

/// libfreenect driver context restricted to the audio subdevice.
pub struct FreenectDriver {
    context: Arc<Context>,
}

impl FreenectDriver {
    /// Initialize libfreenect and route its log output into `log`.
    pub fn new(log_level: DriverLogLevel) -> Result<Self, CaptureError> {
        let mut raw = ptr::null_mut();
        let status = unsafe { ffi::freenect_init(&mut raw, ptr::null_mut()) };
        if status < 0 || raw.is_null() {
            return Err(CaptureError::DriverInitFailed(format!(
                "freenect_init() returned {}",
                status
            )));
        }
        let context = Context { raw };

        unsafe {
            ffi::freenect_set_log_level(context.raw, log_level.raw());
            ffi::freenect_set_log_callback(context.raw, Some(forward_driver_log));
        }

        log::info!("libfreenect initialized (log level {:?})", log_level);
        Ok(Self {
            context: Arc::new(context),
        })
    }
}

impl AudioDriver for FreenectDriver {
    fn list_device_attributes(&self) -> Result<Vec<DeviceAttributes>, CaptureError> {
        let mut head = ptr::null_mut();
        let count = unsafe { ffi::freenect_list_device_attributes(self.context.raw, &mut head) };
        if count < 0 {
            return Err(CaptureError::Unknown(format!(
                "freenect_list_device_attributes() returned {}",
                count
            )));
        }

        let mut devices = Vec::with_capacity(count as usize);
        let mut node = head;
        unsafe {
            while !node.is_null() {
                let serial = (*node).camera_serial;
                let camera_serial = if serial.is_null() {
                    String::new()
                } else {
                    CStr::from_ptr(serial).to_string_lossy().into_owned()
                };
                devices.push(DeviceAttributes { camera_serial });
                node = (*node).next;
            }
            ffi::freenect_free_device_attributes(head);
        }
        Ok(devices)
    }

    fn supported_subdevices(&self) -> Subdevices {
        Subdevices(unsafe { ffi::freenect_supported_subdevices() } as u32)
    }

    fn open_device(&self, selector: &DeviceSelector) -> Result<Box<dyn DeviceSession>, CaptureError> {
        let ctx = self.context.raw;
        let mut device = ptr::null_mut();

        let status = unsafe {
            ffi::freenect_select_subdevices(ctx, ffi::FREENECT_DEVICE_AUDIO);
            match selector {
                DeviceSelector::Index(index) => {
                    let index = c_int::try_from(*index).map_err(|_| {
                        CaptureError::DeviceOpenFailed(format!("index {} out of range", index))
                    })?;
                    ffi::freenect_open_device(ctx, &mut device, index)
                }
                DeviceSelector::Serial(serial) => {
                    let serial = CString::new(serial.as_str()).map_err(|_| {
                        CaptureError::DeviceOpenFailed(format!("invalid serial {:?}", serial))
                    })?;
                    ffi::freenect_open_device_by_camera_serial(ctx, &mut device, serial.as_ptr())
                }
            }
        };

        if status < 0 || device.is_null() {
            return Err(CaptureError::DeviceOpenFailed(format!(
                "{} (status {})",
                selector, status
            )));
        }

        Ok(Box::new(FreenectSession {
            context: Arc::clone(&self.context),
            device,
            callback: None,
            streaming: false,
        }))
    }
}

/// An open Kinect with its audio subdevice.
pub struct FreenectSession {
    context: Arc<Context>,
    device: *mut ffi::freenect_device,
    // Boxed twice so the address handed to libfreenect stays put when the
    // session moves between threads.
    callback: Option<Box<SampleCallback>>,
    streaming: bool,
}

// SAFETY: the device is only driven from the thread that currently owns the
// session; ownership moves between threads, never sharing.
unsafe impl Send for FreenectSession {}

impl FreenectSession {
    fn release(&mut self) -> Result<(), CaptureError> {
        if self.device.is_null() {
            return Ok(());
        }

        let mut result = self.stop_streaming();
        unsafe {
            ffi::freenect_set_audio_in_callback(self.device, None);
            ffi::freenect_set_user(self.device, ptr::null_mut());
            let status = ffi::freenect_close_device(self.device);
            if status < 0 && result.is_ok() {
                result = Err(CaptureError::DriverStatus(status));
            }
        }
        self.device = ptr::null_mut();
        self.callback = None;
        result
    }
}

impl DeviceSession for FreenectSession {
    fn set_sample_callback(&mut self, callback: SampleCallback) {
        let mut boxed = Box::new(callback);
        let user = &mut *boxed as *mut SampleCallback as *mut c_void;
        unsafe {
            ffi::freenect_set_user(self.device, user);
            ffi::freenect_set_audio_in_callback(self.device, Some(audio_in_trampoline));
        }
        self.callback = Some(boxed);
    }

    fn start_streaming(&mut self) -> Result<(), CaptureError> {
        let status = unsafe { ffi::freenect_start_audio(self.device) };
        if status < 0 {
            return Err(CaptureError::StreamStartFailed(format!(
                "freenect_start_audio() returned {}",
                status
            )));
        }
        self.streaming = true;
        Ok(())
    }

    fn process_events(&mut self) -> Result<(), CaptureError> {
        let status = unsafe { ffi::freenect_process_events(self.context.raw) };
        if status < 0 {
            return Err(CaptureError::DriverStatus(status));
        }
        Ok(())
    }

    fn stop_streaming(&mut self) -> Result<(), CaptureError> {
        if !self.streaming {
            return Ok(());
        }
        self.streaming = false;
        let status = unsafe { ffi::freenect_stop_audio(self.device) };
        if status < 0 {
            return Err(CaptureError::DriverStatus(status));
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<(), CaptureError> {
        self.release()
    }
}

impl Drop for FreenectSession {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Failed to close Kinect device: {}", e);
        }
    }
}

/// `freenect_audio_in_cb` that hands each batch to the session's closure.
unsafe extern "C" fn audio_in_trampoline(
    dev: *mut ffi::freenect_device,
    num_samples: c_int,
    mic1: *mut i32,
    mic2: *mut i32,
    mic3: *mut i32,
    mic4: *mut i32,
    _cancelled: *mut i16,
    _unknown: *mut c_void,
) {
    if num_samples <= 0 || [mic1, mic2, mic3, mic4].iter().any(|p| p.is_null()) {
        return;
    }
    let user = ffi::freenect_get_user(dev) as *mut SampleCallback;
    if user.is_null() {
        return;
    }

    let n = num_samples as usize;
    let frames = RawFrames::new(
        std::slice::from_raw_parts(mic1, n),
        std::slice::from_raw_parts(mic2, n),
        std::slice::from_raw_parts(mic3, n),
        std::slice::from_raw_parts(mic4, n),
    );
    let callback = &mut *user;
    if panic::catch_unwind(AssertUnwindSafe(|| callback(frames))).is_err() {
        log::error!("Sample callback panicked; batch of {} frames lost", n);
    }
}

/// `freenect_log_cb` forwarding driver messages into `log`.
unsafe extern "C" fn forward_driver_log(
    _ctx: *mut ffi::freenect_context,
    level: ffi::freenect_loglevel,
    msg: *const c_char,
) {
    if msg.is_null() {
        return;
    }
    let message = CStr::from_ptr(msg).to_string_lossy();
    log_level::forward(DriverLogLevel::from_raw(level), &message);
}
