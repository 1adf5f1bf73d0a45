//! Raw declarations for the parts of `libfreenect.h` and
//! `libfreenect-audio.h` used by the audio backend.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};

#[repr(C)]
pub struct freenect_context {
    _private: [u8; 0],
}

#[repr(C)]
pub struct freenect_device {
    _private: [u8; 0],
}

#[repr(C)]
pub struct freenect_usb_context {
    _private: [u8; 0],
}

/// Node of the linked list returned by `freenect_list_device_attributes`.
#[repr(C)]
pub struct freenect_device_attributes {
    pub next: *mut freenect_device_attributes,
    pub camera_serial: *const c_char,
}

pub type freenect_loglevel = c_int;
pub type freenect_device_flags = c_int;

pub const FREENECT_DEVICE_AUDIO: freenect_device_flags = 0x04;

pub type freenect_log_cb =
    Option<unsafe extern "C" fn(ctx: *mut freenect_context, level: freenect_loglevel, msg: *const c_char)>;

pub type freenect_audio_in_cb = Option<
    unsafe extern "C" fn(
        dev: *mut freenect_device,
        num_samples: c_int,
        mic1: *mut i32,
        mic2: *mut i32,
        mic3: *mut i32,
        mic4: *mut i32,
        cancelled: *mut i16,
        unknown: *mut c_void,
    ),
>;

#[link(name = "freenect")]
extern "C" {
    pub fn freenect_init(ctx: *mut *mut freenect_context, usb_ctx: *mut freenect_usb_context) -> c_int;
    pub fn freenect_shutdown(ctx: *mut freenect_context) -> c_int;
    pub fn freenect_set_log_level(ctx: *mut freenect_context, level: freenect_loglevel);
    pub fn freenect_set_log_callback(ctx: *mut freenect_context, cb: freenect_log_cb);
    pub fn freenect_process_events(ctx: *mut freenect_context) -> c_int;

    pub fn freenect_list_device_attributes(
        ctx: *mut freenect_context,
        attribute_list: *mut *mut freenect_device_attributes,
    ) -> c_int;
    pub fn freenect_free_device_attributes(attribute_list: *mut freenect_device_attributes);
    pub fn freenect_supported_subdevices() -> c_int;
    pub fn freenect_select_subdevices(ctx: *mut freenect_context, subdevs: freenect_device_flags);

    pub fn freenect_open_device(ctx: *mut freenect_context, dev: *mut *mut freenect_device, index: c_int) -> c_int;
    pub fn freenect_open_device_by_camera_serial(
        ctx: *mut freenect_context,
        dev: *mut *mut freenect_device,
        camera_serial: *const c_char,
    ) -> c_int;
    pub fn freenect_close_device(dev: *mut freenect_device) -> c_int;

    pub fn freenect_set_user(dev: *mut freenect_device, user: *mut c_void);
    pub fn freenect_get_user(dev: *mut freenect_device) -> *mut c_void;

    pub fn freenect_set_audio_in_callback(dev: *mut freenect_device, callback: freenect_audio_in_cb);
    pub fn freenect_start_audio(dev: *mut freenect_device) -> c_int;
    pub fn freenect_stop_audio(dev: *mut freenect_device) -> c_int;
}
