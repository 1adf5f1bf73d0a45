//! Raw sample layout delivered by the driver and its conversion to `f32`.
//!
//! The Kinect array delivers four planar channels of signed 32-bit samples.
//! Normalization maps the full `i32` range onto `[-1.0, 1.0]`.

use crate::models::audio_models::{MicChannel, CHANNEL_COUNT};

/// `1 / 2^31`, the scale from full-range `i32` to unit `f32`.
pub const I32_SCALE: f64 = 1.0 / 2_147_483_648.0;

/// Convert one raw sample to floating point.
///
/// The product is formed in `f64` and rounded once to `f32`, so `i32::MIN`
/// maps to exactly `-1.0` and `i32::MAX` rounds to `1.0` (its `f64` value is
/// `0.99999999953`, which has no closer `f32` neighbour).
#[inline]
pub fn normalize_i32(raw: i32) -> f32 {
    (raw as f64 * I32_SCALE) as f32
}

/// One batch of planar samples borrowed from the driver.
///
/// All four channels are viewed with the same length: the shortest of the
/// slices handed in. The driver always hands in equal lengths.
#[derive(Debug, Clone, Copy)]
pub struct RawFrames<'a> {
    mics: [&'a [i32]; CHANNEL_COUNT],
    len: usize,
}

impl<'a> RawFrames<'a> {
    pub fn new(mic1: &'a [i32], mic2: &'a [i32], mic3: &'a [i32], mic4: &'a [i32]) -> Self {
        let len = mic1.len().min(mic2.len()).min(mic3.len()).min(mic4.len());
        debug_assert!(
            [mic2.len(), mic3.len(), mic4.len()].iter().all(|&l| l == mic1.len()),
            "driver delivered channels of different lengths"
        );
        Self {
            mics: [&mic1[..len], &mic2[..len], &mic3[..len], &mic4[..len]],
            len,
        }
    }

    /// Samples per channel in this batch.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn channel(&self, channel: MicChannel) -> &'a [i32] {
        self.mics[channel.index()]
    }

    pub(crate) fn channels(&self) -> &[&'a [i32]; CHANNEL_COUNT] {
        &self.mics
    }
}
