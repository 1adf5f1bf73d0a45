use crate::models::audio_models::{MicChannel, CHANNEL_COUNT};
use crate::processing::sample_format::{normalize_i32, RawFrames};

/// Samples taken out of a `SampleBuffer` by one drain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainedSamples {
    /// Samples per channel.
    pub count: usize,
    /// Channel data in array order (mic 1 first), oldest sample first.
    pub channels: [Vec<f32>; CHANNEL_COUNT],
}

impl DrainedSamples {
    pub fn channel(&self, channel: MicChannel) -> &[f32] {
        &self.channels[channel.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Four-channel circular buffer of normalized microphone samples.
///
/// Not synchronized on its own: the bridge wraps it in
/// `Arc<parking_lot::Mutex<SampleBuffer>>` so that the capture callback and
/// `flush` see cursor, count and all four channels change as one unit.
///
/// Overflow behavior: when a write would push the unread count past capacity,
/// the older backlog is dropped and only the newest batch stays readable.
#[derive(Debug)]
pub struct SampleBuffer {
    channels: [Vec<f32>; CHANNEL_COUNT],
    write_cursor: usize,
    available: usize,
    capacity: usize,
}

impl SampleBuffer {
    /// Allocate a zeroed buffer holding `capacity` samples per channel.
    ///
    /// # Panics
    /// If `capacity` is zero. `BridgeConfig::validate` rejects such configs.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample buffer capacity must be positive");
        Self {
            channels: std::array::from_fn(|_| vec![0.0; capacity]),
            write_cursor: 0,
            available: 0,
            capacity,
        }
    }

    /// Normalize and store one batch from the driver.
    ///
    /// Returns how many samples per channel were lost: the unread backlog
    /// plus, for a batch longer than the buffer, the head of the batch that
    /// did not fit. Zero exactly when the write did not overflow.
    pub fn write(&mut self, frames: &RawFrames<'_>) -> usize {
        let n = frames.len();
        if n == 0 {
            return 0;
        }

        let mut cursor = self.write_cursor;
        for i in 0..n {
            for (channel, raw) in self.channels.iter_mut().zip(frames.channels()) {
                channel[cursor] = normalize_i32(raw[i]);
            }
            cursor += 1;
            if cursor == self.capacity {
                cursor = 0;
            }
        }
        self.write_cursor = cursor;

        if self.available + n > self.capacity {
            let dropped = self.available + n.saturating_sub(self.capacity);
            self.available = n.min(self.capacity);
            dropped
        } else {
            self.available += n;
            0
        }
    }

    /// Take the unread window (oldest first) and reset to empty.
    ///
    /// The window is the `available` samples ending just before the write
    /// cursor, read across the wrap point when needed.
    pub fn drain(&mut self) -> DrainedSamples {
        let count = self.available;
        let start = (self.write_cursor + self.capacity - count) % self.capacity;

        let channels = std::array::from_fn(|ch| {
            let source = &self.channels[ch];
            let first = count.min(self.capacity - start);
            let mut out = Vec::with_capacity(count);
            out.extend_from_slice(&source[start..start + first]);
            out.extend_from_slice(&source[..count - first]);
            out
        });

        self.available = 0;
        self.write_cursor = 0;

        DrainedSamples { count, channels }
    }

    /// Number of unread samples per channel.
    pub fn available(&self) -> usize {
        self.available
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Advisory: more than half the buffer is unread.
    pub fn is_ready(&self) -> bool {
        self.available > self.capacity / 2
    }

    /// Samples per channel the buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
