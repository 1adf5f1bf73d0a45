use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of microphones in the Kinect array.
pub const CHANNEL_COUNT: usize = 4;

/// One microphone of the four-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MicChannel {
    Mic1,
    Mic2,
    Mic3,
    Mic4,
}

impl MicChannel {
    /// Channels in array order.
    pub const ALL: [MicChannel; CHANNEL_COUNT] =
        [MicChannel::Mic1, MicChannel::Mic2, MicChannel::Mic3, MicChannel::Mic4];

    /// Order in which `flush` emits channel events: right-most outlet first.
    pub const FLUSH_ORDER: [MicChannel; CHANNEL_COUNT] =
        [MicChannel::Mic4, MicChannel::Mic3, MicChannel::Mic2, MicChannel::Mic1];

    pub fn index(self) -> usize {
        match self {
            Self::Mic1 => 0,
            Self::Mic2 => 1,
            Self::Mic3 => 2,
            Self::Mic4 => 3,
        }
    }
}

impl fmt::Display for MicChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mic{}", self.index() + 1)
    }
}

/// Attributes of a device found by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    pub camera_serial: String,
}

/// Bitmask of the subdevices the driver was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subdevices(pub u32);

impl Subdevices {
    pub const MOTOR: Subdevices = Subdevices(1 << 0);
    pub const CAMERA: Subdevices = Subdevices(1 << 1);
    pub const AUDIO: Subdevices = Subdevices(1 << 2);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Subdevices) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the known subdevices present in the mask.
    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::MOTOR, "motor"),
            (Self::CAMERA, "camera"),
            (Self::AUDIO, "audio"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

impl std::ops::BitOr for Subdevices {
    type Output = Subdevices;

    fn bitor(self, rhs: Self) -> Self::Output {
        Subdevices(self.0 | rhs.0)
    }
}

/// Counters for debugging a capture bridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BridgeDiagnostics {
    pub callback_count: u64,
    pub samples_received: u64,
    pub overflow_count: u64,
    pub samples_dropped: u64,
    pub flush_count: u64,
    pub samples_flushed: u64,
    pub estimated_rate: f64,
    pub average_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdevice_names() {
        let mask = Subdevices::MOTOR | Subdevices::AUDIO;
        assert!(mask.contains(Subdevices::AUDIO));
        assert!(!mask.contains(Subdevices::CAMERA));
        assert_eq!(mask.names(), vec!["motor", "audio"]);
        assert_eq!(mask.bits(), 5);
    }

    #[test]
    fn flush_order_is_reverse_array_order() {
        let mut reversed = MicChannel::ALL;
        reversed.reverse();
        assert_eq!(MicChannel::FLUSH_ORDER, reversed);
        assert_eq!(MicChannel::Mic3.to_string(), "mic3");
    }
}
