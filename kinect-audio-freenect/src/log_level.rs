//! Driver verbosity and its mapping onto the `log` facade.

use log::{Level, LevelFilter};

/// libfreenect log levels, in the driver's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DriverLogLevel {
    Fatal = 0,
    #[default]
    Error = 1,
    Warning = 2,
    Notice = 3,
    Info = 4,
    Debug = 5,
    Spew = 6,
    Flood = 7,
}

impl DriverLogLevel {
    /// Level from the driver's raw value; out-of-range values clamp to the ends.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            i32::MIN..=0 => Self::Fatal,
            1 => Self::Error,
            2 => Self::Warning,
            3 => Self::Notice,
            4 => Self::Info,
            5 => Self::Debug,
            6 => Self::Spew,
            _ => Self::Flood,
        }
    }

    pub fn raw(self) -> i32 {
        self as i32
    }

    /// `log` level used when forwarding a driver message of this level.
    pub fn log_level(self) -> Level {
        match self {
            Self::Fatal | Self::Error => Level::Error,
            Self::Warning => Level::Warn,
            Self::Notice | Self::Info => Level::Info,
            Self::Debug => Level::Debug,
            Self::Spew | Self::Flood => Level::Trace,
        }
    }

    /// Most verbose `log` filter that lets this level's messages through.
    pub fn level_filter(self) -> LevelFilter {
        self.log_level().to_level_filter()
    }
}

/// Forward one driver message to `log` under the `libfreenect` target.
pub fn forward(level: DriverLogLevel, message: &str) {
    let message = message.trim_end();
    if !message.is_empty() {
        log::log!(target: "libfreenect", level.log_level(), "{}", message);
    }
}
