use std::time::{Duration, Instant};

/// Measures the rate at which the driver actually delivers samples.
///
/// `estimated` is the rate over the most recently completed window,
/// `average` the rate since the first batch arrived.
#[derive(Debug, Clone)]
pub struct RateMeter {
    window: Duration,
    first_arrival: Option<Instant>,
    window_start: Option<Instant>,
    window_samples: u64,
    total_samples: u64,
    estimated: f64,
    average: f64,
}

impl RateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            first_arrival: None,
            window_start: None,
            window_samples: 0,
            total_samples: 0,
            estimated: 0.0,
            average: 0.0,
        }
    }

    /// Account for `samples` frames that arrived at `now`.
    ///
    /// The first batch only starts the clock: its samples were captured
    /// before the first timestamp and are not counted.
    pub fn record(&mut self, samples: usize, now: Instant) {
        let (Some(first), Some(window_start)) = (self.first_arrival, self.window_start) else {
            self.first_arrival = Some(now);
            self.window_start = Some(now);
            return;
        };

        self.window_samples += samples as u64;
        self.total_samples += samples as u64;

        let since_first = now.saturating_duration_since(first).as_secs_f64();
        if since_first > 0.0 {
            self.average = self.total_samples as f64 / since_first;
        }

        let in_window = now.saturating_duration_since(window_start);
        if in_window >= self.window {
            self.estimated = self.window_samples as f64 / in_window.as_secs_f64();
            self.window_start = Some(now);
            self.window_samples = 0;
        }
    }

    pub fn estimated(&self) -> f64 {
        self.estimated
    }

    pub fn average(&self) -> f64 {
        self.average
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
