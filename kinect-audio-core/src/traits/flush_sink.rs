use serde::Serialize;

use crate::models::audio_models::MicChannel;

/// One output event produced by `CaptureBridge::flush`.
///
/// A flush emits `SampleCount` first, then one `Channel` event per
/// microphone in `MicChannel::FLUSH_ORDER`, each carrying `count` samples
/// oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlushEvent<'a> {
    SampleCount { count: usize },
    Channel { channel: MicChannel, samples: &'a [f32] },
}

/// Receiver of flush output, standing in for the host's outlets.
///
/// Called on the thread that invoked `flush`, after the buffer lock has been
/// released.
pub trait FlushSink: Send + Sync {
    fn on_flush_event(&self, event: &FlushEvent<'_>);
}
