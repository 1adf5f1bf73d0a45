/// Capture bridge state machine.
///
/// State transitions:
/// ```text
/// uninitialized → running → stopping → stopped
/// ```
/// There is no transition back to `Running`. A driver failure on the capture
/// thread moves a running bridge to `Stopping` until `stop` joins the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    #[default]
    Uninitialized,
    Running,
    Stopping,
    Stopped,
}

impl BridgeState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether the buffer is still allocated and can be drained.
    pub fn can_flush(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}
