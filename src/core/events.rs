use serde::Serialize;
use uuid::Uuid;

use crate::models::release::ReleaseInfo;

/// Controller state machine, serialized for the bridge layer.
///
/// `Completed`, `Cancelled` and `Failed` are terminal for a single run; the
/// controller resets itself to `Idle` right after emitting one of them.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum UpdateStatus {
    Idle,
    Checking,
    AwaitingConfirmation,
    Downloading,
    Completed,
    Cancelled,
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DownloadProgress {
    pub task_id: Uuid,
    pub version: String,
    /// `None` while the server has not advertised a Content-Length.
    pub percent: Option<u8>,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

/// Non-owning handle to the presentation surface.
///
/// Implementations must be infallible: if the surface is gone when a message
/// arrives, drop it silently.
pub trait UpdateEmitter: Send + Sync + Clone + 'static {
    fn emit_status(&self, status: &UpdateStatus);
    fn emit_update_available(&self, release: &ReleaseInfo);
    fn emit_progress(&self, progress: &DownloadProgress);
    fn emit_settings_redirect(&self);
}

/// Rate limit for progress emissions. The first sample always passes.
pub struct ProgressThrottle {
    last_emit: Option<std::time::Instant>,
    min_interval: std::time::Duration,
}

impl ProgressThrottle {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            last_emit: None,
            min_interval: std::time::Duration::from_millis(min_interval_ms),
        }
    }

    pub fn should_emit(&mut self) -> bool {
        let now = std::time::Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_allows_first_emit() {
        let mut throttle = ProgressThrottle::new(1000);
        assert!(throttle.should_emit());
    }

    #[test]
    fn throttle_blocks_immediate_second_emit() {
        let mut throttle = ProgressThrottle::new(1000);
        assert!(throttle.should_emit());
        assert!(!throttle.should_emit());
    }

    #[test]
    fn zero_interval_never_blocks() {
        let mut throttle = ProgressThrottle::new(0);
        assert!(throttle.should_emit());
        assert!(throttle.should_emit());
    }
}
