use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One in-flight artifact download.
///
/// The controller owns at most one live task; assigning a new one cancels
/// and replaces the old (single-flight slot). The destination path is
/// derived from the version so a re-run of the same update overwrites
/// cleanly.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub id: Uuid,
    pub version: String,
    pub dest: PathBuf,
    pub total_bytes: Option<u64>,
    pub downloaded_bytes: u64,
    pub cancel_token: CancellationToken,
}

impl DownloadTask {
    pub fn new(version: &str, dest: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: version.to_string(),
            dest,
            total_bytes: None,
            downloaded_bytes: 0,
            cancel_token: CancellationToken::new(),
        }
    }
}

/// Ephemeral progress reading pushed after every chunk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSample {
    /// Percent complete in `0..=100`, derived from Content-Length.
    Percent {
        percent: u8,
        downloaded_bytes: u64,
        total_bytes: u64,
    },
    /// The server did not advertise a total size.
    Indeterminate { downloaded_bytes: u64 },
}

impl ProgressSample {
    pub fn percent(&self) -> Option<u8> {
        match self {
            ProgressSample::Percent { percent, .. } => Some(*percent),
            ProgressSample::Indeterminate { .. } => None,
        }
    }

    pub fn downloaded_bytes(&self) -> u64 {
        match self {
            ProgressSample::Percent {
                downloaded_bytes, ..
            }
            | ProgressSample::Indeterminate { downloaded_bytes } => *downloaded_bytes,
        }
    }

    pub fn total_bytes(&self) -> Option<u64> {
        match self {
            ProgressSample::Percent { total_bytes, .. } => Some(*total_bytes),
            ProgressSample::Indeterminate { .. } => None,
        }
    }
}
