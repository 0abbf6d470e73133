use thiserror::Error;

/// Failure taxonomy for the update flow.
///
/// `VersionOracle` swallows these into a "no update" answer; the downloader
/// and controller surface them so the shell can show an accurate terminal
/// state. Filesystem cleanup always happens before an error is returned.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("network error: {0}")]
    Network(String),

    #[error("malformed release metadata: {0}")]
    Parse(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("download cancelled")]
    Cancelled,

    #[error("install blocked: unknown-sources permission not granted")]
    PermissionDenied,
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpdateError::Parse(err.to_string())
        } else {
            UpdateError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(err: serde_json::Error) -> Self {
        UpdateError::Parse(err.to_string())
    }
}

impl UpdateError {
    /// Retrying is pointless for cancellations and 4xx-class responses.
    pub fn is_fatal(&self) -> bool {
        match self {
            UpdateError::Cancelled | UpdateError::PermissionDenied => true,
            UpdateError::Network(msg) => {
                for code in &["HTTP 400", "HTTP 401", "HTTP 403", "HTTP 404", "HTTP 410"] {
                    if msg.contains(code) {
                        return true;
                    }
                }
                false
            }
            _ => false,
        }
    }
}
