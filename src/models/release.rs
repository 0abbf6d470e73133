use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one version check. Produced by `VersionOracle`, consumed once
/// by the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseInfo {
    pub version: String,
    pub available: bool,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub download_url: Option<String>,
}

impl ReleaseInfo {
    pub fn not_available() -> Self {
        Self {
            version: String::new(),
            available: false,
            name: None,
            notes: None,
            published_at: None,
            download_url: None,
        }
    }
}
