use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Updater configuration. Defaults point at the production release
/// endpoints; tests override them with a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterSettings {
    pub schema_version: u32,
    pub endpoints: EndpointSettings,
    pub download: DownloadSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// GET `<release_api_url>` returns the latest-release metadata document.
    pub release_api_url: String,
    /// HEAD probe target; failure silently suppresses the whole check.
    /// Empty means "derive from the release endpoint's host".
    pub probe_url: String,
    /// `{version}` is substituted into the templated artifact URL.
    pub artifact_url_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    pub output_dir: PathBuf,
    /// `{version}` is substituted into the artifact file name.
    pub artifact_name_template: String,
    pub stall_timeout_secs: u64,
    pub max_retries: u32,
    pub progress_throttle_ms: u64,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            endpoints: EndpointSettings {
                release_api_url:
                    "https://api.github.com/repos/Touch-N-Stars/Touch-N-Stars/releases/latest"
                        .into(),
                probe_url: "https://github.com".into(),
                artifact_url_template:
                    "https://github.com/Touch-N-Stars/Touch-N-Stars/releases/download/v{version}/TouchNStars-{version}.apk"
                        .into(),
            },
            download: DownloadSettings {
                output_dir: crate::core::paths::downloads_dir(),
                artifact_name_template: "TouchNStars-{version}.apk".into(),
                stall_timeout_secs: 30,
                max_retries: 3,
                progress_throttle_ms: 150,
            },
        }
    }
}

impl UpdaterSettings {
    pub fn artifact_name(&self, version: &str) -> String {
        self.download
            .artifact_name_template
            .replace("{version}", version)
    }

    pub fn artifact_url(&self, version: &str) -> String {
        self.endpoints
            .artifact_url_template
            .replace("{version}", version)
    }

    pub fn artifact_path(&self, version: &str) -> PathBuf {
        self.download.output_dir.join(self.artifact_name(version))
    }
}
