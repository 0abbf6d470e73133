use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use semver::Version;
use serde::Deserialize;

use crate::core::error::UpdateError;
use crate::models::release::ReleaseInfo;
use crate::models::settings::UpdaterSettings;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").expect("version pattern is a valid regex"));

/// Latest-release metadata document, GitHub releases shape. Deserialized
/// structurally; a payload that does not fit simply means "no update".
#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    tag_name: Option<String>,
    name: Option<String>,
    body: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

/// Answers "is a newer release published than what we are running?".
///
/// Best-effort by contract: every network or parse failure collapses into
/// `ReleaseInfo::not_available()` so a version check can never interrupt the
/// host application.
#[derive(Clone)]
pub struct VersionOracle {
    client: reqwest::Client,
    settings: UpdaterSettings,
}

impl VersionOracle {
    pub fn new(client: reqwest::Client, settings: UpdaterSettings) -> Self {
        Self { client, settings }
    }

    pub async fn fetch_latest(&self, current_version: &str) -> ReleaseInfo {
        if !self.probe().await {
            tracing::debug!("reachability probe failed, skipping update check");
            return ReleaseInfo::not_available();
        }

        match self.resolve_latest().await {
            Ok(Some(release)) => {
                if is_newer(&release.version, current_version) {
                    release
                } else {
                    ReleaseInfo::not_available()
                }
            }
            Ok(None) => ReleaseInfo::not_available(),
            Err(e) => {
                tracing::warn!("update check failed: {}", e);
                ReleaseInfo::not_available()
            }
        }
    }

    /// Lightweight HEAD request deciding whether the real calls are worth
    /// attempting at all.
    async fn probe(&self) -> bool {
        let Some(target) = self.probe_target() else {
            return false;
        };
        let request = self.client.head(&target);
        match tokio::time::timeout(PROBE_TIMEOUT, request.send()).await {
            Ok(Ok(resp)) => resp.status().is_success(),
            _ => false,
        }
    }

    /// The configured probe URL, or the release endpoint's host when none
    /// is set.
    fn probe_target(&self) -> Option<String> {
        let configured = self.settings.endpoints.probe_url.trim();
        if !configured.is_empty() {
            return Some(configured.to_string());
        }
        let api = url::Url::parse(&self.settings.endpoints.release_api_url).ok()?;
        let host = api.host_str()?;
        Some(format!("{}://{}", api.scheme(), host))
    }

    async fn resolve_latest(&self) -> Result<Option<ReleaseInfo>, UpdateError> {
        let response = self
            .client
            .get(&self.settings.endpoints.release_api_url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Network(format!(
                "HTTP {} from release endpoint",
                status
            )));
        }

        let doc: ReleaseDocument = response.json().await?;
        if doc.draft || doc.prerelease {
            return Ok(None);
        }

        let tag = doc
            .tag_name
            .as_deref()
            .or(doc.name.as_deref())
            .unwrap_or_default();
        let version = sanitize_version(tag);
        if version.is_empty() {
            tracing::warn!("release has unparseable version tag: {:?}", tag);
            return Ok(None);
        }

        let artifact_name = self.settings.artifact_name(&version);
        let download_url = doc
            .assets
            .iter()
            .find(|a| a.name == artifact_name)
            .map(|a| a.browser_download_url.clone());

        Ok(Some(ReleaseInfo {
            version,
            available: true,
            name: doc.name,
            notes: doc.body,
            published_at: doc.published_at,
            download_url,
        }))
    }
}

/// Extracts a dotted numeric version from a raw tag ("v1.4.2" -> "1.4.2").
pub fn sanitize_version(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    if let Some(m) = VERSION_RE.find(trimmed) {
        return m.as_str().to_string();
    }
    trimmed
        .split(['-', '+'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn parse_version(version: &str) -> Option<Version> {
    let mut segments: Vec<u64> = Vec::with_capacity(3);
    for part in version.split('.') {
        segments.push(part.parse().ok()?);
    }
    if segments.is_empty() {
        return None;
    }
    segments.resize(3, 0);
    Some(Version::new(segments[0], segments[1], segments[2]))
}

/// Strictly-after under numeric dotted comparison, so "1.10.0" beats
/// "1.9.0". Lexicographic string comparison is exactly what this must not
/// be.
pub fn is_newer(latest: &str, current: &str) -> bool {
    match (
        parse_version(&sanitize_version(latest)),
        parse_version(&sanitize_version(current)),
    ) {
        (Some(latest), Some(current)) => latest > current,
        _ => {
            tracing::warn!(
                "cannot compare versions {:?} and {:?}, assuming no update",
                latest,
                current
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_v_prefix() {
        assert_eq!(sanitize_version("v1.4.2"), "1.4.2");
    }

    #[test]
    fn sanitize_extracts_from_noisy_tag() {
        assert_eq!(sanitize_version("release-2.0.1-rc"), "2.0.1");
    }

    #[test]
    fn sanitize_falls_back_on_prerelease_suffix() {
        assert_eq!(sanitize_version("1.4.0-beta.1"), "1.4.0");
    }

    #[test]
    fn sanitize_rejects_garbage() {
        assert_eq!(sanitize_version("latest"), "latest");
        assert!(parse_version(&sanitize_version("latest")).is_none());
    }

    #[test]
    fn two_segment_versions_are_padded() {
        assert_eq!(parse_version("1.4"), Some(Version::new(1, 4, 0)));
    }

    #[test]
    fn newer_patch_release_wins() {
        assert!(is_newer("1.4.1", "1.4.0"));
        assert!(!is_newer("1.4.0", "1.4.1"));
    }

    #[test]
    fn equal_versions_are_not_newer() {
        assert!(!is_newer("1.4.0", "1.4.0"));
    }

    #[test]
    fn numeric_ordering_beats_lexicographic() {
        assert!(is_newer("1.10.0", "1.9.0"));
        assert!(!is_newer("1.9.0", "1.10.0"));
    }

    #[test]
    fn tagged_versions_compare_sanitized() {
        assert!(is_newer("v2.0.0", "1.9.9"));
    }

    #[test]
    fn unparseable_version_never_reports_newer() {
        assert!(!is_newer("latest", "1.0.0"));
        assert!(!is_newer("1.1.0", "unknown"));
    }

    #[test]
    fn probe_target_falls_back_to_api_host() {
        let mut settings = UpdaterSettings::default();
        settings.endpoints.probe_url = String::new();
        settings.endpoints.release_api_url =
            "https://api.example.com/repos/x/y/releases/latest".into();
        let oracle = VersionOracle::new(reqwest::Client::new(), settings);
        assert_eq!(
            oracle.probe_target().as_deref(),
            Some("https://api.example.com")
        );
    }

    #[test]
    fn probe_target_prefers_configured_url() {
        let oracle = VersionOracle::new(reqwest::Client::new(), UpdaterSettings::default());
        assert_eq!(oracle.probe_target().as_deref(), Some("https://github.com"));
    }
}
