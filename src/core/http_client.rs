use std::time::Duration;

use crate::core::error::UpdateError;

pub const USER_AGENT: &str = "touch-n-stars-updater";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared client for the probe, the metadata fetch and the artifact
/// download. No overall request timeout: artifact transfers are bounded by
/// the downloader's stall timeout instead.
pub fn build_client() -> Result<reqwest::Client, UpdateError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?;
    Ok(client)
}
