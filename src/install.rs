use std::path::Path;

use async_trait::async_trait;

use crate::core::error::UpdateError;

/// MIME type handed to the package installer along with the artifact.
pub const APK_MIME: &str = "application/vnd.android.package-archive";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The installer UI took over the artifact.
    Started,
    /// Install-from-unknown-sources is not authorized; the shell should
    /// redirect to the settings surface and retry afterwards.
    PermissionDenied,
}

/// Boundary to the operating system's package installer. The shell
/// implements this; the updater only drives the handoff and its two
/// outcomes.
#[async_trait]
pub trait InstallHandoff: Send + Sync {
    async fn request_install(
        &self,
        artifact: &Path,
        mime: &str,
    ) -> Result<InstallOutcome, UpdateError>;
}
