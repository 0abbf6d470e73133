use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::core::downloader;
use crate::core::error::UpdateError;
use crate::core::events::{DownloadProgress, ProgressThrottle, UpdateEmitter, UpdateStatus};
use crate::core::http_client;
use crate::core::version::VersionOracle;
use crate::install::{InstallHandoff, InstallOutcome, APK_MIME};
use crate::models::release::ReleaseInfo;
use crate::models::settings::UpdaterSettings;
use crate::models::task::{DownloadTask, ProgressSample};

/// Orchestrates the update flow: version check, confirmation, the single
/// in-flight download, and the installer handoff.
///
/// State machine: Idle → Checking → AwaitingConfirmation → Downloading →
/// Completed | Cancelled | Failed. Terminal states are emitted, then the
/// controller returns itself to Idle with the task slot cleared, so a
/// failed run can never leave it stuck mid-flow.
#[derive(Clone)]
pub struct UpdateController<E: UpdateEmitter> {
    inner: Arc<tokio::sync::Mutex<ControllerState>>,
    emitter: E,
    client: reqwest::Client,
    oracle: VersionOracle,
    installer: Arc<dyn InstallHandoff>,
    settings: UpdaterSettings,
}

struct ControllerState {
    status: UpdateStatus,
    pending: Option<ReleaseInfo>,
    task: Option<DownloadTask>,
    completed: Option<CompletedArtifact>,
}

struct CompletedArtifact {
    path: PathBuf,
    redirect_emitted: bool,
}

impl<E: UpdateEmitter> UpdateController<E> {
    pub fn new(
        settings: UpdaterSettings,
        emitter: E,
        installer: Arc<dyn InstallHandoff>,
    ) -> Result<Self, UpdateError> {
        let client = http_client::build_client()?;
        let oracle = VersionOracle::new(client.clone(), settings.clone());
        Ok(Self {
            inner: Arc::new(tokio::sync::Mutex::new(ControllerState {
                status: UpdateStatus::Idle,
                pending: None,
                task: None,
                completed: None,
            })),
            emitter,
            client,
            oracle,
            installer,
            settings,
        })
    }

    pub async fn status(&self) -> UpdateStatus {
        self.inner.lock().await.status.clone()
    }

    /// Asks the oracle for a newer release and, if one exists, presents the
    /// confirmation prompt via `emit_update_available`.
    ///
    /// Best-effort: a failed check resolves silently with no update and no
    /// event. Calling while a check or prompt is already pending is a no-op,
    /// so repeated checks never stack duplicate prompts. Checking while a
    /// download runs is allowed; confirming the result supersedes the
    /// in-flight task.
    pub async fn check_for_update(&self, current_version: &str) -> ReleaseInfo {
        {
            let mut state = self.inner.lock().await;
            match state.status {
                UpdateStatus::Checking | UpdateStatus::AwaitingConfirmation => {
                    return ReleaseInfo::not_available();
                }
                UpdateStatus::Downloading => {}
                _ => state.status = UpdateStatus::Checking,
            }
        }

        let release = self.oracle.fetch_latest(current_version).await;

        let mut state = self.inner.lock().await;
        if release.available {
            state.status = UpdateStatus::AwaitingConfirmation;
            state.pending = Some(release.clone());
            self.emitter.emit_update_available(&release);
        } else if state.status == UpdateStatus::Checking {
            state.status = UpdateStatus::Idle;
        }
        release
    }

    /// Accepts the pending prompt and spawns the download worker. Any task
    /// still in flight is cancelled first; only the new task's events are
    /// observed from here on.
    pub async fn confirm(&self) -> bool {
        let (task, url) = {
            let mut state = self.inner.lock().await;
            if state.status != UpdateStatus::AwaitingConfirmation {
                return false;
            }
            let release = match state.pending.take() {
                Some(release) => release,
                None => return false,
            };

            if let Some(old) = state.task.take() {
                tracing::info!("superseding in-flight download of {}", old.version);
                old.cancel_token.cancel();
            }

            let dest = self.settings.artifact_path(&release.version);
            let url = release
                .download_url
                .clone()
                .unwrap_or_else(|| self.settings.artifact_url(&release.version));
            let task = DownloadTask::new(&release.version, dest);
            state.task = Some(task.clone());
            state.completed = None;
            state.status = UpdateStatus::Downloading;
            self.emitter.emit_status(&UpdateStatus::Downloading);
            (task, url)
        };

        let controller = self.clone();
        tokio::spawn(async move {
            run_download(controller, task, url).await;
        });
        true
    }

    /// Flips the live task's cancellation flag. The task stays addressable
    /// for its whole flight, even after a re-check has already queued the
    /// next prompt. No-op when no task exists. The worker performs cleanup
    /// and emits the terminal `Cancelled` state.
    pub async fn cancel(&self) -> bool {
        let state = self.inner.lock().await;
        match &state.task {
            Some(task) => {
                task.cancel_token.cancel();
                true
            }
            None => false,
        }
    }

    /// Re-issues the installer handoff for an already-downloaded artifact,
    /// the path back into the flow after the user returns from the
    /// unknown-sources settings surface.
    pub async fn retry_install(&self) -> bool {
        let has_artifact = self.inner.lock().await.completed.is_some();
        if has_artifact {
            self.handoff().await;
        }
        has_artifact
    }

    async fn handoff(&self) {
        let path = {
            let state = self.inner.lock().await;
            match &state.completed {
                Some(artifact) => artifact.path.clone(),
                None => return,
            }
        };

        match self.installer.request_install(&path, APK_MIME).await {
            Ok(InstallOutcome::Started) => {
                self.inner.lock().await.completed = None;
            }
            Ok(InstallOutcome::PermissionDenied) | Err(UpdateError::PermissionDenied) => {
                let mut state = self.inner.lock().await;
                if let Some(artifact) = state.completed.as_mut() {
                    if !artifact.redirect_emitted {
                        artifact.redirect_emitted = true;
                        self.emitter.emit_settings_redirect();
                    }
                }
            }
            Err(e) => {
                tracing::warn!("installer handoff failed: {}", e);
            }
        }
    }
}

async fn run_download<E: UpdateEmitter>(
    controller: UpdateController<E>,
    task: DownloadTask,
    url: String,
) {
    let (tx, mut rx) = mpsc::channel::<ProgressSample>(32);

    let emitter = controller.emitter.clone();
    let inner = controller.inner.clone();
    let token = task.cancel_token.clone();
    let task_id = task.id;
    let version = task.version.clone();
    let throttle_ms = controller.settings.download.progress_throttle_ms;

    // Relays worker samples to the presentation surface. Stops as soon as
    // the task is cancelled or superseded so no stale progress leaks out.
    let forwarder = tokio::spawn(async move {
        let mut throttle = ProgressThrottle::new(throttle_ms);
        while let Some(sample) = rx.recv().await {
            if token.is_cancelled() {
                break;
            }
            {
                let mut state = inner.lock().await;
                match state.task.as_mut() {
                    Some(current) if current.id == task_id => {
                        current.downloaded_bytes = sample.downloaded_bytes();
                        current.total_bytes = sample.total_bytes();
                    }
                    _ => break,
                }
            }
            if sample.percent() != Some(100) && !throttle.should_emit() {
                continue;
            }
            emitter.emit_progress(&DownloadProgress {
                task_id,
                version: version.clone(),
                percent: sample.percent(),
                downloaded_bytes: sample.downloaded_bytes(),
                total_bytes: sample.total_bytes(),
            });
        }
    });

    // The surface shows the download starting from zero right away, before
    // the first chunk lands.
    if !task.cancel_token.is_cancelled() {
        controller.emitter.emit_progress(&DownloadProgress {
            task_id,
            version: task.version.clone(),
            percent: Some(0),
            downloaded_bytes: 0,
            total_bytes: None,
        });
    }

    let stall_timeout = Duration::from_secs(controller.settings.download.stall_timeout_secs);
    let max_retries = controller.settings.download.max_retries;

    let result = tokio::select! {
        r = downloader::download_artifact(
            &controller.client,
            &url,
            &task.dest,
            task.id,
            tx,
            &task.cancel_token,
            stall_timeout,
            max_retries,
        ) => r,
        _ = task.cancel_token.cancelled() => Err(UpdateError::Cancelled),
    };

    let _ = forwarder.await;

    let mut state = controller.inner.lock().await;
    let is_current = state.task.as_ref().map(|t| t.id == task.id).unwrap_or(false);
    if !is_current {
        // Superseded: the newer task owns all events from here on. The
        // scratch file is ours alone; the destination is left for a
        // successor targeting the same version.
        let same_dest = state.task.as_ref().is_some_and(|t| t.dest == task.dest);
        drop(state);
        let _ = tokio::fs::remove_file(downloader::part_path_for(&task.dest, task.id)).await;
        if result.is_ok() && !same_dest {
            let _ = tokio::fs::remove_file(&task.dest).await;
        }
        return;
    }
    state.task = None;
    // A re-check may already have queued the next prompt; do not clobber it.
    if state.status == UpdateStatus::Downloading {
        state.status = UpdateStatus::Idle;
    }

    match result {
        Ok(bytes) => {
            tracing::info!("update {} downloaded ({} bytes)", task.version, bytes);
            state.completed = Some(CompletedArtifact {
                path: task.dest.clone(),
                redirect_emitted: false,
            });
            // Dialog dismissal reaches the surface before the installer
            // takes over.
            controller.emitter.emit_status(&UpdateStatus::Completed);
            drop(state);
            controller.handoff().await;
        }
        Err(err) => {
            drop(state);
            // The select! may have dropped the download future before it
            // could clean up after itself; cleanup must precede the
            // terminal event either way.
            let _ = tokio::fs::remove_file(downloader::part_path_for(&task.dest, task.id)).await;
            match err {
                UpdateError::Cancelled => {
                    tracing::info!("update {} download cancelled", task.version);
                    controller.emitter.emit_status(&UpdateStatus::Cancelled);
                }
                e => {
                    tracing::error!("update {} download failed: {}", task.version, e);
                    controller.emitter.emit_status(&UpdateStatus::Failed {
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[derive(Clone, Default)]
    struct NullEmitter;

    impl UpdateEmitter for NullEmitter {
        fn emit_status(&self, _status: &UpdateStatus) {}
        fn emit_update_available(&self, _release: &ReleaseInfo) {}
        fn emit_progress(&self, _progress: &DownloadProgress) {}
        fn emit_settings_redirect(&self) {}
    }

    struct NullInstaller;

    #[async_trait::async_trait]
    impl InstallHandoff for NullInstaller {
        async fn request_install(
            &self,
            _artifact: &Path,
            _mime: &str,
        ) -> Result<InstallOutcome, UpdateError> {
            Ok(InstallOutcome::Started)
        }
    }

    fn controller() -> UpdateController<NullEmitter> {
        UpdateController::new(
            UpdaterSettings::default(),
            NullEmitter,
            Arc::new(NullInstaller),
        )
        .expect("controller construction")
    }

    #[tokio::test]
    async fn starts_idle() {
        assert_eq!(controller().status().await, UpdateStatus::Idle);
    }

    #[tokio::test]
    async fn cancel_when_idle_is_noop() {
        assert!(!controller().cancel().await);
    }

    #[tokio::test]
    async fn confirm_without_prompt_is_noop() {
        let controller = controller();
        assert!(!controller.confirm().await);
        assert_eq!(controller.status().await, UpdateStatus::Idle);
    }

    #[tokio::test]
    async fn retry_install_without_artifact_is_noop() {
        assert!(!controller().retry_install().await);
    }
}
