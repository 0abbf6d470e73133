use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::error::UpdateError;
use crate::models::task::ProgressSample;

/// Nominal write granularity. The byte stream yields whatever the socket
/// produced; writes and progress updates are re-sliced to this size.
pub const CHUNK_SIZE: usize = 8 * 1024;

const MAX_RETRIES: u32 = 3;

/// In-progress file for one task. Keyed by the task id so a superseded
/// worker and its successor never share a scratch file, even when both
/// target the same destination.
pub fn part_path_for(output: &Path, task_id: Uuid) -> PathBuf {
    let mut part = output.as_os_str().to_owned();
    part.push(format!(".{}.part", task_id.simple()));
    PathBuf::from(part)
}

fn percent_of(downloaded: u64, total: u64) -> u8 {
    ((downloaded.saturating_mul(100)) / total).min(100) as u8
}

/// Keeps the sample stream monotonic: progress never goes backwards even
/// when a retry restarts the transfer from zero.
struct ProgressGate {
    tx: mpsc::Sender<ProgressSample>,
    max_bytes: u64,
    max_percent: u8,
}

impl ProgressGate {
    fn new(tx: mpsc::Sender<ProgressSample>) -> Self {
        Self {
            tx,
            max_bytes: 0,
            max_percent: 0,
        }
    }

    async fn send(&mut self, sample: ProgressSample) {
        if sample.downloaded_bytes() < self.max_bytes {
            return;
        }
        if let Some(percent) = sample.percent() {
            if percent < self.max_percent {
                return;
            }
            self.max_percent = percent;
        }
        self.max_bytes = sample.downloaded_bytes();
        let _ = self.tx.send(sample).await;
    }
}

/// Streams the artifact at `url` into `<output>.part` and renames it into
/// place once the transfer is complete and size-validated.
///
/// Cancellation is cooperative: the token is checked before each read, and
/// no partial file survives a cancelled or failed download. Transient
/// failures are retried with jittered backoff; 4xx responses and
/// cancellation are not.
pub async fn download_artifact(
    client: &reqwest::Client,
    url: &str,
    output: &Path,
    task_id: Uuid,
    progress_tx: mpsc::Sender<ProgressSample>,
    cancel: &CancellationToken,
    stall_timeout: Duration,
    max_retries: u32,
) -> Result<u64, UpdateError> {
    let retries = max_retries.clamp(1, MAX_RETRIES * 2);
    let part_path = part_path_for(output, task_id);
    let mut gate = ProgressGate::new(progress_tx);
    let mut last_err = None;

    for attempt in 0..retries {
        if cancel.is_cancelled() {
            remove_partial(&part_path).await;
            return Err(UpdateError::Cancelled);
        }

        if attempt > 0 {
            let base = 1000 * (attempt as u64);
            let jitter = rand::random::<u64>() % (base / 2 + 1);
            tokio::time::sleep(Duration::from_millis(base + jitter)).await;
        }

        match download_attempt(client, url, output, &part_path, &mut gate, cancel, stall_timeout)
            .await
        {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                remove_partial(&part_path).await;
                if e.is_fatal() {
                    return Err(e);
                }
                tracing::warn!(
                    "artifact download attempt {}/{} failed: {}",
                    attempt + 1,
                    retries,
                    e
                );
                last_err = Some(e);
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| UpdateError::Network(format!("download failed after {} attempts", retries))))
}

async fn remove_partial(part_path: &Path) {
    let _ = tokio::fs::remove_file(part_path).await;
}

async fn download_attempt(
    client: &reqwest::Client,
    url: &str,
    output: &Path,
    part_path: &Path,
    gate: &mut ProgressGate,
    cancel: &CancellationToken,
    stall_timeout: Duration,
) -> Result<u64, UpdateError> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(UpdateError::Network(format!("HTTP {} for artifact", status)));
    }

    let total_bytes = response.content_length().filter(|t| *t > 0);

    let file = tokio::fs::File::create(&part_path).await?;
    let mut writer = tokio::io::BufWriter::with_capacity(CHUNK_SIZE * 8, file);
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    loop {
        if cancel.is_cancelled() {
            let _ = writer.flush().await;
            return Err(UpdateError::Cancelled);
        }

        match tokio::time::timeout(stall_timeout, stream.next()).await {
            Ok(Some(Ok(chunk))) => {
                for slice in chunk.chunks(CHUNK_SIZE) {
                    writer.write_all(slice).await?;
                    downloaded += slice.len() as u64;
                    let sample = match total_bytes {
                        Some(total) => ProgressSample::Percent {
                            percent: percent_of(downloaded, total),
                            downloaded_bytes: downloaded,
                            total_bytes: total,
                        },
                        None => ProgressSample::Indeterminate {
                            downloaded_bytes: downloaded,
                        },
                    };
                    gate.send(sample).await;
                }
            }
            Ok(Some(Err(e))) => {
                let _ = writer.flush().await;
                return Err(UpdateError::Network(format!("stream error: {}", e)));
            }
            Ok(None) => break,
            Err(_) => {
                let _ = writer.flush().await;
                return Err(UpdateError::Network(format!(
                    "download stalled: no data received for {}s",
                    stall_timeout.as_secs()
                )));
            }
        }
    }

    writer.flush().await?;
    drop(writer);

    if let Some(expected) = total_bytes {
        let actual = tokio::fs::metadata(&part_path).await?.len();
        if actual != expected {
            return Err(UpdateError::Network(format!(
                "short download: expected {} bytes, got {}",
                expected, actual
            )));
        }
    }

    tokio::fs::rename(&part_path, output).await?;

    if let Some(total) = total_bytes {
        gate.send(ProgressSample::Percent {
            percent: 100,
            downloaded_bytes: downloaded,
            total_bytes: total,
        })
        .await;
    }

    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        let id = Uuid::new_v4();
        let part = part_path_for(Path::new("TouchNStars-1.4.0.apk"), id);
        let name = part.to_string_lossy();
        assert!(name.starts_with("TouchNStars-1.4.0.apk."));
        assert!(name.ends_with(".part"));
    }

    #[test]
    fn part_path_is_unique_per_task() {
        let output = Path::new("downloads/TouchNStars-1.4.0.apk");
        let a = part_path_for(output, Uuid::new_v4());
        let b = part_path_for(output, Uuid::new_v4());
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("downloads")));
    }

    #[test]
    fn percent_is_floor_of_ratio() {
        assert_eq!(percent_of(0, 200), 0);
        assert_eq!(percent_of(50, 200), 25);
        assert_eq!(percent_of(199, 200), 99);
        assert_eq!(percent_of(200, 200), 100);
    }

    #[test]
    fn percent_never_exceeds_100() {
        assert_eq!(percent_of(500, 200), 100);
    }

    #[tokio::test]
    async fn gate_drops_regressing_samples() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut gate = ProgressGate::new(tx);

        gate.send(ProgressSample::Percent {
            percent: 40,
            downloaded_bytes: 400,
            total_bytes: 1000,
        })
        .await;
        // A retry restarting from zero must not leak lower readings.
        gate.send(ProgressSample::Percent {
            percent: 10,
            downloaded_bytes: 100,
            total_bytes: 1000,
        })
        .await;
        gate.send(ProgressSample::Percent {
            percent: 50,
            downloaded_bytes: 500,
            total_bytes: 1000,
        })
        .await;
        drop(gate);

        let mut seen = Vec::new();
        while let Some(sample) = rx.recv().await {
            seen.push(sample.percent().unwrap());
        }
        assert_eq!(seen, vec![40, 50]);
    }

    #[tokio::test]
    async fn gate_passes_indeterminate_growth() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut gate = ProgressGate::new(tx);

        gate.send(ProgressSample::Indeterminate {
            downloaded_bytes: 100,
        })
        .await;
        gate.send(ProgressSample::Indeterminate {
            downloaded_bytes: 50,
        })
        .await;
        gate.send(ProgressSample::Indeterminate {
            downloaded_bytes: 200,
        })
        .await;
        drop(gate);

        let mut seen = Vec::new();
        while let Some(sample) = rx.recv().await {
            seen.push(sample.downloaded_bytes());
        }
        assert_eq!(seen, vec![100, 200]);
    }
}
