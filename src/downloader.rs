use crate::error::SyncError;
use crate::size::is_correct_size;
use crate::types::{
    DownloadDecision, DownloadReport, DownloadTask, Inventory, InventoryEntry, SyncSummary,
};
use chrono::Datelike;
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_TRANSFERS: usize = 4;

#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Transfers that may be in flight at once. 1 reproduces strictly
    /// sequential behaviour.
    pub parallelism: usize,
    pub timeout: Duration,
    pub show_progress: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            timeout: Duration::from_secs(60),
            show_progress: false,
        }
    }
}

/// `root/YYYY/MM/DD/<file name>` for an entry.
pub fn destination_path(root: &Path, entry: &InventoryEntry) -> Result<PathBuf, SyncError> {
    let name = entry.file_name().ok_or_else(|| SyncError::InvalidEntry {
        url: entry.url.clone(),
    })?;
    Ok(root
        .join(format!("{:04}", entry.date.year()))
        .join(format!("{:02}", entry.date.month()))
        .join(format!("{:02}", entry.date.day()))
        .join(name))
}

/// Classifies what to do with an entry given the file currently at `path`.
pub fn decide(entry: &InventoryEntry, path: &Path) -> DownloadDecision {
    if !path.exists() {
        DownloadDecision::Missing
    } else if is_correct_size(entry.size.as_deref(), path) {
        DownloadDecision::Skip
    } else {
        DownloadDecision::SizeMismatch
    }
}

pub struct Downloader {
    config: DownloaderConfig,
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(config: DownloaderConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            client,
            cancel: CancellationToken::new(),
        })
    }

    /// Stops the run from starting further transfers once cancelled.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Mirrors missing or mis-sized inventory files under `destination_root`.
    ///
    /// Entries are visited in inventory order. The run stops as soon as
    /// `max_transfers` files have been transferred; later entries are not
    /// looked at. Any transfer error ends the run after the transfers already
    /// in flight have finished.
    pub async fn sync(
        &self,
        inventory: &Inventory,
        destination_root: &Path,
        max_transfers: usize,
    ) -> Result<SyncSummary, SyncError> {
        tokio::fs::create_dir_all(destination_root).await?;

        let start_time = Instant::now();
        let progress = if self.config.show_progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden())
        };
        let parallelism = self.config.parallelism.max(1);

        let mut reports = Vec::new();
        let mut skipped = 0;
        let mut batch: Vec<DownloadTask> = Vec::new();

        for entry in inventory {
            if reports.len() + batch.len() >= max_transfers || self.cancel.is_cancelled() {
                break;
            }

            let output_path = destination_path(destination_root, entry)?;
            if batch.iter().any(|task| task.output_path == output_path) {
                // Never let two workers write the same file.
                reports.extend(self.run_batch(std::mem::take(&mut batch), &progress).await?);
                if reports.len() >= max_transfers || self.cancel.is_cancelled() {
                    break;
                }
            }

            if let Some(parent) = output_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let reason = decide(entry, &output_path);
            debug!("{:?}: {}", reason, output_path.display());
            if !reason.needs_fetch() {
                skipped += 1;
                continue;
            }
            batch.push(DownloadTask {
                entry: entry.clone(),
                output_path,
                reason,
            });

            let remaining = max_transfers - reports.len();
            if batch.len() >= parallelism.min(remaining) {
                reports.extend(self.run_batch(std::mem::take(&mut batch), &progress).await?);
            }
        }

        if !batch.is_empty() && !self.cancel.is_cancelled() {
            reports.extend(self.run_batch(batch, &progress).await?);
        }

        let summary = SyncSummary {
            transferred: reports.len(),
            skipped,
            total_bytes_downloaded: reports.iter().map(|r| r.bytes_downloaded).sum(),
            total_duration: start_time.elapsed(),
            reports,
        };
        info!(
            "Transferred {} file(s), {} already present",
            summary.transferred, summary.skipped
        );
        Ok(summary)
    }

    /// Runs a batch concurrently, waits for all of it, then reports the first error.
    async fn run_batch(
        &self,
        batch: Vec<DownloadTask>,
        progress: &MultiProgress,
    ) -> Result<Vec<DownloadReport>, SyncError> {
        let handles: Vec<_> = batch
            .into_iter()
            .map(|task| {
                let pb = progress.add(self.create_progress_bar(&task));
                self.download_file(task, pb)
            })
            .collect();

        let mut reports = Vec::new();
        let mut first_error = None;
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!("Transfer failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    async fn download_file(
        &self,
        task: DownloadTask,
        pb: ProgressBar,
    ) -> Result<DownloadReport, SyncError> {
        let start_time = Instant::now();
        let part_path = part_path(&task.output_path);
        info!("Downloading {} to {}", task.entry.url, task.output_path.display());

        let result = async {
            let bytes = self.fetch_to(&task.entry.url, &part_path, &pb).await?;
            tokio::fs::rename(&part_path, &task.output_path).await?;
            Ok::<u64, SyncError>(bytes)
        }
        .await;

        let bytes_downloaded = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                pb.abandon_with_message("failed");
                if let Err(cleanup) = tokio::fs::remove_file(&part_path).await {
                    debug!("Could not remove {}: {}", part_path.display(), cleanup);
                }
                return Err(e);
            }
        };
        pb.finish();

        Ok(DownloadReport {
            task,
            bytes_downloaded,
            duration: start_time.elapsed(),
        })
    }

    async fn fetch_to(&self, url: &str, path: &Path, pb: &ProgressBar) -> Result<u64, SyncError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::from_request(url, e))?;

        if !resp.status().is_success() {
            return Err(SyncError::HttpStatus {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        pb.set_length(resp.content_length().unwrap_or(0));

        let mut file = File::create(path).await?;
        let mut stream = resp.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SyncError::from_request(url, e))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().await?;

        Ok(downloaded)
    }

    fn create_progress_bar(&self, task: &DownloadTask) -> ProgressBar {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {prefix:.bold} {msg:<40} {bytes:>10}/{total_bytes:<10} {wide_bar:.cyan/blue}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_prefix(task.entry.date.format("%Y-%m-%d").to_string());
        let name = task.entry.file_name().unwrap_or("unknown");
        pb.set_message(match task.reason {
            DownloadDecision::SizeMismatch => format!("{} (size mismatch)", name),
            _ => name.to_string(),
        });
        pb
    }
}

/// Sibling path a transfer streams into before it is renamed into place.
fn part_path(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    output_path.with_file_name(name)
}

/// Writes one row per completed transfer to a CSV report.
pub async fn write_stats_csv(summary: &SyncSummary, path: &Path) -> Result<(), SyncError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(Vec::new());

    wtr.write_record([
        "Filename",
        "Reason",
        "Size (MB)",
        "Duration (s)",
        "Speed (MB/s)",
        "URL",
    ])?;

    for report in &summary.reports {
        let filename = report
            .task
            .output_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        let size_mb = report.bytes_downloaded as f64 / 1_048_576.0;
        let duration_secs = report.duration.as_secs_f64();
        let speed_mbs = if duration_secs > 0.0 {
            size_mb / duration_secs
        } else {
            0.0
        };

        wtr.write_record([
            filename.to_string(),
            format!("{:?}", report.task.reason),
            format!("{:.2}", size_mb),
            format!("{:.2}", duration_secs),
            format!("{:.2}", speed_mbs),
            report.task.entry.url.clone(),
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| SyncError::Io(e.into_error()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn entry(url: &str, size: Option<&str>) -> InventoryEntry {
        InventoryEntry {
            date: NaiveDate::from_ymd_opt(2021, 8, 1).unwrap(),
            url: url.to_string(),
            mtime: None,
            size: size.map(str::to_string),
        }
    }

    #[test]
    fn test_destination_path_layout() {
        let path = destination_path(Path::new("/data"), &entry("http://h/x/MultiA.gz", None)).unwrap();
        assert_eq!(path, PathBuf::from("/data/2021/08/01/MultiA.gz"));
    }

    #[test]
    fn test_destination_path_needs_file_name() {
        let err = destination_path(Path::new("/data"), &entry("http://h/x/", None)).unwrap_err();
        assert!(matches!(err, SyncError::InvalidEntry { .. }));
    }

    #[test]
    fn test_decide() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("MultiA.gz");
        let e = entry("http://h/MultiA.gz", Some("4"));
        assert_eq!(decide(&e, &path), DownloadDecision::Missing);

        std::fs::write(&path, b"abcd").unwrap();
        assert_eq!(decide(&e, &path), DownloadDecision::Skip);

        std::fs::write(&path, b"abcdefgh").unwrap();
        assert_eq!(decide(&e, &path), DownloadDecision::SizeMismatch);

        // Without a listed size nothing can be trusted.
        assert_eq!(decide(&entry("http://h/MultiA.gz", None), &path), DownloadDecision::SizeMismatch);
    }

    #[test]
    fn test_progress_bar_labels_entry() {
        let downloader = Downloader::new(DownloaderConfig::default()).unwrap();
        let task = DownloadTask {
            entry: entry("http://h/x/MultiA.gz?v=2", Some("1K")),
            output_path: PathBuf::from("/data/2021/08/01/MultiA.gz"),
            reason: DownloadDecision::SizeMismatch,
        };
        let pb = downloader.create_progress_bar(&task);
        assert_eq!(pb.prefix(), "2021-08-01");
        assert_eq!(pb.message(), "MultiA.gz (size mismatch)");
    }

    #[test]
    fn test_part_path_is_sibling() {
        assert_eq!(
            part_path(Path::new("/data/2021/08/01/MultiA.gz")),
            PathBuf::from("/data/2021/08/01/MultiA.gz.part")
        );
    }

    #[tokio::test]
    async fn test_zero_quota_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let inventory = Inventory::from(vec![entry("http://127.0.0.1:9/MultiA.gz", None)]);
        let downloader = Downloader::new(DownloaderConfig::default()).unwrap();
        let summary = downloader.sync(&inventory, dir.path(), 0).await.unwrap();
        assert_eq!(summary.transferred, 0);
        assert!(!dir.path().join("2021").exists());
    }
}
