use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

/// One remote file discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    pub date: NaiveDate,
    pub url: String,
    pub mtime: Option<String>,
    pub size: Option<String>,
}

impl InventoryEntry {
    /// Last path segment of the URL, used as the local file name.
    ///
    /// Any query string or fragment is not part of the name.
    pub fn file_name(&self) -> Option<&str> {
        let path = self.url.split(['?', '#']).next().unwrap_or("");
        path.rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
    }
}

/// Ordered, append-only record of discovered files.
///
/// Duplicates are kept; the order is the order entries were appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: InventoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InventoryEntry> {
        self.entries.iter()
    }
}

impl From<Vec<InventoryEntry>> for Inventory {
    fn from(entries: Vec<InventoryEntry>) -> Self {
        Self { entries }
    }
}

impl Extend<InventoryEntry> for Inventory {
    fn extend<I: IntoIterator<Item = InventoryEntry>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for Inventory {
    type Item = InventoryEntry;
    type IntoIter = std::vec::IntoIter<InventoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a InventoryEntry;
    type IntoIter = std::slice::Iter<'a, InventoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// What the downloader does with an entry whose destination has been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadDecision {
    /// File exists and its size agrees with the listing.
    Skip,
    Missing,
    SizeMismatch,
}

impl DownloadDecision {
    pub fn needs_fetch(self) -> bool {
        !matches!(self, DownloadDecision::Skip)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub entry: InventoryEntry,
    pub output_path: PathBuf,
    pub reason: DownloadDecision,
}

#[derive(Debug)]
pub struct DownloadReport {
    pub task: DownloadTask,
    pub bytes_downloaded: u64,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct SyncSummary {
    pub transferred: usize,
    pub skipped: usize,
    pub total_bytes_downloaded: u64,
    pub total_duration: Duration,
    pub reports: Vec<DownloadReport>,
}
