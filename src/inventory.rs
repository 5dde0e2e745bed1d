//! Builds an inventory of remote files by scraping one listing page per day.
//!
//! Listing pages are matched with a regular expression rather than parsed as
//! HTML. The entry pattern must expose the file's relative name in a named
//! group `name`; when enabled, the last-modified text and the size text are
//! taken from the named groups `mtime` and `size`.

use crate::error::SyncError;
use crate::types::{Inventory, InventoryEntry};
use chrono::{Datelike, NaiveDate};
use futures::{stream, StreamExt, TryStreamExt};
use log::{debug, info};
use regex::Regex;
use std::time::Duration;

pub const DEFAULT_URL_TEMPLATE: &str = "https://mtarchive.geol.iastate.edu/{year:4d}/{month:02d}/{day:02d}/mrms/ncep/MultiSensor_QPE_01H_Pass2";
pub const DEFAULT_FILE_PREFIX: &str = "Multi";
pub const DEFAULT_ENTRY_PATTERN: &str =
    "<a href={quote_char}(?P<name>{file_prefix}.*?){quote_char}.*?</a>.*?{mtime_pattern}.*?{size_pattern}";
pub const DEFAULT_QUOTE_CHAR: &str = "\"";
pub const DEFAULT_MTIME_PATTERN: &str = r"(?P<mtime>\d{4}-\d{2}-\d{2} \d{2}:\d{2})";
pub const DEFAULT_SIZE_PATTERN: &str = r"(?P<size>\d+(?:\.\d+)?[KMGT]?)";

/// Where listing pages live and how to pick file records out of them.
///
/// An empty `mtime_pattern` or `size_pattern` disables that column. A size
/// pattern without an mtime pattern is rejected.
#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub url_template: String,
    pub file_prefix: String,
    pub entry_pattern: String,
    pub quote_char: String,
    pub mtime_pattern: String,
    pub size_pattern: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            entry_pattern: DEFAULT_ENTRY_PATTERN.to_string(),
            quote_char: DEFAULT_QUOTE_CHAR.to_string(),
            mtime_pattern: DEFAULT_MTIME_PATTERN.to_string(),
            size_pattern: DEFAULT_SIZE_PATTERN.to_string(),
        }
    }
}

impl ListingConfig {
    /// Validates the configuration and compiles the entry pattern.
    pub fn compile(&self) -> Result<ListingPattern, SyncError> {
        let has_mtime = !self.mtime_pattern.is_empty();
        let has_size = !self.size_pattern.is_empty();
        if !has_mtime && has_size {
            return Err(SyncError::Configuration(
                "a size pattern requires an mtime pattern; disable both or neither".to_string(),
            ));
        }

        // Surface template mistakes before anything touches the network.
        expand_url_template(&self.url_template, NaiveDate::MIN)?;

        let source = self
            .entry_pattern
            .replace("{quote_char}", &regex::escape(&self.quote_char))
            .replace("{file_prefix}", &regex::escape(&self.file_prefix))
            .replace("{mtime_pattern}", &self.mtime_pattern)
            .replace("{size_pattern}", &self.size_pattern);
        let regex = Regex::new(&source).map_err(|e| {
            SyncError::Configuration(format!("invalid entry pattern {:?}: {}", source, e))
        })?;

        let has_group = |group: &str| regex.capture_names().flatten().any(|n| n == group);
        let mut required = vec!["name"];
        if has_mtime {
            required.push("mtime");
        }
        if has_size {
            required.push("size");
        }
        if let Some(missing) = required.into_iter().find(|group| !has_group(group)) {
            return Err(SyncError::Configuration(format!(
                "entry pattern {:?} has no named group `{}`",
                source, missing
            )));
        }

        debug!("Compiled entry pattern: {}", source);
        Ok(ListingPattern {
            regex,
            url_template: self.url_template.clone(),
        })
    }
}

/// A validated listing configuration.
#[derive(Debug, Clone)]
pub struct ListingPattern {
    regex: Regex,
    url_template: String,
}

impl ListingPattern {
    pub fn listing_url(&self, date: NaiveDate) -> Result<String, SyncError> {
        expand_url_template(&self.url_template, date)
    }

    /// Extracts entries from one listing page, in page order.
    pub fn extract(&self, page: &str, listing_url: &str, date: NaiveDate) -> Vec<InventoryEntry> {
        let base = listing_url.trim_end_matches('/');
        self.regex
            .captures_iter(page)
            .filter_map(|caps| {
                let name = caps.name("name")?.as_str();
                let optional = |group: &str| {
                    caps.name(group)
                        .map(|m| m.as_str().trim().to_string())
                        .filter(|s| !s.is_empty())
                };
                Some(InventoryEntry {
                    date,
                    url: format!("{}/{}", base, name),
                    mtime: optional("mtime"),
                    size: optional("size"),
                })
            })
            .collect()
    }
}

/// Formats `{year}`, `{month}` and `{day}` placeholders into a URL.
///
/// Placeholders accept a width with optional zero fill, e.g. `{month:02d}`.
pub fn expand_url_template(template: &str, date: NaiveDate) -> Result<String, SyncError> {
    let mut out = String::with_capacity(template.len() + 8);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            SyncError::Configuration(format!("unclosed placeholder in {:?}", template))
        })?;
        out.push_str(&format_placeholder(&after[..close], date, template)?);
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(SyncError::Configuration(format!(
            "unmatched '}}' in {:?}",
            template
        )));
    }
    out.push_str(rest);
    Ok(out)
}

fn format_placeholder(spec: &str, date: NaiveDate, template: &str) -> Result<String, SyncError> {
    let bad = || SyncError::Configuration(format!("bad placeholder {{{}}} in {:?}", spec, template));
    let (name, format) = spec.split_once(':').unwrap_or((spec, ""));
    let value = match name {
        "year" => date.year() as i64,
        "month" => date.month() as i64,
        "day" => date.day() as i64,
        _ => return Err(bad()),
    };
    if format.is_empty() {
        return Ok(value.to_string());
    }
    let width = format.strip_suffix('d').ok_or_else(bad)?;
    let (zero_fill, width) = match width.strip_prefix('0') {
        Some(w) => (true, w),
        None => (false, width),
    };
    let width: usize = if width.is_empty() {
        0
    } else {
        width.parse().map_err(|_| bad())?
    };
    Ok(if zero_fill {
        format!("{:0width$}", value, width = width)
    } else {
        format!("{:width$}", value, width = width)
    })
}

/// Fetches listing pages and assembles the inventory.
pub struct InventoryBuilder {
    client: reqwest::Client,
    pattern: ListingPattern,
    parallelism: usize,
}

impl InventoryBuilder {
    /// Fails with a configuration error before any request is made.
    pub fn new(
        config: &ListingConfig,
        timeout: Duration,
        parallelism: usize,
    ) -> Result<Self, SyncError> {
        let pattern = config.compile()?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            pattern,
            parallelism: parallelism.max(1),
        })
    }

    /// Scrapes every day in `dates`, keeping chronological order.
    ///
    /// The first failed day aborts the build and nothing is returned.
    pub async fn build(&self, dates: &[NaiveDate]) -> Result<Inventory, SyncError> {
        info!(
            "Building inventory for {} day(s), {} listing fetch(es) at a time",
            dates.len(),
            self.parallelism
        );
        let days: Vec<Vec<InventoryEntry>> = stream::iter(dates.iter().copied())
            .map(|date| self.fetch_day(date))
            .buffered(self.parallelism)
            .try_collect()
            .await?;

        let mut inventory = Inventory::new();
        for entries in days {
            inventory.extend(entries);
        }
        info!("Inventory holds {} entries", inventory.len());
        Ok(inventory)
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<InventoryEntry>, SyncError> {
        let url = self.pattern.listing_url(date)?;
        info!("Reading listing {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::from_request(&url, e))?;
        if !resp.status().is_success() {
            return Err(SyncError::HttpStatus {
                url,
                status: resp.status().as_u16(),
            });
        }
        let page = resp
            .text()
            .await
            .map_err(|e| SyncError::from_request(&url, e))?;

        let entries = self.pattern.extract(&page, &url, date);
        info!("Found {} entries for {}", entries.len(), date);
        Ok(entries)
    }
}

/// Builds an inventory with a single-fetch-at-a-time builder.
pub async fn build_inventory(
    dates: &[NaiveDate],
    config: &ListingConfig,
    timeout: Duration,
) -> Result<Inventory, SyncError> {
    InventoryBuilder::new(config, timeout, 1)?.build(dates).await
}
