use crate::error::SyncError;
use crate::types::{Inventory, InventoryEntry};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use log::debug;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const COLUMNS: [&str; 4] = ["date", "url", "mtime", "size"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Writes the inventory as a tab-separated table with a header row.
///
/// Absent `mtime`/`size` values are written as empty fields.
pub async fn write_inventory(path: &Path, inventory: &Inventory) -> Result<(), SyncError> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    wtr.write_record(COLUMNS)?;
    for entry in inventory {
        let date = entry.date.format(DATE_FORMAT).to_string();
        wtr.write_record([
            date.as_str(),
            entry.url.as_str(),
            entry.mtime.as_deref().unwrap_or(""),
            entry.size.as_deref().unwrap_or(""),
        ])?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| SyncError::Io(e.into_error()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    debug!("Wrote {} entries to {}", inventory.len(), path.display());
    Ok(())
}

/// Reads an inventory written by [`write_inventory`].
///
/// Columns are located by header name, so their order does not matter.
pub async fn read_inventory(path: &Path) -> Result<Inventory, SyncError> {
    let mut file = File::open(path).await?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).await?;
    parse_inventory(&contents)
}

pub fn parse_inventory(contents: &str) -> Result<Inventory, SyncError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(contents.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| SyncError::Parse(format!("missing column `{}`", name)))
    };
    let [date_col, url_col, mtime_col, size_col] = [
        column(COLUMNS[0])?,
        column(COLUMNS[1])?,
        column(COLUMNS[2])?,
        column(COLUMNS[3])?,
    ];

    let mut inventory = Inventory::new();
    for (row, result) in reader.records().enumerate() {
        // header is line 1
        let line = row + 2;
        let record = result.map_err(|e| SyncError::Parse(e.to_string()))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();
        let optional = |idx: usize| Some(field(idx).to_string()).filter(|s| !s.is_empty());

        let date = NaiveDate::parse_from_str(field(date_col), DATE_FORMAT).map_err(|e| {
            SyncError::Parse(format!("line {}: bad date {:?}: {}", line, field(date_col), e))
        })?;
        let url = field(url_col);
        if url.is_empty() {
            return Err(SyncError::Parse(format!("line {}: empty url", line)));
        }

        let entry = InventoryEntry {
            date,
            url: url.to_string(),
            mtime: optional(mtime_col),
            size: optional(size_col),
        };
        debug!("Parsed entry: {:?}", entry);
        inventory.push(entry);
    }

    Ok(inventory)
}
