//! Incremental mirroring of date-partitioned remote archives.
//!
//! Listing pages are scraped day by day into an [`Inventory`], which can be
//! persisted with [`store`] and later handed to the [`Downloader`] to fetch
//! the files that are missing or whose size disagrees with the listing.

pub mod datespec;
pub mod downloader;
pub mod error;
pub mod inventory;
pub mod size;
pub mod store;
pub mod types;

pub use datespec::{resolve_range, DateSpec};
pub use downloader::{Downloader, DownloaderConfig};
pub use error::SyncError;
pub use inventory::{InventoryBuilder, ListingConfig};
pub use types::{DownloadDecision, Inventory, InventoryEntry, SyncSummary};
