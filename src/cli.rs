use clap::{Args, Parser, Subcommand};
use mrms_sync::datespec::DateSpec;
use mrms_sync::downloader::DEFAULT_MAX_TRANSFERS;
use mrms_sync::inventory::{
    DEFAULT_ENTRY_PATTERN, DEFAULT_FILE_PREFIX, DEFAULT_MTIME_PATTERN, DEFAULT_QUOTE_CHAR,
    DEFAULT_SIZE_PATTERN, DEFAULT_URL_TEMPLATE,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inventory and mirror daily archive listings", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape listing pages for a range of days into an inventory file
    Inventory(InventoryArgs),
    /// Fetch inventory files that are missing or have the wrong size
    Download(DownloadArgs),
}

#[derive(Args, Debug)]
pub struct InventoryArgs {
    /// First day: YYYY-MM-DD, days relative to the end date, or @unix-seconds
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub start: DateSpec,

    /// Last day: YYYY-MM-DD, days relative to today, or @unix-seconds
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub end: DateSpec,

    /// Output inventory file
    pub out: PathBuf,

    /// Listing URL template with {year}, {month} and {day} placeholders
    #[arg(long, default_value = DEFAULT_URL_TEMPLATE)]
    pub url: String,

    /// Prefix of the file names to collect
    #[arg(long, default_value = DEFAULT_FILE_PREFIX)]
    pub prefix: String,

    /// Entry pattern template
    #[arg(long, default_value = DEFAULT_ENTRY_PATTERN)]
    pub pattern: String,

    /// Quote character around href values
    #[arg(long, default_value = DEFAULT_QUOTE_CHAR)]
    pub quote_char: String,

    /// Last-modified pattern with a `mtime` group; empty disables it
    #[arg(long, default_value = DEFAULT_MTIME_PATTERN)]
    pub mtime_pattern: String,

    /// Size pattern with a `size` group; empty disables it
    #[arg(long, default_value = DEFAULT_SIZE_PATTERN)]
    pub size_pattern: String,

    /// Number of listing pages fetched concurrently
    #[arg(short, long, default_value = "1")]
    pub parallelism: usize,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "60")]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Inventory file describing files to download
    #[arg(short, long, default_value = "inv")]
    pub inventory: PathBuf,

    /// Root of the output tree; files land under YYYY/MM/DD
    #[arg(short, long)]
    pub out: PathBuf,

    /// Maximum number of files to transfer in this run
    #[arg(short, long, default_value_t = DEFAULT_MAX_TRANSFERS)]
    pub max: usize,

    /// Number of concurrent downloads
    #[arg(short, long, default_value = "1")]
    pub parallelism: usize,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "60")]
    pub timeout: u64,

    /// Write per-file transfer statistics to this CSV file
    #[arg(long)]
    pub stats: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
}
