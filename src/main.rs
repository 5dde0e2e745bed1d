mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, DownloadArgs, InventoryArgs};
use colored::*;
use log::{error, info};
use mrms_sync::datespec::{resolve_range, today_utc};
use mrms_sync::downloader::{write_stats_csv, Downloader, DownloaderConfig};
use mrms_sync::inventory::{InventoryBuilder, ListingConfig};
use mrms_sync::store::{read_inventory, write_inventory};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Inventory(args) => run_inventory(args).await,
        Command::Download(args) => run_download(args).await,
    };
    if let Err(e) = &result {
        error!("{:#}", e);
        eprintln!("{} {:#}", "Failed:".red().bold(), e);
    }
    result
}

async fn run_inventory(args: InventoryArgs) -> anyhow::Result<()> {
    let dates = resolve_range(&args.start, &args.end, today_utc())?;
    info!(
        "Inventory range: {} day(s) from {:?} to {:?}",
        dates.len(),
        dates.first(),
        dates.last()
    );

    let config = ListingConfig {
        url_template: args.url,
        file_prefix: args.prefix,
        entry_pattern: args.pattern,
        quote_char: args.quote_char,
        mtime_pattern: args.mtime_pattern,
        size_pattern: args.size_pattern,
    };
    let builder = InventoryBuilder::new(
        &config,
        Duration::from_secs(args.timeout),
        args.parallelism,
    )?;
    let inventory = builder.build(&dates).await?;

    write_inventory(&args.out, &inventory)
        .await
        .with_context(|| format!("writing inventory to {}", args.out.display()))?;
    println!(
        "{} {} entries to {}",
        "Wrote".green(),
        inventory.len(),
        args.out.display()
    );
    Ok(())
}

async fn run_download(args: DownloadArgs) -> anyhow::Result<()> {
    let inventory = read_inventory(&args.inventory)
        .await
        .with_context(|| format!("reading inventory {}", args.inventory.display()))?;
    info!("Parsed {} entries from {}", inventory.len(), args.inventory.display());

    let downloader = Downloader::new(DownloaderConfig {
        parallelism: args.parallelism,
        timeout: Duration::from_secs(args.timeout),
        show_progress: !args.no_progress,
    })?;

    let cancel = downloader.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted; letting running transfers finish".yellow());
            cancel.cancel();
        }
    });

    let summary = downloader.sync(&inventory, &args.out, args.max).await?;

    if let Some(stats) = &args.stats {
        if let Err(e) = write_stats_csv(&summary, stats).await {
            error!("Failed to write stats CSV: {}", e);
        }
    }

    println!("\n{}", "Download Summary:".bold());
    println!("Transferred: {} files", summary.transferred.to_string().green());
    println!("Already present: {} files", summary.skipped);
    println!(
        "Total data transferred: {:.2} MB",
        summary.total_bytes_downloaded as f64 / 1_048_576.0
    );
    println!("Total duration: {:.2?}", summary.total_duration);
    for report in &summary.reports {
        println!(
            "✓ {} ({:?}, {:.2} MB in {:.2?})",
            report.task.output_path.display().to_string().green(),
            report.task.reason,
            report.bytes_downloaded as f64 / 1_048_576.0,
            report.duration
        );
    }
    if summary.transferred == args.max {
        println!(
            "{}",
            "Transfer limit reached; run again to continue".yellow()
        );
    }
    Ok(())
}
