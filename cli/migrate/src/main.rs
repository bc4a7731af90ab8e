//! bucket-migrate CLI
//!
//! Copies every object of one bucket into another and records each outcome.

use bm_cli_common::{format_duration, format_number, init_logging};
use bm_pipeline::StatsSnapshot;
use clap::Parser;
use std::path::Path;

mod args;
mod progress;
mod run;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    init_logging(args.log_level)?;

    let json_summary = args.json_summary;
    let recon_file = args.recon_file.clone();

    let result = run::execute(args).await;
    let code = run::exit_code(&result);

    match &result {
        Ok(stats) => {
            if json_summary {
                println!("{}", serde_json::to_string_pretty(stats)?);
            }
            print_summary(stats, &recon_file);
        }
        Err(e) => eprintln!("Error: {e:#}"),
    }

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}

fn print_summary(stats: &StatsSnapshot, recon_file: &Path) {
    eprintln!();
    if stats.interrupted {
        eprintln!("Migration interrupted:");
    } else {
        eprintln!("Migration completed:");
    }
    eprintln!("  Pages listed:     {}", format_number(stats.pages_listed));
    eprintln!("  Keys listed:      {}", format_number(stats.keys_listed));
    eprintln!("  Keys skipped:     {}", format_number(stats.keys_skipped));
    eprintln!("  Keys succeeded:   {}", format_number(stats.keys_succeeded));
    eprintln!("  Keys failed:      {}", format_number(stats.keys_failed));
    eprintln!("  Retries:          {}", format_number(stats.retries));
    if stats.manifest_lines > 0 {
        eprintln!("  Manifest lines:   {}", format_number(stats.manifest_lines));
        eprintln!(
            "  Downloads:        {}",
            format_number(stats.downloads_succeeded)
        );
    }
    eprintln!("  Peak in flight:   {}", stats.peak_in_flight);
    eprintln!("  Reconciliation:   {}", recon_file.display());

    if let Some(duration) = stats.duration() {
        eprintln!(
            "  Duration:         {}",
            format_duration(duration.to_std().unwrap_or_default())
        );
        if let Some(kps) = stats.keys_per_second() {
            eprintln!("  Throughput:       {:.1} keys/sec", kps);
        }
    }
}
