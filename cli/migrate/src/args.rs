//! CLI argument definitions for bucket-migrate.

use bm_cli_common::LogLevel;
use bm_cli_common::args::parse_positive_usize;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Copy every object of a source bucket into a destination bucket.
///
/// Keys are listed one page at a time and copied by a bounded pool of
/// workers. Every outcome is appended to a CSV reconciliation log.
///
/// ## Examples
///
/// Direct copy:
///   bucket-migrate -s old-bucket -d new-bucket --capacity 16
///
/// Resume an interrupted run:
///   bucket-migrate -s old-bucket -d new-bucket --recon-file run.csv --resume
///
/// Manifest expansion:
///   bucket-migrate -s manifests -d archive --mode manifest --objects-bucket raw-data
#[derive(Parser, Debug)]
#[command(name = "bucket-migrate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Buckets ===
    /// Source bucket to list
    #[arg(short, long, env = "BM_SOURCE_BUCKET")]
    pub source_bucket: String,

    /// Destination bucket
    #[arg(short, long, env = "BM_DEST_BUCKET")]
    pub dest_bucket: String,

    /// Only migrate keys under this prefix
    #[arg(short, long, env = "BM_PREFIX")]
    pub prefix: Option<String>,

    /// What to do with each listed key
    #[arg(long, value_enum, default_value = "direct")]
    pub mode: ModeArg,

    /// Bucket holding the objects referenced by manifests (manifest mode)
    #[arg(long, env = "BM_OBJECTS_BUCKET")]
    pub objects_bucket: Option<String>,

    // === Pipeline ===
    /// Maximum keys processed concurrently [default: number of CPUs]
    #[arg(short, long, value_parser = parse_positive_usize)]
    pub capacity: Option<usize>,

    /// Reconciliation log path
    #[arg(long, env = "BM_RECON_FILE", default_value = "reconciliation.csv")]
    pub recon_file: PathBuf,

    /// Skip keys the reconciliation log already records as done
    #[arg(long)]
    pub resume: bool,

    /// Keys requested per listing call
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..=1000))]
    pub page_size: Option<i32>,

    /// Stop after this many keys (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub max_keys: usize,

    // === Retry ===
    /// Retries per request after the first attempt
    #[arg(long, default_value = "9")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds
    #[arg(long, default_value = "100")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[arg(long, default_value = "20000")]
    pub max_backoff_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    pub request_timeout: u64,

    // === S3 Configuration ===
    /// Custom S3 endpoint URL (for LocalStack)
    #[arg(long, env = "BM_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// AWS access key ID
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key: Option<String>,

    /// AWS secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// AWS profile name
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    // === Output ===
    /// Print periodic progress to stderr
    #[arg(long)]
    pub progress: bool,

    /// Seconds between progress lines
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub progress_interval: u64,

    /// Print the final statistics as JSON on stdout
    #[arg(long)]
    pub json_summary: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

/// Migration mode argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Copy each key to the destination bucket
    Direct,
    /// Treat each key as a manifest of objects to fetch, then forward it
    Manifest,
}
