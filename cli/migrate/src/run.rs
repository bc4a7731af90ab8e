//! Main execution logic for the bucket-migrate CLI.

use anyhow::{Result, anyhow};
use bm_pipeline::{
    CancellationFlag, MigrationMode, MigrationStats, PipelineConfig, RetryConfig, StatsSnapshot,
    migrate_with_stats,
};
use bm_store_s3::{S3Config, S3Store};
use bm_traits::ObjectStore;
use std::sync::Arc;
use tracing::warn;

use crate::args::{Cli, ModeArg};
use crate::progress::ProgressReporter;

/// Exit code used when the run was interrupted.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit code for a fatal listing, recorder or configuration error.
pub const EXIT_FAILURE: i32 = 1;

/// Process exit code for a finished run.
///
/// Per-key failures are recorded, not fatal, and still exit 0.
pub fn exit_code(result: &Result<StatsSnapshot>) -> i32 {
    match result {
        Ok(stats) if stats.interrupted => EXIT_INTERRUPTED,
        Ok(_) => 0,
        Err(_) => EXIT_FAILURE,
    }
}

/// Execute a migration with the provided arguments.
pub async fn execute(args: Cli) -> Result<StatsSnapshot> {
    let config = build_pipeline_config(&args)?;
    config.validate().map_err(|e| anyhow!("Invalid configuration: {e}"))?;

    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::from_config(&build_s3_config(&args)).await);

    let cancel = CancellationFlag::new();
    listen_for_interrupt(cancel.clone());

    let stats = Arc::new(MigrationStats::new());
    let mut progress = ProgressReporter::new(args.progress, args.progress_interval, stats.clone());
    progress.start();

    let result = migrate_with_stats(config, store, cancel, stats).await;
    progress.stop().await;

    Ok(result?)
}

/// Build the pipeline configuration from CLI arguments.
pub fn build_pipeline_config(args: &Cli) -> Result<PipelineConfig> {
    let mode = match args.mode {
        ModeArg::Direct => MigrationMode::Direct,
        ModeArg::Manifest => MigrationMode::Manifest {
            objects_bucket: args
                .objects_bucket
                .clone()
                .ok_or_else(|| anyhow!("--objects-bucket is required when --mode=manifest"))?,
        },
    };

    let retry = RetryConfig::new()
        .with_max_retries(args.max_retries)
        .with_initial_backoff_ms(args.initial_backoff_ms)
        .with_max_backoff_ms(args.max_backoff_ms);

    let mut config = PipelineConfig::new(&args.source_bucket, &args.dest_bucket)
        .with_mode(mode)
        .with_recon_path(&args.recon_file)
        .with_resume(args.resume)
        .with_max_keys(args.max_keys)
        .with_retry(retry);

    if let Some(prefix) = &args.prefix {
        config = config.with_prefix(prefix);
    }
    if let Some(capacity) = args.capacity {
        config = config.with_capacity(capacity);
    }
    if let Some(page_size) = args.page_size {
        config = config.with_page_size(page_size);
    }

    Ok(config)
}

fn build_s3_config(args: &Cli) -> S3Config {
    let mut s3_config = S3Config::new()
        .with_region(&args.region)
        .with_timeout(args.request_timeout);

    if let Some(endpoint) = &args.s3_endpoint {
        s3_config = s3_config.with_endpoint(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&args.access_key, &args.secret_key) {
        s3_config = s3_config.with_credentials(access_key, secret_key);
    }

    if let Some(profile) = &args.profile {
        s3_config = s3_config.with_profile(profile);
    }

    s3_config
}

/// First Ctrl-C stops admitting keys; a second one exits immediately.
fn listen_for_interrupt(cancel: CancellationFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, finishing in-flight keys (press Ctrl-C again to abort)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Aborted; keys in flight were not recorded");
            std::process::exit(EXIT_INTERRUPTED);
        }
    });
}
