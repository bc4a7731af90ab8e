//! End-to-end migration tests against LocalStack.

use crate::common::{LocalStackTestContext, unique_bucket};
use bm_pipeline::{CancellationFlag, MigrationMode, PipelineConfig, RetryConfig, migrate};
use bm_traits::ObjectStore;
use std::sync::Arc;
use tempfile::TempDir;

async fn context() -> Option<LocalStackTestContext> {
    let ctx = LocalStackTestContext::new().await;
    if !ctx.is_available().await {
        eprintln!("LocalStack not available, skipping test");
        return None;
    }
    Some(ctx)
}

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .with_max_retries(2)
        .with_initial_backoff_ms(10)
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_migrate_bucket_across_pages() {
    let Some(ctx) = context().await else { return };
    let source = unique_bucket("bm-src");
    let dest = unique_bucket("bm-dst");
    ctx.create_bucket(&source).await.unwrap();
    ctx.create_bucket(&dest).await.unwrap();

    let mut keys: Vec<String> = (0..7).map(|i| format!("data/file-{i}.txt")).collect();
    for key in &keys {
        ctx.put(&source, key, key).await.unwrap();
    }
    ctx.put(&source, "data/", "").await.unwrap();
    keys.insert(0, "data/".to_string());

    let dir = TempDir::new().unwrap();
    let recon = dir.path().join("recon.csv");
    let config = PipelineConfig::new(&source, &dest)
        .with_capacity(3)
        .with_page_size(2)
        .with_recon_path(&recon)
        .with_retry(fast_retry());
    let store: Arc<dyn ObjectStore> = Arc::new(ctx.store().await);

    let stats = migrate(config, store, CancellationFlag::new())
        .await
        .unwrap();

    assert_eq!(stats.keys_succeeded, 8);
    assert_eq!(stats.keys_failed, 0);
    assert_eq!(stats.pages_listed, 4);

    let mut copied = ctx.list_keys(&dest).await.unwrap();
    copied.sort();
    assert_eq!(copied, keys);
    assert_eq!(
        ctx.get(&dest, "data/file-3.txt").await.as_deref(),
        Some("data/file-3.txt")
    );

    let log = std::fs::read_to_string(&recon).unwrap();
    let mut lines = log.lines();
    assert_eq!(lines.next(), Some("Key,Status,Reason"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 8);
    assert_eq!(rows[0], "data/,Success,");
    assert!(rows.iter().all(|r| r.ends_with(",Success,")));
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_missing_destination_bucket_recorded_as_failures() {
    let Some(ctx) = context().await else { return };
    let source = unique_bucket("bm-src");
    ctx.create_bucket(&source).await.unwrap();
    ctx.put(&source, "a.txt", "a").await.unwrap();

    let dir = TempDir::new().unwrap();
    let recon = dir.path().join("recon.csv");
    let config = PipelineConfig::new(&source, unique_bucket("bm-absent"))
        .with_capacity(2)
        .with_recon_path(&recon)
        .with_retry(fast_retry());
    let store: Arc<dyn ObjectStore> = Arc::new(ctx.store().await);

    let stats = migrate(config, store, CancellationFlag::new())
        .await
        .unwrap();

    assert_eq!(stats.keys_failed, 1);
    let log = std::fs::read_to_string(&recon).unwrap();
    assert!(log.contains("a.txt,Failure,not found"));
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_missing_source_bucket_is_fatal() {
    let Some(ctx) = context().await else { return };
    let dir = TempDir::new().unwrap();
    let recon = dir.path().join("recon.csv");
    let config = PipelineConfig::new(unique_bucket("bm-absent"), unique_bucket("bm-dst"))
        .with_recon_path(&recon)
        .with_retry(fast_retry());
    let store: Arc<dyn ObjectStore> = Arc::new(ctx.store().await);

    let result = migrate(config, store, CancellationFlag::new()).await;

    assert!(result.is_err());
    assert_eq!(
        std::fs::read_to_string(&recon).unwrap(),
        "Key,Status,Reason\n"
    );
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_resume_skips_recorded_keys() {
    let Some(ctx) = context().await else { return };
    let source = unique_bucket("bm-src");
    let dest = unique_bucket("bm-dst");
    ctx.create_bucket(&source).await.unwrap();
    ctx.create_bucket(&dest).await.unwrap();
    for key in ["a.txt", "b.txt", "c.txt"] {
        ctx.put(&source, key, key).await.unwrap();
    }

    let dir = TempDir::new().unwrap();
    let recon = dir.path().join("recon.csv");
    std::fs::write(&recon, "Key,Status,Reason\na.txt,Success,\n").unwrap();

    let config = PipelineConfig::new(&source, &dest)
        .with_recon_path(&recon)
        .with_resume(true)
        .with_retry(fast_retry());
    let store: Arc<dyn ObjectStore> = Arc::new(ctx.store().await);

    let stats = migrate(config, store, CancellationFlag::new())
        .await
        .unwrap();

    assert_eq!(stats.keys_skipped, 1);
    assert_eq!(stats.keys_succeeded, 2);
    assert_eq!(
        std::fs::read_to_string(&recon).unwrap(),
        "Key,Status,Reason\na.txt,Success,\nb.txt,Success,\nc.txt,Success,\n"
    );
    assert!(ctx.get(&dest, "a.txt").await.is_none());
}

#[tokio::test]
#[ignore = "requires LocalStack"]
async fn test_manifest_expansion() {
    let Some(ctx) = context().await else { return };
    let manifests = unique_bucket("bm-manifests");
    let objects = unique_bucket("bm-objects");
    let archive = unique_bucket("bm-archive");
    for bucket in [&manifests, &objects, &archive] {
        ctx.create_bucket(bucket).await.unwrap();
    }
    ctx.put(&objects, "o/1.bin", "1").await.unwrap();
    ctx.put(&objects, "o/2.bin", "2").await.unwrap();
    ctx.put(&manifests, "batch-1.txt", "o/1.bin\no/2.bin\no/missing.bin\n")
        .await
        .unwrap();

    let dir = TempDir::new().unwrap();
    let recon = dir.path().join("manifests.csv");
    let config = PipelineConfig::new(&manifests, &archive)
        .with_mode(MigrationMode::Manifest {
            objects_bucket: objects.clone(),
        })
        .with_recon_path(&recon)
        .with_retry(fast_retry());
    let store: Arc<dyn ObjectStore> = Arc::new(ctx.store().await);

    let stats = migrate(config, store, CancellationFlag::new())
        .await
        .unwrap();

    assert_eq!(stats.manifest_lines, 3);
    assert_eq!(stats.downloads_succeeded, 2);
    assert_eq!(
        std::fs::read_to_string(&recon).unwrap(),
        "FileName,TotalLines,SuccessfulDownloads\nbatch-1.txt,3,2\n"
    );
    assert!(ctx.get(&archive, "batch-1.txt").await.is_some());
}
