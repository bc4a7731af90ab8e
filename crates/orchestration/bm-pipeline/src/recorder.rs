//! Append-only CSV reconciliation log.

use async_trait::async_trait;
use bm_error::{RecorderError, Result};
use bm_traits::RecordSink;
use bm_types::{ObjectKey, RecordFormat, ReconciliationRecord};
use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Durable, append-only record of per-key outcomes.
///
/// Every row is written and synced to disk before [`RecordSink::record`]
/// returns. Appends are serialized through a mutex so concurrent callers never
/// interleave partial lines. An existing log is reopened in append mode and
/// never truncated.
#[derive(Debug)]
pub struct ReconciliationRecorder {
    path: PathBuf,
    format: RecordFormat,
    file: Mutex<File>,
    recorded: AtomicU64,
}

impl ReconciliationRecorder {
    /// Open or create the log at `path`.
    ///
    /// A new or empty file gets the header for `format`. An existing log must
    /// carry that same header.
    pub async fn open(path: impl Into<PathBuf>, format: RecordFormat) -> Result<Self> {
        let path = path.into();
        let open_error = |e: std::io::Error| RecorderError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(open_error)?;
        let len = file.metadata().await.map_err(open_error)?.len();

        if len == 0 {
            let header = encode_row(&format.header()).map_err(|message| RecorderError::Open {
                path: path.display().to_string(),
                message,
            })?;
            file.write_all(&header).await.map_err(open_error)?;
            file.flush().await.map_err(open_error)?;
            file.sync_data().await.map_err(open_error)?;
            info!(path = %path.display(), "Created reconciliation log");
        } else {
            let mut first_line = String::new();
            BufReader::new(&mut file)
                .read_line(&mut first_line)
                .await
                .map_err(open_error)?;
            let expected = format.header().join(",");
            if first_line.trim_end() != expected {
                return Err(RecorderError::Open {
                    path: path.display().to_string(),
                    message: format!(
                        "existing header {:?} does not match {:?}",
                        first_line.trim_end(),
                        expected
                    ),
                }
                .into());
            }

            // A crash can leave a partial last line; start the next row on a fresh one.
            file.seek(SeekFrom::Start(len - 1))
                .await
                .map_err(open_error)?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last).await.map_err(open_error)?;
            if last[0] != b'\n' {
                file.write_all(b"\n").await.map_err(open_error)?;
                file.flush().await.map_err(open_error)?;
                file.sync_data().await.map_err(open_error)?;
            }
            info!(path = %path.display(), bytes = len, "Appending to existing reconciliation log");
        }

        Ok(Self {
            path,
            format,
            file: Mutex::new(file),
            recorded: AtomicU64::new(0),
        })
    }

    fn append_error(&self, message: impl Into<String>) -> RecorderError {
        RecorderError::Append {
            path: self.path.display().to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl RecordSink for ReconciliationRecorder {
    async fn record(&self, record: &ReconciliationRecord) -> Result<()> {
        if record.format() != self.format {
            return Err(self
                .append_error(format!(
                    "{:?} record written to {:?} log",
                    record.format(),
                    self.format
                ))
                .into());
        }

        let row = encode_row(&record.fields()).map_err(|m| self.append_error(m))?;

        let mut file = self.file.lock().await;
        file.write_all(&row)
            .await
            .map_err(|e| self.append_error(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| self.append_error(e.to_string()))?;
        file.sync_data()
            .await
            .map_err(|e| self.append_error(e.to_string()))?;
        drop(file);

        self.recorded.fetch_add(1, Ordering::Relaxed);
        debug!(key = %record.key(), "Recorded outcome");
        Ok(())
    }

    fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }
}

/// One CSV line, quoted as needed, terminated by `\n`.
fn encode_row<S: AsRef<[u8]>>(fields: &[S]) -> std::result::Result<Vec<u8>, String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields).map_err(|e| e.to_string())?;
    writer.into_inner().map_err(|e| e.error().to_string())
}

/// Keys an existing log marks as done, used to resume a run.
///
/// A missing log yields no keys. Direct logs count only `Success` rows, so
/// failed keys are attempted again.
pub fn completed_keys(path: &Path, format: RecordFormat) -> Result<HashSet<ObjectKey>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let read_error = |message: String| RecorderError::Read {
        path: path.display().to_string(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| read_error(e.to_string()))?;

    let headers = reader.headers().map_err(|e| read_error(e.to_string()))?;
    if !headers.is_empty() && headers.iter().ne(format.header()) {
        return Err(read_error(format!(
            "header {:?} does not match {:?} log",
            headers.iter().collect::<Vec<_>>(),
            format
        ))
        .into());
    }

    let mut keys = HashSet::new();
    for row in reader.records() {
        let row = row.map_err(|e| read_error(e.to_string()))?;
        let fields: Vec<&str> = row.iter().collect();
        if let Some(key) = format.completed_key(&fields) {
            keys.insert(ObjectKey::from(key));
        }
    }

    debug!(path = %path.display(), keys = keys.len(), "Loaded completed keys");
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bm_types::{CopyOutcome, ManifestOutcome};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn success(key: &str) -> ReconciliationRecord {
        CopyOutcome::success(key.into(), 1).into()
    }

    fn failure(key: &str, reason: &str) -> ReconciliationRecord {
        CopyOutcome::failure(key.into(), reason, 1).into()
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recon.csv");

        let recorder = ReconciliationRecorder::open(&path, RecordFormat::Direct)
            .await
            .unwrap();
        recorder.record(&success("a.txt")).await.unwrap();
        recorder
            .record(&failure("missing.txt", "not found"))
            .await
            .unwrap();
        drop(recorder);

        let recorder = ReconciliationRecorder::open(&path, RecordFormat::Direct)
            .await
            .unwrap();
        recorder.record(&success("b.txt")).await.unwrap();
        assert_eq!(recorder.recorded(), 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Key,Status,Reason\na.txt,Success,\nmissing.txt,Failure,not found\nb.txt,Success,\n"
        );
    }

    #[tokio::test]
    async fn test_manifest_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifests.csv");

        let recorder = ReconciliationRecorder::open(&path, RecordFormat::Manifest)
            .await
            .unwrap();
        recorder
            .record(&ManifestOutcome::completed("batch-1.txt".into(), 3, 2, 1).into())
            .await
            .unwrap();
        recorder
            .record(&ManifestOutcome::failed("batch-2.txt".into(), 0, 0, "not found", 1).into())
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "FileName,TotalLines,SuccessfulDownloads\nbatch-1.txt,3,2\nbatch-2.txt,0,0,not found\n"
        );

        let done = completed_keys(&path, RecordFormat::Manifest).unwrap();
        assert_eq!(done, HashSet::from([ObjectKey::from("batch-1.txt")]));
    }

    #[tokio::test]
    async fn test_keys_with_commas_quoted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recon.csv");

        let recorder = ReconciliationRecorder::open(&path, RecordFormat::Direct)
            .await
            .unwrap();
        recorder.record(&success("a,b \"c\".txt")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("\"a,b \"\"c\"\".txt\",Success,\n"));

        let done = completed_keys(&path, RecordFormat::Direct).unwrap();
        assert!(done.contains(&ObjectKey::from("a,b \"c\".txt")));
    }

    #[tokio::test]
    async fn test_partial_last_line_repaired() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recon.csv");
        std::fs::write(&path, "Key,Status,Reason\na.txt,Success,\nb.t").unwrap();

        let recorder = ReconciliationRecorder::open(&path, RecordFormat::Direct)
            .await
            .unwrap();
        recorder.record(&success("c.txt")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Key,Status,Reason\na.txt,Success,\nb.t\nc.txt,Success,\n"
        );
    }

    #[tokio::test]
    async fn test_mismatched_header_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recon.csv");
        std::fs::write(&path, "FileName,TotalLines,SuccessfulDownloads\n").unwrap();

        let result = ReconciliationRecorder::open(&path, RecordFormat::Direct).await;
        assert!(result.is_err());
        // Untouched.
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "FileName,TotalLines,SuccessfulDownloads\n"
        );
    }

    #[tokio::test]
    async fn test_wrong_record_format_rejected() {
        let dir = TempDir::new().unwrap();
        let recorder =
            ReconciliationRecorder::open(dir.path().join("recon.csv"), RecordFormat::Manifest)
                .await
                .unwrap();

        assert!(recorder.record(&success("a.txt")).await.is_err());
        assert_eq!(recorder.recorded(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recon.csv");
        let recorder = Arc::new(
            ReconciliationRecorder::open(&path, RecordFormat::Direct)
                .await
                .unwrap(),
        );

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    recorder
                        .record(&failure(&format!("key-{i}"), "throttled"))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().skip(1).collect();
        assert_eq!(lines.len(), 50);
        assert!(
            lines
                .iter()
                .all(|l| l.starts_with("key-") && l.ends_with(",Failure,throttled"))
        );
    }

    #[test]
    fn test_completed_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recon.csv");
        std::fs::write(
            &path,
            "Key,Status,Reason\na.txt,Success,\nmissing.txt,Failure,not found\nb.txt,Success,\n",
        )
        .unwrap();

        let done = completed_keys(&path, RecordFormat::Direct).unwrap();
        assert_eq!(done.len(), 2);
        assert!(done.contains(&ObjectKey::from("a.txt")));
        assert!(!done.contains(&ObjectKey::from("missing.txt")));

        assert!(completed_keys(&path, RecordFormat::Manifest).is_err());
        assert!(
            completed_keys(&dir.path().join("absent.csv"), RecordFormat::Direct)
                .unwrap()
                .is_empty()
        );
    }
}
