//! Rows of the reconciliation log.

use crate::{CopyOutcome, CopyStatus, ManifestOutcome, ObjectKey};
use serde::{Deserialize, Serialize};

/// Layout of the reconciliation log, one per migration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// `Key,Status,Reason`
    Direct,

    /// `FileName,TotalLines,SuccessfulDownloads`
    Manifest,
}

impl RecordFormat {
    /// Header row written when the log is created.
    pub fn header(&self) -> [&'static str; 3] {
        match self {
            RecordFormat::Direct => ["Key", "Status", "Reason"],
            RecordFormat::Manifest => ["FileName", "TotalLines", "SuccessfulDownloads"],
        }
    }

    /// Key of a row that counts as done when resuming, if it does.
    ///
    /// Direct logs only treat `Success` rows as done. Failed manifests carry a
    /// trailing reason after the three header columns, so only rows with
    /// exactly three fields and numeric counts are done. Failed keys of either
    /// layout are retried.
    pub fn completed_key<'a>(&self, row: &[&'a str]) -> Option<&'a str> {
        let key = row.first().copied().filter(|k| !k.is_empty())?;
        match self {
            RecordFormat::Direct => (row.get(1).copied() == Some(STATUS_SUCCESS)).then_some(key),
            RecordFormat::Manifest => (row.len() == 3
                && row[1..].iter().all(|f| f.parse::<u64>().is_ok()))
            .then_some(key),
        }
    }
}

const STATUS_SUCCESS: &str = "Success";
const STATUS_FAILURE: &str = "Failure";

/// Persisted projection of one outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationRecord {
    /// Direct-copy row
    Copy(CopyOutcome),

    /// Manifest-expansion row
    Manifest(ManifestOutcome),
}

impl ReconciliationRecord {
    /// Key this row is about.
    pub fn key(&self) -> &ObjectKey {
        match self {
            ReconciliationRecord::Copy(o) => &o.key,
            ReconciliationRecord::Manifest(o) => &o.file_key,
        }
    }

    /// Log layout this row belongs to.
    pub fn format(&self) -> RecordFormat {
        match self {
            ReconciliationRecord::Copy(_) => RecordFormat::Direct,
            ReconciliationRecord::Manifest(_) => RecordFormat::Manifest,
        }
    }

    /// Whether the underlying work succeeded.
    pub fn is_success(&self) -> bool {
        match self {
            ReconciliationRecord::Copy(o) => o.is_success(),
            ReconciliationRecord::Manifest(o) => o.is_success(),
        }
    }

    /// Column values in header order.
    ///
    /// A failed manifest appends its reason as a fourth field.
    pub fn fields(&self) -> Vec<String> {
        match self {
            ReconciliationRecord::Copy(o) => {
                let (status, reason) = match &o.status {
                    CopyStatus::Success => (STATUS_SUCCESS, String::new()),
                    CopyStatus::Failure(reason) => (STATUS_FAILURE, reason.clone()),
                };
                vec![o.key.to_string(), status.to_string(), reason]
            }
            ReconciliationRecord::Manifest(o) => {
                let mut fields = vec![
                    o.file_key.to_string(),
                    o.total_lines.to_string(),
                    o.successful_downloads.to_string(),
                ];
                if let CopyStatus::Failure(reason) = &o.status {
                    fields.push(reason.clone());
                }
                fields
            }
        }
    }
}

impl From<CopyOutcome> for ReconciliationRecord {
    fn from(outcome: CopyOutcome) -> Self {
        ReconciliationRecord::Copy(outcome)
    }
}

impl From<ManifestOutcome> for ReconciliationRecord {
    fn from(outcome: ManifestOutcome) -> Self {
        ReconciliationRecord::Manifest(outcome)
    }
}
