//! Core types for bucket-migrate.
//!
//! This crate provides the foundational types used throughout the system:
//! - [`ObjectKey`] and [`Page`] - what the key lister produces
//! - [`CopyOutcome`] and [`ManifestOutcome`] - the terminal result for one key
//! - [`ReconciliationRecord`] - the row persisted to the reconciliation log

pub mod key;
pub mod outcome;
pub mod record;

pub use key::*;
pub use outcome::*;
pub use record::*;
