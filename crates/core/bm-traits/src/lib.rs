//! Core traits for bucket-migrate.
//!
//! This crate defines the seams the pipeline is built against:
//! - [`ObjectStore`] - single-attempt remote listing, copy, get and put
//! - [`RecordSink`] - durable destination for reconciliation records

pub mod sink;
pub mod store;

pub use sink::RecordSink;
pub use store::{ListPage, ListRequest, ObjectStore};
