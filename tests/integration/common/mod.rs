//! Shared LocalStack test infrastructure.

pub mod localstack;

pub use localstack::{LocalStackTestContext, unique_bucket};
