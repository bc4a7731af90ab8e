//! Integration tests for bucket-migrate.
//!
//! These tests require LocalStack to be running. They are marked as `#[ignore]`
//! so a plain `cargo test` skips them.
//!
//! ## Running Integration Tests
//!
//! 1. Start LocalStack:
//!    ```bash
//!    docker run -d -p 4566:4566 localstack/localstack
//!    ```
//!
//! 2. Run the integration tests:
//!    ```bash
//!    LOCALSTACK_ENDPOINT=http://localhost:4566 cargo test -p integration-tests -- --ignored
//!    ```

mod common;
mod migrate_test;
mod store_test;
