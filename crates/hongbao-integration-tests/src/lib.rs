//! Integration test crate for the hongbao distribution pipeline.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise end-to-end distribution flows across multiple workspace
//! crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p hongbao-integration-tests -- --ignored
//! ```
