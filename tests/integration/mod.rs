//! Integration test suite for updatectl
//!
//! End-to-end tests against a mock backend. Every test starts its own
//! `wiremock` server and temporary download directory, so they run in
//! parallel.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **gating**: Startup check, fail-open fallback and the sticky force gate
//! - **package**: Download sessions, release-page resolution, cancellation, install
//! - **bundle**: Over-the-air bundle check and apply
//! - **cli**: The `updatectl` binary and its exit statuses

mod bundle;
mod cli;
mod common;
mod gating;
mod package;
