//! unstuck core library
//!
//! This library provides the machinery behind the `unstuck` CLI:
//! - Cluster access through `kubectl` and an in-memory fake
//! - Detectors for stuck namespaces, CRDs, and generic resources
//! - The escalating remediation planner and action orderer
//! - The sequential applier with confirmation, verification, and deadlines
//! - Text/JSON/YAML rendering, JSON schemas, and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod logging;

pub mod action;
pub mod detect;
pub mod exit_codes;
pub mod kube;
pub mod output;
pub mod plan;
pub mod schema;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
