//! Convergence Tracker v0.3.0 - OVN control-plane convergence detection
//!
//! Polls the logical flow count of the southbound database and the OpenFlow
//! count of the integration bridge until both stop moving, then reports how
//! long the control plane took to settle.
//!
//! # Architecture
//!
//! - **Detection**: noise-tolerant dual-channel convergence detector
//! - **Collection**: OVN/OVS metric probes behind a command runner
//! - **Reporting**: result documents indexed into OpenSearch
//! - **Health**: post-run log scan for inactivity-probe disconnects

// Core detection
pub mod errors;
pub mod analysis;
pub mod metrics;
pub mod tools;

// Re-export commonly used types
pub use errors::{Result, TrackerError};

// Host integration
pub mod telemetry;
pub mod bootstrap;
pub mod health;
pub mod reporting;
pub mod cli;
pub mod config;

// Shared run pipeline for the CLI commands
pub mod execution;
