//! Result reporting
//!
//! Builds the tracker's documents and indexes them with bounded retries.

pub mod backend;
pub mod document;
pub mod reporter;

pub use backend::{IndexBackend, OpenSearchBackend};
pub use document::{InfoDocument, ResultDocument, RunIdentity};
pub use reporter::Reporter;
