//! External tooling
//!
//! Provides bounded access to the host's control-plane CLIs:
//! - Command runner (argv only, per-call timeout)
//! - Retry manager (exponential backoff)

pub mod types;
pub mod process;
pub mod retry;

// Re-export commonly used types
pub use types::{CommandContext, CommandOutput};
pub use process::{CommandRunner, SystemRunner};
pub use retry::RetryManager;
