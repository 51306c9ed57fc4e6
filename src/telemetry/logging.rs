//! Log subscriber setup
//!
//! `RUST_LOG` overrides the level derived from CLI verbosity.

use crate::errors::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human oriented
    Pretty,

    /// One line per event
    #[default]
    Compact,

    /// Newline-delimited JSON for log shippers
    Json,
}

impl FromStr for LogFormat {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(TrackerError::ConfigError(format!(
                "unknown log format `{}` (expected pretty, compact or json)",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_logging(format: LogFormat, level: LevelFilter) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(subscriber_fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Compact => registry
            .with(subscriber_fmt::layer().compact().with_target(false))
            .try_init(),
        LogFormat::Pretty => registry
            .with(subscriber_fmt::layer().pretty().with_target(true))
            .try_init(),
    };

    installed.map_err(|e| TrackerError::ConfigError(format!("failed to set logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_is_compact() {
        assert_eq!(LogFormat::default(), LogFormat::Compact);
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }
}
