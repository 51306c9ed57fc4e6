//! Command-line argument parsing for the tracker
//!
//! Provides clap-based CLI with subcommands and verbosity control. Flags
//! override the config file and environment.

use crate::config::TrackerConfig;
use crate::telemetry::LogFormat;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Watch OVN flow counts until they settle after a change
#[derive(Parser, Debug)]
#[command(name = "convergence-tracker")]
#[command(version)]
#[command(about = "Watch an OVN control plane settle and report when its flow counts converge", long_about = None)]
pub struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seconds between polls
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Seconds without significant change required to call it converged
    #[arg(long)]
    pub convergence_period: Option<u64>,

    /// Extra seconds to wait, on top of the period, before giving up
    #[arg(long)]
    pub convergence_timeout: Option<u64>,

    /// Node name used in logs and documents
    #[arg(long)]
    pub node_name: Option<String>,

    /// Log format: pretty, compact or json
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Exit after the run instead of idling until shutdown
    #[arg(long)]
    pub no_idle: bool,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run detection and report the result (default)
    Track,

    /// Read both flow counts once and print them
    Probe,

    /// Scan component logs for inactivity-probe disconnects
    Health {
        /// Only flag lines after this RFC 3339 time (default: all)
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },

    /// Display effective configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Subcommand to run, `track` when none was given
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Track)
    }

    /// Overlay flags onto configuration
    pub fn apply_to(&self, config: &mut TrackerConfig) {
        if let Some(poll_interval) = self.poll_interval {
            config.tracking.poll_interval = poll_interval;
        }
        if let Some(period) = self.convergence_period {
            config.tracking.convergence_period = Some(period);
        }
        if let Some(timeout) = self.convergence_timeout {
            config.tracking.convergence_timeout = Some(timeout);
        }
        if let Some(node_name) = &self.node_name {
            config.run.node_name = node_name.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Default log level for this verbosity
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::WARN,
            Verbosity::Normal => LevelFilter::INFO,
            Verbosity::Verbose => LevelFilter::DEBUG,
            Verbosity::VeryVerbose => LevelFilter::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_quiet() {
        let args = Args::parse_from(["convergence-tracker", "-q"]);
        assert_eq!(args.verbosity(), Verbosity::Quiet);
        assert_eq!(args.verbosity().level_filter(), LevelFilter::WARN);
    }

    #[test]
    fn test_verbosity_normal() {
        let args = Args::parse_from(["convergence-tracker"]);
        assert_eq!(args.verbosity(), Verbosity::Normal);
        assert_eq!(args.verbosity().as_str(), "normal");
    }

    #[test]
    fn test_verbosity_very_verbose() {
        let args = Args::parse_from(["convergence-tracker", "-vv"]);
        assert_eq!(args.verbosity(), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_default_command_is_track() {
        let args = Args::parse_from(["convergence-tracker"]);
        assert_eq!(args.command(), Commands::Track);
    }

    #[test]
    fn test_health_since() {
        let args = Args::parse_from([
            "convergence-tracker",
            "health",
            "--since",
            "2024-05-01T10:00:00Z",
        ]);
        match args.command() {
            Commands::Health { since } => {
                assert_eq!(since.unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "convergence-tracker",
            "--convergence-period",
            "30",
            "--convergence-timeout",
            "120",
            "--node-name",
            "worker-2",
            "--log-format",
            "json",
        ]);
        let mut config = TrackerConfig::default();
        config.tracking.convergence_period = Some(999);
        args.apply_to(&mut config);

        assert_eq!(config.tracking.convergence_period, Some(30));
        assert_eq!(config.tracking.convergence_timeout, Some(120));
        assert_eq!(config.run.node_name, "worker-2");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.tracking.poll_interval, 5);
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let result = Args::try_parse_from(["convergence-tracker", "--log-format", "xml"]);
        assert!(result.is_err());
    }
}
