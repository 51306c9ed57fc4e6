//! OVN/OVS backed metric source
//!
//! Primary channel: logical flows in the southbound database.
//! Secondary channel: OpenFlow entries on `br-int`.

use crate::analysis::types::Reading;
use crate::errors::{Result, TrackerError};
use crate::metrics::source::MetricSource;
use crate::tools::process::CommandRunner;
use crate::tools::types::CommandOutput;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Integration bridge whose flows are counted
pub const INTEGRATION_BRIDGE: &str = "br-int";

/// Northbound tables counted after detection
pub const NORTHBOUND_TABLES: [&str; 3] = ["acl", "port_group", "address_set"];

/// Southbound tables counted after detection
pub const SOUTHBOUND_TABLES: [&str; 1] = ["logical_flow"];

/// Which OVN database a table lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvnDatabase {
    Northbound,
    Southbound,
}

impl OvnDatabase {
    /// CLI that queries this database
    pub fn program(&self) -> &'static str {
        match self {
            OvnDatabase::Northbound => "ovn-nbctl",
            OvnDatabase::Southbound => "ovn-sbctl",
        }
    }
}

/// Metric source reading counts through the OVN/OVS CLIs
pub struct OvnMetricSource<R: CommandRunner> {
    runner: Arc<R>,
    node_name: String,
}

impl<R: CommandRunner> OvnMetricSource<R> {
    /// Create source for the named node
    pub fn new(runner: Arc<R>, node_name: impl Into<String>) -> Self {
        Self {
            runner,
            node_name: node_name.into(),
        }
    }

    /// Count rows of a table, failing on any stderr output
    pub async fn count_table(&self, database: OvnDatabase, table: &str) -> Result<u64> {
        let program = database.program();
        let output = self
            .runner
            .run(
                program,
                &["--no-leader-only", "--columns=_uuid", "list", table],
            )
            .await?;

        if output.has_stderr() {
            return Err(TrackerError::CommandFailed {
                program: program.to_string(),
                reason: output.stderr.trim().to_string(),
            });
        }
        reject_truncated(&output)?;

        Ok(count_uuid_rows(&output.stdout))
    }

    /// Count OpenFlow entries on the integration bridge
    pub async fn count_openflows(&self) -> Result<u64> {
        let output = self
            .runner
            .run("ovs-ofctl", &["dump-aggregate", INTEGRATION_BRIDGE])
            .await?;
        reject_truncated(&output)?;

        parse_flow_count(&output.stdout)
    }

    /// Row counts for the database tables reported with the result
    ///
    /// Tables whose query fails are left out.
    pub async fn database_counts(&self) -> BTreeMap<String, u64> {
        let tables = NORTHBOUND_TABLES
            .iter()
            .map(|t| (OvnDatabase::Northbound, *t))
            .chain(SOUTHBOUND_TABLES.iter().map(|t| (OvnDatabase::Southbound, *t)));

        let mut counts = BTreeMap::new();
        for (database, table) in tables {
            match self.count_table(database, table).await {
                Ok(count) => {
                    counts.insert(table.to_string(), count);
                }
                Err(e) => {
                    tracing::debug!(node = %self.node_name, table, error = %e, "skipping table count");
                }
            }
        }
        counts
    }
}

#[async_trait]
impl<R: CommandRunner> MetricSource for OvnMetricSource<R> {
    async fn read_primary(&self) -> Reading {
        match self.count_table(OvnDatabase::Southbound, "logical_flow").await {
            Ok(count) => Reading::Observed(count),
            Err(e) => {
                tracing::warn!(node = %self.node_name, error = %e, "failed getting logical flows count");
                Reading::degraded(e.to_string())
            }
        }
    }

    async fn read_secondary(&self) -> Reading {
        match self.count_openflows().await {
            Ok(count) => Reading::Observed(count),
            Err(e) => {
                tracing::warn!(node = %self.node_name, error = %e, "failed getting flows count");
                Reading::degraded(e.to_string())
            }
        }
    }
}

/// A partial listing would be counted as a smaller, stable value
fn reject_truncated(output: &CommandOutput) -> Result<()> {
    if output.truncated {
        return Err(TrackerError::ParseError(format!(
            "{} output exceeded the capture limit",
            output.program
        )));
    }
    Ok(())
}

/// Count records in `--columns=_uuid list` output
pub fn count_uuid_rows(stdout: &str) -> u64 {
    stdout
        .lines()
        .filter(|line| line.trim_start().starts_with("_uuid"))
        .count() as u64
}

/// Extract `flow_count=N` from `ovs-ofctl dump-aggregate` output
pub fn parse_flow_count(stdout: &str) -> Result<u64> {
    let (_, rest) = stdout
        .split_once("flow_count=")
        .ok_or_else(|| TrackerError::ParseError("no flow_count in dump-aggregate output".to_string()))?;

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits
        .parse()
        .map_err(|_| TrackerError::ParseError(format!("invalid flow_count: {:?}", rest.trim())))
}
