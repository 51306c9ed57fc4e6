//! Indexed documents
//!
//! Field names are what the dashboards query; keep them stable.

use crate::analysis::types::DetectionResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Metric name of the document sent when tracking starts
pub const INFO_METRIC: &str = "convergence_tracker_info";

/// Metric name of the document carrying the outcome
pub const RESULT_METRIC: &str = "convergence_tracker";

/// Who produced a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    /// Run UUID shared by every tracker in the test
    pub uuid: String,

    /// Node this tracker watches
    pub node_name: String,

    /// Workload label
    pub workload: String,
}

impl RunIdentity {
    fn header(&self, metric_name: &str) -> DocumentHeader {
        DocumentHeader {
            metric_name: metric_name.to_string(),
            timestamp: Utc::now(),
            workload: self.workload.clone(),
            uuid: self.uuid.clone(),
            source_name: self.node_name.clone(),
        }
    }
}

/// Fields common to every document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentHeader {
    #[serde(rename = "metricName")]
    pub metric_name: String,
    pub timestamp: DateTime<Utc>,
    pub workload: String,
    pub uuid: String,
    pub source_name: String,
}

/// Document announcing a tracker start
#[derive(Debug, Clone, Serialize)]
pub struct InfoDocument {
    #[serde(flatten)]
    pub header: DocumentHeader,
    pub convergence_period: u64,
    pub convergence_timeout: u64,
    pub test_metadata: Option<Value>,
}

impl InfoDocument {
    /// Build info document; periods are in seconds
    pub fn new(
        identity: &RunIdentity,
        convergence_period: u64,
        convergence_timeout: u64,
        metadata: Option<&str>,
    ) -> Self {
        Self {
            header: identity.header(INFO_METRIC),
            convergence_period,
            convergence_timeout,
            test_metadata: parse_metadata(metadata),
        }
    }
}

/// Document carrying the outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct ResultDocument {
    #[serde(flatten)]
    pub header: DocumentHeader,
    pub convergence_timestamp: DateTime<Utc>,
    pub timed_out: bool,
    pub nbdb: BTreeMap<String, u64>,
    pub ovs_flows: u64,
    pub logical_flows: u64,
    pub unhealthy_logs: Vec<String>,
}

impl ResultDocument {
    /// Build result document from a detection result and the data
    /// gathered after it
    pub fn new(
        identity: &RunIdentity,
        result: &DetectionResult,
        nbdb: BTreeMap<String, u64>,
        unhealthy_logs: Vec<String>,
    ) -> Self {
        Self {
            header: identity.header(RESULT_METRIC),
            convergence_timestamp: result.stabilized_at,
            timed_out: result.timed_out,
            nbdb,
            ovs_flows: result.final_secondary_count,
            logical_flows: result.final_primary_count,
            unhealthy_logs,
        }
    }
}

/// Embed metadata as JSON when it parses, otherwise as a plain string
pub fn parse_metadata(raw: Option<&str>) -> Option<Value> {
    let raw = raw?;
    Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
}
