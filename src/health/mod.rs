//! Control-plane health scanning
//!
//! After detection, looks through the OVS and OVN component logs for
//! inactivity-probe disconnects that happened during the run.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::PathBuf;

/// Marker of a dropped OVSDB/OpenFlow connection
pub const INACTIVITY_MARKER: &str = "no response to inactivity probe";

/// Separator of the CRI log prefix in pod logs
const CRI_STDERR_PREFIX: &str = "stderr F ";

/// Timestamp format of OVS/OVN log lines
const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Where component logs live on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLocations {
    /// ovs-vswitchd log file
    pub vswitchd_log: PathBuf,

    /// Root of the kubelet pod log tree
    pub pod_log_root: PathBuf,
}

impl Default for LogLocations {
    fn default() -> Self {
        Self {
            vswitchd_log: PathBuf::from("/var/log/openvswitch/ovs-vswitchd.log"),
            pod_log_root: PathBuf::from("/var/log/pods"),
        }
    }
}

/// A named log file to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    pub name: String,
    pub path: PathBuf,
}

/// Scanner for concerning log lines
pub struct HealthScanner {
    locations: LogLocations,
    interconnect: bool,
    since: DateTime<Utc>,
}

impl HealthScanner {
    /// Create scanner flagging lines after `since`
    pub fn new(locations: LogLocations, interconnect: bool, since: DateTime<Utc>) -> Self {
        Self {
            locations,
            interconnect,
            since,
        }
    }

    /// Resolve which log files to scan
    ///
    /// `northd` runs in the master pod, or in every node pod in
    /// interconnect mode. A later match replaces the path but keeps the
    /// original position.
    pub async fn discover_sources(&self) -> Vec<LogSource> {
        let mut sources = vec![LogSource {
            name: "vswitchd".to_string(),
            path: self.locations.vswitchd_log.clone(),
        }];

        let mut pods = Vec::new();
        match tokio::fs::read_dir(&self.locations.pod_log_root).await {
            Ok(mut entries) => loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => pods.push(entry.file_name().to_string_lossy().into_owned()),
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(
                            root = %self.locations.pod_log_root.display(),
                            error = %e,
                            "stopped listing pod log root"
                        );
                        break;
                    }
                }
            },
            Err(e) => {
                tracing::debug!(
                    root = %self.locations.pod_log_root.display(),
                    error = %e,
                    "pod log root not readable"
                );
            }
        }
        pods.sort();

        let root = &self.locations.pod_log_root;
        for pod in &pods {
            if pod.contains("ovnkube-master") {
                upsert(&mut sources, "northd", root.join(pod).join("northd/0.log"));
            }
            if pod.contains("ovnkube-node") {
                upsert(
                    &mut sources,
                    "ovn-controller",
                    root.join(pod).join("ovn-controller/0.log"),
                );
                if self.interconnect {
                    upsert(&mut sources, "northd", root.join(pod).join("northd/0.log"));
                }
            }
        }

        sources
    }

    /// Scan all sources and return the concerning lines in order
    pub async fn scan(&self) -> Vec<String> {
        let mut concerning = Vec::new();

        for source in self.discover_sources().await {
            match tokio::fs::read(&source.path).await {
                Ok(bytes) => {
                    // Lines with stray bytes still carry a readable marker
                    let contents = String::from_utf8_lossy(&bytes);
                    concerning.extend(
                        flagged_lines(&contents, self.since)
                            .into_iter()
                            .map(|line| format!("{}: {}", source.name, line)),
                    );
                }
                Err(e) => {
                    concerning.push(format!("failed to open {}: {}", source.path.display(), e));
                }
            }
        }

        concerning
    }
}

fn upsert(sources: &mut Vec<LogSource>, name: &str, path: PathBuf) {
    match sources.iter_mut().find(|s| s.name == name) {
        Some(existing) => existing.path = path,
        None => sources.push(LogSource {
            name: name.to_string(),
            path,
        }),
    }
}

/// Marker lines in `contents` timestamped strictly after `since`
pub fn flagged_lines(contents: &str, since: DateTime<Utc>) -> Vec<&str> {
    contents
        .lines()
        .filter(|line| line.contains(INACTIVITY_MARKER))
        .filter(|line| match parse_log_timestamp(line) {
            Some(timestamp) => timestamp > since,
            None => {
                tracing::debug!(line = *line, "skipping marker line without parseable timestamp");
                false
            }
        })
        .collect()
}

/// Timestamp of an OVS/OVN log line, with or without a CRI prefix
///
/// `2024-05-01T10:00:00.1Z stderr F 2024-05-01T10:00:00.123456Z|00042|...`
/// yields the inner `2024-05-01T10:00:00.123456Z`.
pub fn parse_log_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let payload = match line.split_once(CRI_STDERR_PREFIX) {
        Some((_, rest)) => rest,
        None => line,
    };
    let stamp = payload.split('|').next()?.trim();

    NaiveDateTime::parse_from_str(stamp, LOG_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
