//! Tracker run pipeline
//!
//! Wires bootstrap, detection, database census, health scanning and
//! reporting for one run. The CLI host calls [`Tracker::run`] and then
//! [`idle_until_shutdown`].

use crate::analysis::{ConvergenceDetector, DetectionConfig, DetectionResult};
use crate::bootstrap::{Bootstrap, BootstrapStatus};
use crate::config::TrackerConfig;
use crate::errors::Result;
use crate::health::HealthScanner;
use crate::metrics::{MetricSource, OvnMetricSource};
use crate::reporting::{InfoDocument, OpenSearchBackend, Reporter, ResultDocument, RunIdentity};
use crate::reporting::backend::IndexBackend;
use crate::telemetry::{TelemetryCollector, TelemetryStats};
use crate::tools::process::CommandRunner;
use crate::tools::retry::RetryManager;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub identity: RunIdentity,
    pub bootstrap: BootstrapStatus,
    pub detection: DetectionResult,
    pub nbdb: BTreeMap<String, u64>,
    pub unhealthy_logs: Vec<String>,
    pub info_indexed: bool,
    pub result_indexed: bool,
    pub stats: TelemetryStats,
}

/// One tracker run
pub struct Tracker<R: CommandRunner, B: IndexBackend> {
    config: TrackerConfig,
    detection: DetectionConfig,
    identity: RunIdentity,
    runner: Arc<R>,
    reporter: Reporter<B>,
    telemetry: TelemetryCollector,
}

impl<R: CommandRunner, B: IndexBackend> Tracker<R, B> {
    /// Create tracker; fails when the timing configuration is incomplete
    pub fn new(config: TrackerConfig, runner: Arc<R>, reporter: Reporter<B>) -> Result<Self> {
        let detection = config.detection_config()?;
        let identity = config.run_identity();
        let telemetry = TelemetryCollector::new();

        Ok(Self {
            config,
            detection,
            identity,
            runner,
            reporter: reporter.with_telemetry(telemetry.clone()),
            telemetry,
        })
    }

    /// Identity stamped on this run's documents
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Execute the full pipeline
    ///
    /// Only setup failures are returned as errors; reporting problems are
    /// logged and reflected in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let run_start = Utc::now();
        let node = self.identity.node_name.as_str();

        let info = InfoDocument::new(
            &self.identity,
            self.detection.convergence_period.as_secs(),
            self.detection.convergence_timeout.as_secs(),
            self.config.run.metadata.as_deref(),
        );
        let info_indexed = self.reporter.report(&info).await;

        tracing::info!(
            node,
            period_secs = self.detection.convergence_period.as_secs(),
            timeout_secs = self.detection.convergence_timeout.as_secs(),
            "Start openflow-tracker {}, convergence_period {}, convergence timeout {}",
            node,
            self.detection.convergence_period.as_secs(),
            self.detection.convergence_timeout.as_secs()
        );

        let bootstrap = Bootstrap::new(self.runner.as_ref(), self.config.run_dirs())
            .prepare()
            .await?;

        let source = OvnMetricSource::new(self.runner.clone(), node);
        let detection = self.detect(&source).await;
        let nbdb = source.database_counts().await;

        tracing::info!(
            node,
            flows = detection.final_secondary_count,
            timed_out = detection.timed_out,
            "RESULT: time={} {} finished with {} flows, nbdb data: {:?}",
            detection.stabilized_at.format("%Y-%m-%d %H:%M:%S%.3f"),
            node,
            detection.final_secondary_count,
            nbdb
        );

        let unhealthy_logs = HealthScanner::new(
            self.config.log_locations(),
            bootstrap.is_interconnect(),
            run_start,
        )
        .scan()
        .await;

        if unhealthy_logs.is_empty() {
            tracing::info!(node, "HEALTHCHECK: {} has no problems", node);
        } else {
            tracing::warn!(
                node,
                count = unhealthy_logs.len(),
                "HEALTHCHECK: {} has concerning logs: {:?}",
                node,
                unhealthy_logs
            );
        }

        let result = ResultDocument::new(&self.identity, &detection, nbdb.clone(), unhealthy_logs.clone());
        let result_indexed = self.reporter.report(&result).await;

        Ok(RunSummary {
            identity: self.identity.clone(),
            bootstrap,
            detection,
            nbdb,
            unhealthy_logs,
            info_indexed,
            result_indexed,
            stats: self.telemetry.get_stats(),
        })
    }

    async fn detect<S: MetricSource>(&self, source: S) -> DetectionResult {
        let mut detector = ConvergenceDetector::new(source, self.detection.clone())
            .with_node_name(self.identity.node_name.clone())
            .with_telemetry(self.telemetry.clone());
        detector.run().await
    }
}

/// Build the production reporter from configuration
///
/// Reporting is disabled unless both server and index are set.
pub fn build_reporter(config: &TrackerConfig) -> Result<Reporter<OpenSearchBackend>> {
    let retry = RetryManager::with_config(config.reporting.retries, 500);

    match (&config.reporting.server, &config.reporting.index) {
        (Some(server), Some(index)) => Ok(Reporter::new(
            OpenSearchBackend::new(server.clone())?,
            index.clone(),
            retry,
        )),
        _ => {
            tracing::warn!("ES_SERVER or ES_INDEX_NETPOL not set, results will not be indexed");
            Ok(Reporter::disabled())
        }
    }
}

/// Read both metrics once, for the `probe` command
pub async fn probe<R: CommandRunner>(runner: Arc<R>, node_name: &str) -> serde_json::Value {
    let source = OvnMetricSource::new(runner, node_name);
    let primary = source.read_primary().await;
    let secondary = source.read_secondary().await;

    json!({
        "node": node_name,
        "logical_flows": primary,
        "ovs_flows": secondary,
    })
}

/// Keep the process alive after a run until it is asked to stop
pub async fn idle_until_shutdown() -> Result<()> {
    tracing::info!("tracking finished, idling until shutdown");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutdown requested");
    Ok(())
}
