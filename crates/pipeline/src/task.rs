//! Per-task pipeline driver.
//!
//! Wires one extractor, one validation pool and one report aggregator
//! together with two bounded queues sized to the task's throughput budget.

use std::sync::Arc;
use std::time::Duration;

use overseer_core::config::{PipelineConfig, TaskConfig};
use overseer_notify::Notifier;
use overseer_rules::{RuleRegistry, ValidationSet};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::alert::AlertWriter;
use crate::cache::AlertCache;
use crate::extractor::RowExtractor;
use crate::report::{ReportAggregator, ReportStats};
use crate::source::RowSource;
use crate::worker::{PoolStats, ValidationPool};

/// Task configuration with pipeline defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSettings {
    pub name: String,
    pub query: String,
    /// Integer column driving the cursor.
    pub id_field: String,
    /// Column keying alert-cache entries and labelling report lines.
    pub entity_field: String,
    pub start_cursor: i64,
    /// Rows per extraction and capacity of both queues.
    pub tps: usize,
    pub report_size: usize,
    pub parallelism: usize,
    pub poll_interval: Duration,
    pub alert_ttl: Duration,
    pub report_to: String,
    pub report_subject: String,
}

impl TaskSettings {
    pub fn resolve(task: &TaskConfig, pipeline: &PipelineConfig, admin_email: &str) -> Self {
        Self {
            name: task.name.clone(),
            query: task.query.clone(),
            id_field: task.field_id.clone(),
            entity_field: task.entity_field().to_string(),
            start_cursor: task.start_cursor,
            tps: task.tps_or(pipeline).max(1) as usize,
            report_size: task.report_size_or(pipeline).max(1),
            parallelism: pipeline.effective_parallelism(),
            poll_interval: Duration::from_millis(pipeline.poll_interval_ms),
            alert_ttl: Duration::from_secs(pipeline.alert_ttl_secs),
            report_to: admin_email.to_string(),
            report_subject: format!("{}: {}", pipeline.report_subject, task.name),
        }
    }
}

/// Shared external collaborators, cloned into every task.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn RowSource>,
    pub cache: Arc<dyn AlertCache>,
    pub notifier: Arc<dyn Notifier>,
}

/// What a task did before it stopped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSummary {
    pub name: String,
    /// Cursor when the extractor stopped, `None` if it failed.
    pub final_cursor: Option<i64>,
    pub pool: PoolStats,
    pub reports: ReportStats,
}

pub struct TaskDriver {
    settings: TaskSettings,
    set: Arc<ValidationSet>,
    collaborators: Collaborators,
}

impl TaskDriver {
    /// Build the task's validation set from its subjects.
    pub fn new(
        task: &TaskConfig,
        settings: TaskSettings,
        registry: &RuleRegistry,
        collaborators: &Collaborators,
    ) -> Self {
        let set = ValidationSet::build(registry, &task.subjects);
        if set.is_empty() {
            warn!(task = %settings.name, "task has no usable subjects; every row will pass");
        }
        Self {
            settings,
            set: Arc::new(set),
            collaborators: collaborators.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &TaskSettings {
        &self.settings
    }

    /// Run all three stages until `cancel` fires and the queues drain.
    pub async fn run(self, cancel: CancellationToken) -> TaskSummary {
        let s = self.settings;
        info!(
            task = %s.name,
            tps = s.tps,
            report_size = s.report_size,
            parallelism = s.parallelism,
            rules = self.set.len(),
            "task started"
        );

        let (row_tx, row_rx) = mpsc::channel(s.tps);
        let (report_tx, report_rx) = mpsc::channel(s.tps);

        let extractor = RowExtractor::new(
            s.name.clone(),
            self.collaborators.source.clone(),
            s.query.clone(),
            s.id_field.clone(),
            s.tps,
            s.start_cursor,
        )
        .with_poll_interval(s.poll_interval);

        let pool = ValidationPool::new(
            s.name.clone(),
            self.set.clone(),
            s.entity_field.clone(),
            s.parallelism,
            report_tx,
            AlertWriter::new(self.collaborators.cache.clone(), s.alert_ttl),
        );

        let aggregator = ReportAggregator::new(
            s.name.clone(),
            self.collaborators.notifier.clone(),
            s.report_to.clone(),
            s.report_subject.clone(),
            s.report_size,
        );

        let extract = tokio::spawn(extractor.run(row_tx, cancel));
        let validate = tokio::spawn(pool.run(row_rx));
        let report = tokio::spawn(aggregator.collect(report_rx));
        let _guard = AbortStages(vec![
            extract.abort_handle(),
            validate.abort_handle(),
            report.abort_handle(),
        ]);

        let final_cursor = stage_result(&s.name, "extractor", extract.await);
        let pool = stage_result(&s.name, "validation pool", validate.await).unwrap_or_default();
        let reports = stage_result(&s.name, "report aggregator", report.await).unwrap_or_default();

        info!(
            task = %s.name,
            cursor = ?final_cursor,
            rows = pool.rows,
            violations = pool.violations,
            reports = reports.reports_sent,
            "task stopped"
        );

        TaskSummary {
            name: s.name,
            final_cursor,
            pool,
            reports,
        }
    }
}

/// Aborts the stage tasks if the driver itself is aborted mid-drain.
struct AbortStages(Vec<AbortHandle>);

impl Drop for AbortStages {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

fn stage_result<T>(task: &str, stage: &str, joined: Result<T, JoinError>) -> Option<T> {
    match joined {
        Ok(value) => Some(value),
        Err(e) => {
            error!(task, stage, error = %e, "stage terminated abnormally");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_core::OverseerConfig;

    const YAML: &str = r#"
admin_email: ops@example.com
connection: { host: localhost, name: metrics, user: u }
pipeline: { tps: 200, report_size: 50, parallelism: 3, poll_interval_ms: 250 }
tasks:
  - name: devices
    query: SELECT * FROM device_metrics WHERE id > $1 ORDER BY id
    fieldId: id
    start_cursor: 10
    report_size: 7
"#;

    #[test]
    fn entity_field_is_separate_from_cursor_field() {
        let yaml = YAML.replace("fieldId: id", "fieldId: id\n    kvKey: device_id");
        let config = OverseerConfig::from_yaml_str(&yaml).unwrap();
        let s = TaskSettings::resolve(&config.tasks[0], &config.pipeline, &config.admin_email);
        assert_eq!(s.id_field, "id");
        assert_eq!(s.entity_field, "device_id");
    }

    #[test]
    fn resolve_applies_defaults_and_overrides() {
        let config = OverseerConfig::from_yaml_str(YAML).unwrap();
        let s = TaskSettings::resolve(&config.tasks[0], &config.pipeline, &config.admin_email);
        assert_eq!(s.name, "devices");
        assert_eq!(s.id_field, "id");
        assert_eq!(s.entity_field, "id");
        assert_eq!(s.start_cursor, 10);
        assert_eq!(s.tps, 200);
        assert_eq!(s.report_size, 7);
        assert_eq!(s.parallelism, 3);
        assert_eq!(s.poll_interval, Duration::from_millis(250));
        assert_eq!(s.alert_ttl, Duration::from_secs(900));
        assert_eq!(s.report_to, "ops@example.com");
        assert_eq!(s.report_subject, "Metrics report: devices");
    }
}
