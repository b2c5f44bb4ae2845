//! Bounded validation worker pool.
//!
//! Rows are pulled from the row queue and validated on spawned tasks. A
//! semaphore gates how many validations run at once; a permit is held for
//! the whole life of its task and released when the task ends, panics
//! included.

use std::sync::Arc;

use overseer_core::{Row, Value};
use overseer_rules::ValidationSet;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::alert::AlertWriter;

/// Outcome of validating one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowVerdict {
    /// One report line per failing field.
    pub messages: Vec<String>,
    /// Combined text of all failures, `None` when the row is clean.
    pub alert: Option<String>,
    /// The row's entity identifier, when present and usable.
    pub entity_id: Option<String>,
}

/// Entity identifier as text. Integers and non-empty text are usable.
pub fn entity_id(row: &Row, entity_field: &str) -> Option<String> {
    match row.get(entity_field)? {
        Value::Int(id) => Some(id.to_string()),
        Value::Text(id) if !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}

/// Run every field of `row` through `set`.
pub fn validate_row(set: &ValidationSet, row: &Row, entity_field: &str) -> RowVerdict {
    let entity_id = entity_id(row, entity_field);
    let shown_id = entity_id.as_deref().unwrap_or("?");

    let mut messages = Vec::new();
    let mut alert = String::new();
    for (field, value) in row.iter() {
        if let Err(violation) = set.validate(field, value) {
            messages.push(format!("err - {violation} [{shown_id}]"));
            alert.push_str(&violation.to_string());
            alert.push_str(" ; ");
        }
    }

    RowVerdict {
        messages,
        alert: (!alert.is_empty()).then_some(alert),
        entity_id,
    }
}

/// Counters reported when a pool finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub rows: u64,
    pub violations: u64,
    pub alerts_stored: u64,
    pub alerts_failed: u64,
    /// Rows with violations but no usable entity identifier.
    pub alerts_skipped: u64,
    pub panicked: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlertOutcome {
    None,
    Stored,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy)]
struct RowOutcome {
    violations: usize,
    alert: AlertOutcome,
}

struct WorkerContext {
    task: String,
    set: Arc<ValidationSet>,
    entity_field: String,
    reports: mpsc::Sender<String>,
    alerts: AlertWriter,
}

impl WorkerContext {
    async fn process(&self, row: Row) -> RowOutcome {
        let verdict = validate_row(&self.set, &row, &self.entity_field);
        let violations = verdict.messages.len();

        for message in verdict.messages {
            debug!(task = %self.task, %message, "violation");
            if self.reports.send(message).await.is_err() {
                warn!(task = %self.task, "report queue closed; dropping violation messages");
                break;
            }
        }

        let alert = match (verdict.alert, verdict.entity_id) {
            (None, _) => AlertOutcome::None,
            (Some(_), None) => {
                error!(
                    task = %self.task,
                    field = %self.entity_field,
                    "row has violations but no usable entity identifier; alert not cached"
                );
                AlertOutcome::Skipped
            }
            (Some(text), Some(id)) => match self.alerts.store_alert(&id, &text).await {
                Ok(()) => AlertOutcome::Stored,
                Err(e) => {
                    warn!(task = %self.task, entity_id = %id, error = %e, "failed to store alert");
                    AlertOutcome::Failed
                }
            },
        };

        RowOutcome { violations, alert }
    }
}

pub struct ValidationPool {
    ctx: Arc<WorkerContext>,
    gate: Arc<Semaphore>,
    parallelism: usize,
}

impl ValidationPool {
    pub fn new(
        task: impl Into<String>,
        set: Arc<ValidationSet>,
        entity_field: impl Into<String>,
        parallelism: usize,
        reports: mpsc::Sender<String>,
        alerts: AlertWriter,
    ) -> Self {
        let parallelism = parallelism.max(1);
        Self {
            ctx: Arc::new(WorkerContext {
                task: task.into(),
                set,
                entity_field: entity_field.into(),
                reports,
                alerts,
            }),
            gate: Arc::new(Semaphore::new(parallelism)),
            parallelism,
        }
    }

    /// Validate rows until the row queue closes, then wait for in-flight
    /// validations. The report sender is dropped on return.
    pub async fn run(self, mut rows: mpsc::Receiver<Row>) -> PoolStats {
        info!(task = %self.ctx.task, parallelism = self.parallelism, "validation pool started");
        let mut stats = PoolStats::default();
        let mut in_flight = JoinSet::new();

        while let Some(row) = rows.recv().await {
            let permit = match self.gate.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let ctx = self.ctx.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                ctx.process(row).await
            });
            stats.rows += 1;

            while let Some(done) = in_flight.try_join_next() {
                self.record(&mut stats, done);
            }
        }

        while let Some(done) = in_flight.join_next().await {
            self.record(&mut stats, done);
        }

        info!(
            task = %self.ctx.task,
            rows = stats.rows,
            violations = stats.violations,
            alerts = stats.alerts_stored,
            "validation pool drained"
        );
        stats
    }

    fn record(&self, stats: &mut PoolStats, done: Result<RowOutcome, JoinError>) {
        match done {
            Ok(outcome) => {
                stats.violations += outcome.violations as u64;
                match outcome.alert {
                    AlertOutcome::None => {}
                    AlertOutcome::Stored => stats.alerts_stored += 1,
                    AlertOutcome::Failed => stats.alerts_failed += 1,
                    AlertOutcome::Skipped => stats.alerts_skipped += 1,
                }
            }
            Err(e) => {
                stats.panicked += 1;
                error!(task = %self.ctx.task, error = %e, "validation task failed");
            }
        }
    }
}
