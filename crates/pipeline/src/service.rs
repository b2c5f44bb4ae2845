//! Top-level supervisor: one task driver per configured task.

use std::sync::Arc;
use std::time::Duration;

use overseer_core::config::{PipelineConfig, TaskConfig};
use overseer_rules::RuleRegistry;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::task::{Collaborators, TaskDriver, TaskSettings, TaskSummary};

pub struct Overseer {
    registry: Arc<RuleRegistry>,
    collaborators: Collaborators,
    pipeline: PipelineConfig,
    admin_email: String,
}

impl Overseer {
    pub fn new(
        registry: Arc<RuleRegistry>,
        collaborators: Collaborators,
        pipeline: PipelineConfig,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            collaborators,
            pipeline,
            admin_email: admin_email.into(),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.shutdown_timeout_secs)
    }

    /// Run every task until `cancel` fires and all tasks drain, or the
    /// shutdown timeout expires. Summaries of tasks that finished are
    /// returned in completion order.
    pub async fn run(&self, tasks: &[TaskConfig], cancel: CancellationToken) -> Vec<TaskSummary> {
        let mut drivers = JoinSet::new();
        for task in tasks {
            let settings = TaskSettings::resolve(task, &self.pipeline, &self.admin_email);
            let driver = TaskDriver::new(task, settings, &self.registry, &self.collaborators);
            drivers.spawn(driver.run(cancel.child_token()));
        }
        info!(tasks = drivers.len(), "overseer running");

        let mut summaries = Vec::with_capacity(tasks.len());

        // Tasks only finish on their own after cancellation or a stage panic.
        let finished = tokio::select! {
            _ = cancel.cancelled() => false,
            _ = collect(&mut drivers, &mut summaries) => true,
        };
        if finished {
            return summaries;
        }

        let timeout = self.shutdown_timeout();
        info!(timeout_secs = timeout.as_secs(), running = drivers.len(), "waiting for tasks to drain");
        if tokio::time::timeout(timeout, collect(&mut drivers, &mut summaries))
            .await
            .is_err()
        {
            warn!(remaining = drivers.len(), "shutdown timeout elapsed; aborting remaining tasks");
            drivers.abort_all();
            while drivers.join_next().await.is_some() {}
        }
        summaries
    }
}

async fn collect(drivers: &mut JoinSet<TaskSummary>, summaries: &mut Vec<TaskSummary>) {
    while let Some(joined) = drivers.join_next().await {
        match joined {
            Ok(summary) => summaries.push(summary),
            Err(e) => error!(error = %e, "task driver failed"),
        }
    }
}
