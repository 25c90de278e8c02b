//! One end-to-end run: start a session, discover probes, synchronize each, drain the jobs.

use crate::clock::Clock;
use crate::jobs::{JobPolicy, JobProcessor, JobRunSummary};
use crate::model::Probe;
use crate::session::{SessionClient, SessionError};
use crate::sync::{ClockSynchronizer, SyncPolicy};
use std::sync::Arc;

/// What a run reports back. Failure reasons only go to the log.
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub success: bool,
    /// Probes in discovery order; empty when the run failed before synchronization.
    pub probes: Vec<Probe>,
    /// Present when the job loop ran to an outcome.
    pub jobs: Option<JobRunSummary>,
}

impl WorkflowReport {
    fn failed() -> Self {
        Self {
            success: false,
            probes: Vec::new(),
            jobs: None,
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    client: SessionClient,
    synchronizer: ClockSynchronizer,
    jobs: JobProcessor,
}

impl Orchestrator {
    pub fn new(client: SessionClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            synchronizer: ClockSynchronizer::new(client.clone(), Arc::clone(&clock)),
            jobs: JobProcessor::new(client.clone(), clock),
            client,
        }
    }

    pub fn with_policies(mut self, sync: SyncPolicy, jobs: JobPolicy) -> Self {
        self.synchronizer = self.synchronizer.with_policy(sync);
        self.jobs = self.jobs.with_policy(jobs);
        self
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    pub async fn run(&self, username: &str, email: &str) -> WorkflowReport {
        tracing::info!(target: "luma::workflow", username, "workflow started");
        match self.execute(username, email).await {
            Ok(report) => {
                tracing::info!(
                    target: "luma::workflow",
                    success = report.success,
                    probes = report.probes.len(),
                    "workflow finished"
                );
                report
            }
            Err(err) => {
                tracing::error!(target: "luma::workflow", error = %err, "workflow aborted");
                WorkflowReport::failed()
            }
        }
    }

    async fn execute(&self, username: &str, email: &str) -> Result<WorkflowReport, SessionError> {
        self.client.start_session(username, email).await?;

        let mut probes = self.client.list_probes().await?;
        tracing::info!(target: "luma::workflow", count = probes.len(), "probes discovered");

        if !self.synchronizer.synchronize_all(&mut probes).await {
            return Ok(WorkflowReport {
                success: false,
                probes,
                jobs: None,
            });
        }

        let summary = self.jobs.process_all(&probes).await?;
        Ok(WorkflowReport {
            success: summary.succeeded(),
            probes,
            jobs: Some(summary),
        })
    }
}
