//! Drains the server's verification job queue.
//!
//! Each job names a probe; the processor answers it with the probe's corrected "now", encoded
//! in the probe's wire format, plus the last measured round trip. The server's answer decides
//! whether the loop keeps claiming jobs.

use crate::clock::Clock;
use crate::model::{Job, Probe};
use crate::session::{ResponseCode, SessionClient, SessionError};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_JOB_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPolicy {
    /// Pause after a transient failure. Retries are unbounded.
    pub retry_delay: Duration,
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_JOB_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunOutcome {
    /// The server had no more jobs to hand out.
    Drained,
    /// The server answered `Done`.
    Done,
    /// The server rejected a job.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRunSummary {
    pub outcome: JobRunOutcome,
    pub completed: usize,
    pub skipped: usize,
}

impl JobRunSummary {
    pub fn succeeded(&self) -> bool {
        self.outcome != JobRunOutcome::Failed
    }
}

enum Step {
    Drained,
    Skipped,
    Checked(Job, ResponseCode),
}

#[derive(Clone)]
pub struct JobProcessor {
    client: SessionClient,
    clock: Arc<dyn Clock>,
    policy: JobPolicy,
}

impl JobProcessor {
    pub fn new(client: SessionClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            policy: JobPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: JobPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> JobPolicy {
        self.policy
    }

    /// Claims and answers jobs until the queue drains, the server says `Done`, or a job fails.
    ///
    /// Transport errors are retried forever after [`JobPolicy::retry_delay`]; errors that
    /// retrying cannot fix (see [`SessionError::is_fatal`]) are returned.
    pub async fn process_all(&self, probes: &[Probe]) -> Result<JobRunSummary, SessionError> {
        tracing::info!(target: "luma::jobs", probes = probes.len(), "processing jobs");
        let mut completed = 0;
        let mut skipped = 0;
        let summary = |outcome, completed, skipped| JobRunSummary {
            outcome,
            completed,
            skipped,
        };

        loop {
            let (mut job, code) = match self.step(probes).await {
                Ok(Step::Drained) => {
                    tracing::info!(target: "luma::jobs", completed, skipped, "job queue drained");
                    return Ok(summary(JobRunOutcome::Drained, completed, skipped));
                }
                Ok(Step::Skipped) => {
                    skipped += 1;
                    continue;
                }
                Ok(Step::Checked(job, code)) => (job, code),
                Err(err) if err.is_fatal() => {
                    tracing::error!(target: "luma::jobs", error = %err, "job processing aborted");
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        target: "luma::jobs",
                        error = %err,
                        retry_in = ?self.policy.retry_delay,
                        "job iteration failed; retrying"
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                    continue;
                }
            };

            match code {
                ResponseCode::Done => {
                    job.mark_completed();
                    completed += 1;
                    tracing::info!(target: "luma::jobs", job_id = %job.id(), completed, "server reported all jobs done");
                    return Ok(summary(JobRunOutcome::Done, completed, skipped));
                }
                ResponseCode::Success => {
                    job.mark_completed();
                    completed += 1;
                    tracing::info!(target: "luma::jobs", job_id = %job.id(), completed, "job completed");
                }
                ResponseCode::Fail => {
                    job.mark_failed();
                    tracing::error!(target: "luma::jobs", job_id = %job.id(), completed, "job rejected by server");
                    return Ok(summary(JobRunOutcome::Failed, completed, skipped));
                }
                other => {
                    tracing::warn!(
                        target: "luma::jobs",
                        job_id = %job.id(),
                        code = %other,
                        "unexpected job result; continuing"
                    );
                }
            }
        }
    }

    async fn step(&self, probes: &[Probe]) -> Result<Step, SessionError> {
        let Some(job) = self.client.take_job().await? else {
            return Ok(Step::Drained);
        };

        let Some(probe) = probes.iter().find(|probe| probe.name() == job.probe_name()) else {
            tracing::warn!(
                target: "luma::jobs",
                job_id = %job.id(),
                probe = %job.probe_name(),
                "job names an unknown probe; skipping"
            );
            return Ok(Step::Skipped);
        };

        let probe_now = probe.encode_timestamp(probe.corrected(self.clock.now_ticks()))?;
        tracing::debug!(
            target: "luma::jobs",
            job_id = %job.id(),
            probe = %probe.name(),
            probe_now = %probe_now,
            round_trip = probe.round_trip(),
            "answering job"
        );
        let code = self
            .client
            .check_job(job.id(), &probe_now, probe.round_trip())
            .await?;
        Ok(Step::Checked(job, code))
    }
}
