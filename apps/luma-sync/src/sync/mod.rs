//! Two-timestamp clock synchronization against probes.
//!
//! Each exchange records the local instant before (`t0`) and after (`t3`) a sync request, and
//! the probe reports when it received (`t1`) and answered (`t2`) it. The offset correction is
//! `((t1 - t0) + (t2 - t3)) / 2` and is added to the probe's running offset. A probe counts as
//! synchronized once a single round's correction falls under [`SYNC_TOLERANCE_TICKS`].
//!
//! [`SYNC_TOLERANCE_TICKS`]: crate::model::SYNC_TOLERANCE_TICKS

use crate::clock::Clock;
use crate::model::{OffsetEstimate, Probe};
use crate::session::{SessionClient, SessionError};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Rounds per probe, failed exchanges included.
    pub max_attempts: u32,
    /// Pause after a failed exchange.
    pub retry_delay: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Clone)]
pub struct ClockSynchronizer {
    client: SessionClient,
    clock: Arc<dyn Clock>,
    policy: SyncPolicy,
}

impl ClockSynchronizer {
    pub fn new(client: SessionClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            policy: SyncPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Runs rounds until the probe converges or attempts run out. Never errors: failures
    /// are logged and reported as `false`.
    pub async fn synchronize(&self, probe: &mut Probe) -> bool {
        tracing::info!(target: "luma::sync", probe = %probe.name(), "synchronizing probe");
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            match self.exchange(probe).await {
                Ok(estimate) => {
                    probe.record_round(estimate);
                    tracing::debug!(
                        target: "luma::sync",
                        probe = %probe.name(),
                        attempt,
                        offset_delta = estimate.offset_delta,
                        round_trip = estimate.round_trip,
                        time_offset = probe.time_offset(),
                        "sync round complete"
                    );
                    if probe.is_synchronized() {
                        tracing::info!(
                            target: "luma::sync",
                            probe = %probe.name(),
                            attempts = attempt,
                            time_offset = probe.time_offset(),
                            "probe synchronized"
                        );
                        return true;
                    }
                }
                Err(err) if err.is_unauthorized() => {
                    tracing::error!(
                        target: "luma::sync",
                        probe = %probe.name(),
                        attempt,
                        error = %err,
                        "sync aborted: session no longer authorized"
                    );
                    return false;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "luma::sync",
                        probe = %probe.name(),
                        attempt,
                        error = %err,
                        "sync round failed"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        tracing::warn!(
            target: "luma::sync",
            probe = %probe.name(),
            max_attempts,
            "probe did not converge"
        );
        false
    }

    /// Synchronizes probes in order, stopping at the first one that fails.
    pub async fn synchronize_all(&self, probes: &mut [Probe]) -> bool {
        for probe in probes.iter_mut() {
            if !self.synchronize(probe).await {
                tracing::error!(
                    target: "luma::sync",
                    probe = %probe.name(),
                    "probe failed to synchronize; aborting round"
                );
                return false;
            }
        }
        tracing::info!(target: "luma::sync", count = probes.len(), "all probes synchronized");
        true
    }

    async fn exchange(&self, probe: &Probe) -> Result<OffsetEstimate, SessionError> {
        let t0 = self.clock.now_ticks();
        let stamps = self.client.sync_probe(probe.id()).await?;
        let t3 = self.clock.now_ticks();

        let t1 = probe.decode_timestamp(&stamps.t1)?;
        let t2 = probe.decode_timestamp(&stamps.t2)?;
        Ok(OffsetEstimate::from_exchange(t0, t1, t2, t3))
    }
}
