//! In-process stand-in for the Luma session API.
//!
//! Probes keep their own clocks, each a fixed skew away from the shared simulated local
//! clock. Every clock read, on either side, advances simulated time by one step, so sync
//! exchanges see a small symmetric network delay.

#![allow(dead_code)]

use async_trait::async_trait;
use luma_sync::clock::Clock;
use luma_sync::codec::{self, Ticks, TimestampEncoding};
use luma_sync::session::{
    CheckJobRequest, CheckJobResponse, JobDto, JobResponse, ProbeDto, ProbesResponse,
    ResponseCode, SessionBackend, SessionError, StartRequest, StartResponse, SyncResponse,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

pub const START_TICKS: Ticks = 638_397_614_450_000_000;
pub const STEP_TICKS: Ticks = 10_000;
/// How far a submitted timestamp may stray from the probe's clock.
pub const CHECK_TOLERANCE_TICKS: Ticks = 50_000;

/// Simulated local clock shared by the client and the fake server.
#[derive(Debug)]
pub struct SimClock {
    now: AtomicI64,
    step: Ticks,
}

impl SimClock {
    pub fn new(start: Ticks, step: Ticks) -> Self {
        Self {
            now: AtomicI64::new(start),
            step,
        }
    }
}

impl Clock for SimClock {
    fn now_ticks(&self) -> Ticks {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SimProbe {
    pub id: String,
    pub name: String,
    /// Advertised wire name; may be deliberately unknown.
    pub encoding: String,
    pub skew: Ticks,
}

impl SimProbe {
    pub fn new(id: &str, name: &str, encoding: TimestampEncoding, skew: Ticks) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            encoding: encoding.as_str().into(),
            skew,
        }
    }

    fn codec(&self) -> Result<TimestampEncoding, SessionError> {
        Ok(self.encoding.parse()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub job_id: String,
    pub probe_name: String,
    pub error: Ticks,
    pub round_trip: Ticks,
    pub code: ResponseCode,
}

#[derive(Default)]
struct State {
    issued_token: Option<String>,
    jobs: VecDeque<(String, String)>,
    /// Job ids claimed but not yet checked, with their probe names.
    claimed: Vec<(String, String)>,
    checks: Vec<CheckRecord>,
}

pub struct SimulatedLuma {
    clock: Arc<SimClock>,
    username: String,
    probes: Vec<SimProbe>,
    finish_with_done: bool,
    state: Mutex<State>,
    syncs: AtomicUsize,
    tokens_issued: AtomicUsize,
}

impl SimulatedLuma {
    pub fn new(clock: Arc<SimClock>, username: &str, probes: Vec<SimProbe>) -> Self {
        Self {
            clock,
            username: username.into(),
            probes,
            finish_with_done: false,
            state: Mutex::new(State::default()),
            syncs: AtomicUsize::new(0),
            tokens_issued: AtomicUsize::new(0),
        }
    }

    /// Answer the last queued job with `Done` instead of `Success`.
    pub fn finish_with_done(mut self) -> Self {
        self.finish_with_done = true;
        self
    }

    pub fn queue_job(&self, id: &str, probe_name: &str) {
        self.state
            .lock()
            .unwrap()
            .jobs
            .push_back((id.into(), probe_name.into()));
    }

    /// Forget the issued token, as if it had expired server-side.
    pub fn revoke_token(&self) {
        self.state.lock().unwrap().issued_token = None;
    }

    pub fn checks(&self) -> Vec<CheckRecord> {
        self.state.lock().unwrap().checks.clone()
    }

    pub fn remaining_jobs(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }

    pub fn sync_count(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }

    fn authorized(&self, token: &str) -> bool {
        self.state.lock().unwrap().issued_token.as_deref() == Some(token)
    }

    fn probe_by_id(&self, id: &str) -> Option<&SimProbe> {
        self.probes.iter().find(|probe| probe.id == id)
    }

    fn probe_by_name(&self, name: &str) -> Option<&SimProbe> {
        self.probes.iter().find(|probe| probe.name == name)
    }

    fn probe_clock(&self, probe: &SimProbe) -> Ticks {
        self.clock.now_ticks() + probe.skew
    }
}

fn code(code: &str) -> ResponseCode {
    ResponseCode::from(code)
}

#[async_trait]
impl SessionBackend for SimulatedLuma {
    async fn start_session(
        &self,
        _base_url: &Url,
        request: &StartRequest,
    ) -> Result<StartResponse, SessionError> {
        if request.username != self.username || !request.email.contains('@') {
            return Ok(StartResponse {
                access_token: None,
                code: code("Fail"),
                message: Some("unknown user".into()),
            });
        }
        let serial = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("sim-token-{serial}");
        self.state.lock().unwrap().issued_token = Some(token.clone());
        Ok(StartResponse {
            access_token: Some(token),
            code: code("Success"),
            message: None,
        })
    }

    async fn list_probes(
        &self,
        _base_url: &Url,
        token: &str,
    ) -> Result<ProbesResponse, SessionError> {
        if !self.authorized(token) {
            return Ok(ProbesResponse {
                probes: None,
                code: code("Unauthorized"),
                message: None,
            });
        }
        Ok(ProbesResponse {
            probes: Some(
                self.probes
                    .iter()
                    .map(|probe| ProbeDto {
                        id: probe.id.clone(),
                        name: probe.name.clone(),
                        encoding: probe.encoding.clone(),
                    })
                    .collect(),
            ),
            code: code("Success"),
            message: None,
        })
    }

    async fn sync_probe(
        &self,
        _base_url: &Url,
        token: &str,
        probe_id: &str,
    ) -> Result<SyncResponse, SessionError> {
        if !self.authorized(token) {
            return Ok(SyncResponse {
                t1: None,
                t2: None,
                code: code("Unauthorized"),
                message: None,
            });
        }
        let Some(probe) = self.probe_by_id(probe_id) else {
            return Ok(SyncResponse {
                t1: None,
                t2: None,
                code: code("Fail"),
                message: Some("no such probe".into()),
            });
        };
        self.syncs.fetch_add(1, Ordering::SeqCst);
        let encoding = probe.codec()?;
        let t1 = codec::encode(self.probe_clock(probe), encoding)?;
        let t2 = codec::encode(self.probe_clock(probe), encoding)?;
        Ok(SyncResponse {
            t1: Some(t1),
            t2: Some(t2),
            code: code("Success"),
            message: None,
        })
    }

    async fn take_job(&self, _base_url: &Url, token: &str) -> Result<JobResponse, SessionError> {
        if !self.authorized(token) {
            return Ok(JobResponse {
                job: None,
                code: code("Unauthorized"),
                message: None,
            });
        }
        let mut state = self.state.lock().unwrap();
        match state.jobs.pop_front() {
            Some((id, probe_name)) => {
                state.claimed.push((id.clone(), probe_name.clone()));
                Ok(JobResponse {
                    job: Some(JobDto { id, probe_name }),
                    code: code("Success"),
                    message: None,
                })
            }
            None => Ok(JobResponse {
                job: None,
                code: code("Fail"),
                message: Some("no more jobs".into()),
            }),
        }
    }

    async fn check_job(
        &self,
        _base_url: &Url,
        token: &str,
        job_id: &str,
        request: &CheckJobRequest,
    ) -> Result<CheckJobResponse, SessionError> {
        if !self.authorized(token) {
            return Ok(CheckJobResponse {
                code: code("Unauthorized"),
                message: None,
            });
        }

        let claimed = {
            let mut state = self.state.lock().unwrap();
            let position = state.claimed.iter().position(|(id, _)| id == job_id);
            position.map(|index| state.claimed.remove(index))
        };
        let Some((_, probe_name)) = claimed else {
            return Ok(CheckJobResponse {
                code: code("Fail"),
                message: Some("job not claimed".into()),
            });
        };
        let Some(probe) = self.probe_by_name(&probe_name) else {
            return Ok(CheckJobResponse {
                code: code("Fail"),
                message: Some("no such probe".into()),
            });
        };

        let submitted = codec::decode(&request.probe_now, probe.codec()?);
        let expected = self.probe_clock(probe);
        let (error, accepted) = match submitted {
            Ok(ticks) => {
                let error = ticks - expected;
                (error, error.abs() <= CHECK_TOLERANCE_TICKS && request.round_trip >= 0)
            }
            Err(_) => (Ticks::MAX, false),
        };

        let mut state = self.state.lock().unwrap();
        let answer = if !accepted {
            code("Fail")
        } else if self.finish_with_done && state.jobs.is_empty() {
            code("Done")
        } else {
            code("Success")
        };
        state.checks.push(CheckRecord {
            job_id: job_id.into(),
            probe_name,
            error,
            round_trip: request.round_trip,
            code: answer.clone(),
        });
        Ok(CheckJobResponse {
            code: answer,
            message: None,
        })
    }
}
