//! Scripted collaborators for unit tests.

use crate::clock::Clock;
use crate::codec::{self, Ticks, TimestampEncoding};
use crate::session::{
    CheckJobRequest, CheckJobResponse, JobDto, JobResponse, ProbeDto, ProbesResponse,
    ResponseCode, SessionBackend, SessionError, StartRequest, StartResponse, SyncResponse,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Start {
        username: String,
        email: String,
    },
    ListProbes {
        token: String,
    },
    Sync {
        token: String,
        probe_id: String,
    },
    TakeJob {
        token: String,
    },
    CheckJob {
        token: String,
        job_id: String,
        request: CheckJobRequest,
    },
}

/// Backend answering from per-endpoint queues. An exhausted job queue reports the queue as
/// drained; other exhausted queues answer with an invalid-response error.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    starts: Mutex<VecDeque<Result<StartResponse, SessionError>>>,
    probes: Mutex<VecDeque<Result<ProbesResponse, SessionError>>>,
    syncs: Mutex<VecDeque<Result<SyncResponse, SessionError>>>,
    jobs: Mutex<VecDeque<Result<JobResponse, SessionError>>>,
    checks: Mutex<VecDeque<Result<CheckJobResponse, SessionError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_start(&self, response: Result<StartResponse, SessionError>) {
        self.starts.lock().push_back(response);
    }

    pub(crate) fn push_probes(&self, response: Result<ProbesResponse, SessionError>) {
        self.probes.lock().push_back(response);
    }

    pub(crate) fn push_sync(&self, response: Result<SyncResponse, SessionError>) {
        self.syncs.lock().push_back(response);
    }

    pub(crate) fn push_job(&self, response: Result<JobResponse, SessionError>) {
        self.jobs.lock().push_back(response);
    }

    pub(crate) fn push_check(&self, response: Result<CheckJobResponse, SessionError>) {
        self.checks.lock().push_back(response);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, matcher: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matcher(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

fn exhausted<T>(what: &str) -> Result<T, SessionError> {
    Err(SessionError::InvalidResponse(format!("no scripted {what} response")))
}

#[async_trait]
impl SessionBackend for ScriptedBackend {
    async fn start_session(
        &self,
        _base_url: &Url,
        request: &StartRequest,
    ) -> Result<StartResponse, SessionError> {
        self.record(Call::Start {
            username: request.username.clone(),
            email: request.email.clone(),
        });
        self.starts
            .lock()
            .pop_front()
            .unwrap_or_else(|| exhausted("start"))
    }

    async fn list_probes(
        &self,
        _base_url: &Url,
        token: &str,
    ) -> Result<ProbesResponse, SessionError> {
        self.record(Call::ListProbes {
            token: token.to_string(),
        });
        self.probes
            .lock()
            .pop_front()
            .unwrap_or_else(|| exhausted("probe list"))
    }

    async fn sync_probe(
        &self,
        _base_url: &Url,
        token: &str,
        probe_id: &str,
    ) -> Result<SyncResponse, SessionError> {
        self.record(Call::Sync {
            token: token.to_string(),
            probe_id: probe_id.to_string(),
        });
        self.syncs
            .lock()
            .pop_front()
            .unwrap_or_else(|| exhausted("sync"))
    }

    async fn take_job(&self, _base_url: &Url, token: &str) -> Result<JobResponse, SessionError> {
        self.record(Call::TakeJob {
            token: token.to_string(),
        });
        self.jobs.lock().pop_front().unwrap_or_else(|| {
            Ok(JobResponse {
                job: None,
                code: ResponseCode::Fail,
                message: Some("queue empty".into()),
            })
        })
    }

    async fn check_job(
        &self,
        _base_url: &Url,
        token: &str,
        job_id: &str,
        request: &CheckJobRequest,
    ) -> Result<CheckJobResponse, SessionError> {
        self.record(Call::CheckJob {
            token: token.to_string(),
            job_id: job_id.to_string(),
            request: request.clone(),
        });
        self.checks
            .lock()
            .pop_front()
            .unwrap_or_else(|| exhausted("check"))
    }
}

pub(crate) fn probe_dto(id: &str, name: &str, encoding: &str) -> ProbeDto {
    ProbeDto {
        id: id.into(),
        name: name.into(),
        encoding: encoding.into(),
    }
}

pub(crate) fn job_response(id: &str, probe_name: &str) -> JobResponse {
    JobResponse {
        job: Some(JobDto {
            id: id.into(),
            probe_name: probe_name.into(),
        }),
        code: ResponseCode::Success,
        message: None,
    }
}

pub(crate) fn check_response(code: &str) -> CheckJobResponse {
    CheckJobResponse {
        code: ResponseCode::from(code),
        message: None,
    }
}

/// Sync answer from a probe whose clock reads `local + skew` at both timestamps.
pub(crate) fn skewed_sync(local: Ticks, skew: Ticks, encoding: TimestampEncoding) -> SyncResponse {
    let stamp = codec::encode(local + skew, encoding).expect("encodable instant");
    SyncResponse {
        t1: Some(stamp.clone()),
        t2: Some(stamp),
        code: ResponseCode::Success,
        message: None,
    }
}

/// Clock that advances by a fixed step on every read.
pub(crate) struct FakeClock {
    now: AtomicI64,
    step: Ticks,
}

impl FakeClock {
    pub(crate) fn frozen(at: Ticks) -> Self {
        Self::stepping(at, 0)
    }

    pub(crate) fn stepping(at: Ticks, step: Ticks) -> Self {
        Self {
            now: AtomicI64::new(at),
            step,
        }
    }
}

impl Clock for FakeClock {
    fn now_ticks(&self) -> Ticks {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}
