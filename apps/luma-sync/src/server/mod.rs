//! HTTP trigger: `POST /sync` runs one workflow and reports the outcome.

use crate::auth::TokenManager;
use crate::clock::{Clock, SystemClock};
use crate::codec::TimestampEncoding;
use crate::jobs::JobPolicy;
use crate::model::Probe;
use crate::session::{
    ReqwestSessionBackend, SessionBackend, SessionClient, SessionConfig, SessionError,
};
use crate::sync::SyncPolicy;
use crate::workflow::{Orchestrator, WorkflowReport};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    session: SessionConfig,
    backend: Arc<dyn SessionBackend>,
    clock: Arc<dyn Clock>,
    sync_policy: SyncPolicy,
    job_policy: JobPolicy,
}

impl AppState {
    pub fn new(session: SessionConfig) -> Result<Self, SessionError> {
        let backend = Arc::new(ReqwestSessionBackend::new(session.timeout())?);
        Ok(Self::with_backend(session, backend, Arc::new(SystemClock)))
    }

    pub fn with_backend(
        session: SessionConfig,
        backend: Arc<dyn SessionBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session,
            backend,
            clock,
            sync_policy: SyncPolicy::default(),
            job_policy: JobPolicy::default(),
        }
    }

    pub fn with_policies(mut self, sync_policy: SyncPolicy, job_policy: JobPolicy) -> Self {
        self.sync_policy = sync_policy;
        self.job_policy = job_policy;
        self
    }

    /// Each request gets its own token slot, so concurrent runs never share a session.
    fn orchestrator(&self) -> Orchestrator {
        let client = SessionClient::with_backend(
            self.session.clone(),
            Arc::clone(&self.backend),
            Arc::new(TokenManager::new()),
        );
        Orchestrator::new(client, Arc::clone(&self.clock))
            .with_policies(self.sync_policy, self.job_policy)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/sync", post(trigger_sync))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(target: "luma::server", %addr, "listening");
    axum::serve(listener, build_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(target: "luma::server", error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!(target: "luma::server", "shutting down");
}

async fn health_check() -> &'static str {
    "ok"
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeInfo {
    pub id: String,
    pub name: String,
    pub encoding: TimestampEncoding,
    pub is_synchronized: bool,
}

impl From<&Probe> for ProbeInfo {
    fn from(probe: &Probe) -> Self {
        Self {
            id: probe.id().to_string(),
            name: probe.name().to_string(),
            encoding: probe.encoding(),
            is_synchronized: probe.is_synchronized(),
        }
    }
}

/// Outcome document shared by the HTTP trigger and the command line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
    pub timestamp: String,
    pub probes: Vec<ProbeInfo>,
}

pub const SUCCESS_MESSAGE: &str = "Synchronization and job processing completed successfully";
pub const FAILURE_MESSAGE: &str = "Synchronization or job processing failed";
pub const MISSING_CREDENTIALS_MESSAGE: &str = "Username and email are required";
pub const INVALID_BODY_MESSAGE: &str = "Request body must be a JSON object";

impl SyncReport {
    pub fn from_workflow(report: &WorkflowReport, elapsed: Duration) -> Self {
        let message = if report.success {
            SUCCESS_MESSAGE
        } else {
            FAILURE_MESSAGE
        };
        Self {
            success: report.success,
            message: message.to_string(),
            duration_ms: millis(elapsed),
            timestamp: now_rfc3339(),
            probes: report.probes.iter().map(ProbeInfo::from).collect(),
        }
    }

    fn rejected(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            duration_ms: 0,
            timestamp: now_rfc3339(),
            probes: Vec::new(),
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::new())
}

/// Runs a workflow for `username`/`email` and reports it.
pub async fn run_report(orchestrator: &Orchestrator, username: &str, email: &str) -> SyncReport {
    let started = Instant::now();
    let report = orchestrator.run(username, email).await;
    SyncReport::from_workflow(&report, started.elapsed())
}

async fn trigger_sync(
    State(state): State<AppState>,
    request: Result<Json<SyncRequest>, JsonRejection>,
) -> (StatusCode, Json<SyncReport>) {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            tracing::warn!(
                target: "luma::server",
                error = %rejection.body_text(),
                "unreadable sync request"
            );
            return (
                StatusCode::BAD_REQUEST,
                Json(SyncReport::rejected(INVALID_BODY_MESSAGE)),
            );
        }
    };
    let username = request.username.trim();
    let email = request.email.trim();
    if username.is_empty() || email.is_empty() {
        tracing::warn!(target: "luma::server", "sync request missing username or email");
        return (
            StatusCode::BAD_REQUEST,
            Json(SyncReport::rejected(MISSING_CREDENTIALS_MESSAGE)),
        );
    }

    tracing::info!(target: "luma::server", username, "sync triggered");
    let report = run_report(&state.orchestrator(), username, email).await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    tracing::info!(
        target: "luma::server",
        success = report.success,
        duration_ms = report.duration_ms,
        "sync finished"
    );
    (status, Json(report))
}
