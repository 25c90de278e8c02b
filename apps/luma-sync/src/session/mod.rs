//! Client for the Luma session API.
//!
//! [`SessionBackend`] is the raw transport: one method per endpoint, returning the response
//! documents untouched. [`SessionClient`] layers the session rules on top: every
//! authenticated call goes through the [`TokenManager`], response codes are validated, and
//! an `Unauthorized` answer drops the stored token before the error is returned.

mod http;
pub mod wire;

use crate::auth::TokenManager;
use crate::codec::{CodecError, Ticks, TimestampEncoding};
use crate::model::{Job, Probe};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub use http::ReqwestSessionBackend;
pub use reqwest::StatusCode;
pub use wire::{
    CheckJobRequest, CheckJobResponse, JobDto, JobResponse, ProbeDto, ProbesResponse,
    ResponseCode, StartRequest, StartResponse, SyncResponse,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct SessionConfig {
    base_url: Url,
    timeout: Duration,
}

impl SessionConfig {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, SessionError> {
        let mut base = base_url.as_ref().trim().to_string();
        if base.is_empty() {
            return Err(SessionError::InvalidConfig(
                "api base url cannot be empty".into(),
            ));
        }
        if !base.contains("://") {
            base = format!("{}{base}", infer_scheme(&base));
        }
        // Relative endpoints only join under the base path when it ends with a slash.
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|err| SessionError::InvalidConfig(format!("invalid api base url: {err}")))?;
        Ok(Self {
            base_url,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn infer_scheme(base: &str) -> &'static str {
    let host = base.split(['/', ':']).next().unwrap_or(base).to_ascii_lowercase();
    if host == "localhost" || host == "0.0.0.0" || host.starts_with("127.") {
        "http://"
    } else {
        "https://"
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected http status {0}")]
    HttpStatus(StatusCode),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("server answered {code}: {message}")]
    Rejected { code: ResponseCode, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl SessionError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SessionError::Unauthorized(_))
    }

    /// Errors that retrying cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Unauthorized(_) | SessionError::Codec(_) | SessionError::InvalidConfig(_)
        )
    }
}

#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn start_session(
        &self,
        base_url: &Url,
        request: &StartRequest,
    ) -> Result<StartResponse, SessionError>;

    async fn list_probes(&self, base_url: &Url, token: &str)
    -> Result<ProbesResponse, SessionError>;

    async fn sync_probe(
        &self,
        base_url: &Url,
        token: &str,
        probe_id: &str,
    ) -> Result<SyncResponse, SessionError>;

    async fn take_job(&self, base_url: &Url, token: &str) -> Result<JobResponse, SessionError>;

    async fn check_job(
        &self,
        base_url: &Url,
        token: &str,
        job_id: &str,
        request: &CheckJobRequest,
    ) -> Result<CheckJobResponse, SessionError>;
}

/// Probe-encoded receive (`t1`) and reply (`t2`) instants from one sync exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTimestamps {
    pub t1: String,
    pub t2: String,
}

#[derive(Clone)]
pub struct SessionClient {
    config: Arc<SessionConfig>,
    backend: Arc<dyn SessionBackend>,
    tokens: Arc<TokenManager>,
}

impl SessionClient {
    pub fn new(config: SessionConfig, tokens: Arc<TokenManager>) -> Result<Self, SessionError> {
        let backend = Arc::new(ReqwestSessionBackend::new(config.timeout())?);
        Ok(Self::with_backend(config, backend, tokens))
    }

    pub fn with_backend(
        config: SessionConfig,
        backend: Arc<dyn SessionBackend>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            tokens,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Opens a session and stores the issued access token.
    pub async fn start_session(&self, username: &str, email: &str) -> Result<String, SessionError> {
        tracing::info!(target: "luma::session", username, "starting session");
        let request = StartRequest {
            username: username.to_string(),
            email: email.to_string(),
        };

        let response = self
            .backend
            .start_session(self.config.base_url(), &request)
            .await?;
        if let Err(err) = ensure_success(&response.code, response.message.as_deref()) {
            if err.is_unauthorized() {
                self.tokens.invalidate();
            }
            return Err(err);
        }

        let token = response
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                SessionError::InvalidResponse("start response carried no access token".into())
            })?;

        self.tokens.set_token(token.clone());
        tracing::info!(target: "luma::session", "session started");
        Ok(token)
    }

    pub async fn list_probes(&self) -> Result<Vec<Probe>, SessionError> {
        self.authorized(|token| async move {
            let response = self
                .backend
                .list_probes(self.config.base_url(), &token)
                .await?;
            ensure_success(&response.code, response.message.as_deref())?;

            let dtos = response.probes.ok_or_else(|| {
                SessionError::InvalidResponse("probe list missing from response".into())
            })?;
            let probes = dtos
                .into_iter()
                .map(|dto| -> Result<Probe, SessionError> {
                    let encoding = dto.encoding.parse::<TimestampEncoding>()?;
                    Ok(Probe::new(dto.id, dto.name, encoding))
                })
                .collect::<Result<Vec<_>, SessionError>>()?;

            tracing::info!(target: "luma::session", count = probes.len(), "probes listed");
            Ok::<_, SessionError>(probes)
        })
        .await
    }

    pub async fn sync_probe(&self, probe_id: &str) -> Result<ProbeTimestamps, SessionError> {
        self.authorized(|token| async move {
            tracing::debug!(target: "luma::session", probe_id, "requesting probe sync");
            let response = self
                .backend
                .sync_probe(self.config.base_url(), &token, probe_id)
                .await?;
            ensure_success(&response.code, response.message.as_deref())?;

            // Missing timestamps surface as empty strings, which the codec rejects.
            Ok::<_, SessionError>(ProbeTimestamps {
                t1: response.t1.unwrap_or_default(),
                t2: response.t2.unwrap_or_default(),
            })
        })
        .await
    }

    /// Claims the next job. `None` means the queue is drained.
    pub async fn take_job(&self) -> Result<Option<Job>, SessionError> {
        self.authorized(|token| async move {
            tracing::debug!(target: "luma::session", "taking next job");
            let response = self
                .backend
                .take_job(self.config.base_url(), &token)
                .await?;
            if response.code == ResponseCode::Unauthorized {
                return Err(unauthorized(response.message.as_deref()));
            }

            match response.job {
                Some(dto) => {
                    tracing::info!(
                        target: "luma::session",
                        job_id = %dto.id,
                        probe = %dto.probe_name,
                        "job claimed"
                    );
                    Ok(Some(Job::new(dto.id, dto.probe_name)))
                }
                None => {
                    if response.code != ResponseCode::Success {
                        tracing::info!(
                            target: "luma::session",
                            code = %response.code,
                            "no more jobs available"
                        );
                    }
                    Ok(None)
                }
            }
        })
        .await
    }

    /// Submits a job's probe timestamp; the returned code drives the job loop.
    pub async fn check_job(
        &self,
        job_id: &str,
        probe_now: &str,
        round_trip: Ticks,
    ) -> Result<ResponseCode, SessionError> {
        self.authorized(|token| async move {
            tracing::debug!(target: "luma::session", job_id, "checking job");
            let request = CheckJobRequest {
                probe_now: probe_now.to_string(),
                round_trip,
            };
            let response = self
                .backend
                .check_job(self.config.base_url(), &token, job_id, &request)
                .await?;

            tracing::info!(
                target: "luma::session",
                job_id,
                code = %response.code,
                message = response.message.as_deref().unwrap_or(""),
                "job checked"
            );
            if response.code == ResponseCode::Unauthorized {
                return Err(unauthorized(response.message.as_deref()));
            }
            Ok(response.code)
        })
        .await
    }

    async fn authorized<T, F, Fut>(&self, operation: F) -> Result<T, SessionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let token = self
            .tokens
            .valid_token()
            .ok_or_else(|| SessionError::Unauthorized("no valid access token".into()))?;

        match operation(token).await {
            Err(err) if err.is_unauthorized() => {
                tracing::warn!(
                    target: "luma::session",
                    error = %err,
                    "token rejected during call; invalidating"
                );
                self.tokens.invalidate();
                Err(err)
            }
            other => other,
        }
    }
}

fn unauthorized(message: Option<&str>) -> SessionError {
    SessionError::Unauthorized(message.unwrap_or("token expired or invalid").to_string())
}

fn ensure_success(code: &ResponseCode, message: Option<&str>) -> Result<(), SessionError> {
    match code {
        ResponseCode::Success => Ok(()),
        ResponseCode::Unauthorized => Err(unauthorized(message)),
        other => Err(SessionError::Rejected {
            code: other.clone(),
            message: message.unwrap_or("no message").to_string(),
        }),
    }
}
