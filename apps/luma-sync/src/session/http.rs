use super::wire::{
    CheckJobRequest, CheckJobResponse, JobResponse, ProbesResponse, StartRequest, StartResponse,
    SyncResponse,
};
use super::{SessionBackend, SessionError};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("luma-sync/", env!("CARGO_PKG_VERSION"));

/// [`SessionBackend`] speaking JSON over HTTPS.
pub struct ReqwestSessionBackend {
    client: reqwest::Client,
}

impl ReqwestSessionBackend {
    pub fn new(timeout: Duration) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

fn endpoint(base_url: &Url, path: &str) -> Result<Url, SessionError> {
    base_url
        .join(path)
        .map_err(|err| SessionError::InvalidConfig(format!("invalid endpoint '{path}': {err}")))
}

/// `{collection}/{id}/{action}` under the base URL. The id is escaped as a single path
/// segment; ids `url` would drop or resolve (`""`, `.`, `..`) are refused.
fn resource_endpoint(
    base_url: &Url,
    collection: &str,
    id: &str,
    action: &str,
) -> Result<Url, SessionError> {
    if matches!(id, "" | "." | "..") {
        return Err(SessionError::InvalidResponse(format!(
            "unusable resource id '{id}'"
        )));
    }
    let mut url = endpoint(base_url, collection)?;
    url.path_segments_mut()
        .map_err(|_| SessionError::InvalidConfig(format!("cannot extend endpoint '{collection}'")))?
        .pop_if_empty()
        .push(id)
        .push(action);
    Ok(url)
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SessionError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(SessionError::Unauthorized(format!(
            "{} returned {status}",
            response.url().path()
        )));
    }
    if !status.is_success() {
        return Err(SessionError::HttpStatus(status));
    }
    Ok(response.json::<T>().await?)
}

#[async_trait]
impl SessionBackend for ReqwestSessionBackend {
    async fn start_session(
        &self,
        base_url: &Url,
        request: &StartRequest,
    ) -> Result<StartResponse, SessionError> {
        let url = endpoint(base_url, "api/start")?;
        let response = self.client.post(url).json(request).send().await?;
        read_json(response).await
    }

    async fn list_probes(
        &self,
        base_url: &Url,
        token: &str,
    ) -> Result<ProbesResponse, SessionError> {
        let url = endpoint(base_url, "api/probe")?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        read_json(response).await
    }

    async fn sync_probe(
        &self,
        base_url: &Url,
        token: &str,
        probe_id: &str,
    ) -> Result<SyncResponse, SessionError> {
        let url = resource_endpoint(base_url, "api/probe/", probe_id, "sync")?;
        let response = self.client.post(url).bearer_auth(token).send().await?;
        read_json(response).await
    }

    async fn take_job(&self, base_url: &Url, token: &str) -> Result<JobResponse, SessionError> {
        let url = endpoint(base_url, "api/job/take")?;
        let response = self.client.post(url).bearer_auth(token).send().await?;
        read_json(response).await
    }

    async fn check_job(
        &self,
        base_url: &Url,
        token: &str,
        job_id: &str,
        request: &CheckJobRequest,
    ) -> Result<CheckJobResponse, SessionError> {
        let url = resource_endpoint(base_url, "api/job/", job_id, "check")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }
}
