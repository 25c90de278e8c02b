//! JSON documents exchanged with the Luma API. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result code carried by every API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseCode {
    Success,
    Fail,
    Unauthorized,
    Done,
    Other(String),
}

impl ResponseCode {
    pub fn as_str(&self) -> &str {
        match self {
            ResponseCode::Success => "Success",
            ResponseCode::Fail => "Fail",
            ResponseCode::Unauthorized => "Unauthorized",
            ResponseCode::Done => "Done",
            ResponseCode::Other(code) => code,
        }
    }
}

impl From<String> for ResponseCode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Success" => ResponseCode::Success,
            "Fail" => ResponseCode::Fail,
            "Unauthorized" => ResponseCode::Unauthorized,
            "Done" => ResponseCode::Done,
            _ => ResponseCode::Other(value),
        }
    }
}

impl From<&str> for ResponseCode {
    fn from(value: &str) -> Self {
        ResponseCode::from(value.to_string())
    }
}

impl From<ResponseCode> for String {
    fn from(value: ResponseCode) -> Self {
        match value {
            ResponseCode::Other(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    pub code: ResponseCode,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeDto {
    pub id: String,
    pub name: String,
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbesResponse {
    #[serde(default)]
    pub probes: Option<Vec<ProbeDto>>,
    pub code: ResponseCode,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    #[serde(default)]
    pub t1: Option<String>,
    #[serde(default)]
    pub t2: Option<String>,
    pub code: ResponseCode,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDto {
    pub id: String,
    pub probe_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    #[serde(default)]
    pub job: Option<JobDto>,
    pub code: ResponseCode,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckJobRequest {
    pub probe_now: String,
    pub round_trip: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckJobResponse {
    pub code: ResponseCode,
    #[serde(default)]
    pub message: Option<String>,
}
