use crate::errors::GatewayError;
use serde::{Deserialize, Serialize};

/// Query string of `GET /displayAd`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayAdQuery {
    pub user_xid: Option<String>,
    pub video_xid: Option<String>,
}

impl DisplayAdQuery {
    /// Both parameters are required and must be non-empty
    pub fn validate(&self) -> Result<(&str, &str), GatewayError> {
        let user = required(self.user_xid.as_deref(), "userXid")?;
        let video = required(self.video_xid.as_deref(), "videoXid")?;
        Ok((user, video))
    }
}

/// Query string of the per-user endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_xid: Option<String>,
}

impl UserQuery {
    pub fn user_xid(&self) -> Result<&str, GatewayError> {
        required(self.user_xid.as_deref(), "userXid")
    }
}

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub backend: &'static str,
    pub policy: &'static str,
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, GatewayError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GatewayError::MissingParameter(name)),
    }
}
