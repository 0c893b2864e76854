//! Remote persistence client.
//!
//! [`SessionApi`] is the seam the sync engine talks through; tests plug in
//! scripted fakes, the CLI uses [`ReqwestSessionApi`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use url::Url;

use super::normalize::normalize_stats;
use super::stats::Stats;
use super::types::{NewSession, Session, SessionId};
use crate::error::{ApiError, ConfigError};
use crate::timer::PLACEHOLDER_TASK;

#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Sessions, most recent first.
    async fn fetch_sessions(&self, token: &str) -> Result<Vec<Session>, ApiError>;

    async fn fetch_stats(&self, token: &str) -> Result<Stats, ApiError>;

    /// Persist one session and return the server's copy.
    async fn create_session(&self, token: &str, session: &NewSession) -> Result<Session, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestSessionApi {
    client: Client,
    base_url: Url,
}

impl ReqwestSessionApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            key: "sync.base_url".to_string(),
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                key: "sync.base_url".to_string(),
                message: format!("{base_url} cannot be used as a base URL"),
            });
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "sync.request_timeout_secs".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segment: &str) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Decode(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    fn ensure_token(token: &str) -> Result<(), ApiError> {
        if token.trim().is_empty() {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }

    /// Read the body, mapping non-2xx statuses into [`ApiError`].
    async fn read_body(response: Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.trim().to_string()
            };
            return Err(ApiError::from_status(status.as_u16(), message));
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RemoteSession {
    id: RemoteId,
    #[serde(alias = "durationMinutes", alias = "duration_minutes")]
    duration: f64,
    #[serde(default, alias = "taskName", alias = "task_name")]
    task: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default, alias = "createdAt")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "startTime")]
    start_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "endTime")]
    end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SessionList {
    Bare(Vec<RemoteSession>),
    Wrapped { sessions: Vec<RemoteSession> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SessionEnvelope {
    Wrapped { session: RemoteSession },
    Bare(RemoteSession),
}

impl RemoteSession {
    fn into_session(self) -> Result<Session, ApiError> {
        let id = match self.id {
            RemoteId::Number(id) => id,
            RemoteId::Text(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ApiError::Decode(format!("session id {raw:?} is not numeric")))?,
        };
        let task = self
            .task
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| PLACEHOLDER_TASK.to_string());
        let duration = if self.duration.is_finite() && self.duration > 0.0 {
            self.duration.round() as u32
        } else {
            0
        };

        Ok(Session {
            id: SessionId::Confirmed(id),
            duration,
            task,
            completed: self.completed.unwrap_or(true),
            created_at: self
                .created_at
                .or(self.end_time)
                .or(self.start_time)
                .unwrap_or_default(),
            start_time: self.start_time,
            end_time: self.end_time,
            unsaved: false,
        })
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str, what: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(format!("invalid {what} payload: {e}")))
}

#[async_trait]
impl SessionApi for ReqwestSessionApi {
    async fn fetch_sessions(&self, token: &str) -> Result<Vec<Session>, ApiError> {
        Self::ensure_token(token)?;
        let response = self
            .client
            .get(self.endpoint("sessions")?)
            .bearer_auth(token)
            .send()
            .await?;
        let body = Self::read_body(response).await?;

        let remote = match decode::<SessionList>(&body, "session list")? {
            SessionList::Bare(list) | SessionList::Wrapped { sessions: list } => list,
        };
        remote.into_iter().map(RemoteSession::into_session).collect()
    }

    async fn fetch_stats(&self, token: &str) -> Result<Stats, ApiError> {
        Self::ensure_token(token)?;
        let response = self
            .client
            .get(self.endpoint("stats")?)
            .bearer_auth(token)
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        normalize_stats(decode(&body, "stats")?)
    }

    async fn create_session(&self, token: &str, session: &NewSession) -> Result<Session, ApiError> {
        Self::ensure_token(token)?;
        let response = self
            .client
            .post(self.endpoint("sessions")?)
            .bearer_auth(token)
            .json(session)
            .send()
            .await?;
        let body = Self::read_body(response).await?;

        match decode::<SessionEnvelope>(&body, "session")? {
            SessionEnvelope::Wrapped { session } | SessionEnvelope::Bare(session) => {
                session.into_session()
            }
        }
    }
}
