//! Todoist REST API (v2) client
//!
//! Every call carries the caller's bearer token and times out after 30
//! seconds. [`RemoteError`] keeps "no data" apart from "request failed"

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Default Todoist REST API base URL
pub const DEFAULT_API_BASE: &str = "https://api.todoist.com/rest/v2";

/// HTTP request timeout
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors talking to Todoist
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport failure (connection refused, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    /// Body could not be interpreted
    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

/// Due information as returned by Todoist
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteDue {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
}

/// A task as returned by `GET /tasks`; ids stay raw JSON since older API versions sent numbers
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTask {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due: Option<RemoteDue>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub project_id: Option<Value>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Thin Todoist REST client
#[derive(Debug, Clone)]
pub struct TodoistClient {
    client: Client,
    base_url: String,
}

impl TodoistClient {
    /// Client for the given API base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Client for the public Todoist API
    pub fn with_defaults() -> Result<Self, RemoteError> {
        Self::new(DEFAULT_API_BASE)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return the JSON body, `Value::Null` when empty
    async fn request(&self, method: Method, token: &str, endpoint: &str) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%method, endpoint, "Todoist request");

        let response = self
            .client
            .request(method, &url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|err| RemoteError::Decode {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })
    }

    /// All open tasks; undecodable items are skipped, a non-array body is a decode error
    pub async fn get_tasks(&self, token: &str) -> Result<Vec<RemoteTask>, RemoteError> {
        let body = self.request(Method::GET, token, "/tasks").await?;
        let Value::Array(items) = body else {
            return Err(RemoteError::Decode {
                endpoint: "/tasks".to_string(),
                message: "expected a JSON array".to_string(),
            });
        };

        let tasks = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RemoteTask>(item) {
                Ok(task) => Some(task),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping undecodable remote task");
                    None
                }
            })
            .collect();
        Ok(tasks)
    }

    /// Close (complete) a task
    pub async fn close_task(&self, token: &str, task_id: &str) -> Result<(), RemoteError> {
        let endpoint = format!("/tasks/{}/close", task_id);
        self.request(Method::POST, token, &endpoint).await.map(|_| ())
    }

    /// Project list, used to validate a token
    pub async fn get_projects(&self, token: &str) -> Result<Value, RemoteError> {
        self.request(Method::GET, token, "/projects").await
    }
}
