//! `reqwest` implementation of [`ChoreApi`].

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::ChoreApi;
use crate::error::ApiError;
use crate::model::{
    AuthResponse, Cleaner, CleanerId, Created, ErrorBody, IpResponse, NewCleaner, NewTask, Task,
    TaskCompletion, TaskId, User, Weekday,
};

/// HTTP client for the chore backend.
pub struct HttpApi {
    client: reqwest::Client,
    /// Origin without the `/api` suffix, e.g. `https://chores.example.com`.
    base_url: RwLock<String>,
}

impl HttpApi {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ApiError::Transport {
                operation: "build_client".into(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: RwLock::new(base_url),
        })
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Point subsequent calls at a different backend address.
    pub fn set_base_url(&self, url: &str) -> Result<(), ApiError> {
        let url = normalize_base_url(url)?;
        info!(base_url = %url, "API base URL set");
        *self.base_url.write().unwrap_or_else(|e| e.into_inner()) = url;
        Ok(())
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/api/{resource}", self.base_url())
    }

    /// Send a request and turn transport failures and non-2xx statuses into
    /// [`ApiError`]s, logging each one.
    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| {
            warn!(operation, error = %e, "Network error");
            ApiError::Transport {
                operation: operation.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(operation, status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        warn!(operation, status = status.as_u16(), error = %message, "Backend returned an error");
        Err(ApiError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(|e| {
            warn!(operation, error = %e, "Failed to decode response body");
            ApiError::Decode {
                operation: operation.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl ChoreApi for HttpApi {
    async fn resolve_base_url(&self) -> Result<String, ApiError> {
        let op = "resolve_base_url";
        let resp = self.send(op, self.client.get(self.endpoint("ip"))).await?;
        let body: IpResponse = Self::decode(op, resp).await?;
        normalize_base_url(&body.ip)
    }

    async fn authenticate(&self, name: &str, password: &SecretString) -> Result<User, ApiError> {
        let op = "authenticate";
        let body = serde_json::json!({
            "name": name,
            "password": password.expose_secret(),
        });
        let resp = self
            .send(op, self.client.post(self.endpoint("authenticate")).json(&body))
            .await?;
        let auth: AuthResponse = Self::decode(op, resp).await?;
        Ok(auth.into_user(name))
    }

    async fn list_cleaners(&self) -> Result<Vec<Cleaner>, ApiError> {
        let op = "list_cleaners";
        let resp = self.send(op, self.client.get(self.endpoint("cleaners"))).await?;
        Self::decode(op, resp).await
    }

    async fn add_cleaner(&self, name: &str) -> Result<Created<Cleaner>, ApiError> {
        let op = "add_cleaner";
        let resp = self
            .send(
                op,
                self.client
                    .post(self.endpoint("cleaners"))
                    .json(&NewCleaner { name }),
            )
            .await?;
        Self::decode(op, resp).await
    }

    async fn remove_cleaner(&self, id: CleanerId) -> Result<(), ApiError> {
        self.send(
            "remove_cleaner",
            self.client
                .delete(self.endpoint("cleaners"))
                .query(&[("id", id)]),
        )
        .await?;
        Ok(())
    }

    async fn list_tasks(&self, scope: Option<CleanerId>) -> Result<Vec<Task>, ApiError> {
        let op = "list_tasks";
        let mut request = self.client.get(self.endpoint("tasks"));
        if let Some(cleaner_id) = scope {
            request = request.query(&[("cleaner_id", cleaner_id)]);
        }
        let resp = self.send(op, request).await?;
        let rows: Vec<serde_json::Value> = Self::decode(op, resp).await?;
        Ok(decode_task_rows(rows))
    }

    async fn add_task(
        &self,
        cleaner_id: CleanerId,
        day: Weekday,
        description: &str,
    ) -> Result<Created<Task>, ApiError> {
        let op = "add_task";
        let body = NewTask {
            cleaner_id,
            day,
            task: description,
        };
        let resp = self
            .send(op, self.client.post(self.endpoint("tasks")).json(&body))
            .await?;
        Self::decode(op, resp).await
    }

    async fn remove_task(&self, id: TaskId) -> Result<(), ApiError> {
        self.send(
            "remove_task",
            self.client.delete(self.endpoint("tasks")).query(&[("id", id)]),
        )
        .await?;
        Ok(())
    }

    async fn set_task_completed(&self, id: TaskId, completed: bool) -> Result<(), ApiError> {
        self.send(
            "set_task_completed",
            self.client
                .put(self.endpoint("tasks"))
                .json(&TaskCompletion { id, completed }),
        )
        .await?;
        Ok(())
    }

    fn qr_code_url(&self) -> String {
        format!(
            "{}?t={}",
            self.endpoint("qr"),
            chrono::Utc::now().timestamp_millis()
        )
    }
}

/// Decode task rows one at a time. Rows that do not parse (for example a day
/// that is not a weekday name) are logged and skipped.
fn decode_task_rows(rows: Vec<serde_json::Value>) -> Vec<Task> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<Task>(row.clone()) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(error = %e, row = %row, "Skipping malformed task row");
                None
            }
        })
        .collect()
}

/// Normalize a backend address: trim whitespace, trailing slashes, and a
/// trailing `/api` segment. Only `http`/`https` are accepted.
pub fn normalize_base_url(url: &str) -> Result<String, ApiError> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/api").unwrap_or(trimmed);
    let trimmed = trimmed.trim_end_matches('/');

    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() => Ok(trimmed.to_string()),
        _ => Err(ApiError::InvalidUrl {
            url: url.to_string(),
            reason: "expected an http(s) URL with a host".into(),
        }),
    }
}
