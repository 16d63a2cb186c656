use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use thiserror::Error;

use crate::auth::{RequestCredentials, SessionHandle};
use crate::core::task::{Task, TaskPatch};

const USERNAME_HEADER: &str = "x-username";

/// Failure talking to the task service. No retry or backoff lives here;
/// callers surface the message and move on.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("Failed to {context}: {status}")]
    Status {
        context: &'static str,
        status: StatusCode,
    },
    /// The request never produced a response.
    #[error("Failed to {context}: {source}")]
    Request {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl TransportError {
    /// Status of the server's response, when there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request { .. } => None,
        }
    }
}

/// Client for the remote task collection at `{base}/api/tasks`.
///
/// Every call asks the session for credentials first; a signed-out session
/// is not an error — the request just goes out unauthenticated and the
/// server decides what that is allowed to do.
pub struct TaskStoreClient {
    base_url: String,
    session: SessionHandle,
    http: Client,
}

impl TaskStoreClient {
    pub fn new(base_url: &str, session: SessionHandle) -> Result<Self, TransportError> {
        let http = Client::builder().build().map_err(|e| TransportError::Request {
            context: "build HTTP client",
            source: e,
        })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        let creds = self.session.credentials().await;
        request.headers(auth_headers(creds.as_ref()))
    }

    async fn send(
        &self,
        request: RequestBuilder,
        context: &'static str,
    ) -> Result<reqwest::Response, TransportError> {
        let resp = request
            .send()
            .await
            .map_err(|e| TransportError::Request { context, source: e })?;
        let status = resp.status();
        if !status.is_success() {
            log::debug!("{} returned {}", context, status);
            return Err(TransportError::Status { context, status });
        }
        Ok(resp)
    }

    /// Fetch the whole collection, in server order.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, TransportError> {
        let context = "fetch tasks";
        let request = self.with_auth(self.http.get(self.url("/tasks"))).await;
        let resp = self.send(request, context).await?;
        resp.json()
            .await
            .map_err(|e| TransportError::Request { context, source: e })
    }

    /// Create a task. The id must already be assigned by the caller; the
    /// body is forwarded exactly as given and validated server-side.
    pub async fn create_task(&self, task: &Task) -> Result<(), TransportError> {
        let request = self
            .with_auth(self.http.post(self.url("/tasks")).json(task))
            .await;
        self.send(request, "add task").await?;
        Ok(())
    }

    /// Partial update: only the fields present in `patch` reach the server.
    pub async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<(), TransportError> {
        let request = self
            .with_auth(self.http.put(self.url(&format!("/tasks/{}", id))).json(patch))
            .await;
        self.send(request, "update task").await?;
        Ok(())
    }

    /// Delete by id. Whether deleting an unknown id succeeds or 404s is the
    /// server's call; callers must tolerate either.
    pub async fn delete_task(&self, id: i64) -> Result<(), TransportError> {
        let request = self
            .with_auth(self.http.delete(self.url(&format!("/tasks/{}", id))))
            .await;
        self.send(request, "delete task").await?;
        Ok(())
    }
}

/// Headers for the current session. Signed out means no headers at all —
/// the silent-fallback condition, never a failure. Content type is not set
/// here; the request builder adds it for JSON bodies.
fn auth_headers(creds: Option<&RequestCredentials>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let Some(creds) = creds else {
        return headers;
    };
    match HeaderValue::from_str(&format!("Bearer {}", creds.id_token)) {
        Ok(value) => {
            headers.insert(AUTHORIZATION, value);
        }
        Err(e) => log::warn!("Skipping malformed bearer token: {}", e),
    }
    match HeaderValue::from_str(&creds.username) {
        Ok(value) => {
            headers.insert(USERNAME_HEADER, value);
        }
        Err(e) => log::warn!("Skipping malformed username header: {}", e),
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_out_yields_no_auth_headers() {
        let headers = auth_headers(None);
        assert!(headers.is_empty());
    }

    #[test]
    fn signed_in_yields_bearer_and_username() {
        let creds = RequestCredentials {
            id_token: "tok-123".into(),
            username: "maria".into(),
        };
        let headers = auth_headers(Some(&creds));
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok-123");
        assert_eq!(headers.get(USERNAME_HEADER).unwrap(), "maria");
    }

    #[test]
    fn malformed_token_falls_back_instead_of_failing() {
        let creds = RequestCredentials {
            id_token: "bad\ntoken".into(),
            username: "maria".into(),
        };
        let headers = auth_headers(Some(&creds));
        assert!(headers.get(AUTHORIZATION).is_none());
        assert_eq!(headers.get(USERNAME_HEADER).unwrap(), "maria");
    }

    #[test]
    fn status_error_carries_the_status_text() {
        let err = TransportError::Status {
            context: "fetch tasks",
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert_eq!(err.to_string(), "Failed to fetch tasks: 503 Service Unavailable");
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }
}
