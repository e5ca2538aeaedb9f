//! Outbound calls to collaborating services.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use saga_store::HttpMethod;

/// Header carrying the saga correlation id on every outbound call.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";
/// Header carrying the saga's user id on every outbound call.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// Reasons an outbound call did not produce a usable result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceCallError {
    /// No base URL is registered for the service.
    #[error("Service URL not found for {0}")]
    UnknownService(String),

    /// The request never produced a response (connect error, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a status outside 2xx.
    #[error("Service call failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered 2xx but the flow rejected the result.
    #[error("{0}")]
    Rejected(String),
}

/// A fully rendered outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Value,
    pub correlation_id: String,
    pub user_id: i64,
}

/// What a service answered.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: Value,
}

impl ServiceResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Any 2xx status counts as success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-success answer into a `Status` error.
    pub fn into_result(self) -> Result<Value, ServiceCallError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(ServiceCallError::Status {
                status: self.status,
                body: match self.body {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
            })
        }
    }
}

/// Trait for invoking collaborating services.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Performs one call. Any HTTP answer is `Ok`; only transport failures are `Err`.
    async fn call(&self, request: ServiceRequest) -> Result<ServiceResponse, ServiceCallError>;
}

/// Flattens a JSON object into query parameters; strings are not quoted.
fn query_pairs(body: &Value) -> Vec<(String, String)> {
    body.as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// reqwest-backed client with a fixed per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpServiceClient {
    client: reqwest::Client,
}

impl HttpServiceClient {
    pub fn new(timeout: Duration) -> Result<Self, ServiceCallError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceCallError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn call(&self, request: ServiceRequest) -> Result<ServiceResponse, ServiceCallError> {
        let builder = match request.method {
            HttpMethod::Get => self
                .client
                .get(&request.url)
                .query(&query_pairs(&request.body)),
            HttpMethod::Post => self.client.post(&request.url).json(&request.body),
            HttpMethod::Put => self.client.put(&request.url).json(&request.body),
            HttpMethod::Patch => self.client.patch(&request.url).json(&request.body),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        let response = builder
            .header(CORRELATION_ID_HEADER, &request.correlation_id)
            .header(USER_ID_HEADER, request.user_id.to_string())
            .send()
            .await
            .map_err(|e| ServiceCallError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceCallError::Transport(e.to_string()))?;

        let body = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        tracing::debug!(status, "service responded");
        Ok(ServiceResponse { status, body })
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(ServiceResponse),
    Transport(String),
}

#[derive(Debug, Default)]
struct InMemoryClientState {
    once: HashMap<String, VecDeque<Scripted>>,
    always: HashMap<String, Scripted>,
    calls: Vec<ServiceRequest>,
}

/// Scripted service client for testing.
///
/// Responses are keyed by full URL. One-shot responses queued with
/// [`InMemoryServiceClient::respond_once`] are consumed before the standing
/// response set by [`InMemoryServiceClient::respond`]. Unscripted URLs answer
/// 404.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServiceClient {
    state: Arc<Mutex<InMemoryClientState>>,
}

impl InMemoryServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryClientState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answers every call to `url` with `status` and `body`.
    pub fn respond(&self, url: impl Into<String>, status: u16, body: Value) {
        self.lock().always.insert(
            url.into(),
            Scripted::Respond(ServiceResponse::new(status, body)),
        );
    }

    /// Answers the next call to `url` with `status` and `body`.
    pub fn respond_once(&self, url: impl Into<String>, status: u16, body: Value) {
        self.lock()
            .once
            .entry(url.into())
            .or_default()
            .push_back(Scripted::Respond(ServiceResponse::new(status, body)));
    }

    /// Fails every call to `url` with a transport error.
    pub fn fail_transport(&self, url: impl Into<String>, message: impl Into<String>) {
        self.lock()
            .always
            .insert(url.into(), Scripted::Transport(message.into()));
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<ServiceRequest> {
        self.lock().calls.clone()
    }

    /// Returns the calls made to `url`.
    pub fn calls_to(&self, url: &str) -> Vec<ServiceRequest> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.url == url)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }
}

#[async_trait]
impl ServiceClient for InMemoryServiceClient {
    async fn call(&self, request: ServiceRequest) -> Result<ServiceResponse, ServiceCallError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let url = request.url.clone();
        state.calls.push(request);

        let scripted = state
            .once
            .get_mut(&url)
            .and_then(VecDeque::pop_front)
            .or_else(|| state.always.get(&url).cloned());

        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Transport(message)) => Err(ServiceCallError::Transport(message)),
            None => Ok(ServiceResponse::new(
                404,
                serde_json::json!({"error": format!("no route for {url}")}),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(url: &str) -> ServiceRequest {
        ServiceRequest {
            method: HttpMethod::Post,
            url: url.to_string(),
            body: json!({}),
            correlation_id: "corr".into(),
            user_id: 1,
        }
    }

    #[test]
    fn test_success_statuses() {
        for status in [200, 201, 202, 204, 299] {
            assert!(ServiceResponse::new(status, json!({})).is_success());
        }
        for status in [199, 300, 301, 400, 500] {
            assert!(!ServiceResponse::new(status, json!({})).is_success());
        }
    }

    #[test]
    fn test_into_result() {
        let err = ServiceResponse::new(500, json!({"detail": "down"}))
            .into_result()
            .unwrap_err();
        assert_eq!(
            err,
            ServiceCallError::Status {
                status: 500,
                body: r#"{"detail":"down"}"#.into()
            }
        );
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(&json!({"bet_slip_id": "B1", "limit": 5}));
        assert!(pairs.contains(&("bet_slip_id".to_string(), "B1".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "5".to_string())));
        assert!(query_pairs(&json!([1, 2])).is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_client_scripts() {
        let client = InMemoryServiceClient::new();
        client.respond("http://svc/a", 200, json!({"ok": true}));
        client.respond_once("http://svc/a", 500, json!({}));
        client.fail_transport("http://svc/b", "connection refused");

        assert_eq!(client.call(request("http://svc/a")).await.unwrap().status, 500);
        assert_eq!(client.call(request("http://svc/a")).await.unwrap().status, 200);
        assert!(matches!(
            client.call(request("http://svc/b")).await,
            Err(ServiceCallError::Transport(_))
        ));
        assert_eq!(client.call(request("http://svc/c")).await.unwrap().status, 404);

        assert_eq!(client.call_count(), 4);
        assert_eq!(client.calls_to("http://svc/a").len(), 2);
    }
}
