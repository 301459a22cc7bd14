use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use super::types::{CompletionClient, CompletionRequest};
use super::InvokeError;
use crate::config::AnalysisConfig;

/// Header carrying the request identifier to the provider.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// HTTP client for the external completion endpoint.
pub struct HttpCompletionClient {
    endpoint_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpCompletionClient {
    pub fn new(endpoint_url: &str, model: &str, timeout: Duration) -> Result<Self, InvokeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InvokeError::Client(e.to_string()))?;

        Ok(Self {
            endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            client,
            timeout,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, InvokeError> {
        let client = Self::new(&config.endpoint_url, &config.model, config.request_timeout)?;
        Ok(match &config.api_key {
            Some(key) => client.with_api_key(key),
            None => client,
        })
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

/// Request body for the generate endpoint.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    request_id: String,
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, InvokeError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
            request_id: request.request_id.to_string(),
        };

        let mut builder = self
            .client
            .post(&self.endpoint_url)
            .header(REQUEST_ID_HEADER, request.request_id.to_string())
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                InvokeError::Timeout(self.timeout)
            } else if e.is_connect() {
                InvokeError::Connection(self.endpoint_url.clone())
            } else {
                InvokeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InvokeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                InvokeError::Timeout(self.timeout)
            } else {
                InvokeError::Transport(e.to_string())
            }
        })?;

        extract_completion_text(&text)
    }
}

/// Pull the completion text out of a provider body.
///
/// Accepts Ollama-style `{"response": ..}`, `{"text": ..}`, `{"content": ..}`
/// and OpenAI-style `choices[0]`; a non-JSON body is taken as the text itself.
pub fn extract_completion_text(body: &str) -> Result<String, InvokeError> {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Ok(body.to_string()),
    };

    let candidates = [
        value.get("response"),
        value.get("text"),
        value.get("content"),
        value.pointer("/choices/0/message/content"),
        value.pointer("/choices/0/text"),
    ];

    let text = candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .map(str::to_string);
    text.ok_or_else(|| InvokeError::MalformedBody("no completion text field".into()))
}

/// Wraps a completion client with a hard timeout and request tagging.
/// Never retries; retry policy belongs to the caller.
#[derive(Clone)]
pub struct AiInvoker {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl AiInvoker {
    pub fn new(client: Arc<dyn CompletionClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn invoke(
        &self,
        request_id: Uuid,
        system: &str,
        prompt: &str,
    ) -> Result<String, InvokeError> {
        let request = CompletionRequest {
            request_id,
            system: system.to_string(),
            prompt: prompt.to_string(),
        };

        tracing::debug!(request_id = %request_id, timeout_ms = self.timeout.as_millis() as u64, "Dispatching completion request");

        let outcome = match tokio::time::timeout(self.timeout, self.client.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(InvokeError::Timeout(self.timeout)),
        };

        let text = outcome.and_then(|text| {
            if text.trim().is_empty() {
                Err(InvokeError::EmptyResponse)
            } else {
                Ok(text)
            }
        });

        if let Err(e) = &text {
            tracing::warn!(request_id = %request_id, error = %e, "Completion request failed");
        }

        text
    }
}

enum MockOutcome {
    Respond(String),
    Fail(InvokeError),
}

/// Mock completion client for testing: canned response or failure,
/// optional delay, and a call counter.
pub struct MockCompletionClient {
    outcome: MockOutcome,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new(response: &str) -> Self {
        Self::with_outcome(MockOutcome::Respond(response.to_string()))
    }

    pub fn failing(error: InvokeError) -> Self {
        Self::with_outcome(MockOutcome::Fail(error))
    }

    fn with_outcome(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().ok()?.clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.outcome {
            MockOutcome::Respond(text) => Ok(text.clone()),
            MockOutcome::Fail(err) => Err(err.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api/generate")
    }

    async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        Json(json!({
            "response": format!(
                "id={id} body_id={} model={} auth={auth} prompt={}",
                body["request_id"].as_str().unwrap_or(""),
                body["model"].as_str().unwrap_or(""),
                body["prompt"].as_str().unwrap_or("")
            )
        }))
    }

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            request_id: Uuid::new_v4(),
            system: "system".into(),
            prompt: prompt.into(),
        }
    }

    #[tokio::test]
    async fn http_client_sends_request_id_and_reads_response() {
        let url = spawn_stub(Router::new().route("/api/generate", post(echo))).await;
        let client = HttpCompletionClient::new(&url, "screening-analyst", Duration::from_secs(5))
            .unwrap()
            .with_api_key("k1");
        let req = request("hello");

        let text = client.complete(&req).await.unwrap();
        assert!(text.contains(&format!("id={}", req.request_id)));
        assert!(text.contains(&format!("body_id={}", req.request_id)));
        assert!(text.contains("model=screening-analyst"));
        assert!(text.contains("auth=Bearer k1"));
        assert!(text.contains("prompt=hello"));
    }

    #[tokio::test]
    async fn http_client_maps_non_success_status() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let url = spawn_stub(router).await;
        let client = HttpCompletionClient::new(&url, "m", Duration::from_secs(5)).unwrap();

        let err = client.complete(&request("x")).await.unwrap_err();
        assert_eq!(
            err,
            InvokeError::Status {
                status: 503,
                body: "overloaded".into()
            }
        );
    }

    #[tokio::test]
    async fn http_client_reports_unreachable_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpCompletionClient::new(
            &format!("http://{addr}/api/generate"),
            "m",
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.complete(&request("x")).await.unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Connection(_) | InvokeError::Transport(_)
        ));
    }

    #[test]
    fn http_client_trims_trailing_slash() {
        let client =
            HttpCompletionClient::new("http://localhost:11434/api/generate/", "m", Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.endpoint_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn extracts_known_body_shapes() {
        assert_eq!(extract_completion_text(r#"{"response":"a"}"#).unwrap(), "a");
        assert_eq!(extract_completion_text(r#"{"text":"b"}"#).unwrap(), "b");
        assert_eq!(
            extract_completion_text(r#"{"choices":[{"message":{"content":"c"}}]}"#).unwrap(),
            "c"
        );
        assert_eq!(extract_completion_text("plain text body").unwrap(), "plain text body");
        assert!(matches!(
            extract_completion_text(r#"{"unexpected":1}"#),
            Err(InvokeError::MalformedBody(_))
        ));
    }

    #[tokio::test]
    async fn invoker_returns_mock_text_and_counts_calls() {
        let mock = Arc::new(MockCompletionClient::new("## 健康風險評估\n【低】"));
        let invoker = AiInvoker::new(mock.clone(), Duration::from_secs(30));
        let id = Uuid::new_v4();

        let text = invoker.invoke(id, "sys", "prompt").await.unwrap();
        assert!(text.contains("【低】"));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.last_request().unwrap().request_id, id);
    }

    #[tokio::test(start_paused = true)]
    async fn invoker_enforces_hard_timeout() {
        let mock = Arc::new(MockCompletionClient::new("late").with_delay(Duration::from_secs(60)));
        let invoker = AiInvoker::new(mock, Duration::from_secs(30));

        let err = invoker.invoke(Uuid::new_v4(), "sys", "prompt").await.unwrap_err();
        assert_eq!(err, InvokeError::Timeout(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn invoker_rejects_blank_response() {
        let invoker = AiInvoker::new(Arc::new(MockCompletionClient::new("  \n ")), Duration::from_secs(1));
        let err = invoker.invoke(Uuid::new_v4(), "s", "p").await.unwrap_err();
        assert_eq!(err, InvokeError::EmptyResponse);
    }

    #[tokio::test]
    async fn invoker_does_not_retry_failures() {
        let mock = Arc::new(MockCompletionClient::failing(InvokeError::Status {
            status: 500,
            body: "boom".into(),
        }));
        let invoker = AiInvoker::new(mock.clone(), Duration::from_secs(1));
        assert!(invoker.invoke(Uuid::new_v4(), "s", "p").await.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
