//! HTTP client for the assistant backend.
//!
//! Endpoints used:
//! - `POST /api/chat` - non-streaming answer `{response}`
//! - `POST /api/admin_chat` - NDJSON thought stream
//! - `POST /api/save_memory` - store a curated Q/A pair
//! - `POST /api/scrape`, `POST /api/reindex` - plain-text process logs
//! - `GET /api/get-data` - knowledge store listing

mod types;

pub use types::{
    ChatRequest, ChatResponse, DataFilter, DataKind, KnowledgeItem, ProcessKind, StatusResponse,
    WirePart, WireTurn,
};

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ClientSettings;
use crate::session::ChatBackend;
use crate::stream::{frame_lines, parse_events, ThoughtEvent};
use types::SaveMemoryRequest;

/// Errors talking to the backend.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Server returned status {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("Server reported an error: {0}")]
    Remote(String),
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),
}

/// Backend API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl ApiClient {
    /// Create a client from settings.
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(settings.base_url.clone()));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("damay/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            })
        }
    }

    /// Ask for a complete answer without the reasoning trace.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, ClientError> {
        debug!(query_len = request.query.len(), history = request.history.len(), "POST /api/chat");
        let response = self
            .http
            .post(self.endpoint("/api/chat"))
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        let body: ChatResponse = Self::check_status(response)?.json().await?;
        Ok(body.response)
    }

    /// Open the streamed reasoning trace for a question.
    ///
    /// No overall timeout is applied: the stream stays open until the backend
    /// closes it.
    pub async fn stream_thoughts(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = Result<ThoughtEvent, ClientError>>, ClientError> {
        debug!(query_len = request.query.len(), history = request.history.len(), "POST /api/admin_chat");
        let response = self
            .http
            .post(self.endpoint("/api/admin_chat"))
            .json(request)
            .send()
            .await?;
        let response = Self::check_status(response)?;
        let chunks = response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from));
        Ok(parse_events(frame_lines(chunks)))
    }

    /// Store a question/answer pair in the backend's memory bank.
    pub async fn save_memory(&self, question: &str, answer: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.endpoint("/api/save_memory"))
            .timeout(self.request_timeout)
            .json(&SaveMemoryRequest { question, answer })
            .send()
            .await?;
        // The endpoint reports failures in the body, also on 4xx/5xx.
        let body: StatusResponse = response.json().await?;
        if body.is_success() {
            info!("Saved conversation to memory bank");
            Ok(body.message)
        } else {
            Err(ClientError::Remote(body.message))
        }
    }

    /// Start a maintenance job and stream its log lines.
    pub async fn run_process(
        &self,
        kind: ProcessKind,
    ) -> Result<impl Stream<Item = Result<String, ClientError>>, ClientError> {
        debug!(path = kind.path(), "Starting process");
        let response = self.http.post(self.endpoint(kind.path())).send().await?;
        let response = Self::check_status(response)?;
        let chunks = response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from));
        Ok(frame_lines(chunks))
    }

    /// Fetch the knowledge store listing.
    pub async fn list_data(&self) -> Result<Vec<KnowledgeItem>, ClientError> {
        let response = self
            .http
            .get(self.endpoint("/api/get-data"))
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(Self::check_status(response)?.json().await?)
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn ask(&self, request: &ChatRequest) -> Result<String, ClientError> {
        self.chat(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatTurn;
    use crate::stream::StepKind;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        let settings = ClientSettings {
            base_url: server.uri(),
            ..ClientSettings::default()
        };
        ApiClient::new(&settings).unwrap()
    }

    // =========================================================================
    // Construction Tests
    // =========================================================================

    #[test]
    fn test_new_rejects_non_http_url() {
        let settings = ClientSettings {
            base_url: "ftp://example".into(),
            ..ClientSettings::default()
        };
        assert!(matches!(ApiClient::new(&settings), Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_new_strips_trailing_slash() {
        let settings = ClientSettings {
            base_url: "http://localhost:5000/".into(),
            ..ClientSettings::default()
        };
        let client = ApiClient::new(&settings).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.endpoint("/api/chat"), "http://localhost:5000/api/chat");
    }

    // =========================================================================
    // Endpoint Tests
    // =========================================================================

    #[tokio::test]
    async fn test_chat_posts_history_and_returns_response() {
        let server = MockServer::start().await;
        let history = vec![ChatTurn::user("Halo")];
        let request = ChatRequest::new("Halo", &history);

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(serde_json::to_value(&request).unwrap()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "Hai!"})),
            )
            .mount(&server)
            .await;

        let answer = client_for(&server).chat(&request).await.unwrap();
        assert_eq!(answer, "Hai!");
    }

    #[tokio::test]
    async fn test_chat_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .chat(&ChatRequest::new("x", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_stream_thoughts_frames_ndjson_body() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"step\":\"start\",\"data\":\"Menerima\"}\n",
            "not json\n",
            "{\"step\":\"final_answer\",\"data\":\"Hasil\"}"
        );
        Mock::given(method("POST"))
            .and(path("/api/admin_chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let stream = client_for(&server)
            .stream_thoughts(&ChatRequest::new("q", &[]))
            .await
            .unwrap();
        let events: Vec<_> = Box::pin(stream).collect().await;
        let steps: Vec<StepKind> = events.into_iter().map(|e| e.unwrap().step).collect();
        assert_eq!(steps, vec![StepKind::Start, StepKind::FinalAnswer]);
    }

    #[tokio::test]
    async fn test_save_memory_reports_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/save_memory"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "status": "error",
                "message": "Question and answer are required."
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).save_memory("", "").await.unwrap_err();
        match err {
            ClientError::Remote(message) => assert!(message.contains("required")),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_process_streams_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/reindex"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "Loading documents...\n\nIndex saved successfully\n",
                "text/plain",
            ))
            .mount(&server)
            .await;

        let stream = client_for(&server).run_process(ProcessKind::Reindex).await.unwrap();
        let lines: Vec<String> = Box::pin(stream).map(|l| l.unwrap()).collect().await;
        assert_eq!(lines, vec!["Loading documents...", "Index saved successfully"]);
    }

    #[tokio::test]
    async fn test_list_data_parses_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "type": "Manual", "title": "Jadwal", "url": "jadwal.pdf", "content": "..."}
            ])))
            .mount(&server)
            .await;

        let items = client_for(&server).list_data().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, DataKind::Manual);
    }
}
