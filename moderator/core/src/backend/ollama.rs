//! Ollama Backend Implementation
//!
//! Inference backend for Ollama (local LLM server).
//!
//! # Ollama API
//!
//! - `/api/tags` - reachability probe
//! - `/v1/models` - OpenAI-compatible model listing
//! - `/api/generate` - streaming completions carrying a per-model context
//!
//! The generate endpoint answers with newline-delimited JSON. A spawned task
//! pumps the HTTP body through an [`NdjsonDecoder`] into a bounded channel so
//! the moderator consumes fragments one at a time.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::decoder::NdjsonDecoder;
use super::traits::{GenerateEvent, GenerateRequest, InferenceBackend, ModelDescriptor};
use crate::config::ServerSettings;
use crate::error::BackendError;

/// Capacity of the fragment channel between the HTTP pump and the consumer
const STREAM_CHANNEL_CAPACITY: usize = 100;

/// Timeout for the reachability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for model listing
const LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of `/v1/models`
#[derive(Debug, Default, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelDescriptor>,
}

/// Ollama backend client
#[derive(Clone, Debug)]
pub struct OllamaBackend {
    /// Base URL, e.g. `http://localhost:11434`
    base_url: String,
    /// HTTP client (no global timeout; generate may run arbitrarily long)
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(host: impl AsRef<str>, port: u16) -> Self {
        Self::with_base_url(format!("http://{}:{port}", host.as_ref()))
    }

    /// Create a backend for an explicit base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Create from the `[server]` settings section
    #[must_use]
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self::with_base_url(settings.base_url())
    }

    /// Create from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_settings(&ServerSettings::from_env())
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url)
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::from_settings(&ServerSettings::default())
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn check_connection(&self) -> bool {
        match self
            .http_client
            .get(self.tags_url())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, url = %self.base_url, "Connection probe failed");
                false
            }
        }
    }

    async fn list_models(&self) -> Vec<ModelDescriptor> {
        let response = match self
            .http_client
            .get(self.models_url())
            .timeout(LIST_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Failed to fetch models");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Model listing returned an error status");
            return Vec::new();
        }

        match response.json::<ModelList>().await {
            Ok(list) => list.data,
            Err(e) => {
                warn!(error = %e, "Failed to parse model list");
                Vec::new()
            }
        }
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<mpsc::Receiver<GenerateEvent>, BackendError> {
        debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            context_len = request.context.len(),
            "Opening generate stream"
        );

        let response = self
            .http_client
            .post(self.generate_url())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(forward_stream(response.bytes_stream(), tx));
        Ok(rx)
    }
}

/// Decode an NDJSON byte stream into fragment events
///
/// Stops after the terminal fragment, on the first transport error or
/// server-reported error line, or when the receiver is dropped.
pub(crate) async fn forward_stream<S, B, E>(stream: S, tx: mpsc::Sender<GenerateEvent>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = NdjsonDecoder::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                for fragment in decoder.push(bytes.as_ref()) {
                    if let Some(message) = fragment.error {
                        warn!(error = %message, "Server reported a failure mid-stream");
                        let _ = tx.send(GenerateEvent::Error(message)).await;
                        return;
                    }
                    let done = fragment.done;
                    if tx.send(GenerateEvent::Fragment(fragment)).await.is_err() {
                        debug!("Stream receiver dropped, abandoning response");
                        return;
                    }
                    if done {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(GenerateEvent::Error(e.to_string())).await;
                return;
            }
        }
    }

    if let Some(mut fragment) = decoder.finish() {
        let event = match fragment.error.take() {
            Some(message) => GenerateEvent::Error(message),
            None => GenerateEvent::Fragment(fragment),
        };
        let _ = tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn collect(chunks: Vec<Result<&'static [u8], String>>) -> Vec<GenerateEvent> {
        let (tx, mut rx) = mpsc::channel(100);
        forward_stream(futures::stream::iter(chunks), tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_ollama_backend_creation() {
        let backend = OllamaBackend::new("localhost", 11434);
        assert_eq!(backend.base_url(), "http://localhost:11434");
        assert_eq!(backend.generate_url(), "http://localhost:11434/api/generate");
        assert_eq!(backend.models_url(), "http://localhost:11434/v1/models");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = OllamaBackend::with_base_url("http://example.com:8080/");
        assert_eq!(backend.tags_url(), "http://example.com:8080/api/tags");
    }

    #[test]
    fn test_from_settings() {
        let mut settings = ServerSettings {
            scheme: "http".to_string(),
            host: "example.com".to_string(),
            port: 8080,
        };
        let backend = OllamaBackend::from_settings(&settings);
        assert_eq!(backend.base_url(), "http://example.com:8080");

        settings.scheme = "https".to_string();
        let backend = OllamaBackend::from_settings(&settings);
        assert_eq!(backend.generate_url(), "https://example.com:8080/api/generate");
    }

    #[tokio::test]
    async fn test_forward_stream_stops_at_done() {
        let events = collect(vec![
            Ok(b"{\"response\":\"Hi\",\"done\":false}\n{\"respo".as_slice()),
            Ok(b"nse\":\"!\",\"done\":true,\"context\":[1]}\n{\"response\":\"late\"}\n".as_slice()),
        ])
        .await;

        assert_eq!(events.len(), 2);
        match &events[1] {
            GenerateEvent::Fragment(f) => {
                assert!(f.done);
                assert_eq!(f.context, Some(vec![1]));
            }
            GenerateEvent::Error(e) => panic!("unexpected error {e}"),
        }
    }

    #[tokio::test]
    async fn test_forward_stream_reports_transport_error() {
        let events = collect(vec![
            Ok(b"{\"response\":\"Hi\"}\n".as_slice()),
            Err("connection reset".to_string()),
        ])
        .await;

        assert_eq!(
            events.last(),
            Some(&GenerateEvent::Error("connection reset".to_string()))
        );
    }

    #[tokio::test]
    async fn test_forward_stream_flushes_trailing_line() {
        let events = collect(vec![Ok(b"{\"response\":\"tail\",\"done\":true}".as_slice())]).await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_forward_stream_surfaces_server_error_line() {
        let events = collect(vec![Ok(b"{\"response\":\"Hi\",\"done\":false}\n{\"error\":\"model runner has unexpectedly stopped\"}\n{\"response\":\"late\"}\n".as_slice())]).await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            GenerateEvent::Error("model runner has unexpectedly stopped".to_string())
        );
    }

    #[tokio::test]
    async fn test_forward_stream_surfaces_trailing_error_line() {
        let events = collect(vec![Ok(b"{\"error\":\"out of memory\"}".as_slice())]).await;
        assert_eq!(events, vec![GenerateEvent::Error("out of memory".to_string())]);
    }

    #[tokio::test]
    async fn test_check_connection_refused_is_false() {
        // Port 9 (discard) is not an inference server; connection fails fast
        let backend = OllamaBackend::with_base_url("http://127.0.0.1:9");
        assert!(!backend.check_connection().await);
        assert!(backend.list_models().await.is_empty());
    }
}
