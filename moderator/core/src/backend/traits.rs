//! Inference Backend Traits
//!
//! Trait and wire types for the inference server the moderator talks to. The
//! trait keeps the turn controller independent of the HTTP client so that a
//! scripted backend can stand in for tests.
//!
//! # Design Philosophy
//!
//! The [`InferenceBackend`] trait provides a common interface for:
//! - Probing whether the server is reachable
//! - Enumerating available models
//! - Streaming a generate call as discrete fragment events

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::BackendError;

/// Opaque conversational state returned by the server for one participant
pub type ContextTokens = Vec<i64>;

/// Event produced while a generate stream is being decoded
#[derive(Clone, Debug, PartialEq)]
pub enum GenerateEvent {
    /// One decoded line of the response stream
    Fragment(GenerateFragment),
    /// The stream failed after the request was accepted
    Error(String),
}

/// One newline-delimited JSON object from the generate stream
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateFragment {
    /// Partial (or final) chunk of response text
    #[serde(default)]
    pub response: String,
    /// Terminal marker
    #[serde(default)]
    pub done: bool,
    /// Context to persist; only authoritative on the terminal fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextTokens>,
    /// Timing and usage counters, present on the terminal fragment
    #[serde(flatten)]
    pub stats: GenerateStats,
    /// Failure the server reported inside an accepted stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Timing and usage counters reported with the terminal fragment
///
/// Durations are in nanoseconds, as reported by the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateStats {
    /// Total time spent on the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    /// Time spent loading the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_duration: Option<u64>,
    /// Number of prompt tokens evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Time spent evaluating the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_duration: Option<u64>,
    /// Number of response tokens generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
    /// Time spent generating the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
}

impl GenerateStats {
    /// Whether the server reported any counter at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Generation speed in tokens per second, if both counters are known
    #[must_use]
    pub fn tokens_per_second(&self) -> Option<f64> {
        let count = self.eval_count?;
        let nanos = self.eval_duration?;
        if nanos == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(count as f64 / (nanos as f64 / 1_000_000_000.0))
    }
}

/// A streaming generate request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    /// Model identifier
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Prior context for this model (empty on its first turn)
    pub context: ContextTokens,
    /// Always true for discussion turns
    pub stream: bool,
}

impl GenerateRequest {
    /// Create a streaming request with an empty context
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            context: Vec::new(),
            stream: true,
        }
    }

    /// Set the prior context
    #[must_use]
    pub fn with_context(mut self, context: ContextTokens) -> Self {
        self.context = context;
        self
    }
}

/// A model advertised by the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier, used as the participant name
    pub id: String,
    /// Object type reported by the server (usually "model")
    #[serde(default)]
    pub object: Option<String>,
    /// Creation time (unix seconds)
    #[serde(default)]
    pub created: Option<i64>,
    /// Owner reported by the server
    #[serde(default)]
    pub owned_by: Option<String>,
}

impl ModelDescriptor {
    /// Descriptor carrying only an identifier
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: None,
            created: None,
            owned_by: None,
        }
    }
}

/// Inference backend trait
///
/// Implement this trait to drive the moderator against a different server.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Lightweight reachability probe. Never errors; any failure is `false`.
    async fn check_connection(&self) -> bool;

    /// List available models. Any failure yields an empty list.
    async fn list_models(&self) -> Vec<ModelDescriptor>;

    /// Open a streaming generate call
    ///
    /// Returns a channel receiver that yields one event per decoded line. The
    /// channel is closed after the terminal fragment or when the network
    /// stream ends. Dropping the receiver abandons the stream.
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<mpsc::Receiver<GenerateEvent>, BackendError>;

    /// Check if a specific model is available
    async fn has_model(&self, model: &str) -> bool {
        self.list_models().await.iter().any(|m| m.id == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_request_builder() {
        let request = GenerateRequest::new("llama3", "Hello").with_context(vec![1, 2, 3]);

        assert_eq!(request.model, "llama3");
        assert_eq!(request.prompt, "Hello");
        assert_eq!(request.context, vec![1, 2, 3]);
        assert!(request.stream);
    }

    #[test]
    fn test_generate_request_wire_shape() {
        let request = GenerateRequest::new("a", "hi");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "a", "prompt": "hi", "context": [], "stream": true})
        );
    }

    #[test]
    fn test_terminal_fragment_parses_stats() {
        let line = r#"{"model":"a","created_at":"2024-01-01T00:00:00Z","response":"","done":true,
            "context":[1,2,3],"total_duration":5000,"eval_count":20,"eval_duration":2000000000}"#;
        let fragment: GenerateFragment = serde_json::from_str(line).unwrap();

        assert!(fragment.done);
        assert_eq!(fragment.context, Some(vec![1, 2, 3]));
        assert_eq!(fragment.stats.total_duration, Some(5000));
        assert_eq!(fragment.stats.eval_count, Some(20));
        assert!((fragment.stats.tokens_per_second().unwrap() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_fragment_has_no_stats() {
        let fragment: GenerateFragment =
            serde_json::from_str(r#"{"response":"Hel","done":false}"#).unwrap();
        assert_eq!(fragment.response, "Hel");
        assert!(!fragment.done);
        assert!(fragment.context.is_none());
        assert!(fragment.stats.is_empty());
        assert!(fragment.stats.tokens_per_second().is_none());
    }

    #[test]
    fn test_model_descriptor_minimal() {
        let model: ModelDescriptor = serde_json::from_str(r#"{"id":"qwen3:8b"}"#).unwrap();
        assert_eq!(model, ModelDescriptor::named("qwen3:8b"));
    }
}
