//! Scripted Backend for Tests
//!
//! Provides a mock [`InferenceBackend`] that replays scripted turns per model
//! without any network I/O. Every generate request is recorded so tests can
//! verify prompts and context threading.
//!
//! # Usage
//!
//! ```ignore
//! use moderator_core::backend::testing::{ScriptedBackend, ScriptedTurn};
//!
//! let backend = ScriptedBackend::new()
//!     .with_turn("a", ScriptedTurn::reply("Hello").with_context(vec![1, 2, 3]))
//!     .with_turn("b", ScriptedTurn::stream_error("boom"));
//!
//! // After the discussion, verify what was sent
//! assert_eq!(backend.requests()[0].model, "a");
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::traits::{
    ContextTokens, GenerateEvent, GenerateFragment, GenerateRequest, GenerateStats,
    InferenceBackend, ModelDescriptor,
};
use crate::error::BackendError;

/// One scripted response to a generate call
#[derive(Clone, Debug)]
pub enum ScriptedTurn {
    /// Emit these events, then close the stream
    Events(Vec<GenerateEvent>),
    /// Refuse the request before any stream is opened
    Refuse(String),
    /// Emit these events, then keep the stream open until the receiver is dropped
    Hang(Vec<GenerateEvent>),
}

impl ScriptedTurn {
    /// A well-formed reply split into a few chunks with an empty terminal fragment
    pub fn reply(text: &str) -> Self {
        Self::chunks(&chunk_text(text))
    }

    /// A reply made of the given chunks, followed by a terminal fragment
    pub fn chunks(chunks: &[&str]) -> Self {
        let mut events: Vec<GenerateEvent> = chunks
            .iter()
            .map(|chunk| {
                GenerateEvent::Fragment(GenerateFragment {
                    response: (*chunk).to_string(),
                    ..Default::default()
                })
            })
            .collect();
        events.push(GenerateEvent::Fragment(GenerateFragment {
            done: true,
            context: Some(Vec::new()),
            stats: GenerateStats {
                eval_count: Some(chunks.len() as u64),
                eval_duration: Some(1_000_000),
                ..Default::default()
            },
            ..Default::default()
        }));
        Self::Events(events)
    }

    /// A reply whose stream fails after emitting some text
    pub fn stream_error(message: &str) -> Self {
        Self::Events(vec![
            GenerateEvent::Fragment(GenerateFragment {
                response: "partial".to_string(),
                ..Default::default()
            }),
            GenerateEvent::Error(message.to_string()),
        ])
    }

    /// Replace the terminal fragment's context
    #[must_use]
    pub fn with_context(mut self, context: ContextTokens) -> Self {
        if let Self::Events(events) = &mut self {
            for event in events.iter_mut() {
                if let GenerateEvent::Fragment(fragment) = event {
                    if fragment.done {
                        fragment.context = Some(context.clone());
                    }
                }
            }
        }
        self
    }
}

fn chunk_text(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = rest.len().min(4);
        while !rest.is_char_boundary(end) {
            end += 1;
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

/// Mock backend replaying scripted turns per model
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    /// Remaining turns per model
    scripts: Arc<Mutex<HashMap<String, VecDeque<ScriptedTurn>>>>,
    /// Every generate request, in order
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
    /// Models returned by `list_models`
    models: Vec<ModelDescriptor>,
    /// Whether `check_connection` succeeds
    reachable: bool,
}

impl ScriptedBackend {
    /// Create a reachable backend with no scripts
    #[must_use]
    pub fn new() -> Self {
        Self {
            reachable: true,
            ..Default::default()
        }
    }

    /// Queue a turn for a model
    #[must_use]
    pub fn with_turn(self, model: &str, turn: ScriptedTurn) -> Self {
        self.push_turn(model, turn);
        self
    }

    /// Advertise these models from `list_models`
    #[must_use]
    pub fn with_models(mut self, ids: &[&str]) -> Self {
        self.models = ids.iter().map(|id| ModelDescriptor::named(*id)).collect();
        self
    }

    /// Make the connection probe fail
    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Queue a turn for a model after construction
    pub fn push_turn(&self, model: &str, turn: ScriptedTurn) {
        self.scripts
            .lock()
            .entry(model.to_string())
            .or_default()
            .push_back(turn);
    }

    /// All generate requests received so far
    #[must_use]
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }

    /// Number of generate requests received so far
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    async fn check_connection(&self) -> bool {
        self.reachable
    }

    async fn list_models(&self) -> Vec<ModelDescriptor> {
        if self.reachable {
            self.models.clone()
        } else {
            Vec::new()
        }
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<mpsc::Receiver<GenerateEvent>, BackendError> {
        self.requests.lock().push(request.clone());

        let turn = self
            .scripts
            .lock()
            .get_mut(&request.model)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| BackendError::Status {
                status: 404,
                body: format!("model '{}' not found", request.model),
            })?;

        let (events, hang) = match turn {
            ScriptedTurn::Refuse(reason) => return Err(BackendError::Unavailable(reason)),
            ScriptedTurn::Events(events) => (events, false),
            ScriptedTurn::Hang(events) => (events, true),
        };

        let (tx, rx) = mpsc::channel(events.len().max(1));
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if hang {
                tx.closed().await;
            }
        });
        Ok(rx)
    }
}
