//! Turn Controller
//!
//! The [`Moderator`] runs one discussion between two participants. It is a
//! single sequential task: each turn streams a response from the backend,
//! splits off any thought segment, reveals the result into the transcript and
//! only then composes the prompt for the other participant.
//!
//! # State Machine
//!
//! ```text
//! Idle ──run()──► Running ──┬── rounds exhausted ──► Completed
//!                           ├── cancel token ──────► Cancelled
//!                           └── backend failure ───► Failed
//! ```
//!
//! # Cancellation
//!
//! The [`CancellationToken`] is checked before every generate call, raced
//! against every stream event, and observed by the reveal scheduler on every
//! character. A stream abandoned by cancellation is dropped; anything the
//! server sends afterwards is never read.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{ContextTokens, GenerateEvent, GenerateRequest, InferenceBackend};
use crate::config::DiscussionConfig;
use crate::error::{BackendError, DiscussionError};
use crate::prompt::{opening_prompt, reply_prompt};
use crate::reasoning::{has_thought_marker_from, split_reasoning, THOUGHT_OPEN};
use crate::reveal::{MessageReveal, RevealScheduler, RevealSettings};
use crate::transcript::{MessageId, TranscriptObserver, TranscriptStore};

/// Unique discussion identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscussionId(pub String);

impl DiscussionId {
    /// Generate a new random discussion ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for DiscussionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DiscussionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a discussion
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscussionState {
    /// Not started
    #[default]
    Idle,
    /// Turns are being taken
    Running,
    /// Every round ran
    Completed,
    /// Stopped by the cancel token
    Cancelled,
    /// Stopped by a backend failure
    Failed,
}

impl DiscussionState {
    /// Whether the discussion has ended
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Summary returned by [`Moderator::run`]
#[derive(Debug)]
pub struct DiscussionOutcome {
    /// Final state
    pub state: DiscussionState,
    /// Turns whose answer was fully revealed
    pub turns_completed: u32,
    /// The failure, when `state` is [`DiscussionState::Failed`]
    pub error: Option<DiscussionError>,
}

/// Speaker bookkeeping for the next turn
#[derive(Debug)]
struct TurnState {
    current_speaker: String,
    other_speaker: String,
    current_prompt: String,
    round_index: u32,
}

impl TurnState {
    fn opening(config: &DiscussionConfig) -> Self {
        Self {
            current_speaker: config.model1().to_string(),
            other_speaker: config.model2().to_string(),
            current_prompt: opening_prompt(config.conversation_style(), config.topic()),
            round_index: 0,
        }
    }

    /// Hand the floor to the other speaker with `quote` as their prompt source
    fn advance(&mut self, style: &str, quote: &str) {
        self.current_prompt =
            reply_prompt(style, &self.other_speaker, &self.current_speaker, quote);
        std::mem::swap(&mut self.current_speaker, &mut self.other_speaker);
        self.round_index += 1;
    }
}

/// How one turn ended, short of failure
enum TurnResult {
    Revealed(String),
    Cancelled,
}

/// Drives a two-participant discussion
pub struct Moderator<B: InferenceBackend> {
    id: DiscussionId,
    backend: B,
    config: DiscussionConfig,
    transcript: TranscriptStore,
    contexts: HashMap<String, ContextTokens>,
    reveal: RevealScheduler,
    cancel: CancellationToken,
    state: DiscussionState,
    turns_completed: u32,
}

impl<B: InferenceBackend> fmt::Debug for Moderator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Moderator")
            .field("id", &self.id)
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("state", &self.state)
            .field("turns_completed", &self.turns_completed)
            .finish_non_exhaustive()
    }
}

impl<B: InferenceBackend> Moderator<B> {
    /// Create an idle moderator
    pub fn new(backend: B, config: DiscussionConfig, reveal: RevealSettings) -> Self {
        let cancel = CancellationToken::new();
        Self {
            id: DiscussionId::new(),
            backend,
            config,
            transcript: TranscriptStore::new(),
            contexts: HashMap::new(),
            reveal: RevealScheduler::new(reveal, cancel.clone()),
            cancel,
            state: DiscussionState::Idle,
            turns_completed: 0,
        }
    }

    /// Use an externally owned cancel token
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.reveal = RevealScheduler::new(self.reveal.settings(), cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Token that stops the discussion when cancelled
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Register a transcript observer
    pub fn subscribe(&mut self, observer: impl TranscriptObserver + 'static) {
        self.transcript.subscribe(observer);
    }

    /// Discussion ID
    #[must_use]
    pub fn id(&self) -> &DiscussionId {
        &self.id
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &DiscussionConfig {
        &self.config
    }

    /// Backend in use
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Transcript so far
    #[must_use]
    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    /// Stored context for a participant
    #[must_use]
    pub fn context_for(&self, participant: &str) -> Option<&ContextTokens> {
        self.contexts.get(participant)
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> DiscussionState {
        self.state
    }

    /// Run the discussion to a terminal state
    ///
    /// Calling this again after the discussion ended does nothing and reports
    /// the state it ended in.
    pub async fn run(&mut self) -> DiscussionOutcome {
        if self.state != DiscussionState::Idle {
            warn!(discussion = %self.id, state = ?self.state, "Discussion already ran");
            return self.outcome(None);
        }

        self.state = DiscussionState::Running;
        info!(
            discussion = %self.id,
            model1 = self.config.model1(),
            model2 = self.config.model2(),
            style = self.config.conversation_style(),
            rounds = self.config.rounds(),
            "Discussion started"
        );

        let mut turn = TurnState::opening(&self.config);
        let mut error = None;

        while turn.round_index < self.config.rounds() {
            if self.cancel.is_cancelled() {
                self.state = DiscussionState::Cancelled;
                break;
            }

            match self.take_turn(&turn).await {
                Ok(TurnResult::Revealed(content)) => {
                    self.turns_completed += 1;
                    turn.advance(self.config.conversation_style(), &content);
                }
                Ok(TurnResult::Cancelled) => {
                    self.state = DiscussionState::Cancelled;
                    break;
                }
                Err(err) => {
                    warn!(
                        discussion = %self.id,
                        speaker = %turn.current_speaker,
                        round = turn.round_index,
                        error = %err,
                        "Turn failed"
                    );
                    self.state = DiscussionState::Failed;
                    error = Some(err);
                    break;
                }
            }
        }

        if self.state == DiscussionState::Running {
            self.state = DiscussionState::Completed;
        }

        info!(
            discussion = %self.id,
            state = ?self.state,
            turns = self.turns_completed,
            "Discussion ended"
        );
        self.outcome(error)
    }

    fn outcome(&self, error: Option<DiscussionError>) -> DiscussionOutcome {
        DiscussionOutcome {
            state: self.state,
            turns_completed: self.turns_completed,
            error,
        }
    }

    /// One turn; on failure the turn's message carries the error text
    async fn take_turn(&mut self, turn: &TurnState) -> Result<TurnResult, DiscussionError> {
        let id = self.transcript.append(&turn.current_speaker);
        debug!(
            message = %id,
            speaker = %turn.current_speaker,
            round = turn.round_index,
            "Turn started"
        );

        let result = self.stream_turn(&id, turn).await;
        if let Err(err) = &result {
            if let Err(mark_err) = self.transcript.fail(&id, &format!("Error: {err}")) {
                warn!(message = %id, error = %mark_err, "Could not mark message as errored");
            }
        }
        result
    }

    async fn stream_turn(
        &mut self,
        id: &MessageId,
        turn: &TurnState,
    ) -> Result<TurnResult, DiscussionError> {
        let speaker = &turn.current_speaker;
        let context = self.contexts.get(speaker).cloned().unwrap_or_default();
        let context_size = context.len();
        self.transcript
            .update(id, |m| m.context_size = context_size)?;

        let request = GenerateRequest::new(speaker.as_str(), turn.current_prompt.as_str())
            .with_context(context);
        let mut rx = self.backend.generate(&request).await?;

        let mut full_response = String::new();
        let mut fragments = 0usize;
        let mut reasoning_seen = false;

        let terminal = loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                event = rx.recv() => Some(event),
            };

            let Some(event) = event else {
                // Abandon the stream; later fragments are never read
                drop(rx);
                let split = split_reasoning(&full_response);
                self.transcript.update(id, |m| {
                    m.content = split.content;
                    if split.thought_process.is_some() {
                        m.thought_process = split.thought_process;
                    }
                })?;
                self.transcript.cancel(id)?;
                debug!(message = %id, fragments, "Turn cancelled while streaming");
                return Ok(TurnResult::Cancelled);
            };

            match event {
                None => return Err(BackendError::Incomplete.into()),
                Some(GenerateEvent::Error(message)) => {
                    return Err(BackendError::Stream(message).into());
                }
                Some(GenerateEvent::Fragment(fragment)) => {
                    if let Some(message) = fragment.error {
                        return Err(BackendError::Stream(message).into());
                    }
                    fragments += 1;
                    // A marker may straddle the previous fragment boundary
                    let scan_from = full_response
                        .len()
                        .saturating_sub(THOUGHT_OPEN.len() - 1);
                    full_response.push_str(&fragment.response);

                    if !reasoning_seen && has_thought_marker_from(&full_response, scan_from) {
                        reasoning_seen = true;
                        self.transcript.update(id, |m| m.is_reasoning_model = true)?;
                    }
                    if fragment.done {
                        break fragment;
                    }
                }
            }
        };
        drop(rx);

        let context = terminal.context.unwrap_or_default();
        debug!(
            message = %id,
            fragments,
            context_len = context.len(),
            "Response complete"
        );
        self.contexts.insert(speaker.clone(), context);

        let stats = (!terminal.stats.is_empty()).then_some(terminal.stats);
        self.transcript.update(id, |m| m.stats = stats)?;

        let split = split_reasoning(&full_response);
        match self
            .reveal
            .reveal_message(&mut self.transcript, id, &split)
            .await?
        {
            MessageReveal::Revealed(content) => Ok(TurnResult::Revealed(content)),
            MessageReveal::Cancelled => Ok(TurnResult::Cancelled),
        }
    }
}
