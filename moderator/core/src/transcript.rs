//! Transcript Store
//!
//! The ordered record of a discussion: one [`Message`] per turn, appended in
//! chronological order and never removed. Only the last-appended message may
//! change, and only while it is still thinking. Once finalized (complete,
//! cancelled or errored) a message is read-only.
//!
//! Rendering surfaces register a [`TranscriptObserver`] and are called back on
//! every append and every in-place update.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::GenerateStats;
use crate::error::TranscriptError;

/// Unique message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    #[must_use]
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a message
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Awaiting the response or still being revealed
    #[default]
    Thinking,
    /// Fully revealed
    Complete,
    /// Finalized early by a stop request
    Cancelled,
    /// The turn failed; content holds the error description
    Errored,
}

/// One turn of the discussion
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Participant (model identifier) that produced this turn
    pub author: String,
    /// Visible answer text, grows during reveal
    pub content: String,
    /// Lifecycle status
    pub status: MessageStatus,
    /// Set once the raw stream is seen to contain a thought marker
    pub is_reasoning_model: bool,
    /// Thought text, grows during its own reveal phase
    pub thought_process: Option<String>,
    /// Length of the context the participant carried into this turn
    pub context_size: usize,
    /// Counters from the terminal fragment
    pub stats: Option<GenerateStats>,
    /// Creation time (unix ms)
    pub created_at: i64,
}

impl Message {
    /// Create an empty, thinking message
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            author: author.into(),
            content: String::new(),
            status: MessageStatus::Thinking,
            is_reasoning_model: false,
            thought_process: None,
            context_size: 0,
            stats: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Whether the message is still awaiting or revealing its response
    #[must_use]
    pub fn is_thinking(&self) -> bool {
        self.status == MessageStatus::Thinking
    }

    /// Whether the turn failed
    #[must_use]
    pub fn is_errored(&self) -> bool {
        self.status == MessageStatus::Errored
    }
}

/// A mutation observed by a rendering surface
#[derive(Clone, Copy, Debug)]
pub enum TranscriptChange<'a> {
    /// A new message was appended
    Appended(&'a Message),
    /// The active message changed in place
    Updated(&'a Message),
}

impl<'a> TranscriptChange<'a> {
    /// The message after the change
    #[must_use]
    pub fn message(&self) -> &'a Message {
        match self {
            Self::Appended(message) | Self::Updated(message) => message,
        }
    }
}

/// Notify-on-change hook for rendering surfaces
pub trait TranscriptObserver: Send {
    /// Called after every append or update
    fn on_change(&mut self, change: &TranscriptChange<'_>);
}

/// Append-only list of messages with observer notification
#[derive(Default)]
pub struct TranscriptStore {
    messages: Vec<Message>,
    observers: Vec<Box<dyn TranscriptObserver>>,
}

impl fmt::Debug for TranscriptStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptStore")
            .field("messages", &self.messages)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl TranscriptStore {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn subscribe(&mut self, observer: impl TranscriptObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Append a new thinking message for `author`
    pub fn append(&mut self, author: &str) -> MessageId {
        let message = Message::new(author);
        let id = message.id.clone();
        self.messages.push(message);

        if let Some(message) = self.messages.last() {
            notify(&mut self.observers, &TranscriptChange::Appended(message));
        }
        id
    }

    /// Mutate the active message in place
    ///
    /// # Errors
    ///
    /// Returns [`TranscriptError::UnknownMessage`] if no such message exists and
    /// [`TranscriptError::ReadOnly`] if it is finalized or not the last message.
    pub fn update<F>(&mut self, id: &MessageId, mutate: F) -> Result<&Message, TranscriptError>
    where
        F: FnOnce(&mut Message),
    {
        let index = self
            .messages
            .iter()
            .rposition(|m| &m.id == id)
            .ok_or_else(|| TranscriptError::UnknownMessage(id.clone()))?;

        if index + 1 != self.messages.len() || !self.messages[index].is_thinking() {
            return Err(TranscriptError::ReadOnly(id.clone()));
        }

        mutate(&mut self.messages[index]);

        let message = &self.messages[index];
        notify(&mut self.observers, &TranscriptChange::Updated(message));
        Ok(message)
    }

    /// Mark the active message fully revealed
    ///
    /// # Errors
    ///
    /// See [`TranscriptStore::update`].
    pub fn complete(&mut self, id: &MessageId) -> Result<&Message, TranscriptError> {
        self.update(id, |m| m.status = MessageStatus::Complete)
    }

    /// Finalize the active message after a stop request
    ///
    /// # Errors
    ///
    /// See [`TranscriptStore::update`].
    pub fn cancel(&mut self, id: &MessageId) -> Result<&Message, TranscriptError> {
        self.update(id, |m| m.status = MessageStatus::Cancelled)
    }

    /// Replace the active message's content with an error description
    ///
    /// # Errors
    ///
    /// See [`TranscriptStore::update`].
    pub fn fail(&mut self, id: &MessageId, description: &str) -> Result<&Message, TranscriptError> {
        self.update(id, |m| {
            m.content = description.to_string();
            m.status = MessageStatus::Errored;
        })
    }

    /// All messages in chronological order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a message by ID
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// The message currently being produced, if any
    #[must_use]
    pub fn active(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.is_thinking())
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no turn has started yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn notify(observers: &mut [Box<dyn TranscriptObserver>], change: &TranscriptChange<'_>) {
    for observer in observers.iter_mut() {
        observer.on_change(change);
    }
}
