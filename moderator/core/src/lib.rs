//! Moderator Core - Two-Model Discussion Engine for duologue
//!
//! This crate runs a discussion between two language models served by a local
//! Ollama-compatible inference server. It owns the turn-taking loop, the
//! streamed response decoding, the separation of thought text from answers
//! and the typewriter reveal. It has no terminal or UI dependency; rendering
//! surfaces plug in as [`TranscriptObserver`]s.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      Rendering Surface                         │
//! │            (terminal renderer, tests, anything else)           │
//! └───────────────────────────────▲───────────────────────────────┘
//!                                 │ TranscriptChange
//! ┌───────────────────────────────┼───────────────────────────────┐
//! │                        MODERATOR CORE                          │
//! │                                                                │
//! │  DiscussionConfig ──► Moderator ──────► TranscriptStore        │
//! │                        │    ▲  │              ▲                │
//! │           GenerateRequest   │  │ SplitResponse │ reveal writes  │
//! │                        ▼    │  ▼              │                │
//! │  ┌──────────────────────┐   │ ┌──────────────────────────────┐ │
//! │  │  InferenceBackend    │   │ │ reasoning ──► RevealScheduler│ │
//! │  │  (Ollama, Scripted)  │───┘ └──────────────────────────────┘ │
//! │  └──────────┬───────────┘ GenerateEvent                        │
//! └─────────────┼──────────────────────────────────────────────────┘
//!               │ NDJSON over HTTP
//!        ┌──────▼──────┐
//!        │   Ollama    │
//!        └─────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Moderator`]: The turn controller that runs one discussion
//! - [`DiscussionConfig`]: Validated topic, participants, style and rounds
//! - [`TranscriptStore`]: Append-only list of [`Message`]s with observers
//! - [`RevealScheduler`]: Character-by-character reveal with cancellation
//! - [`InferenceBackend`]: The inference server seam
//!
//! # Quick Start
//!
//! ```ignore
//! use moderator_core::{DiscussionConfig, Moderator, OllamaBackend, RevealSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env();
//!     let config = DiscussionConfig::new("The future of AI", "llama3.2", "qwen3", "debate", 4)
//!         .unwrap();
//!
//!     let mut moderator = Moderator::new(backend, config, RevealSettings::default());
//!     let stop = moderator.cancel_token();
//!     tokio::spawn(async move {
//!         tokio::signal::ctrl_c().await.ok();
//!         stop.cancel();
//!     });
//!
//!     let outcome = moderator.run().await;
//!     println!("{:?} after {} turns", outcome.state, outcome.turns_completed);
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod error;
pub mod moderator;
pub mod prompt;
pub mod reasoning;
pub mod reveal;
pub mod topics;
pub mod transcript;

// Re-exports for convenience
pub use backend::{
    ContextTokens, GenerateEvent, GenerateFragment, GenerateRequest, GenerateStats,
    InferenceBackend, ModelDescriptor, NdjsonDecoder, OllamaBackend,
};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigOverrides, ConfigSource,
    DiscussionConfig, ServerSettings, Settings,
};
pub use error::{BackendError, ConfigError, DiscussionError, TranscriptError};
pub use moderator::{DiscussionId, DiscussionOutcome, DiscussionState, Moderator};
pub use reasoning::{split_reasoning, SplitResponse};
pub use reveal::{MessageReveal, RevealOutcome, RevealScheduler, RevealSettings, RevealTask};
pub use transcript::{
    Message, MessageId, MessageStatus, TranscriptChange, TranscriptObserver, TranscriptStore,
};
