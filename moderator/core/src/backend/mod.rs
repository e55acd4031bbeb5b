//! Inference Server Integration
//!
//! This module provides abstracted access to the inference server through the
//! [`InferenceBackend`] trait.
//!
//! # Available Backends
//!
//! - **Ollama**: Local LLM server (default)
//! - **Scripted**: Replays canned turns, for tests and demos
//!
//! # Usage
//!
//! ```ignore
//! use moderator_core::backend::{GenerateRequest, InferenceBackend, OllamaBackend};
//!
//! let backend = OllamaBackend::from_env();
//! let request = GenerateRequest::new("llama3.2", "Hello!");
//! let rx = backend.generate(&request).await?;
//! ```

mod decoder;
mod ollama;
pub mod testing;
mod traits;

pub use decoder::NdjsonDecoder;
pub use ollama::OllamaBackend;
pub use traits::{
    ContextTokens, GenerateEvent, GenerateFragment, GenerateRequest, GenerateStats,
    InferenceBackend, ModelDescriptor,
};
