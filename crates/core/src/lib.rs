//! Contract layer between the language-learning front end and a hosted
//! generative model.
//!
//! - `schema`: response shape contracts and validation.
//! - `llm_client` / `gemini`: the model client abstraction and its Gemini implementation.
//! - `audio`: decoding of pronunciation payloads.
//! - `prompts`: prompt templates with optional on-disk overrides.
//! - `conversation`: practice conversations backed by a session handle.
//! - `tutor`: the feature operations built on the above.
//! - `view`: per-feature busy/error/result state with cancellation.

pub mod audio;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod llm_client;
pub mod models;
pub mod prompts;
pub mod schema;
pub mod tutor;
pub mod view;

pub use error::{Result, TutorError};
