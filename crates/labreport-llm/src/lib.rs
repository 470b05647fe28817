//! Analysis engine for lab report interpretation.
//!
//! Builds the interpretation and comparison prompts and talks to Gemini's
//! `generateContent` API. The HTTP client is gated behind the default
//! `gemini` feature so hosts that run the model themselves can use the
//! prompts alone.

pub mod gemini;
pub mod prompts;

pub use gemini::{GeminiConfig, GenerateContentRequest, GenerateContentResponse};
#[cfg(feature = "gemini")]
pub use gemini::GeminiEngine;
pub use prompts::*;
