//! # silvia-providers
//!
//! AI provider implementations for Silvia.

pub mod gemini;
mod sse;

pub use gemini::GeminiProvider;
