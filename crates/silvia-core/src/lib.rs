//! # silvia-core
//!
//! Core types, traits, configuration, and error handling for Silvia.

pub mod config;
pub mod crypto;
pub mod error;
pub mod filter;
pub mod message;
pub mod prompt;
pub mod state;
pub mod traits;
