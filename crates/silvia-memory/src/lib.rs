//! # silvia-memory
//!
//! Knowledge base and chat history storage for Silvia (MySQL or SQLite).

pub mod history;
pub mod knowledge;
pub mod store;

pub use history::HistoryRecorder;
pub use knowledge::TableKnowledge;
pub use store::{Backend, Store};
