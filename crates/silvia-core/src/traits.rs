use crate::{
    error::SilviaError,
    message::{ChannelEvent, OutgoingMessage},
};
use async_trait::async_trait;

/// Completion provider trait.
///
/// A provider takes one fully composed prompt and returns the complete
/// answer text, however it is delivered on the wire (streamed or not).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a prompt to the provider and get the full response.
    async fn complete(&self, prompt: &str) -> Result<OutgoingMessage, SilviaError>;

    /// Check if the provider is reachable with the configured credentials.
    async fn is_available(&self) -> bool;
}

/// Messaging channel trait: the session with the chat network.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start the session. The receiver yields lifecycle events and inbound
    /// messages until the session ends.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<ChannelEvent>, SilviaError>;

    /// Send a reply through this channel.
    async fn send(&self, message: OutgoingMessage) -> Result<(), SilviaError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), SilviaError>;
}

/// Source of the background text prepended to every question.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Short label for logs ("static", "database").
    fn kind(&self) -> &str;

    /// Fetch the current knowledge text.
    async fn knowledge(&self) -> Result<String, SilviaError>;
}

/// Knowledge held in memory for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct StaticKnowledge {
    text: String,
}

impl StaticKnowledge {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl KnowledgeSource for StaticKnowledge {
    fn kind(&self) -> &str {
        "static"
    }

    async fn knowledge(&self) -> Result<String, SilviaError> {
        Ok(self.text.clone())
    }
}
