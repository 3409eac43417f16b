use thiserror::Error;

/// Top-level error type for Silvia.
#[derive(Debug, Error)]
pub enum SilviaError {
    /// Error from the completion provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from the messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Database error (knowledge table or chat history).
    #[error("memory error: {0}")]
    Memory(String),

    /// Outbound webhook error.
    #[error("webhook error: {0}")]
    Webhook(String),

    /// QR payload encryption or verification error.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
