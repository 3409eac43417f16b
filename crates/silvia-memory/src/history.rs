//! Chat history: one row per answered question.

use silvia_core::error::SilviaError;
use sqlx::AnyPool;
use tracing::debug;

/// Writes question/answer pairs to `chat_histories`.
#[derive(Clone)]
pub struct HistoryRecorder {
    pool: AnyPool,
}

impl HistoryRecorder {
    /// Create a recorder sharing the given pool.
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Insert one exchange. `phone` is the sender address as reported by
    /// the channel.
    pub async fn record(
        &self,
        phone: &str,
        question: &str,
        answer: &str,
    ) -> Result<(), SilviaError> {
        sqlx::query("INSERT INTO chat_histories (phone, question, answer) VALUES (?, ?, ?)")
            .bind(phone)
            .bind(question)
            .bind(answer)
            .execute(&self.pool)
            .await
            .map_err(|e| SilviaError::Memory(format!("chat history write failed: {e}")))?;

        debug!("history: recorded exchange for {phone}");
        Ok(())
    }
}
