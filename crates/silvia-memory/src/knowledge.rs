//! Knowledge source backed by a database table.

use async_trait::async_trait;
use silvia_core::{
    config::is_sql_identifier, error::SilviaError, prompt::KNOWLEDGE_SEPARATOR,
    traits::KnowledgeSource,
};
use sqlx::AnyPool;
use tracing::debug;

/// Reads the `content` of every active (`status = 1`) row, on every call,
/// and joins them with blank lines.
pub struct TableKnowledge {
    pool: AnyPool,
    query: String,
}

impl TableKnowledge {
    /// Create a source reading from `table` (validated as a SQL identifier).
    pub fn new(pool: AnyPool, table: &str) -> Result<Self, SilviaError> {
        if !is_sql_identifier(table) {
            return Err(SilviaError::Config(format!(
                "invalid knowledge table name '{table}'"
            )));
        }
        Ok(Self {
            pool,
            query: format!("SELECT content FROM {table} WHERE status = 1"),
        })
    }
}

#[async_trait]
impl KnowledgeSource for TableKnowledge {
    fn kind(&self) -> &str {
        "database"
    }

    async fn knowledge(&self) -> Result<String, SilviaError> {
        let rows: Vec<Option<String>> = sqlx::query_scalar(&self.query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SilviaError::Memory(format!("knowledge query failed: {e}")))?;

        let entries: Vec<String> = rows.into_iter().flatten().collect();
        debug!("knowledge: {} active entries", entries.len());
        Ok(entries.join(KNOWLEDGE_SEPARATOR))
    }
}
