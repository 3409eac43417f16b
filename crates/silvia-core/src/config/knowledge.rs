use serde::{Deserialize, Serialize};
use tracing::info;

use super::defaults::*;
use super::shellexpand;
use crate::error::SilviaError;

/// Bundled knowledge text, embedded at compile time.
const BUNDLED_KNOWLEDGE: &str = include_str!("../../../../prompts/KNOWLEDGE.md");

/// Placeholder replaced with the assistant's display name.
pub const AI_NAME_PLACEHOLDER: &str = "{ai_name}";

/// Where the knowledge text comes from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeKind {
    /// Bundled text or a file on disk, read once at startup.
    #[default]
    Static,
    /// Active rows of the knowledge table, read per message.
    Database,
}

impl std::str::FromStr for KnowledgeKind {
    type Err = SilviaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "database" | "db" => Ok(Self::Database),
            other => Err(SilviaError::Config(format!(
                "unknown knowledge source '{other}', expected 'static' or 'database'"
            ))),
        }
    }
}

/// Knowledge base config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub source: KnowledgeKind,
    /// Text file overriding the bundled knowledge (static source only).
    #[serde(default)]
    pub file: Option<String>,
    /// Table holding `content` / `status` rows (database source only).
    #[serde(default = "default_knowledge_table")]
    pub table: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            source: KnowledgeKind::Static,
            file: None,
            table: default_knowledge_table(),
        }
    }
}

impl KnowledgeConfig {
    /// Resolve the static knowledge text with `{ai_name}` substituted.
    pub fn load_static(&self, ai_name: &str) -> Result<String, SilviaError> {
        let raw = match &self.file {
            Some(path) => {
                let path = shellexpand(path);
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    SilviaError::Config(format!("failed to read knowledge file {path}: {e}"))
                })?;
                info!("knowledge loaded from {path} ({} bytes)", text.len());
                text
            }
            None => BUNDLED_KNOWLEDGE.to_string(),
        };
        Ok(raw.replace(AI_NAME_PLACEHOLDER, ai_name))
    }
}

/// Whether `name` is safe to splice into SQL as a table name.
///
/// Allows `table` or `schema.table` made of ASCII letters, digits and `_`,
/// not starting with a digit.
pub fn is_sql_identifier(name: &str) -> bool {
    let part_ok = |p: &str| {
        !p.is_empty()
            && !p.starts_with(|c: char| c.is_ascii_digit())
            && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2 && parts.iter().all(|p| part_ok(p))
}
