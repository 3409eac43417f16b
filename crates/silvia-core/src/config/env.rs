//! Environment overrides layered on top of the TOML config.

use super::{Config, KnowledgeKind};
use crate::error::SilviaError;

const DEFAULT_MYSQL_PORT: &str = "3306";

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), SilviaError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to read variables.
    ///
    /// Unset variables leave the file value alone. `BOT_PREFIX` may be set
    /// to an empty string to disable the prefix.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), SilviaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("GEMINI_API_KEY") {
            self.provider.gemini.api_key = v;
        }
        if let Some(v) = non_empty("GEMINI_MODEL") {
            self.provider.gemini.model = v;
        }
        if let Some(v) = lookup("BOT_PREFIX") {
            self.bot.prefix = Some(v);
        }
        if let Some(v) = non_empty("AI_NAME") {
            self.silvia.name = v;
        }

        if let Some(url) = non_empty("DATABASE_URL") {
            self.database.url = url;
        } else if let Some(host) = non_empty("DB_HOST") {
            self.database.url = mysql_url(
                &host,
                &non_empty("DB_PORT").unwrap_or_else(|| DEFAULT_MYSQL_PORT.to_string()),
                &lookup("DB_USER").unwrap_or_default(),
                &lookup("DB_PASSWORD").unwrap_or_default(),
                &lookup("DB_NAME").unwrap_or_default(),
            );
        }

        if let Some(v) = non_empty("KNOWLEDGE_TABLE") {
            self.knowledge.table = v;
        }
        if let Some(v) = non_empty("KNOWLEDGE_SOURCE") {
            self.knowledge.source = v.parse::<KnowledgeKind>()?;
        }
        if let Some(v) = non_empty("WEBHOOK_URL") {
            self.notifier.webhook_url = Some(v);
        }
        if let Some(v) = non_empty("QR_SECRET") {
            self.notifier.qr_secret = Some(v);
        }
        if let Some(v) = non_empty("PORT") {
            self.api.port = v
                .trim()
                .parse()
                .map_err(|_| SilviaError::Config(format!("invalid PORT '{v}'")))?;
        }
        if let Some(v) = non_empty("WA_BRIDGE_URL") {
            self.channel.whatsapp.bridge_url = v;
        }
        Ok(())
    }
}

/// Build a MySQL connection URL from discrete parts.
pub(super) fn mysql_url(host: &str, port: &str, user: &str, password: &str, db: &str) -> String {
    let auth = match (user.is_empty(), password.is_empty()) {
        (true, _) => String::new(),
        (false, true) => format!("{}@", urlencoding::encode(user)),
        (false, false) => format!(
            "{}:{}@",
            urlencoding::encode(user),
            urlencoding::encode(password)
        ),
    };
    format!("mysql://{auth}{host}:{port}/{db}")
}
