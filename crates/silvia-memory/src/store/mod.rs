//! Relational store shared by the knowledge source and the history recorder.
//!
//! Goes through `sqlx::Any`, so the same code runs against MySQL in
//! production and SQLite locally or in tests. Both backends accept `?`
//! placeholders.

use silvia_core::{
    config::{is_sql_identifier, shellexpand, DatabaseConfig},
    error::SilviaError,
};
use sqlx::{any::AnyPoolOptions, AnyPool};
use tracing::info;

/// Database flavour, picked from the URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    MySql,
}

impl Backend {
    pub fn from_url(url: &str) -> Result<Self, SilviaError> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "sqlite" => Ok(Self::Sqlite),
            "mysql" | "mariadb" => Ok(Self::MySql),
            other => Err(SilviaError::Memory(format!(
                "unsupported database scheme '{other}' (expected mysql or sqlite)"
            ))),
        }
    }

    fn migrations(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Sqlite => &[(
                "001_init",
                include_str!("../../migrations/sqlite/001_init.sql"),
            )],
            Self::MySql => &[(
                "001_init",
                include_str!("../../migrations/mysql/001_init.sql"),
            )],
        }
    }
}

/// Connection pool plus the backend it talks to.
#[derive(Clone)]
pub struct Store {
    pool: AnyPool,
    backend: Backend,
}

impl Store {
    /// Connect using `config.url`.
    ///
    /// SQLite paths get `~` expanded, their parent directory created, and
    /// the file created if missing.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SilviaError> {
        if !config.is_configured() {
            return Err(SilviaError::Memory("database url is empty".into()));
        }
        sqlx::any::install_default_drivers();

        let backend = Backend::from_url(&config.url)?;
        let url = match backend {
            Backend::Sqlite => sqlite_url(&config.url)?,
            Backend::MySql => config.url.clone(),
        };

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect(&url)
            .await
            .map_err(|e| SilviaError::Memory(format!("failed to connect to database: {e}")))?;

        info!("Database pool ready ({backend:?}, max {} connections)", config.max_connections);
        Ok(Self { pool, backend })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), SilviaError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| SilviaError::Memory(format!("database ping failed: {e}")))?;
        Ok(())
    }

    /// Create the knowledge table (named `knowledge_table`) and
    /// `chat_histories` if missing, tracking applied migrations.
    pub async fn migrate(&self, knowledge_table: &str) -> Result<(), SilviaError> {
        if !is_sql_identifier(knowledge_table) {
            return Err(SilviaError::Memory(format!(
                "invalid knowledge table name '{knowledge_table}'"
            )));
        }

        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name VARCHAR(191) NOT NULL PRIMARY KEY,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SilviaError::Memory(format!("failed to create migrations table: {e}")))?;

        for (name, sql) in self.backend.migrations() {
            let applied: Option<String> =
                sqlx::query_scalar("SELECT name FROM _migrations WHERE name = ?")
                    .bind(*name)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| {
                        SilviaError::Memory(format!("failed to check migration {name}: {e}"))
                    })?;
            if applied.is_some() {
                continue;
            }

            let sql = sql.replace("{knowledge_table}", knowledge_table);
            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| SilviaError::Memory(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(*name)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    SilviaError::Memory(format!("failed to record migration {name}: {e}"))
                })?;
            info!("Applied migration {name}");
        }
        Ok(())
    }
}

/// Normalize a SQLite URL: expand `~`, create the parent directory, and
/// ask the driver to create the file.
fn sqlite_url(url: &str) -> Result<String, SilviaError> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(url.to_string());
    }

    let path = shellexpand(path);
    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SilviaError::Memory(format!("failed to create data dir: {e}")))?;
        }
    }

    let query = if query.is_empty() {
        "mode=rwc".to_string()
    } else if query.contains("mode=") {
        query.to_string()
    } else {
        format!("{query}&mode=rwc")
    };
    Ok(format!("sqlite://{path}?{query}"))
}

#[cfg(test)]
mod tests;
