use super::{sqlite_url, Backend, Store};
use crate::{HistoryRecorder, TableKnowledge};
use silvia_core::{config::DatabaseConfig, traits::KnowledgeSource};

/// Create an in-memory store for testing.
async fn test_store(knowledge_table: &str) -> Store {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        ..Default::default()
    };
    let store = Store::connect(&config).await.unwrap();
    store.migrate(knowledge_table).await.unwrap();
    store
}

async fn add_knowledge(store: &Store, table: &str, content: &str, status: i32) {
    sqlx::query(&format!(
        "INSERT INTO {table} (content, status) VALUES (?, ?)"
    ))
    .bind(content)
    .bind(status)
    .execute(store.pool())
    .await
    .unwrap();
}

#[test]
fn test_backend_from_url() {
    assert_eq!(Backend::from_url("sqlite::memory:").unwrap(), Backend::Sqlite);
    assert_eq!(
        Backend::from_url("mysql://bot:pw@db:3306/silverstream").unwrap(),
        Backend::MySql
    );
    assert!(Backend::from_url("postgres://localhost/db").is_err());
}

#[test]
fn test_sqlite_url_normalization() {
    assert_eq!(sqlite_url("sqlite::memory:").unwrap(), "sqlite::memory:");

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("nested/silvia.db");
    let url = sqlite_url(&format!("sqlite:{}", db.display())).unwrap();
    assert_eq!(url, format!("sqlite://{}?mode=rwc", db.display()));
    assert!(db.parent().unwrap().is_dir(), "parent dir created");

    let url = sqlite_url(&format!("sqlite://{}?mode=ro", db.display())).unwrap();
    assert!(url.ends_with("?mode=ro"));
}

#[tokio::test]
async fn test_connect_rejects_empty_url() {
    assert!(Store::connect(&DatabaseConfig::default()).await.is_err());
}

#[tokio::test]
async fn test_file_backed_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite:{}", dir.path().join("data/silvia.db").display()),
        max_connections: 2,
        ..Default::default()
    };
    let store = Store::connect(&config).await.unwrap();
    store.ping().await.unwrap();
    store.migrate("knowledge_base").await.unwrap();
    assert!(dir.path().join("data/silvia.db").exists());
}

#[tokio::test]
async fn test_migrate_is_idempotent() {
    let store = test_store("knowledge_base").await;
    store.migrate("knowledge_base").await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_migrate_rejects_bad_table_name() {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        ..Default::default()
    };
    let store = Store::connect(&config).await.unwrap();
    assert!(store.migrate("kb; DROP TABLE x").await.is_err());
}

#[tokio::test]
async fn test_knowledge_joins_active_rows() {
    let store = test_store("knowledge_base").await;
    add_knowledge(&store, "knowledge_base", "A", 1).await;
    add_knowledge(&store, "knowledge_base", "B", 1).await;
    add_knowledge(&store, "knowledge_base", "C", 0).await;

    let source = TableKnowledge::new(store.pool().clone(), "knowledge_base").unwrap();
    assert_eq!(source.kind(), "database");
    assert_eq!(source.knowledge().await.unwrap(), "A\n\nB");
}

#[tokio::test]
async fn test_knowledge_reflects_updates_per_call() {
    let store = test_store("knowledge_bases").await;
    let source = TableKnowledge::new(store.pool().clone(), "knowledge_bases").unwrap();
    assert_eq!(source.knowledge().await.unwrap(), "");

    add_knowledge(&store, "knowledge_bases", "Price: Rp 100.000", 1).await;
    assert_eq!(source.knowledge().await.unwrap(), "Price: Rp 100.000");
}

#[tokio::test]
async fn test_knowledge_missing_table_is_error() {
    let store = test_store("knowledge_base").await;
    let source = TableKnowledge::new(store.pool().clone(), "no_such_table").unwrap();
    let err = source.knowledge().await.unwrap_err();
    assert!(err.to_string().contains("knowledge query failed"));
}

#[tokio::test]
async fn test_knowledge_rejects_bad_table_name() {
    let store = test_store("knowledge_base").await;
    assert!(TableKnowledge::new(store.pool().clone(), "kb where 1=1 --").is_err());
}

#[tokio::test]
async fn test_history_insert() {
    let store = test_store("knowledge_base").await;
    let history = HistoryRecorder::new(store.pool().clone());
    history
        .record("628123456789@c.us", "What is this product?", "A water filter.")
        .await
        .unwrap();

    let row: (String, String, String) =
        sqlx::query_as("SELECT phone, question, answer FROM chat_histories")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(
        row,
        (
            "628123456789@c.us".to_string(),
            "What is this product?".to_string(),
            "A water filter.".to_string()
        )
    );
}

#[tokio::test]
async fn test_history_without_table_fails() {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        ..Default::default()
    };
    let store = Store::connect(&config).await.unwrap();
    let history = HistoryRecorder::new(store.pool().clone());
    assert!(history.record("a", "b", "c").await.is_err());
}
