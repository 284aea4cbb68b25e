//! Model Trainer Databases Module
//!
//! Durable storage for trained models: SQLite connection management, the
//! `users`/`models` schema, and the owner-scoped [`ModelRepository`].

pub mod models;
pub mod repository;
pub mod sqlite;

pub use models::{MetricsRow, ModelRecord, ModelStatus, NewModelRecord, NewUser, TaskType};
pub use repository::{ModelRepository, ModelSession};
pub use sqlite::SQLiteManager;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Result alias used throughout the crate
pub type DatabaseResult<T> = Result<T, DatabaseError>;
