//! SQLite store for trained models
//!
//! This module provides connection management and schema creation for the
//! model store, plus the small slice of user management the store depends on.
//!
//! Connections are not shared between requests: every request acquires its
//! own [`ModelSession`] through [`SQLiteManager::session`] and releases it
//! by dropping it.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::NewUser;
use crate::repository::ModelSession;
use crate::DatabaseResult;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite connection manager
#[derive(Debug, Clone)]
pub struct SQLiteManager {
    /// Database path
    db_path: PathBuf,
}

impl SQLiteManager {
    /// Create a new SQLite manager, creating the database file if missing
    pub fn new<P: AsRef<Path>>(db_path: P) -> DatabaseResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        info!("Creating SQLite manager with database path: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = Self { db_path };

        // Switch to WAL journaling
        let conn = manager.open_connection()?;
        conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;

        Ok(manager)
    }

    /// Get database path
    pub fn get_database_path(&self) -> &Path {
        &self.db_path
    }

    /// Initialize database schema
    pub fn initialize_schema(&self) -> DatabaseResult<()> {
        info!("Initializing SQLite database schema");

        let conn = self.open_connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE,
                username TEXT UNIQUE,
                first_name TEXT,
                last_name TEXT,
                hashed_password TEXT,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                role TEXT,
                phone_number TEXT
            );",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model_name TEXT NOT NULL,
                model_type TEXT NOT NULL,
                model_file BLOB NOT NULL,
                metrics TEXT NOT NULL,
                target_column TEXT,
                training_data_path TEXT,
                status TEXT NOT NULL DEFAULT 'trained',
                hyperparameters TEXT,
                owner_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users (id)
            );",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_models_owner ON models(owner_id);",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_models_owner_type ON models(owner_id, model_type);",
            [],
        )?;

        info!("SQLite database schema initialized successfully");
        Ok(())
    }

    /// Acquire a per-request unit of work
    pub fn session(&self) -> DatabaseResult<ModelSession> {
        let conn = self.open_connection()?;
        Ok(ModelSession::new(conn))
    }

    /// Create a user and return its id
    pub fn create_user(&self, user: &NewUser) -> DatabaseResult<i64> {
        debug!("Creating user: {}", user.username);

        let mut conn = self.open_connection()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO users (email, username, first_name, last_name, hashed_password, is_active, role, phone_number)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7);",
            params![
                user.email,
                user.username,
                user.first_name,
                user.last_name,
                user.hashed_password,
                user.role,
                user.phone_number,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!("Created user {} with id {id} at {}", user.username, Utc::now().to_rfc3339());
        Ok(id)
    }

    /// Whether `user_id` names an existing, active user
    pub fn is_active_user(&self, user_id: i64) -> DatabaseResult<bool> {
        let conn = self.open_connection()?;

        let active: Option<bool> = conn
            .query_row(
                "SELECT is_active FROM users WHERE id = ?1;",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(active.unwrap_or(false))
    }

    fn open_connection(&self) -> DatabaseResult<Connection> {
        let conn = Connection::open(&self.db_path)?;

        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(conn)
    }
}
