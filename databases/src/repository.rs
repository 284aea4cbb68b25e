//! Model repository: owner-scoped insert, query and delete of model records
//!
//! ## Write Ordering
//!
//! 1. BEGIN TRANSACTION
//! 2. INSERT / DELETE the single `models` row
//! 3. COMMIT
//!
//! ## Failure Semantics
//!
//! * Any error before COMMIT drops the transaction, which rolls it back
//! * No retries

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::{debug, warn};

use crate::models::{MetricsRow, ModelRecord, NewModelRecord};
use crate::{DatabaseError, DatabaseResult};

/// Durable store of model records with per-owner scoping
pub trait ModelRepository {
    /// Persist `record` atomically and return it with its assigned id
    fn insert(&self, record: NewModelRecord) -> DatabaseResult<ModelRecord>;

    /// All records owned by `owner_id`, optionally filtered by task type (case-insensitive)
    fn find(&self, owner_id: i64, task_type: Option<&str>) -> DatabaseResult<Vec<ModelRecord>>;

    /// Delete `model_id` if it exists and belongs to `owner_id`; false when nothing matched
    fn delete(&self, model_id: i64, owner_id: i64) -> DatabaseResult<bool>;
}

/// Unit of work over one SQLite connection
///
/// Acquired per request from [`crate::SQLiteManager::session`]; the
/// connection closes when the session is dropped.
pub struct ModelSession {
    conn: Connection,
}

impl ModelSession {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Exposed for direct queries in tests
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl ModelRepository for ModelSession {
    fn insert(&self, record: NewModelRecord) -> DatabaseResult<ModelRecord> {
        debug!(
            "Inserting {} model '{}' for owner {}",
            record.task_type, record.name, record.owner_id
        );

        if record.artifact.is_empty() {
            return Err(DatabaseError::InvalidRecord(
                "trained model artifact is empty".to_string(),
            ));
        }

        let metrics_json = serde_json::to_string(&record.metrics)?;
        let created_at = Utc::now();

        // Step 1: Begin transaction
        let tx = self.conn.unchecked_transaction()?;

        // Step 2: Insert model row
        tx.execute(
            "INSERT INTO models (model_name, model_type, model_file, metrics, target_column, training_data_path, status, hyperparameters, owner_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                record.name,
                record.task_type.as_str(),
                record.artifact,
                metrics_json,
                record.target_column,
                record.training_data_path,
                record.status.as_str(),
                record.hyperparameters,
                record.owner_id,
                created_at.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();

        // Step 3: Commit
        tx.commit()?;

        debug!("Model '{}' persisted with id {id}", record.name);
        Ok(ModelRecord::from_new(id, record, created_at))
    }

    fn find(&self, owner_id: i64, task_type: Option<&str>) -> DatabaseResult<Vec<ModelRecord>> {
        debug!("Listing models for owner {owner_id} (filter: {task_type:?})");

        let filter = task_type.map(str::trim).filter(|t| !t.is_empty());

        let mut stmt = self.conn.prepare(
            "SELECT id, model_name, model_type, model_file, metrics, target_column, training_data_path, status, hyperparameters, owner_id, created_at
             FROM models
             WHERE owner_id = ?1 AND (?2 IS NULL OR lower(model_type) = lower(?2))
             ORDER BY id;",
        )?;

        let rows = stmt
            .query_map(params![owner_id, filter], RawModelRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let records = rows
            .into_iter()
            .map(RawModelRow::into_record)
            .collect::<DatabaseResult<Vec<_>>>()?;

        debug!("Found {} models for owner {owner_id}", records.len());
        Ok(records)
    }

    fn delete(&self, model_id: i64, owner_id: i64) -> DatabaseResult<bool> {
        debug!("Deleting model {model_id} for owner {owner_id}");

        let tx = self.conn.unchecked_transaction()?;
        let affected = tx.execute(
            "DELETE FROM models WHERE id = ?1 AND owner_id = ?2;",
            params![model_id, owner_id],
        )?;
        tx.commit()?;

        let deleted = affected > 0;
        if deleted {
            debug!("Model {model_id} deleted");
        } else {
            warn!("Model {model_id} not found for owner {owner_id}");
        }

        Ok(deleted)
    }
}

/// Column values as read, before parsing into domain types
struct RawModelRow {
    id: i64,
    name: String,
    task_type: String,
    artifact: Vec<u8>,
    metrics: String,
    target_column: Option<String>,
    training_data_path: Option<String>,
    status: String,
    hyperparameters: Option<String>,
    owner_id: i64,
    created_at: String,
}

impl RawModelRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            task_type: row.get(2)?,
            artifact: row.get(3)?,
            metrics: row.get(4)?,
            target_column: row.get(5)?,
            training_data_path: row.get(6)?,
            status: row.get(7)?,
            hyperparameters: row.get(8)?,
            owner_id: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn into_record(self) -> DatabaseResult<ModelRecord> {
        let metrics: Vec<MetricsRow> = serde_json::from_str(&self.metrics)?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| DatabaseError::InvalidRecord(format!("bad created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(ModelRecord {
            id: self.id,
            name: self.name,
            task_type: self.task_type.parse()?,
            artifact: self.artifact,
            metrics,
            target_column: self.target_column,
            training_data_path: self.training_data_path,
            status: self.status.parse()?,
            hyperparameters: self.hyperparameters,
            owner_id: self.owner_id,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelStatus, NewUser, TaskType};
    use crate::SQLiteManager;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        manager: SQLiteManager,
        alice: i64,
        bob: i64,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let manager = SQLiteManager::new(dir.path().join("models.db")).unwrap();
        manager.initialize_schema().unwrap();

        let alice = manager
            .create_user(&NewUser {
                email: "alice@example.com".to_string(),
                username: "alice".to_string(),
                ..Default::default()
            })
            .unwrap();
        let bob = manager
            .create_user(&NewUser {
                email: "bob@example.com".to_string(),
                username: "bob".to_string(),
                ..Default::default()
            })
            .unwrap();

        Fixture {
            _dir: dir,
            manager,
            alice,
            bob,
        }
    }

    fn record(owner_id: i64, task_type: TaskType) -> NewModelRecord {
        let mut row = MetricsRow::new();
        row.insert("Accuracy".to_string(), serde_json::json!(0.9));

        NewModelRecord {
            name: format!("{task_type}-model"),
            task_type,
            artifact: vec![1, 2, 3],
            metrics: vec![row],
            target_column: task_type.requires_target().then(|| "label".to_string()),
            training_data_path: None,
            status: ModelStatus::Trained,
            hyperparameters: None,
            owner_id,
        }
    }

    #[test]
    fn test_insert_assigns_distinct_ids() {
        let f = fixture();
        let session = f.manager.session().unwrap();

        let first = session
            .insert(record(f.alice, TaskType::Classification))
            .unwrap();
        let second = session
            .insert(record(f.alice, TaskType::Classification))
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.status, ModelStatus::Trained);
        assert_eq!(first.artifact, vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_rejects_empty_artifact() {
        let f = fixture();
        let session = f.manager.session().unwrap();

        let mut empty = record(f.alice, TaskType::Regression);
        empty.artifact.clear();

        assert!(matches!(
            session.insert(empty),
            Err(DatabaseError::InvalidRecord(_))
        ));
        assert!(session.find(f.alice, None).unwrap().is_empty());
    }

    #[test]
    fn test_insert_for_unknown_owner_leaves_no_row() {
        let f = fixture();
        let session = f.manager.session().unwrap();

        assert!(session.insert(record(9_999, TaskType::Clustering)).is_err());

        let count: i64 = session
            .conn()
            .query_row("SELECT COUNT(*) FROM models", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_find_is_owner_scoped_and_case_insensitive() {
        let f = fixture();
        let session = f.manager.session().unwrap();

        session
            .insert(record(f.alice, TaskType::Classification))
            .unwrap();
        session
            .insert(record(f.alice, TaskType::Regression))
            .unwrap();
        session
            .insert(record(f.bob, TaskType::Classification))
            .unwrap();

        for filter in ["classification", "Classification", "CLASSIFICATION"] {
            let found = session.find(f.alice, Some(filter)).unwrap();
            assert_eq!(found.len(), 1, "filter {filter}");
            assert_eq!(found[0].task_type, TaskType::Classification);
            assert_eq!(found[0].owner_id, f.alice);
        }

        assert_eq!(session.find(f.alice, None).unwrap().len(), 2);
        assert_eq!(session.find(f.alice, Some("")).unwrap().len(), 2);
        assert!(session.find(f.alice, Some("forecasting")).unwrap().is_empty());
    }

    #[test]
    fn test_find_round_trips_fields() {
        let f = fixture();
        let session = f.manager.session().unwrap();

        let mut new = record(f.alice, TaskType::Clustering);
        new.hyperparameters = Some(r#"{"n_clusters":4}"#.to_string());
        let inserted = session.insert(new).unwrap();

        let found = session.find(f.alice, Some("clustering")).unwrap();
        assert_eq!(found.len(), 1);
        let stored = &found[0];
        assert_eq!(stored.id, inserted.id);
        assert_eq!(stored.target_column, None);
        assert_eq!(stored.metrics, inserted.metrics);
        assert_eq!(stored.hyperparameters.as_deref(), Some(r#"{"n_clusters":4}"#));
    }

    #[test]
    fn test_delete_by_non_owner_matches_missing_id() {
        let f = fixture();
        let session = f.manager.session().unwrap();

        let inserted = session
            .insert(record(f.alice, TaskType::Regression))
            .unwrap();

        assert!(!session.delete(inserted.id, f.bob).unwrap());
        assert!(!session.delete(inserted.id + 1_000, f.bob).unwrap());
        assert_eq!(session.find(f.alice, None).unwrap().len(), 1);

        assert!(session.delete(inserted.id, f.alice).unwrap());
        assert!(session.find(f.alice, None).unwrap().is_empty());
        assert!(!session.delete(inserted.id, f.alice).unwrap());
    }

    #[test]
    fn test_concurrent_sessions_do_not_interfere() {
        let f = fixture();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let manager = f.manager.clone();
                let owner = if i % 2 == 0 { f.alice } else { f.bob };
                std::thread::spawn(move || {
                    let session = manager.session().unwrap();
                    session.insert(record(owner, TaskType::Regression)).unwrap()
                })
            })
            .collect();

        let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap().id).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());

        let session = f.manager.session().unwrap();
        assert_eq!(session.find(f.alice, None).unwrap().len(), 2);
        assert_eq!(session.find(f.bob, None).unwrap().len(), 2);
    }
}
