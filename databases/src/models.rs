//! Persisted record types for trained models and their owners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::DatabaseError;

/// One row of evaluation output: metric name to value (numbers, plus the model label).
pub type MetricsRow = BTreeMap<String, serde_json::Value>;

/// Kind of learning problem a model was trained for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classification,
    Clustering,
    Regression,
}

impl TaskType {
    /// Canonical lowercase name, as stored in the `models.model_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Clustering => "clustering",
            TaskType::Regression => "regression",
        }
    }

    /// Whether training for this task needs a target column
    pub fn requires_target(&self) -> bool {
        !matches!(self, TaskType::Clustering)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classification" => Ok(TaskType::Classification),
            "clustering" => Ok(TaskType::Clustering),
            "regression" => Ok(TaskType::Regression),
            other => Err(DatabaseError::InvalidRecord(format!(
                "unknown model type: {other}"
            ))),
        }
    }
}

/// Lifecycle flag of a model record
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    #[default]
    Trained,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Trained => "trained",
        }
    }
}

impl FromStr for ModelStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trained" => Ok(ModelStatus::Trained),
            other => Err(DatabaseError::InvalidRecord(format!(
                "unknown model status: {other}"
            ))),
        }
    }
}

/// A model record before the store assigns its id
#[derive(Debug, Clone)]
pub struct NewModelRecord {
    pub name: String,
    pub task_type: TaskType,
    pub artifact: Vec<u8>,
    pub metrics: Vec<MetricsRow>,
    pub target_column: Option<String>,
    pub training_data_path: Option<String>,
    pub status: ModelStatus,
    pub hyperparameters: Option<String>,
    pub owner_id: i64,
}

/// A persisted training result
#[derive(Debug, Clone, Serialize)]
pub struct ModelRecord {
    pub id: i64,
    pub name: String,
    pub task_type: TaskType,
    #[serde(skip)]
    pub artifact: Vec<u8>,
    pub metrics: Vec<MetricsRow>,
    pub target_column: Option<String>,
    pub training_data_path: Option<String>,
    pub status: ModelStatus,
    pub hyperparameters: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

impl ModelRecord {
    pub(crate) fn from_new(id: i64, record: NewModelRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: record.name,
            task_type: record.task_type,
            artifact: record.artifact,
            metrics: record.metrics,
            target_column: record.target_column,
            training_data_path: record.training_data_path,
            status: record.status,
            hyperparameters: record.hyperparameters,
            owner_id: record.owner_id,
            created_at,
        }
    }
}

/// Account row referenced by `models.owner_id`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub hashed_password: Option<String>,
    pub role: Option<String>,
    pub phone_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_parses_case_insensitively() {
        assert_eq!(
            "Classification".parse::<TaskType>().unwrap(),
            TaskType::Classification
        );
        assert_eq!(
            "REGRESSION".parse::<TaskType>().unwrap(),
            TaskType::Regression
        );
        assert!("forecasting".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_only_clustering_skips_target() {
        assert!(TaskType::Classification.requires_target());
        assert!(TaskType::Regression.requires_target());
        assert!(!TaskType::Clustering.requires_target());
    }
}
