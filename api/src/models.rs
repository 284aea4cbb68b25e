//! API Models Module
//!
//! Configuration and request/response payloads of the HTTP surface.

use serde::{Deserialize, Serialize};

use modeltrainer_core::config::TrainerConfig;
use modeltrainer_core::TrainingOutcome;
use modeltrainer_databases::{MetricsRow, ModelRecord};

/// Room for multipart framing and text fields on top of the file itself
pub const MULTIPART_SLACK_BYTES: usize = 1024 * 1024;

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl ApiConfig {
    pub fn from_trainer_config(config: &TrainerConfig) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            max_upload_bytes: config.training.max_upload_bytes,
        }
    }

    /// Largest request body accepted before the handler runs
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(MULTIPART_SLACK_BYTES)
    }
}

/// Response of the training endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    pub status: String,
    pub model_name: String,
    pub model_path: String,
    pub metrics: Vec<MetricsRow>,
    pub run_id: String,
    pub model_id: i64,
}

impl From<TrainingOutcome> for TrainResponse {
    fn from(outcome: TrainingOutcome) -> Self {
        Self {
            status: "success".to_string(),
            model_name: outcome.model_name,
            model_path: outcome.model_path,
            metrics: outcome.metrics,
            run_id: outcome.run_id,
            model_id: outcome.model_id,
        }
    }
}

/// One entry of the saved-models listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedModel {
    pub id: i64,
    pub model_name: String,
    pub model_type: String,
    pub metrics: Vec<MetricsRow>,
    pub target_column: Option<String>,
    pub training_data_path: Option<String>,
    pub status: String,
    pub hyperparameters: Option<String>,
    pub user_id: i64,
}

impl From<ModelRecord> for SavedModel {
    fn from(record: ModelRecord) -> Self {
        Self {
            id: record.id,
            model_name: record.name,
            model_type: record.task_type.to_string(),
            metrics: record.metrics,
            target_column: record.target_column,
            training_data_path: record.training_data_path,
            status: record.status.as_str().to_string(),
            hyperparameters: record.hyperparameters,
            user_id: record.owner_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SavedModelsQuery {
    pub type_of_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub detail: String,
}
