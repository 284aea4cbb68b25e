//! Training orchestration for ML models
//!
//! One pipeline for every task type:
//!
//! 1. Validate the request (size limit, required target column)
//! 2. Materialize the upload
//! 3. Search for the best model
//! 4. Resolve the model name
//! 5. Serialize the winner
//! 6. Persist the record (commit point)
//! 7. Mirror the artifact and build the response
//!
//! Any failure before step 6 leaves nothing behind. Nothing is retried.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use modeltrainer_databases::{
    MetricsRow, ModelRecord, ModelRepository, ModelStatus, NewModelRecord, TaskType,
};

use crate::config::TrainingSettings;
use crate::error::{TrainerError, TrainerResult};
use crate::ml_integration::dataset::{DatasetMaterializer, MaterializeMode};
use crate::ml_integration::model_management::{ArtifactExporter, ArtifactSerializer};
use crate::ml_integration::search::{LinfaSearchProvider, ModelSearchProvider};

/// A request to train one model
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    /// Authenticated caller; never taken from the request body
    pub owner_id: i64,
    pub task_type: TaskType,
    pub file_content: Vec<u8>,
    pub target_column: Option<String>,
    pub custom_model_name: Option<String>,
    /// Provenance of the upload, usually its file name
    pub training_data_path: Option<String>,
}

/// Result descriptor of a committed training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub model_id: i64,
    pub model_name: String,
    pub task_type: TaskType,
    pub metrics: Vec<MetricsRow>,
    /// Exported file, or a logical reference to the stored blob
    pub model_path: String,
    pub run_id: String,
}

/// Ties materializer, search provider, serializer and repository together
pub struct TrainingOrchestrator {
    provider: Arc<dyn ModelSearchProvider>,
    materializer: DatasetMaterializer,
    serializer: ArtifactSerializer,
    exporter: Option<ArtifactExporter>,
    max_upload_bytes: usize,
}

impl TrainingOrchestrator {
    pub fn new(provider: Arc<dyn ModelSearchProvider>, settings: &TrainingSettings) -> Self {
        Self {
            provider,
            materializer: DatasetMaterializer::new(
                settings.materialize_mode,
                settings.spool_directory.clone(),
            ),
            serializer: ArtifactSerializer,
            exporter: settings
                .artifact_directory
                .as_ref()
                .map(ArtifactExporter::new),
            max_upload_bytes: settings.max_upload_bytes,
        }
    }

    /// Orchestrator backed by [`LinfaSearchProvider`]
    pub fn from_settings(settings: &TrainingSettings) -> Self {
        let provider = LinfaSearchProvider::new(settings.search.clone());
        Self::new(Arc::new(provider), settings)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Run the whole pipeline; the record is visible only if this returns `Ok`
    pub fn train(
        &self,
        repo: &dyn ModelRepository,
        request: TrainingRequest,
    ) -> TrainerResult<TrainingOutcome> {
        let started = Instant::now();
        let task_type = request.task_type;

        // Step 1: Validate
        let size = request.file_content.len();
        if size > self.max_upload_bytes {
            warn!(
                "Rejected {} upload of {} bytes (limit {})",
                task_type, size, self.max_upload_bytes
            );
            return Err(TrainerError::PayloadTooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        let target_column = if task_type.requires_target() {
            let target = non_blank(request.target_column.as_deref()).ok_or_else(|| {
                TrainerError::InvalidRequest(format!(
                    "target_column is required for {} training",
                    task_type
                ))
            })?;
            Some(target.to_string())
        } else {
            None
        };

        info!(
            "Training {} model for owner {} ({} bytes)",
            task_type, request.owner_id, size
        );

        // Step 2: Materialize
        let materializer = if self.provider.requires_file_input() {
            self.materializer.with_mode(MaterializeMode::Spooled)
        } else {
            self.materializer.clone()
        };
        let dataset = materializer.materialize(&request.file_content, target_column.as_deref())?;

        // Step 3: Search
        let outcome = self
            .provider
            .search(&dataset, task_type, target_column.as_deref())
            .map_err(|e| match e {
                TrainerError::TrainingFailed(_)
                | TrainerError::InvalidRequest(_)
                | TrainerError::InvalidDataset(_) => e,
                other => TrainerError::TrainingFailed(other.to_string()),
            })?;
        debug!(
            "Search finished for {} after {:.2}s",
            dataset.source_id(),
            started.elapsed().as_secs_f64()
        );

        // Step 4: Resolve name
        let model_name = non_blank(request.custom_model_name.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| dataset.source_id().to_string());

        // Step 5: Serialize
        let artifact = self.serializer.serialize(&outcome.artifact)?;

        // Step 6: Persist
        let metrics = vec![outcome.metrics];
        let record = repo.insert(NewModelRecord {
            name: model_name.clone(),
            task_type,
            artifact,
            metrics: metrics.clone(),
            target_column,
            training_data_path: non_blank(request.training_data_path.as_deref())
                .map(str::to_string),
            status: ModelStatus::Trained,
            hyperparameters: Some(outcome.hyperparameters),
            owner_id: request.owner_id,
        })?;

        // Step 7: Respond
        let model_path = self.model_path(&record);

        info!(
            "Trained {} model '{}' (id {}) in {:.2}s",
            task_type,
            record.name,
            record.id,
            started.elapsed().as_secs_f64()
        );

        Ok(TrainingOutcome {
            model_id: record.id,
            run_id: model_name.clone(),
            model_name,
            task_type,
            metrics,
            model_path,
        })
    }

    fn model_path(&self, record: &ModelRecord) -> String {
        let reference = format!("models/{}/artifact", record.id);

        let Some(exporter) = &self.exporter else {
            return reference;
        };

        match exporter.export(&record.name, record.task_type, &record.artifact) {
            Ok(path) => path.display().to_string(),
            Err(e) => {
                warn!("Artifact mirror for model {} failed: {:#}", record.id, e);
                reference
            }
        }
    }

    /// The caller's models, optionally filtered by task type (case-insensitive)
    pub fn saved_models(
        &self,
        repo: &dyn ModelRepository,
        owner_id: i64,
        type_filter: Option<&str>,
    ) -> TrainerResult<Vec<ModelRecord>> {
        Ok(repo.find(owner_id, non_blank(type_filter))?)
    }

    /// Delete one of the caller's models. Missing and foreign ids are
    /// reported identically.
    pub fn delete_model(
        &self,
        repo: &dyn ModelRepository,
        model_id: i64,
        owner_id: i64,
    ) -> TrainerResult<()> {
        if repo.delete(model_id, owner_id)? {
            info!("Model {} deleted by owner {}", model_id, owner_id);
            Ok(())
        } else {
            Err(TrainerError::NotFoundOrForbidden)
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_count_as_absent() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("")), None);
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" demo ")), Some("demo"));
    }
}
