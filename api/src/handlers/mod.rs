//! API Handlers Module
//!
//! Request handlers for the training and model catalog endpoints. All
//! blocking work (parsing, search, SQLite) runs on the blocking pool.

use axum::{
    debug_handler,
    extract::{Multipart, Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use modeltrainer_core::{TrainerError, TrainingOrchestrator, TrainingRequest};
use modeltrainer_databases::{SQLiteManager, TaskType};

use crate::auth::CallerIdentity;
use crate::error::ApiError;
use crate::models::{ApiConfig, DeleteResponse, SavedModel, SavedModelsQuery, TrainResponse};

/// Represents the state of the API server
pub struct ApiState {
    /// Model store
    pub store: SQLiteManager,
    /// Training pipeline
    pub orchestrator: Arc<TrainingOrchestrator>,
    pub config: ApiConfig,
}

impl ApiState {
    pub fn new(
        store: SQLiteManager,
        orchestrator: Arc<TrainingOrchestrator>,
        config: ApiConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            config,
        }
    }
}

/// Greeting
#[debug_handler]
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello from Model Trainer!" }))
}

/// Health check endpoint
#[debug_handler]
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "modeltrainer-api" }))
}

#[debug_handler]
pub async fn train_classification(
    State(state): State<Arc<ApiState>>,
    caller: CallerIdentity,
    multipart: Multipart,
) -> Result<Json<TrainResponse>, ApiError> {
    train(state, caller, TaskType::Classification, multipart).await
}

#[debug_handler]
pub async fn train_clustering(
    State(state): State<Arc<ApiState>>,
    caller: CallerIdentity,
    multipart: Multipart,
) -> Result<Json<TrainResponse>, ApiError> {
    train(state, caller, TaskType::Clustering, multipart).await
}

#[debug_handler]
pub async fn train_regression(
    State(state): State<Arc<ApiState>>,
    caller: CallerIdentity,
    multipart: Multipart,
) -> Result<Json<TrainResponse>, ApiError> {
    train(state, caller, TaskType::Regression, multipart).await
}

/// List the caller's models
#[debug_handler]
pub async fn saved_models(
    State(state): State<Arc<ApiState>>,
    caller: CallerIdentity,
    Query(query): Query<SavedModelsQuery>,
) -> Result<Json<Vec<SavedModel>>, ApiError> {
    debug!(
        "Listing models for user {} (type: {:?})",
        caller.0, query.type_of_model
    );

    let store = state.store.clone();
    let orchestrator = state.orchestrator.clone();
    let records = tokio::task::spawn_blocking(move || {
        let session = store.session()?;
        orchestrator.saved_models(&session, caller.0, query.type_of_model.as_deref())
    })
    .await
    .map_err(ApiError::join)??;

    Ok(Json(records.into_iter().map(SavedModel::from).collect()))
}

/// Delete one of the caller's models
#[debug_handler]
pub async fn delete_model(
    State(state): State<Arc<ApiState>>,
    caller: CallerIdentity,
    Path(model_id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let store = state.store.clone();
    let orchestrator = state.orchestrator.clone();
    tokio::task::spawn_blocking(move || {
        let session = store.session()?;
        orchestrator.delete_model(&session, model_id, caller.0)
    })
    .await
    .map_err(ApiError::join)??;

    Ok(Json(DeleteResponse {
        status: "success".to_string(),
        detail: format!("Model with ID {} has been deleted.", model_id),
    }))
}

/// Fields of a training upload
#[derive(Debug, Default)]
struct TrainingUpload {
    file_name: Option<String>,
    file_content: Option<Vec<u8>>,
    target_column: Option<String>,
    custom_model_name: Option<String>,
}

impl TrainingUpload {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut upload = TrainingUpload::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    upload.file_name = field.file_name().map(str::to_string);
                    upload.file_content = Some(field.bytes().await?.to_vec());
                }
                Some("target_column") => upload.target_column = Some(field.text().await?),
                Some("custom_model_name") => {
                    upload.custom_model_name = Some(field.text().await?)
                }
                other => debug!("Ignoring multipart field {:?}", other),
            }
        }

        Ok(upload)
    }
}

async fn train(
    state: Arc<ApiState>,
    caller: CallerIdentity,
    task_type: TaskType,
    multipart: Multipart,
) -> Result<Json<TrainResponse>, ApiError> {
    let upload = TrainingUpload::read(multipart).await?;
    let file_content = upload.file_content.ok_or_else(|| {
        TrainerError::InvalidRequest("a dataset file is required".to_string())
    })?;

    info!(
        "User {} requested {} training on {:?} ({} bytes)",
        caller.0,
        task_type,
        upload.file_name,
        file_content.len()
    );

    let request = TrainingRequest {
        owner_id: caller.0,
        task_type,
        file_content,
        target_column: upload.target_column,
        custom_model_name: upload.custom_model_name,
        training_data_path: upload.file_name,
    };

    let store = state.store.clone();
    let orchestrator = state.orchestrator.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let session = store.session()?;
        orchestrator.train(&session, request)
    })
    .await
    .map_err(ApiError::join)??;

    Ok(Json(TrainResponse::from(outcome)))
}
