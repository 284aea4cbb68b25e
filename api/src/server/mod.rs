//! API Server Module
//!
//! Router construction and the listening server.

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use modeltrainer_core::TrainingOrchestrator;
use modeltrainer_databases::SQLiteManager;

use crate::handlers::{
    delete_model, health_check, root, saved_models, train_classification, train_clustering,
    train_regression, ApiState,
};
use crate::models::ApiConfig;

/// Build the application router over `state`
pub fn build_router(state: Arc<ApiState>) -> Router {
    let body_limit = state.config.body_limit();

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        // Training
        .route("/train/classification", post(train_classification))
        .route("/train/clustering", post(train_clustering))
        .route("/train/regression", post(train_regression))
        // Model catalog
        .route("/train/saved-models", get(saved_models))
        .route("/train/models/:model_id", delete(delete_model))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server
pub struct ApiServer {
    /// Server configuration
    config: ApiConfig,
    /// Shared state
    state: Arc<ApiState>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        config: ApiConfig,
        store: SQLiteManager,
        orchestrator: Arc<TrainingOrchestrator>,
    ) -> Self {
        let state = Arc::new(ApiState::new(store, orchestrator, config.clone()));
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Start the API server
    pub async fn start(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Starting Model Trainer API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("Model Trainer API server listening on {}", addr);
        axum::serve(listener, self.router())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start API server: {}", e))?;

        Ok(())
    }
}
