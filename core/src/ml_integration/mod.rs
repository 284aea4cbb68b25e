//! ML Integration Module
//!
//! # Architecture
//!
//! - `dataset`: upload materialization and feature encoding
//! - `metadata`: model types, candidate specs and search settings
//! - `models`: fitted estimators and the self-contained [`ModelArtifact`]
//! - `trainer`: fitting and cross-validation, supervised and unsupervised
//! - `search`: the [`ModelSearchProvider`] capability and its linfa implementation
//! - `model_management`: artifact serialization and export
//! - `training`: the [`TrainingOrchestrator`]
//!
//! # Usage
//!
//! ```rust,no_run
//! use modeltrainer_core::config::TrainingSettings;
//! use modeltrainer_core::ml_integration::{TrainingOrchestrator, TrainingRequest};
//! use modeltrainer_databases::{SQLiteManager, TaskType};
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = SQLiteManager::new("models.db")?;
//! store.initialize_schema()?;
//!
//! let orchestrator = TrainingOrchestrator::from_settings(&TrainingSettings::default());
//! let outcome = orchestrator.train(
//!     &store.session()?,
//!     TrainingRequest {
//!         owner_id: 1,
//!         task_type: TaskType::Classification,
//!         file_content: std::fs::read("iris.csv")?,
//!         target_column: Some("species".to_string()),
//!         custom_model_name: None,
//!         training_data_path: Some("iris.csv".to_string()),
//!     },
//! )?;
//! println!("model {} stored", outcome.model_id);
//! # Ok(())
//! # }
//! ```

pub mod dataset;
pub mod metadata;
pub mod model_management;
pub mod models;
pub mod search;
pub mod trainer;
pub mod training;

pub use dataset::{DatasetMaterializer, FeaturePipeline, MaterializeMode, TabularDataset};
pub use metadata::{CandidateSpec, ModelType, SearchConfig};
pub use model_management::{ArtifactExporter, ArtifactSerializer};
pub use models::{FittedModel, ModelArtifact};
pub use search::{LinfaSearchProvider, ModelSearchProvider, SearchOutcome};
pub use training::{TrainingOrchestrator, TrainingOutcome, TrainingRequest};
