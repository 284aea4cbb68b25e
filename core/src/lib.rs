//! Model Trainer Core
//!
//! The training pipeline of the model trainer: dataset materialization,
//! automated model search, artifact serialization and the orchestrator
//! that persists results through the model repository.

pub mod config;
pub mod error;
pub mod ml_integration;

pub use config::{ConfigManager, TrainerConfig};
pub use error::{TrainerError, TrainerResult};
pub use ml_integration::{
    LinfaSearchProvider, ModelSearchProvider, SearchOutcome, TrainingOrchestrator,
    TrainingOutcome, TrainingRequest,
};
