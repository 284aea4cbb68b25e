//! Training pipeline errors

use modeltrainer_databases::DatabaseError;

/// Errors surfaced by the training pipeline and the model catalog
#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File size of {size} bytes exceeds the {limit} byte limit. Please upload a smaller file.")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Corrupt model artifact: {0}")]
    CorruptArtifact(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Model not found or you do not have permission to access this model.")]
    NotFoundOrForbidden,
}

impl TrainerError {
    /// Stable machine-readable category
    pub fn category(&self) -> &'static str {
        match self {
            TrainerError::InvalidRequest(_) => "invalid_request",
            TrainerError::PayloadTooLarge { .. } => "payload_too_large",
            TrainerError::InvalidDataset(_) => "invalid_dataset",
            TrainerError::TrainingFailed(_) => "training_failed",
            TrainerError::CorruptArtifact(_) => "corrupt_artifact",
            TrainerError::Persistence(_) => "persistence_error",
            TrainerError::NotFoundOrForbidden => "not_found",
        }
    }

    pub(crate) fn dataset(err: impl std::fmt::Display) -> Self {
        TrainerError::InvalidDataset(err.to_string())
    }

    pub(crate) fn training(err: impl std::fmt::Display) -> Self {
        TrainerError::TrainingFailed(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type TrainerResult<T> = Result<T, TrainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_distinct() {
        let errors = [
            TrainerError::InvalidRequest("x".into()),
            TrainerError::PayloadTooLarge { size: 2, limit: 1 },
            TrainerError::InvalidDataset("x".into()),
            TrainerError::TrainingFailed("x".into()),
            TrainerError::CorruptArtifact("x".into()),
            TrainerError::Persistence(DatabaseError::InvalidRecord("x".into())),
            TrainerError::NotFoundOrForbidden,
        ];

        let mut categories: Vec<_> = errors.iter().map(TrainerError::category).collect();
        categories.sort();
        categories.dedup();
        assert_eq!(categories.len(), errors.len());
    }
}
