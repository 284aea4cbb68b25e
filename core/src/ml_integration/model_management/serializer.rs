//! Artifact Serializer
//!
//! Encodes a [`ModelArtifact`] as a self-contained byte blob: the magic
//! prefix `MTA1` followed by a bincode payload.

use crate::error::{TrainerError, TrainerResult};
use crate::ml_integration::models::ModelArtifact;

/// Leading bytes of every encoded artifact
pub const ARTIFACT_MAGIC: &[u8; 4] = b"MTA1";

/// Converts trained models to and from bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactSerializer;

impl ArtifactSerializer {
    pub fn serialize(&self, artifact: &ModelArtifact) -> TrainerResult<Vec<u8>> {
        let payload = bincode::serialize(artifact).map_err(TrainerError::training)?;

        let mut bytes = Vec::with_capacity(ARTIFACT_MAGIC.len() + payload.len());
        bytes.extend_from_slice(ARTIFACT_MAGIC);
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    pub fn deserialize(&self, bytes: &[u8]) -> TrainerResult<ModelArtifact> {
        if bytes.is_empty() {
            return Err(TrainerError::CorruptArtifact("artifact is empty".to_string()));
        }

        let payload = bytes
            .strip_prefix(ARTIFACT_MAGIC.as_slice())
            .ok_or_else(|| TrainerError::CorruptArtifact("unrecognized artifact header".to_string()))?;

        bincode::deserialize(payload).map_err(|e| TrainerError::CorruptArtifact(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml_integration::dataset::{DatasetMaterializer, FeaturePipeline};
    use crate::ml_integration::metadata::{CandidateSpec, ModelType};
    use crate::ml_integration::trainer::fit_classifier;
    use modeltrainer_databases::TaskType;
    use serde_json::json;

    const CSV: &[u8] =
        b"x,y,label\n0.1,0.2,no\n0.2,0.1,no\n0.3,0.3,no\n0.2,0.4,no\n0.1,0.1,no\n5.1,5.2,yes\n5.3,4.9,yes\n4.8,5.0,yes\n5.0,5.1,yes\n5.2,5.3,yes\n";

    fn artifact() -> ModelArtifact {
        let dataset = DatasetMaterializer::default()
            .materialize(CSV, Some("label"))
            .unwrap();
        let features = FeaturePipeline::fit(&dataset, Some("label")).unwrap();
        let (classes, targets) = dataset.class_targets("label").unwrap();
        let x = features.transform(&dataset).unwrap();
        let spec = CandidateSpec::new(ModelType::DecisionTree).with_param("max_depth", json!(3));

        ModelArtifact {
            task_type: TaskType::Classification,
            model_type: ModelType::DecisionTree,
            target_column: Some("label".to_string()),
            features,
            classes,
            model: fit_classifier(&spec, &x, &targets).unwrap(),
        }
    }

    #[test]
    fn test_round_trip_preserves_predictions() {
        let original = artifact();
        let bytes = ArtifactSerializer.serialize(&original).unwrap();
        assert!(bytes.starts_with(ARTIFACT_MAGIC));

        let restored = ArtifactSerializer.deserialize(&bytes).unwrap();
        let sample = DatasetMaterializer::default()
            .materialize(b"x,y\n0.15,0.2\n5.1,5.0\n", None)
            .unwrap();

        assert_eq!(
            original.predict_dataset(&sample).unwrap(),
            restored.predict_dataset(&sample).unwrap()
        );
        assert_eq!(restored.predict_labels(&sample).unwrap(), vec!["no", "yes"]);
        assert_eq!(restored.features, original.features);
    }

    #[test]
    fn test_rejects_empty_foreign_and_truncated_input() {
        for bytes in [&b""[..], &b"PK\x03\x04rest"[..], &b"MTA1\x01"[..]] {
            assert!(matches!(
                ArtifactSerializer.deserialize(bytes),
                Err(TrainerError::CorruptArtifact(_))
            ));
        }
    }
}
