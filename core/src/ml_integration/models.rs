//! Fitted model types
//!
//! [`ModelArtifact`] bundles a fitted estimator with the feature pipeline
//! and class labels it was trained with, so it can score raw datasets
//! without re-running search.

use linfa::prelude::*;
use linfa_bayes::GaussianNb;
use linfa_clustering::KMeans;
use linfa_elasticnet::ElasticNet;
use linfa_linear::FittedLinearRegression;
use linfa_logistic::MultiFittedLogisticRegression;
use linfa_nn::distance::L2Dist;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

use modeltrainer_databases::TaskType;

use crate::error::{TrainerError, TrainerResult};
use crate::ml_integration::dataset::{FeaturePipeline, TabularDataset};
use crate::ml_integration::metadata::ModelType;

/// A fitted estimator
#[derive(Serialize, Deserialize)]
pub enum FittedModel {
    DecisionTree(DecisionTree<f64, usize>),
    NaiveBayes(GaussianNb<f64, usize>),
    LogisticRegression(MultiFittedLogisticRegression<f64, usize>),
    LinearRegression(FittedLinearRegression<f64>),
    ElasticNet(ElasticNet<f64>),
    KMeans(KMeans<f64, L2Dist>),
}

impl FittedModel {
    /// Predictions as `f64`: class index, regression value or cluster id
    pub fn predict(&self, features: &Array2<f64>) -> Array1<f64> {
        match self {
            FittedModel::DecisionTree(model) => as_f64(model.predict(features)),
            FittedModel::NaiveBayes(model) => as_f64(model.predict(features)),
            FittedModel::LogisticRegression(model) => as_f64(model.predict(features)),
            FittedModel::LinearRegression(model) => model.predict(features),
            FittedModel::ElasticNet(model) => model.predict(features),
            FittedModel::KMeans(model) => as_f64(model.predict(features)),
        }
    }

    /// Class or cluster indices; `None` for regression models
    pub fn predict_indices(&self, features: &Array2<f64>) -> Option<Array1<usize>> {
        match self {
            FittedModel::DecisionTree(model) => Some(model.predict(features)),
            FittedModel::NaiveBayes(model) => Some(model.predict(features)),
            FittedModel::LogisticRegression(model) => Some(model.predict(features)),
            FittedModel::KMeans(model) => Some(model.predict(features)),
            FittedModel::LinearRegression(_) | FittedModel::ElasticNet(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FittedModel::DecisionTree(_) => "DecisionTree",
            FittedModel::NaiveBayes(_) => "NaiveBayes",
            FittedModel::LogisticRegression(_) => "LogisticRegression",
            FittedModel::LinearRegression(_) => "LinearRegression",
            FittedModel::ElasticNet(_) => "ElasticNet",
            FittedModel::KMeans(_) => "KMeans",
        }
    }
}

impl fmt::Debug for FittedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FittedModel").field(&self.kind()).finish()
    }
}

fn as_f64(labels: Array1<usize>) -> Array1<f64> {
    labels.mapv(|label| label as f64)
}

/// Self-contained trained model
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub task_type: TaskType,
    pub model_type: ModelType,
    pub target_column: Option<String>,
    pub features: FeaturePipeline,
    /// Class labels indexed by predicted class; empty unless classification
    pub classes: Vec<String>,
    pub model: FittedModel,
}

impl ModelArtifact {
    /// Predict on an already encoded feature matrix
    pub fn predict(&self, features: &Array2<f64>) -> TrainerResult<Array1<f64>> {
        if features.ncols() != self.features.n_features() {
            return Err(TrainerError::InvalidDataset(format!(
                "expected {} features, got {}",
                self.features.n_features(),
                features.ncols()
            )));
        }
        Ok(self.model.predict(features))
    }

    /// Encode `dataset` with the stored pipeline, then predict
    pub fn predict_dataset(&self, dataset: &TabularDataset) -> TrainerResult<Array1<f64>> {
        let features = self.features.transform(dataset)?;
        self.predict(&features)
    }

    /// Predictions rendered as labels: class names, cluster ids or values
    pub fn predict_labels(&self, dataset: &TabularDataset) -> TrainerResult<Vec<String>> {
        let features = self.features.transform(dataset)?;

        match (self.task_type, self.model.predict_indices(&features)) {
            (TaskType::Classification, Some(indices)) => indices
                .iter()
                .map(|&i| {
                    self.classes.get(i).cloned().ok_or_else(|| {
                        TrainerError::CorruptArtifact(format!("class index {} out of range", i))
                    })
                })
                .collect(),
            (TaskType::Clustering, Some(indices)) => {
                Ok(indices.iter().map(|i| format!("Cluster {}", i)).collect())
            }
            _ => Ok(self
                .predict(&features)?
                .iter()
                .map(|v| v.to_string())
                .collect()),
        }
    }
}
