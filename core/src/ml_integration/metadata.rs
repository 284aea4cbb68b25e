//! ML Model Metadata Types
//!
//! Candidate algorithms, their hyperparameters and the settings that
//! drive automated model search.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use modeltrainer_databases::TaskType;

/// Types of ML models the search provider can fit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    DecisionTree,
    NaiveBayes,
    LogisticRegression,
    LinearRegression,
    Ridge,
    Lasso,
    ElasticNet,
    KMeans,
}

impl ModelType {
    /// Human-readable name reported in the `Model` metrics field
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::DecisionTree => "Decision Tree Classifier",
            ModelType::NaiveBayes => "Naive Bayes",
            ModelType::LogisticRegression => "Logistic Regression",
            ModelType::LinearRegression => "Linear Regression",
            ModelType::Ridge => "Ridge Regression",
            ModelType::Lasso => "Lasso Regression",
            ModelType::ElasticNet => "Elastic Net",
            ModelType::KMeans => "K-Means Clustering",
        }
    }

    /// Task this model type solves
    pub fn task_type(&self) -> TaskType {
        match self {
            ModelType::DecisionTree | ModelType::NaiveBayes | ModelType::LogisticRegression => {
                TaskType::Classification
            }
            ModelType::LinearRegression
            | ModelType::Ridge
            | ModelType::Lasso
            | ModelType::ElasticNet => TaskType::Regression,
            ModelType::KMeans => TaskType::Clustering,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One algorithm to try during search, with fixed hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateSpec {
    pub model_type: ModelType,
    #[serde(default)]
    pub hyperparameters: BTreeMap<String, Value>,
}

impl CandidateSpec {
    pub fn new(model_type: ModelType) -> Self {
        Self {
            model_type,
            hyperparameters: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.hyperparameters.insert(key.to_string(), value);
        self
    }

    pub fn param_u64(&self, key: &str, default: u64) -> u64 {
        self.hyperparameters
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    pub fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.hyperparameters
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    /// JSON description persisted as the record's `hyperparameters`
    pub fn describe(&self) -> String {
        json!({
            "model": self.model_type,
            "params": self.hyperparameters,
        })
        .to_string()
    }
}

/// Settings for the automated model search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub cv_folds: usize,
    pub random_seed: u64,
    pub min_rows: usize,
    pub n_clusters: usize,
    pub classifiers: Vec<CandidateSpec>,
    pub regressors: Vec<CandidateSpec>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            random_seed: 42,
            min_rows: 4,
            n_clusters: 4,
            classifiers: vec![
                CandidateSpec::new(ModelType::DecisionTree).with_param("max_depth", json!(3)),
                CandidateSpec::new(ModelType::DecisionTree).with_param("max_depth", json!(8)),
                CandidateSpec::new(ModelType::NaiveBayes),
                CandidateSpec::new(ModelType::LogisticRegression)
                    .with_param("max_iterations", json!(100)),
            ],
            regressors: vec![
                CandidateSpec::new(ModelType::LinearRegression),
                CandidateSpec::new(ModelType::Ridge).with_param("penalty", json!(1.0)),
                CandidateSpec::new(ModelType::Lasso).with_param("penalty", json!(0.1)),
                CandidateSpec::new(ModelType::ElasticNet)
                    .with_param("penalty", json!(0.1))
                    .with_param("l1_ratio", json!(0.5)),
            ],
        }
    }
}
