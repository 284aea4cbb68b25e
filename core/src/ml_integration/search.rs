//! Model Search Provider
//!
//! Explores candidate algorithms for a task and returns the best one
//! together with a one-row metrics summary.
//!
//! ## Scoring
//!
//! * classification: mean k-fold accuracy
//! * regression: mean k-fold R²
//! * clustering: single k-means fit, scored by silhouette
//!
//! Ties keep the earlier candidate. The winner is refit on every row.

use ndarray::{Array1, Array2};
use serde_json::json;
use tracing::{debug, info, warn};

use modeltrainer_databases::{MetricsRow, TaskType};

use crate::error::{TrainerError, TrainerResult};
use crate::ml_integration::dataset::{FeaturePipeline, TabularDataset};
use crate::ml_integration::metadata::{CandidateSpec, ModelType, SearchConfig};
use crate::ml_integration::models::ModelArtifact;
use crate::ml_integration::trainer::{
    cross_validate_classifier, cross_validate_regressor, fit_classifier, fit_regressor,
    kfold_indices, round4, score_clusters, train_kmeans, ClassificationScores, RegressionScores,
};

/// Result of a successful search
#[derive(Debug)]
pub struct SearchOutcome {
    pub artifact: ModelArtifact,
    pub metrics: MetricsRow,
    /// JSON description of the winning candidate
    pub hyperparameters: String,
}

/// Capability that selects and fits a model for a dataset
pub trait ModelSearchProvider: Send + Sync {
    /// Blocking; may take seconds to minutes on large inputs
    fn search(
        &self,
        dataset: &TabularDataset,
        task_type: TaskType,
        target_column: Option<&str>,
    ) -> TrainerResult<SearchOutcome>;

    /// Whether the dataset must be spooled to a file before search
    fn requires_file_input(&self) -> bool {
        false
    }
}

/// Search over `linfa` estimators
#[derive(Debug, Clone, Default)]
pub struct LinfaSearchProvider {
    config: SearchConfig,
}

struct Prepared<T> {
    features: FeaturePipeline,
    x: Array2<f64>,
    y: T,
}

impl LinfaSearchProvider {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn check_rows(&self, n_rows: usize) -> TrainerResult<()> {
        if n_rows < self.config.min_rows {
            return Err(TrainerError::TrainingFailed(format!(
                "dataset has {} usable rows, at least {} are required",
                n_rows, self.config.min_rows
            )));
        }
        Ok(())
    }

    fn fit_features(
        &self,
        dataset: &TabularDataset,
        target_column: Option<&str>,
    ) -> TrainerResult<(FeaturePipeline, Array2<f64>)> {
        let features = FeaturePipeline::fit(dataset, target_column)?;
        if features.is_empty() {
            return Err(TrainerError::TrainingFailed(
                "dataset has no feature columns".to_string(),
            ));
        }
        let x = features.transform(dataset)?;
        Ok((features, x))
    }

    fn prepare_classification(
        &self,
        dataset: &TabularDataset,
        target: &str,
    ) -> TrainerResult<(Prepared<Array1<usize>>, Vec<String>)> {
        let labelled = dataset.drop_null_target(target)?;
        self.check_rows(labelled.n_rows())?;

        let (classes, y) = labelled.class_targets(target)?;
        if classes.len() < 2 {
            return Err(TrainerError::TrainingFailed(format!(
                "target column '{}' has a single class",
                target
            )));
        }

        let (features, x) = self.fit_features(&labelled, Some(target))?;
        Ok((Prepared { features, x, y }, classes))
    }

    fn search_classification(
        &self,
        dataset: &TabularDataset,
        target: &str,
    ) -> TrainerResult<SearchOutcome> {
        let (data, classes) = self.prepare_classification(dataset, target)?;
        let folds = kfold_indices(data.x.nrows(), self.config.cv_folds, self.config.random_seed);

        let mut best: Option<(&CandidateSpec, ClassificationScores)> = None;
        for spec in &self.config.classifiers {
            match cross_validate_classifier(spec, &data.x, &data.y, &folds) {
                Ok(scores) => {
                    if best
                        .as_ref()
                        .map_or(true, |(_, leader)| scores.accuracy > leader.accuracy)
                    {
                        best = Some((spec, scores));
                    }
                }
                Err(e) => warn!("Candidate {} skipped: {}", spec.model_type, e),
            }
        }

        let (spec, scores) = best.ok_or_else(|| {
            TrainerError::TrainingFailed("no classification candidate could be fitted".to_string())
        })?;
        info!(
            "Selected {} (accuracy {:.4})",
            spec.model_type, scores.accuracy
        );

        let model = fit_classifier(spec, &data.x, &data.y).map_err(TrainerError::training)?;

        let mut metrics = MetricsRow::new();
        metrics.insert("Model".to_string(), json!(spec.model_type.display_name()));
        metrics.insert("Accuracy".to_string(), json!(round4(scores.accuracy)));
        metrics.insert("Prec.".to_string(), json!(round4(scores.precision)));
        metrics.insert("Recall".to_string(), json!(round4(scores.recall)));
        metrics.insert("F1".to_string(), json!(round4(scores.f1)));
        metrics.insert("MCC".to_string(), json!(round4(scores.mcc)));
        metrics.insert("TT (Sec)".to_string(), json!(round4(scores.fit_seconds)));

        Ok(SearchOutcome {
            artifact: ModelArtifact {
                task_type: TaskType::Classification,
                model_type: spec.model_type,
                target_column: Some(target.to_string()),
                features: data.features,
                classes,
                model,
            },
            metrics,
            hyperparameters: spec.describe(),
        })
    }

    fn search_regression(
        &self,
        dataset: &TabularDataset,
        target: &str,
    ) -> TrainerResult<SearchOutcome> {
        let labelled = dataset.drop_null_target(target)?;
        self.check_rows(labelled.n_rows())?;
        let y = labelled.numeric_targets(target)?;
        if y.iter().all(|v| Some(v) == y.first()) {
            return Err(TrainerError::TrainingFailed(format!(
                "target column '{}' is constant",
                target
            )));
        }
        let (features, x) = self.fit_features(&labelled, Some(target))?;

        let folds = kfold_indices(x.nrows(), self.config.cv_folds, self.config.random_seed);

        let mut best: Option<(&CandidateSpec, RegressionScores)> = None;
        for spec in &self.config.regressors {
            match cross_validate_regressor(spec, &x, &y, &folds) {
                Ok(scores) => {
                    if best
                        .as_ref()
                        .map_or(true, |(_, leader)| scores.r2 > leader.r2)
                    {
                        best = Some((spec, scores));
                    }
                }
                Err(e) => warn!("Candidate {} skipped: {}", spec.model_type, e),
            }
        }

        let (spec, scores) = best.ok_or_else(|| {
            TrainerError::TrainingFailed("no regression candidate could be fitted".to_string())
        })?;
        info!("Selected {} (R2 {:.4})", spec.model_type, scores.r2);

        let model = fit_regressor(spec, &x, &y).map_err(TrainerError::training)?;

        let mut metrics = MetricsRow::new();
        metrics.insert("Model".to_string(), json!(spec.model_type.display_name()));
        metrics.insert("MAE".to_string(), json!(round4(scores.mae)));
        metrics.insert("MSE".to_string(), json!(round4(scores.mse)));
        metrics.insert("RMSE".to_string(), json!(round4(scores.rmse)));
        metrics.insert("R2".to_string(), json!(round4(scores.r2)));
        metrics.insert("TT (Sec)".to_string(), json!(round4(scores.fit_seconds)));

        Ok(SearchOutcome {
            artifact: ModelArtifact {
                task_type: TaskType::Regression,
                model_type: spec.model_type,
                target_column: Some(target.to_string()),
                features,
                classes: Vec::new(),
                model,
            },
            metrics,
            hyperparameters: spec.describe(),
        })
    }

    fn search_clustering(&self, dataset: &TabularDataset) -> TrainerResult<SearchOutcome> {
        self.check_rows(dataset.n_rows())?;
        let (features, x) = self.fit_features(dataset, None)?;

        let n_clusters = self.config.n_clusters.min(x.nrows().saturating_sub(1));
        if n_clusters < 2 {
            return Err(TrainerError::TrainingFailed(format!(
                "clustering needs at least 3 rows, got {}",
                x.nrows()
            )));
        }
        if n_clusters < self.config.n_clusters {
            debug!(
                "Reduced cluster count from {} to {}",
                self.config.n_clusters, n_clusters
            );
        }

        let spec = CandidateSpec::new(ModelType::KMeans)
            .with_param("n_clusters", json!(n_clusters))
            .with_param("random_seed", json!(self.config.random_seed));

        let (model, labels, fit_seconds) =
            train_kmeans(&x, &spec).map_err(TrainerError::training)?;
        let (silhouette, calinski_harabasz) = score_clusters(&x, &labels);

        info!(
            "KMeans with {} clusters (silhouette {:.4})",
            n_clusters, silhouette
        );

        let mut metrics = MetricsRow::new();
        metrics.insert("Model".to_string(), json!(ModelType::KMeans.display_name()));
        metrics.insert("Silhouette".to_string(), json!(round4(silhouette)));
        metrics.insert(
            "Calinski-Harabasz".to_string(),
            json!(round4(calinski_harabasz)),
        );
        metrics.insert("TT (Sec)".to_string(), json!(round4(fit_seconds)));

        Ok(SearchOutcome {
            artifact: ModelArtifact {
                task_type: TaskType::Clustering,
                model_type: ModelType::KMeans,
                target_column: None,
                features,
                classes: Vec::new(),
                model,
            },
            metrics,
            hyperparameters: spec.describe(),
        })
    }
}

impl ModelSearchProvider for LinfaSearchProvider {
    fn search(
        &self,
        dataset: &TabularDataset,
        task_type: TaskType,
        target_column: Option<&str>,
    ) -> TrainerResult<SearchOutcome> {
        info!(
            "Searching {} models on {} rows",
            task_type,
            dataset.n_rows()
        );

        match (task_type, target_column) {
            (TaskType::Clustering, _) => self.search_clustering(dataset),
            (TaskType::Classification, Some(target)) => self.search_classification(dataset, target),
            (TaskType::Regression, Some(target)) => self.search_regression(dataset, target),
            (_, None) => Err(TrainerError::InvalidRequest(format!(
                "target column is required for {}",
                task_type
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml_integration::dataset::DatasetMaterializer;

    fn dataset(csv: &str, target: Option<&str>) -> TabularDataset {
        DatasetMaterializer::default()
            .materialize(csv.as_bytes(), target)
            .unwrap()
    }

    fn classification_csv() -> String {
        let mut csv = String::from("x,y,label\n");
        for i in 0..10 {
            let (base, label) = if i < 5 { (0.0, "cat") } else { (5.0, "dog") };
            csv.push_str(&format!("{},{},{}\n", base + i as f64 * 0.1, base + 0.2, label));
        }
        csv
    }

    #[test]
    fn test_classification_reports_metrics_and_winner() {
        let provider = LinfaSearchProvider::default();
        let outcome = provider
            .search(
                &dataset(&classification_csv(), Some("label")),
                TaskType::Classification,
                Some("label"),
            )
            .unwrap();

        for key in ["Model", "Accuracy", "Prec.", "Recall", "F1", "MCC", "TT (Sec)"] {
            assert!(outcome.metrics.contains_key(key), "missing {key}");
        }
        assert_eq!(outcome.artifact.classes, vec!["cat", "dog"]);
        assert!(outcome.hyperparameters.contains("model"));
    }

    #[test]
    fn test_single_class_target_fails_training() {
        let csv = "x,label\n1,a\n2,a\n3,a\n4,a\n5,a\n";
        let err = LinfaSearchProvider::default()
            .search(&dataset(csv, Some("label")), TaskType::Classification, Some("label"))
            .unwrap_err();
        assert!(matches!(err, TrainerError::TrainingFailed(_)));
    }

    #[test]
    fn test_too_few_rows_fails_training() {
        let csv = "x,label\n1,a\n2,b\n";
        let err = LinfaSearchProvider::default()
            .search(&dataset(csv, Some("label")), TaskType::Classification, Some("label"))
            .unwrap_err();
        assert!(matches!(err, TrainerError::TrainingFailed(_)));
    }

    #[test]
    fn test_regression_prefers_a_fitting_line() {
        let mut csv = String::from("x,noise,price\n");
        for i in 0..20 {
            csv.push_str(&format!("{},{},{}\n", i, (i * 7) % 5, 2.0 * i as f64 + 3.0));
        }

        let outcome = LinfaSearchProvider::default()
            .search(&dataset(&csv, Some("price")), TaskType::Regression, Some("price"))
            .unwrap();

        assert_eq!(outcome.artifact.model_type, ModelType::LinearRegression);
        let r2 = outcome.metrics["R2"].as_f64().unwrap();
        assert!(r2 > 0.99, "r2 = {r2}");
        for key in ["MAE", "MSE", "RMSE", "TT (Sec)"] {
            assert!(outcome.metrics.contains_key(key));
        }
    }

    #[test]
    fn test_rare_flag_value_still_trains() {
        let csv = "flag,l\n1,a\n1,a\n1,b\n1,b\n1,a\n1,b\n1,a\n1,b\n1,a\n0,b\n";
        let outcome = LinfaSearchProvider::default()
            .search(&dataset(csv, Some("l")), TaskType::Classification, Some("l"))
            .unwrap();

        assert_eq!(outcome.artifact.classes, vec!["a", "b"]);
        assert!(outcome.metrics["Accuracy"].is_number());
    }

    #[test]
    fn test_constant_feature_classification_skips_naive_bayes() {
        let csv = "x,l\n1,a\n1,b\n1,a\n1,b\n1,a\n";
        let outcome = LinfaSearchProvider::default()
            .search(&dataset(csv, Some("l")), TaskType::Classification, Some("l"))
            .unwrap();

        assert_ne!(outcome.artifact.model_type, ModelType::NaiveBayes);
    }

    #[test]
    fn test_constant_regression_target_fails_training() {
        let csv = "x,y\n1,5\n2,5\n3,5\n4,5\n5,5\n";
        let err = LinfaSearchProvider::default()
            .search(&dataset(csv, Some("y")), TaskType::Regression, Some("y"))
            .unwrap_err();
        assert!(matches!(err, TrainerError::TrainingFailed(ref m) if m.contains("constant")));
    }

    #[test]
    fn test_regression_on_text_target_fails_training() {
        let csv = "x,grade\n1,a\n2,b\n3,c\n4,d\n5,e\n";
        let err = LinfaSearchProvider::default()
            .search(&dataset(csv, Some("grade")), TaskType::Regression, Some("grade"))
            .unwrap_err();
        assert!(matches!(err, TrainerError::TrainingFailed(_)));
    }

    #[test]
    fn test_clustering_clips_cluster_count() {
        let csv = "a,b\n0,0\n0.1,0.1\n9,9\n9.1,9.2\n";
        let outcome = LinfaSearchProvider::default()
            .search(&dataset(csv, None), TaskType::Clustering, None)
            .unwrap();

        assert_eq!(outcome.artifact.target_column, None);
        assert!(outcome.metrics.contains_key("Silhouette"));
        assert!(outcome.metrics.contains_key("Calinski-Harabasz"));
        assert!(outcome.hyperparameters.contains("\"n_clusters\":3"));
    }
}
