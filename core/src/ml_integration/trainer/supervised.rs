//! Supervised Learning Training Methods

use anyhow::{anyhow, bail, Result};
use linfa::prelude::*;
use linfa_bayes::GaussianNb;
use linfa_elasticnet::ElasticNet;
use linfa_linear::LinearRegression;
use linfa_logistic::MultiLogisticRegression;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use std::time::Instant;
use tracing::{debug, info};

use super::{mean, Fold};
use crate::ml_integration::metadata::{CandidateSpec, ModelType};
use crate::ml_integration::models::FittedModel;

/// Mean cross-validated classification scores
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationScores {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub mcc: f64,
    /// Mean fit time per fold, in seconds
    pub fit_seconds: f64,
}

/// Mean cross-validated regression scores
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionScores {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
    pub fit_seconds: f64,
}

pub fn fit_classifier(
    spec: &CandidateSpec,
    features: &Array2<f64>,
    targets: &Array1<usize>,
) -> Result<FittedModel> {
    if features.nrows() != targets.len() {
        return Err(anyhow!(
            "Features and targets must have same number of samples: {} vs {}",
            features.nrows(),
            targets.len()
        ));
    }
    if features.is_empty() {
        return Err(anyhow!("Features and targets cannot be empty"));
    }

    let dataset = Dataset::new(features.clone(), targets.clone());

    match spec.model_type {
        ModelType::DecisionTree => {
            let max_depth = spec.param_u64("max_depth", 10) as usize;
            let min_weight_split = spec.param_f64("min_weight_split", 2.0) as f32;

            let model = DecisionTree::params()
                .max_depth(Some(max_depth))
                .min_weight_split(min_weight_split)
                .fit(&dataset)
                .map_err(|e| anyhow!("Decision tree training failed: {}", e))?;
            Ok(FittedModel::DecisionTree(model))
        }
        ModelType::NaiveBayes => {
            let var_smoothing = spec.param_f64("var_smoothing", 1e-9);

            // Smoothing scales with the largest variance; all-constant columns leave it at zero
            let variances = features.var_axis(Axis(0), 0.0);
            if variances.iter().all(|v| *v <= f64::EPSILON) {
                bail!("Naive Bayes needs at least one feature with non-zero variance");
            }

            let model = GaussianNb::params()
                .var_smoothing(var_smoothing)
                .fit(&dataset)
                .map_err(|e| anyhow!("Naive Bayes training failed: {}", e))?;
            Ok(FittedModel::NaiveBayes(model))
        }
        ModelType::LogisticRegression => {
            let max_iterations = spec.param_u64("max_iterations", 100);
            let alpha = spec.param_f64("alpha", 1.0);

            let model = MultiLogisticRegression::default()
                .max_iterations(max_iterations)
                .alpha(alpha)
                .fit(&dataset)
                .map_err(|e| anyhow!("Logistic regression training failed: {}", e))?;
            Ok(FittedModel::LogisticRegression(model))
        }
        other => bail!("{} is not a classification model", other),
    }
}

pub fn fit_regressor(
    spec: &CandidateSpec,
    features: &Array2<f64>,
    targets: &Array1<f64>,
) -> Result<FittedModel> {
    if features.nrows() != targets.len() {
        return Err(anyhow!(
            "Features and targets must have same number of samples: {} vs {}",
            features.nrows(),
            targets.len()
        ));
    }
    if features.is_empty() {
        return Err(anyhow!("Features and targets cannot be empty"));
    }

    let dataset = Dataset::new(features.clone(), targets.clone());

    match spec.model_type {
        ModelType::LinearRegression => {
            let fit_intercept = spec
                .hyperparameters
                .get("fit_intercept")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);

            let model = LinearRegression::new()
                .with_intercept(fit_intercept)
                .fit(&dataset)
                .map_err(|e| anyhow!("Linear regression training failed: {}", e))?;
            Ok(FittedModel::LinearRegression(model))
        }
        ModelType::Ridge => {
            let model = ElasticNet::<f64>::ridge()
                .penalty(spec.param_f64("penalty", 1.0))
                .fit(&dataset)
                .map_err(|e| anyhow!("Ridge regression training failed: {}", e))?;
            Ok(FittedModel::ElasticNet(model))
        }
        ModelType::Lasso => {
            let model = ElasticNet::<f64>::lasso()
                .penalty(spec.param_f64("penalty", 0.1))
                .fit(&dataset)
                .map_err(|e| anyhow!("Lasso regression training failed: {}", e))?;
            Ok(FittedModel::ElasticNet(model))
        }
        ModelType::ElasticNet => {
            let model = ElasticNet::<f64>::params()
                .penalty(spec.param_f64("penalty", 0.1))
                .l1_ratio(spec.param_f64("l1_ratio", 0.5))
                .fit(&dataset)
                .map_err(|e| anyhow!("Elastic net training failed: {}", e))?;
            Ok(FittedModel::ElasticNet(model))
        }
        other => bail!("{} is not a regression model", other),
    }
}

/// Score `spec` over `folds`. Folds that fail to fit are skipped; an error
/// is returned only when every fold fails.
pub fn cross_validate_classifier(
    spec: &CandidateSpec,
    features: &Array2<f64>,
    targets: &Array1<usize>,
    folds: &[Fold],
) -> Result<ClassificationScores> {
    let mut accuracy = Vec::new();
    let mut precision = Vec::new();
    let mut recall = Vec::new();
    let mut f1 = Vec::new();
    let mut mcc = Vec::new();
    let mut fit_seconds = Vec::new();
    let mut last_error = None;

    for (train, valid) in folds {
        let x_train = features.select(Axis(0), train);
        let y_train = targets.select(Axis(0), train);

        let started = Instant::now();
        let model = match fit_classifier(spec, &x_train, &y_train) {
            Ok(model) => model,
            Err(e) => {
                debug!("{} fold skipped: {}", spec.model_type, e);
                last_error = Some(e);
                continue;
            }
        };
        fit_seconds.push(started.elapsed().as_secs_f64());

        let x_valid = features.select(Axis(0), valid);
        let valid_dataset = Dataset::new(x_valid.clone(), targets.select(Axis(0), valid));
        let predicted = model
            .predict_indices(&x_valid)
            .ok_or_else(|| anyhow!("{} does not predict classes", spec.model_type))?;

        let cm = predicted.confusion_matrix(&valid_dataset)?;
        accuracy.push(finite(cm.accuracy() as f64));
        precision.push(finite(cm.precision() as f64));
        recall.push(finite(cm.recall() as f64));
        f1.push(finite(cm.f1_score() as f64));
        mcc.push(finite(cm.mcc() as f64));
    }

    if accuracy.is_empty() {
        return Err(last_error.unwrap_or_else(|| anyhow!("no folds to evaluate")));
    }

    let scores = ClassificationScores {
        accuracy: mean(&accuracy),
        precision: mean(&precision),
        recall: mean(&recall),
        f1: mean(&f1),
        mcc: mean(&mcc),
        fit_seconds: mean(&fit_seconds),
    };

    info!(
        "{} cross-validated over {} folds: accuracy {:.4}",
        spec.model_type,
        accuracy.len(),
        scores.accuracy
    );
    Ok(scores)
}

/// Score `spec` over `folds`; folds with a non-finite R² are skipped
pub fn cross_validate_regressor(
    spec: &CandidateSpec,
    features: &Array2<f64>,
    targets: &Array1<f64>,
    folds: &[Fold],
) -> Result<RegressionScores> {
    let mut mae = Vec::new();
    let mut mse = Vec::new();
    let mut r2 = Vec::new();
    let mut fit_seconds = Vec::new();
    let mut last_error = None;

    for (train, valid) in folds {
        let x_train = features.select(Axis(0), train);
        let y_train = targets.select(Axis(0), train);

        let started = Instant::now();
        let model = match fit_regressor(spec, &x_train, &y_train) {
            Ok(model) => model,
            Err(e) => {
                debug!("{} fold skipped: {}", spec.model_type, e);
                last_error = Some(e);
                continue;
            }
        };
        let elapsed = started.elapsed().as_secs_f64();

        let x_valid = features.select(Axis(0), valid);
        let valid_dataset = Dataset::new(x_valid.clone(), targets.select(Axis(0), valid));
        let predicted = model.predict(&x_valid);

        let fold_r2 = predicted.r2(&valid_dataset)?;
        if !fold_r2.is_finite() {
            debug!("{} fold skipped: R2 is not finite", spec.model_type);
            continue;
        }

        fit_seconds.push(elapsed);
        r2.push(fold_r2);
        mae.push(predicted.mean_absolute_error(&valid_dataset)?);
        mse.push(predicted.mean_squared_error(&valid_dataset)?);
    }

    if r2.is_empty() {
        return Err(last_error.unwrap_or_else(|| anyhow!("no fold produced a finite score")));
    }

    let mean_mse = mean(&mse);
    let scores = RegressionScores {
        mae: mean(&mae),
        mse: mean_mse,
        rmse: mean_mse.sqrt(),
        r2: mean(&r2),
        fit_seconds: mean(&fit_seconds),
    };

    info!(
        "{} cross-validated over {} folds: R2 {:.4}",
        spec.model_type,
        r2.len(),
        scores.r2
    );
    Ok(scores)
}

fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml_integration::trainer::kfold_indices;
    use ndarray::array;
    use serde_json::json;

    fn separable() -> (Array2<f64>, Array1<usize>) {
        let features = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [0.2, 0.1],
            [5.0, 5.1],
            [5.2, 4.9],
            [4.9, 5.3],
            [5.1, 5.0],
            [5.3, 5.2]
        ];
        let targets = array![0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
        (features, targets)
    }

    #[test]
    fn test_decision_tree_separates_clusters() {
        let (features, targets) = separable();
        let spec = CandidateSpec::new(ModelType::DecisionTree).with_param("max_depth", json!(3));

        let model = fit_classifier(&spec, &features, &targets).unwrap();
        let predicted = model.predict_indices(&features).unwrap();
        assert_eq!(predicted, targets);
    }

    #[test]
    fn test_classifier_cross_validation_scores_in_range() {
        let (features, targets) = separable();
        let folds = kfold_indices(features.nrows(), 5, 42);

        let scores = cross_validate_classifier(
            &CandidateSpec::new(ModelType::NaiveBayes),
            &features,
            &targets,
            &folds,
        )
        .unwrap();

        assert!((0.0..=1.0).contains(&scores.accuracy));
        assert!(scores.fit_seconds >= 0.0);
    }

    #[test]
    fn test_naive_bayes_rejects_constant_features() {
        let features = Array2::from_elem((6, 2), 1.0);
        let targets = array![0, 1, 0, 1, 0, 1];

        let err = fit_classifier(&CandidateSpec::new(ModelType::NaiveBayes), &features, &targets)
            .unwrap_err();
        assert!(err.to_string().contains("variance"));

        // One varying column is enough
        let mut mixed = features.clone();
        mixed[[5, 0]] = 0.0;
        assert!(fit_classifier(&CandidateSpec::new(ModelType::NaiveBayes), &mixed, &targets).is_ok());
    }

    #[test]
    fn test_wrong_task_is_rejected() {
        let (features, targets) = separable();
        assert!(fit_classifier(&CandidateSpec::new(ModelType::Ridge), &features, &targets).is_err());

        let continuous = targets.mapv(|t| t as f64);
        assert!(fit_regressor(
            &CandidateSpec::new(ModelType::NaiveBayes),
            &features,
            &continuous
        )
        .is_err());
    }

    #[test]
    fn test_linear_regression_recovers_a_line() {
        let features = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let targets = Array1::from_shape_fn(12, |i| 3.0 * i as f64 + 1.0);

        let model = fit_regressor(
            &CandidateSpec::new(ModelType::LinearRegression),
            &features,
            &targets,
        )
        .unwrap();
        let predicted = model.predict(&features);
        for (p, t) in predicted.iter().zip(targets.iter()) {
            assert!((p - t).abs() < 1e-6);
        }

        let folds = kfold_indices(12, 3, 42);
        let scores = cross_validate_regressor(
            &CandidateSpec::new(ModelType::LinearRegression),
            &features,
            &targets,
            &folds,
        )
        .unwrap();
        assert!(scores.r2 > 0.99);
        assert!(scores.rmse < 1e-3);
    }
}
