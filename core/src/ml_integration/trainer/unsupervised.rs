//! Unsupervised Learning Training Methods

use anyhow::{anyhow, Result};
use linfa::metrics::SilhouetteScore;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

use crate::ml_integration::metadata::CandidateSpec;
use crate::ml_integration::models::FittedModel;

/// Fit k-means with a seeded initialisation and label the training rows.
///
/// Returns the model, the training labels and the fit time in seconds.
pub fn train_kmeans(
    features: &Array2<f64>,
    spec: &CandidateSpec,
) -> Result<(FittedModel, Array1<usize>, f64)> {
    info!(
        "Starting KMeans training with {} samples and {} features",
        features.nrows(),
        features.ncols()
    );

    let n_clusters = spec.param_u64("n_clusters", 4) as usize;
    let max_iterations = spec.param_u64("max_iterations", 300);
    let tolerance = spec.param_f64("tolerance", 1e-4);
    let seed = spec.param_u64("random_seed", 42);

    if features.is_empty() {
        return Err(anyhow!("Features matrix cannot be empty"));
    }
    if n_clusters < 2 || features.nrows() <= n_clusters {
        return Err(anyhow!(
            "Cannot train KMeans with {} clusters on {} samples",
            n_clusters,
            features.nrows()
        ));
    }

    let dataset = DatasetBase::from(features.clone());
    let rng = Xoshiro256Plus::seed_from_u64(seed);

    let started = Instant::now();
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(max_iterations)
        .tolerance(tolerance)
        .fit(&dataset)
        .map_err(|e| anyhow!("KMeans training failed: {}", e))?;
    let fit_seconds = started.elapsed().as_secs_f64();

    let labels: Array1<usize> = model.predict(features);

    info!("KMeans training completed in {:.3}s", fit_seconds);
    Ok((FittedModel::KMeans(model), labels, fit_seconds))
}

/// Silhouette and Calinski-Harabasz scores; both are 0 for a single cluster
pub fn score_clusters(features: &Array2<f64>, labels: &Array1<usize>) -> (f64, f64) {
    let distinct: BTreeSet<usize> = labels.iter().copied().collect();
    if distinct.len() < 2 {
        return (0.0, 0.0);
    }

    let labelled = Dataset::new(features.clone(), labels.clone());
    let silhouette = match labelled.silhouette_score() {
        Ok(score) if score.is_finite() => score,
        Ok(_) => 0.0,
        Err(e) => {
            debug!("Silhouette score unavailable: {}", e);
            0.0
        }
    };

    (silhouette, calinski_harabasz(features, labels, &distinct))
}

/// Ratio of between-cluster to within-cluster dispersion
fn calinski_harabasz(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    clusters: &BTreeSet<usize>,
) -> f64 {
    let n = features.nrows() as f64;
    let k = clusters.len() as f64;
    if n <= k {
        return 0.0;
    }

    let Some(overall) = features.mean_axis(Axis(0)) else {
        return 0.0;
    };

    let mut between = 0.0;
    let mut within = 0.0;

    for &cluster in clusters {
        let rows: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == cluster)
            .map(|(row, _)| row)
            .collect();
        let members = features.select(Axis(0), &rows);
        let Some(centroid) = members.mean_axis(Axis(0)) else {
            continue;
        };

        between += rows.len() as f64 * (&centroid - &overall).mapv(|d| d * d).sum();
        within += members
            .rows()
            .into_iter()
            .map(|row| (&row - &centroid).mapv(|d| d * d).sum())
            .sum::<f64>();
    }

    if within == 0.0 {
        1.0
    } else {
        between * (n - k) / (within * (k - 1.0))
    }
}
