//! Dataset Materializer
//!
//! Turns uploaded bytes into a [`TabularDataset`] and fits the
//! [`FeaturePipeline`] that encodes it into a numeric matrix.
//!
//! Two materialization modes are supported:
//!
//! * `InMemory` parses straight from the byte buffer
//! * `Spooled` writes the buffer to a private temporary file first; the
//!   file is removed when its guard drops, on every exit path

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

use crate::error::{TrainerError, TrainerResult};

/// How uploaded bytes reach the CSV parser
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaterializeMode {
    #[default]
    InMemory,
    Spooled,
}

/// Parses uploads into tabular datasets
#[derive(Debug, Clone, Default)]
pub struct DatasetMaterializer {
    mode: MaterializeMode,
    spool_directory: Option<PathBuf>,
}

impl DatasetMaterializer {
    pub fn new(mode: MaterializeMode, spool_directory: Option<PathBuf>) -> Self {
        Self {
            mode,
            spool_directory,
        }
    }

    pub fn mode(&self) -> MaterializeMode {
        self.mode
    }

    /// Same materializer with a different mode
    pub fn with_mode(&self, mode: MaterializeMode) -> Self {
        Self {
            mode,
            spool_directory: self.spool_directory.clone(),
        }
    }

    /// Parse `bytes` as CSV with a header row.
    ///
    /// When `target_column` is given it must be present in the header.
    pub fn materialize(
        &self,
        bytes: &[u8],
        target_column: Option<&str>,
    ) -> TrainerResult<TabularDataset> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(TrainerError::InvalidDataset(
                "uploaded file is empty".to_string(),
            ));
        }

        let (frame, source_id) = match self.mode {
            MaterializeMode::InMemory => {
                let frame = CsvReadOptions::default()
                    .with_has_header(true)
                    .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
                    .finish()
                    .map_err(TrainerError::dataset)?;
                let id = Uuid::new_v4().simple().to_string();
                (frame, format!("dataset_{}", &id[..12]))
            }
            MaterializeMode::Spooled => self.parse_spooled(bytes)?,
        };

        let dataset = TabularDataset { frame, source_id };

        if dataset.n_columns() == 0 {
            return Err(TrainerError::InvalidDataset(
                "dataset has no columns".to_string(),
            ));
        }
        if dataset.n_rows() == 0 {
            return Err(TrainerError::InvalidDataset(
                "dataset has no rows".to_string(),
            ));
        }
        if let Some(target) = target_column {
            if !dataset.has_column(target) {
                return Err(TrainerError::InvalidDataset(format!(
                    "target column '{}' not found in dataset columns {:?}",
                    target,
                    dataset.column_names()
                )));
            }
        }

        debug!(
            "Materialized {} ({} rows x {} columns)",
            dataset.source_id,
            dataset.n_rows(),
            dataset.n_columns()
        );
        Ok(dataset)
    }

    fn parse_spooled(&self, bytes: &[u8]) -> TrainerResult<(DataFrame, String)> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("upload_").suffix(".csv");

        let mut spool = match &self.spool_directory {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(TrainerError::dataset)?;
                builder.tempfile_in(dir)
            }
            None => builder.tempfile(),
        }
        .map_err(TrainerError::dataset)?;

        spool.write_all(bytes).map_err(TrainerError::dataset)?;
        spool.flush().map_err(TrainerError::dataset)?;

        let source_id = spool
            .path()
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload_{}", Uuid::new_v4().simple()));

        debug!("Spooled upload to {:?}", spool.path());

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(spool.path().to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(TrainerError::dataset)?;

        // `spool` drops here and the file is removed
        Ok((frame, source_id))
    }
}

/// A parsed upload
#[derive(Debug, Clone)]
pub struct TabularDataset {
    frame: DataFrame,
    source_id: String,
}

impl TabularDataset {
    pub fn from_frame(frame: DataFrame, source_id: impl Into<String>) -> Self {
        Self {
            frame,
            source_id: source_id.into(),
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Filesystem-safe identifier derived from the upload
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn n_columns(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    /// Every column except `target_column`
    pub fn feature_names(&self, target_column: Option<&str>) -> Vec<String> {
        self.column_names()
            .into_iter()
            .filter(|name| Some(name.as_str()) != target_column)
            .collect()
    }

    pub fn is_numeric_column(&self, name: &str) -> bool {
        self.frame
            .column(name)
            .map(|s| s.dtype().is_numeric() || matches!(s.dtype(), DataType::Boolean))
            .unwrap_or(false)
    }

    fn column(&self, name: &str) -> TrainerResult<&Series> {
        self.frame.column(name).map_err(|_| {
            TrainerError::InvalidDataset(format!("column '{}' not found in dataset", name))
        })
    }

    /// Column values as `f64`; non-numeric cells become `None`
    pub fn numeric_values(&self, name: &str) -> TrainerResult<Vec<Option<f64>>> {
        let series = self
            .column(name)?
            .cast(&DataType::Float64)
            .map_err(TrainerError::dataset)?;
        let values = series.f64().map_err(TrainerError::dataset)?;
        Ok(values.into_iter().collect())
    }

    /// Column values rendered as strings
    pub fn text_values(&self, name: &str) -> TrainerResult<Vec<Option<String>>> {
        let series = self
            .column(name)?
            .cast(&DataType::String)
            .map_err(TrainerError::dataset)?;
        let values = series.str().map_err(TrainerError::dataset)?;
        Ok(values
            .into_iter()
            .map(|value| value.map(str::to_string))
            .collect())
    }

    /// Copy without the rows whose `target_column` is null
    pub fn drop_null_target(&self, target_column: &str) -> TrainerResult<TabularDataset> {
        let mask = self.column(target_column)?.is_not_null();
        let frame = self.frame.filter(&mask).map_err(TrainerError::dataset)?;
        Ok(TabularDataset {
            frame,
            source_id: self.source_id.clone(),
        })
    }

    /// Class labels as indices into the sorted list of distinct labels
    pub fn class_targets(&self, target_column: &str) -> TrainerResult<(Vec<String>, Array1<usize>)> {
        let labels: Vec<String> = self
            .text_values(target_column)?
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();

        let classes: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let targets = labels
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        Ok((classes, targets))
    }

    /// Regression targets; fails unless the column is numeric and complete
    pub fn numeric_targets(&self, target_column: &str) -> TrainerResult<Array1<f64>> {
        if !self.is_numeric_column(target_column) {
            return Err(TrainerError::TrainingFailed(format!(
                "target column '{}' must be numeric for regression",
                target_column
            )));
        }

        self.numeric_values(target_column)?
            .into_iter()
            .map(|value| {
                value.ok_or_else(|| {
                    TrainerError::TrainingFailed(format!(
                        "target column '{}' contains missing values",
                        target_column
                    ))
                })
            })
            .collect()
    }
}

/// How one input column becomes one feature
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FeatureEncoding {
    /// Standardized value, nulls imputed with the training mean
    Numeric { mean: f64, scale: f64 },
    /// Index into sorted training levels; unseen levels map past the end
    Ordinal { levels: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureColumn {
    pub name: String,
    pub encoding: FeatureEncoding,
}

/// Column encoders fitted on the training data and stored with the model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeaturePipeline {
    columns: Vec<FeatureColumn>,
}

impl FeaturePipeline {
    /// Fit encoders for every column of `dataset` except `target_column`
    pub fn fit(dataset: &TabularDataset, target_column: Option<&str>) -> TrainerResult<Self> {
        let mut columns = Vec::new();

        for name in dataset.feature_names(target_column) {
            let encoding = if dataset.is_numeric_column(&name) {
                let present: Vec<f64> = dataset
                    .numeric_values(&name)?
                    .into_iter()
                    .flatten()
                    .collect();
                let (mean, scale) = mean_and_scale(&present);
                FeatureEncoding::Numeric { mean, scale }
            } else {
                let levels: Vec<String> = dataset
                    .text_values(&name)?
                    .into_iter()
                    .map(Option::unwrap_or_default)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                FeatureEncoding::Ordinal { levels }
            };

            columns.push(FeatureColumn { name, encoding });
        }

        Ok(Self { columns })
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Encode `dataset` into a rows x features matrix
    pub fn transform(&self, dataset: &TabularDataset) -> TrainerResult<Array2<f64>> {
        let mut matrix = Array2::<f64>::zeros((dataset.n_rows(), self.columns.len()));

        for (j, column) in self.columns.iter().enumerate() {
            match &column.encoding {
                FeatureEncoding::Numeric { mean, scale } => {
                    for (i, value) in dataset.numeric_values(&column.name)?.into_iter().enumerate() {
                        matrix[[i, j]] = (value.unwrap_or(*mean) - mean) / scale;
                    }
                }
                FeatureEncoding::Ordinal { levels } => {
                    for (i, value) in dataset.text_values(&column.name)?.into_iter().enumerate() {
                        let value = value.unwrap_or_default();
                        let code = levels.binary_search(&value).unwrap_or(levels.len());
                        matrix[[i, j]] = code as f64;
                    }
                }
            }
        }

        Ok(matrix)
    }
}

fn mean_and_scale(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    let scale = if std.is_finite() && std > f64::EPSILON {
        std
    } else {
        1.0
    };
    (mean, scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &[u8] = b"x,y,color,label\n1.0,2.0,red,a\n2.0,,blue,b\n3.0,6.0,red,\n4.0,8.0,green,a\n";

    #[test]
    fn test_in_memory_parse_reads_header_and_rows() {
        let dataset = DatasetMaterializer::default()
            .materialize(CSV, Some("label"))
            .unwrap();

        assert_eq!(dataset.n_rows(), 4);
        assert_eq!(dataset.column_names(), vec!["x", "y", "color", "label"]);
        assert!(dataset.source_id().starts_with("dataset_"));
        assert_eq!(dataset.source_id().len(), "dataset_".len() + 12);
    }

    #[test]
    fn test_spooled_parse_removes_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let materializer =
            DatasetMaterializer::new(MaterializeMode::Spooled, Some(dir.path().to_path_buf()));

        let dataset = materializer.materialize(CSV, None).unwrap();

        assert!(dataset.source_id().starts_with("upload_"));
        assert_eq!(dataset.n_rows(), 4);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_spooled_parse_failure_removes_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let materializer =
            DatasetMaterializer::new(MaterializeMode::Spooled, Some(dir.path().to_path_buf()));

        assert!(materializer.materialize(b"x,y\n1,2\n", Some("label")).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_or_headerless_input_is_invalid() {
        let materializer = DatasetMaterializer::default();
        assert!(matches!(
            materializer.materialize(b"", None),
            Err(TrainerError::InvalidDataset(_))
        ));
        assert!(matches!(
            materializer.materialize(b"x,y\n", None),
            Err(TrainerError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_missing_target_is_invalid() {
        let err = DatasetMaterializer::default()
            .materialize(CSV, Some("price"))
            .unwrap_err();
        assert!(matches!(err, TrainerError::InvalidDataset(_)));
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn test_null_targets_are_dropped() {
        let dataset = DatasetMaterializer::default()
            .materialize(CSV, Some("label"))
            .unwrap();
        let labelled = dataset.drop_null_target("label").unwrap();
        assert_eq!(labelled.n_rows(), 3);

        let (classes, targets) = labelled.class_targets("label").unwrap();
        assert_eq!(classes, vec!["a", "b"]);
        assert_eq!(targets.to_vec(), vec![0, 1, 0]);
    }

    #[test]
    fn test_pipeline_imputes_and_encodes() {
        let dataset = DatasetMaterializer::default()
            .materialize(CSV, Some("label"))
            .unwrap();
        let pipeline = FeaturePipeline::fit(&dataset, Some("label")).unwrap();
        assert_eq!(pipeline.feature_names(), vec!["x", "y", "color"]);

        let matrix = pipeline.transform(&dataset).unwrap();
        assert_eq!(matrix.dim(), (4, 3));

        // y is missing in row 1 and imputed with the mean, which standardizes to zero
        assert_eq!(matrix[[1, 1]], 0.0);
        // levels sorted: blue, green, red
        assert_eq!(matrix.column(2).to_vec(), vec![2.0, 0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_unseen_levels_map_past_known_levels() {
        let train = DatasetMaterializer::default()
            .materialize(b"color,v\nred,1\nblue,2\n", None)
            .unwrap();
        let pipeline = FeaturePipeline::fit(&train, Some("v")).unwrap();

        let other = DatasetMaterializer::default()
            .materialize(b"color,v\npurple,1\n", None)
            .unwrap();
        let matrix = pipeline.transform(&other).unwrap();
        assert_eq!(matrix[[0, 0]], 2.0);
    }

    #[test]
    fn test_non_numeric_regression_target_fails_training() {
        let dataset = DatasetMaterializer::default()
            .materialize(CSV, Some("label"))
            .unwrap();
        assert!(matches!(
            dataset.numeric_targets("label"),
            Err(TrainerError::TrainingFailed(_))
        ));
        assert_eq!(
            dataset.numeric_targets("x").unwrap().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }
}
