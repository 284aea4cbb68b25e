//! Configuration Management Module
//!
//! File-based configuration for the model trainer with environment
//! variable overrides and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use modeltrainer_databases::TaskType;

use crate::ml_integration::dataset::MaterializeMode;
use crate::ml_integration::metadata::SearchConfig;

/// Default maximum upload size: 25 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub database: DatabaseSettings,
    pub server: ServerSettings,
    pub training: TrainingSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("modeltrainer.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Training pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
    pub materialize_mode: MaterializeMode,
    /// Where spooled uploads are written; system temp dir when unset
    pub spool_directory: Option<PathBuf>,
    /// When set, committed artifacts are mirrored here
    pub artifact_directory: Option<PathBuf>,
    pub search: SearchConfig,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            materialize_mode: MaterializeMode::default(),
            spool_directory: None,
            artifact_directory: None,
            search: SearchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    /// Daily-rolling log files are written here when set
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

/// Loads, overrides and validates [`TrainerConfig`]
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    config: TrainerConfig,
}

impl ConfigManager {
    /// Load from `<config_dir>/modeltrainer/config.toml`, or defaults when absent
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Self::with_path(config_dir.join("modeltrainer").join("config.toml"))
    }

    /// Load from an explicit path, or defaults when the file does not exist
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut manager = Self {
            config_path: path.as_ref().to_path_buf(),
            config: TrainerConfig::default(),
        };

        if manager.config_exists() {
            manager.load_config()?;
        } else {
            debug!(
                "No configuration at {:?}, using defaults",
                manager.config_path
            );
        }

        manager.apply_env_overrides()?;
        Ok(manager)
    }

    fn get_config_dir() -> Result<PathBuf> {
        dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))
    }

    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Load configuration from file
    pub fn load_config(&mut self) -> Result<()> {
        let content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file {:?}", self.config_path))?;

        self.config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;

        info!("Loaded configuration from {:?}", self.config_path);
        Ok(())
    }

    /// Save configuration to file
    pub fn save_config(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| anyhow!("Failed to serialize TOML config: {}", e))?;

        fs::write(&self.config_path, content)
            .with_context(|| format!("Failed to write config file {:?}", self.config_path))?;

        info!("Saved configuration to {:?}", self.config_path);
        Ok(())
    }

    /// Apply `MODELTRAINER_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("MODELTRAINER_DATABASE_PATH") {
            self.config.database.path = PathBuf::from(path);
            debug!("Applied env override for database path");
        }

        if let Ok(host) = std::env::var("MODELTRAINER_HOST") {
            self.config.server.host = host;
            debug!("Applied env override for host");
        }

        if let Ok(port) = std::env::var("MODELTRAINER_PORT") {
            self.config.server.port = port
                .parse()
                .with_context(|| format!("Invalid MODELTRAINER_PORT: {}", port))?;
            debug!("Applied env override for port");
        }

        if let Ok(limit) = std::env::var("MODELTRAINER_MAX_UPLOAD_BYTES") {
            self.config.training.max_upload_bytes = limit
                .parse()
                .with_context(|| format!("Invalid MODELTRAINER_MAX_UPLOAD_BYTES: {}", limit))?;
            debug!("Applied env override for max upload bytes");
        }

        if let Ok(dir) = std::env::var("MODELTRAINER_ARTIFACT_DIR") {
            self.config.training.artifact_directory = Some(PathBuf::from(dir));
            debug!("Applied env override for artifact directory");
        }

        if let Ok(level) = std::env::var("MODELTRAINER_LOG_LEVEL") {
            self.config.logging.level = level;
            debug!("Applied env override for log level");
        }

        if let Ok(json) = std::env::var("MODELTRAINER_LOG_JSON") {
            self.config.logging.json = json.to_lowercase() == "true";
            debug!("Applied env override for JSON logging");
        }

        Ok(())
    }

    pub fn get_config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn get_config_mut(&mut self) -> &mut TrainerConfig {
        &mut self.config
    }

    pub fn into_config(self) -> TrainerConfig {
        self.config
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    /// Validate configuration
    pub fn validate_config(&self) -> Result<()> {
        validate(&self.config)
    }
}

fn validate(config: &TrainerConfig) -> Result<()> {
    let training = &config.training;
    let search = &training.search;

    if training.max_upload_bytes == 0 {
        return Err(anyhow!("Max upload size must be greater than 0"));
    }

    if search.cv_folds < 2 {
        return Err(anyhow!(
            "Cross-validation needs at least 2 folds, got: {}",
            search.cv_folds
        ));
    }

    if search.n_clusters < 2 {
        return Err(anyhow!(
            "Clustering needs at least 2 clusters, got: {}",
            search.n_clusters
        ));
    }

    if search.classifiers.is_empty() {
        return Err(anyhow!("At least one classification candidate is required"));
    }

    if search.regressors.is_empty() {
        return Err(anyhow!("At least one regression candidate is required"));
    }

    for (kind, candidates, expected) in [
        ("classification", &search.classifiers, TaskType::Classification),
        ("regression", &search.regressors, TaskType::Regression),
    ] {
        if let Some(wrong) = candidates
            .iter()
            .find(|c| c.model_type.task_type() != expected)
        {
            return Err(anyhow!("{} is not a {} model", wrong.model_type, kind));
        }
    }

    if config.server.host.is_empty() {
        return Err(anyhow!("Server host must not be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml_integration::metadata::{CandidateSpec, ModelType};
    use tempfile::tempdir;

    #[test]
    fn test_config_default_creation() {
        let config = TrainerConfig::default();
        assert_eq!(config.training.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.training.search.cv_folds, 5);
        assert_eq!(config.training.search.random_seed, 42);
        assert_eq!(config.training.materialize_mode, MaterializeMode::InMemory);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TrainerConfig::default();

        config.training.max_upload_bytes = 0;
        assert!(validate(&config).is_err());
        config.training.max_upload_bytes = DEFAULT_MAX_UPLOAD_BYTES;

        config.training.search.cv_folds = 1;
        assert!(validate(&config).is_err());
        config.training.search.cv_folds = 3;

        config.training.search.classifiers.clear();
        assert!(validate(&config).is_err());

        config.training.search.classifiers = vec![CandidateSpec::new(ModelType::Ridge)];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("absent.toml")).unwrap();
        assert!(!manager.config_exists());
        assert_eq!(manager.get_config().training.search.n_clusters, 4);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[training]\nmax_upload_bytes = 1024\nmaterialize_mode = \"spooled\"\n\n[training.search]\ncv_folds = 3\n",
        )
        .unwrap();

        let manager = ConfigManager::with_path(&path).unwrap();
        let config = manager.get_config();
        assert_eq!(config.training.max_upload_bytes, 1024);
        assert_eq!(config.training.materialize_mode, MaterializeMode::Spooled);
        assert_eq!(config.training.search.cv_folds, 3);
        assert_eq!(config.training.search.random_seed, 42);
        assert_eq!(config.training.search.classifiers.len(), 4);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut manager = ConfigManager::with_path(&path).unwrap();
        manager.get_config_mut().training.search.n_clusters = 6;
        manager.get_config_mut().training.artifact_directory = Some(PathBuf::from("/tmp/models"));
        manager.save_config().unwrap();

        let reloaded = ConfigManager::with_path(&path).unwrap();
        assert_eq!(reloaded.get_config().training.search.n_clusters, 6);
        assert_eq!(
            reloaded.get_config().training.search.classifiers,
            manager.get_config().training.search.classifiers
        );
    }
}
