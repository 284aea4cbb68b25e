//! Model Exporter
//!
//! Mirrors committed artifacts into a directory as
//! `<name>_<task>_model.bin` files.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use modeltrainer_databases::TaskType;

/// Writes artifact blobs under a fixed directory
#[derive(Debug, Clone)]
pub struct ArtifactExporter {
    directory: PathBuf,
}

impl ArtifactExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Destination for a model, with unsafe name characters replaced
    pub fn path_for(&self, model_name: &str, task_type: TaskType) -> PathBuf {
        self.directory.join(format!(
            "{}_{}_model.bin",
            safe_file_stem(model_name),
            task_type
        ))
    }

    /// Write `bytes` and return the path written
    pub fn export(&self, model_name: &str, task_type: TaskType, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)
            .with_context(|| format!("Failed to create export directory {:?}", self.directory))?;

        let path = self.path_for(model_name, task_type);
        fs::write(&path, bytes).with_context(|| format!("Failed to write artifact {:?}", path))?;

        info!("Exported {} bytes to {:?}", bytes.len(), path);
        Ok(path)
    }
}

/// Keep ASCII alphanumerics, `-` and `_`; everything else becomes `_`
pub fn safe_file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() {
        "model".to_string()
    } else {
        stem
    }
}
