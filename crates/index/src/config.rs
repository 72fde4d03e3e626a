//! Index configuration management.

use crate::types::IndexConfig;
use std::fs;
use std::path::{Path, PathBuf};
use vsearch_core::{AppError, AppResult};

/// Load index configuration.
///
/// Loads from `.vsearch/indexes/<name>/config.yaml` if it exists,
/// otherwise returns a default config carrying the provided index name.
pub fn load_config(workspace: &Path, index_name: &str) -> AppResult<IndexConfig> {
    let config_path = get_config_path(workspace, index_name);

    if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let mut config: IndexConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        // Ensure name matches
        config.name = index_name.to_string();
        config.validate()?;

        tracing::debug!("Loaded index config for '{}'", index_name);
        Ok(config)
    } else {
        tracing::debug!(
            "Using default index config for '{}' (no config file found)",
            index_name
        );
        Ok(IndexConfig {
            name: index_name.to_string(),
            ..Default::default()
        })
    }
}

/// Save index configuration.
pub fn save_config(workspace: &Path, config: &IndexConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))?;
    }

    let yaml = serde_yaml::to_string(config)?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved index config for '{}'", config.name);
    Ok(())
}

/// Get the directory holding an index.
pub fn get_index_dir(workspace: &Path, index_name: &str) -> PathBuf {
    workspace.join(".vsearch").join("indexes").join(index_name)
}

/// Get the path to an index's config file.
pub fn get_config_path(workspace: &Path, index_name: &str) -> PathBuf {
    get_index_dir(workspace, index_name).join("config.yaml")
}

/// Get the SQLite store path for an index.
pub fn get_store_path(workspace: &Path, index_name: &str) -> PathBuf {
    get_index_dir(workspace, index_name).join("index.sqlite")
}
