use crate::infrastructure::config::{ensure_default_configs, load_app_config, AppConfig};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub database_path: PathBuf,
    pub config: AppConfig,
}

pub fn bootstrap_workspace(
    workspace_root: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let database_path = state_dir.join("planner.sqlite");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;

    ensure_default_configs(&config_dir)?;
    let config = load_app_config(&config_dir, lookup)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        database_path,
        config,
    })
}
