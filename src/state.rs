use std::fs;
use std::path::{Path, PathBuf};

use crate::types::Config;

/// Get the canonical config file path (~/.dayflow/config.json)
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".dayflow").join("config.json"))
}

/// Load configuration from ~/.dayflow/config.json.
///
/// A missing file is not an error: first runs get `Config::default()`.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Create or update config.json.
///
/// Loads the stored config (or defaults on first run), applies the mutator,
/// ensures the parent directory exists, and writes it back.
pub fn update_config_at(path: &Path, mutator: impl FnOnce(&mut Config)) -> Result<Config, String> {
    let mut config = load_config_from(path)?;
    mutator(&mut config);

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(&config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;

    Ok(config)
}

/// Resolve the workspace directory holding `state.json`.
///
/// Falls back to ~/.dayflow/workspace when `workspacePath` is unset.
pub fn workspace_dir(config: &Config) -> Result<PathBuf, String> {
    if !config.workspace_path.trim().is_empty() {
        return Ok(PathBuf::from(config.workspace_path.trim()));
    }
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".dayflow").join("workspace"))
}

/// Create the workspace directory if needed. Idempotent, never touches files.
pub fn initialize_workspace(path: &Path) -> Result<(), String> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    }
    Ok(())
}
