//! Initialize the configuration directory: create ~/.arcade, a default config, and the storage root.
//!
//! The storage root is created empty; copy the game-client bundle (with `index.html`) into it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with every default spelled out if missing.
/// - Creates the storage root named by the (possibly pre-existing) config.
///
/// Returns the resolved storage root.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let default_config = serde_json::to_string_pretty(&config::Config::default())
            .context("serializing default config")?;
        std::fs::write(config_path, default_config)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (cfg, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let root = config::resolve_storage_root(&cfg, config_path);
    if !root.exists() {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("creating storage root {}", root.display()))?;
        log::info!("created storage root at {}", root.display());
    } else {
        log::debug!("storage root already exists at {}, skipping", root.display());
    }

    Ok(root)
}
