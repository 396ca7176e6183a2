//! Configuration loading and discovery for `oembed.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::OembedConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "oembed.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse oembed.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override catalog file
    pub catalog: Option<PathBuf>,
    /// Override public files directory
    pub public_root: Option<PathBuf>,
    /// Override site base URL
    pub base_url: Option<String>,
    /// Override server host
    pub host: Option<String>,
    /// Override server port
    pub port: Option<u16>,
}

/// Find oembed.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for oembed.toml
/// 2. Check XDG_CONFIG_HOME/oembed/oembed.toml (or ~/.config/oembed/oembed.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find oembed.toml in XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("oembed").join(CONFIG_FILE);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find oembed.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an oembed.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the default
/// configuration. Relative paths in the file are resolved against the
/// directory containing it.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("site/oembed.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<OembedConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

fn load_config_file(path: &Path) -> Result<OembedConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let mut config: OembedConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    if let Some(root) = project_root(path) {
        config.files.public_root = resolve_path(root, &config.files.public_root);
        config.catalog.path = config.catalog.path.map(|p| resolve_path(root, &p));
    }

    Ok(config)
}

/// Configuration used when no oembed.toml is found.
pub fn default_config() -> OembedConfig {
    OembedConfig::default()
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut OembedConfig, overrides: &CliOverrides) {
    if let Some(ref catalog) = overrides.catalog {
        config.catalog.path = Some(catalog.clone());
    }

    if let Some(ref public_root) = overrides.public_root {
        config.files.public_root = public_root.clone();
    }

    if let Some(ref base_url) = overrides.base_url {
        config.service.base_url = base_url.clone();
    }

    if let Some(ref host) = overrides.host {
        config.server.host = host.clone();
    }

    if let Some(port) = overrides.port {
        config.server.port = port;
    }
}

/// Get the directory a config file lives in.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
