use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::daemon::DEFAULT_DAEMON_URL;
use crate::task::Status;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultFileConfig {
    /// Vault root relative to the config file's directory, or absolute.
    pub vault_root: Option<String>,
    pub daemon_url: Option<String>,
    pub daemon_enabled: Option<bool>,
    pub default_status: Option<String>,
    /// Skip-and-warn on corrupt task files during listing instead of
    /// failing the whole listing.
    pub skip_corrupt: Option<bool>,
    pub request_timeout_ms: Option<u64>,
}

/// Resolved, effective settings the store is constructed from.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub vault_root: PathBuf,
    pub daemon_enabled: bool,
    pub daemon_url: String,
    pub default_status: Status,
    pub skip_corrupt: bool,
    pub request_timeout_ms: u64,
}

impl StoreOptions {
    /// File-only defaults rooted at the given vault directory.
    pub fn file_only(vault_root: impl Into<PathBuf>) -> Self {
        Self {
            vault_root: vault_root.into(),
            daemon_enabled: false,
            daemon_url: DEFAULT_DAEMON_URL.to_string(),
            default_status: Status::Inbox,
            skip_corrupt: false,
            request_timeout_ms: 3000,
        }
    }

    /// Effective options for a vault rooted at `root`: project config
    /// overrides global config overrides built-in defaults.
    pub fn resolve(root: &Path) -> Self {
        let config = effective_config(root);
        Self {
            vault_root: config
                .vault_root
                .map(|dir| root.join(dir))
                .unwrap_or_else(|| root.to_path_buf()),
            daemon_enabled: config.daemon_enabled.unwrap_or(false),
            daemon_url: config
                .daemon_url
                .unwrap_or_else(|| DEFAULT_DAEMON_URL.to_string()),
            default_status: config
                .default_status
                .as_deref()
                .and_then(Status::parse)
                .unwrap_or(Status::Inbox),
            skip_corrupt: config.skip_corrupt.unwrap_or(false),
            request_timeout_ms: config.request_timeout_ms.unwrap_or(3000),
        }
    }
}

pub fn config_filename_candidates() -> [&'static str; 2] {
    [".taskvault.toml", ".taskvaultrc"]
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(".taskvault.toml")
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

pub fn resolve_taskvault_home_dir() -> Option<PathBuf> {
    if let Ok(value) = std::env::var("TASKVAULT_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir().map(|home| home.join(".taskvault"))
}

pub fn global_config_path() -> Option<PathBuf> {
    resolve_taskvault_home_dir().map(|home| home.join("config.toml"))
}

pub fn find_config_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    for candidate in start.ancestors() {
        for name in config_filename_candidates() {
            if candidate.join(name).is_file() {
                return Some(candidate.to_path_buf());
            }
        }
    }
    None
}

pub fn load_config(root: &Path) -> Option<VaultFileConfig> {
    for name in config_filename_candidates() {
        let path = root.join(name);
        if path.is_file() {
            if let Ok(text) = fs::read_to_string(&path) {
                if let Ok(config) = toml::from_str::<VaultFileConfig>(&text) {
                    return Some(config);
                }
            }
        }
    }
    None
}

pub fn load_global_config() -> Option<VaultFileConfig> {
    let path = global_config_path()?;
    if !path.is_file() {
        return None;
    }
    let text = fs::read_to_string(path).ok()?;
    toml::from_str::<VaultFileConfig>(&text).ok()
}

pub fn effective_config(root: &Path) -> VaultFileConfig {
    let project = load_config(root).unwrap_or_default();
    let global = load_global_config().unwrap_or_default();
    VaultFileConfig {
        vault_root: project.vault_root.or(global.vault_root),
        daemon_url: project.daemon_url.or(global.daemon_url),
        daemon_enabled: project.daemon_enabled.or(global.daemon_enabled),
        default_status: project.default_status.or(global.default_status),
        skip_corrupt: project.skip_corrupt.or(global.skip_corrupt),
        request_timeout_ms: project.request_timeout_ms.or(global.request_timeout_ms),
    }
}

pub fn write_config(root: &Path, config: &VaultFileConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path(root);
    let body = toml::to_string_pretty(config)?;
    fs::write(&path, body)?;
    Ok(path)
}
