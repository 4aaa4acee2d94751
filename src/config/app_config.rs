use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::errors::{LayerlockError, Result};

/// Top-level Layerlock configuration.
///
/// Loaded from an explicit `--config` path, or from
/// `<config dir>/layerlock/config.toml` when present; everything has a
/// sensible default so no file is required at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub gpg: GpgSection,
    pub audit: Option<AuditSection>,
}

impl AppConfig {
    /// Load the configuration. An explicit path must exist; the
    /// default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(LayerlockError::FileNotFound {
                        path: path.to_path_buf(),
                    });
                }
                path.to_path_buf()
            }
            None => {
                let Some(default) = Self::default_path() else {
                    return Ok(Self::default());
                };
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| LayerlockError::InvalidConfig {
            detail: format!("Failed to parse {}: {e}", path.display()),
        })
    }

    /// Default config file location for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("layerlock").join("config.toml"))
    }
}

/// The `[store]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSection {
    /// OCI image layout directory used when `--store` is not given.
    pub path: Option<String>,
}

/// The `[gpg]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GpgSection {
    /// Path to the gpg binary.
    pub binary: Option<String>,
    /// GnuPG home directory for pgp recipients and keyrings.
    pub homedir: Option<String>,
}

/// The `[audit]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditSection {
    pub enabled: bool,
    pub log_file: String,
}
