//! Last-used adapter registry
//!
//! Remembers which adapter was opened last so the next run can connect to it
//! without being told again.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name used under the user's config directory
const REGISTRY_FILE: &str = "last_device.json";

/// Errors reading or writing the registry file
#[derive(Debug, Error)]
pub enum RegistryError {
    /// File could not be read or written
    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File contents are not a valid device record
    #[error("Registry format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// The adapter that was connected last
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastDevice {
    /// Display name
    pub name: String,
    /// Serial device path
    pub address: String,
}

/// JSON-file backed store for the last connected adapter
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    path: PathBuf,
}

impl DeviceRegistry {
    /// Create a registry stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.config/elm-console/last_device.json`, or the working directory without a home
    pub fn default_path() -> PathBuf {
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home)
                .join(".config")
                .join("elm-console")
                .join(REGISTRY_FILE),
            None => PathBuf::from(REGISTRY_FILE),
        }
    }

    /// Location of the registry file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the remembered adapter, if any
    pub fn last(&self) -> Result<Option<LastDevice>, RegistryError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Remember `device` as the last connected adapter
    pub fn remember(&self, device: &LastDevice) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(device)?)?;
        debug!("Remembered adapter {} at {}", device.name, self.path.display());
        Ok(())
    }
}
