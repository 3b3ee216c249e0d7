use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Which backend persists session records. Exactly one mode per deployment,
/// chosen here; the server never falls back from one to the other.
#[derive(Debug, Clone, Copy, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStoreKind {
    /// Single SQLite table with transactional upserts
    Sqlite,
    /// One JSON document guarded by an in-process advisory write lock.
    /// Suited to single-server deployments; the lock does not protect
    /// against other processes writing the same file.
    Jsonfile,
}

fn default_port() -> u16 {
    3000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_record_store() -> RecordStoreKind {
    RecordStoreKind::Sqlite
}

/// Server configuration file structure (TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the uploads folder and the session store (default: data)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Session record backend: sqlite or jsonfile (default: sqlite)
    #[serde(default = "default_record_store")]
    pub record_store: RecordStoreKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            data_dir: default_data_dir(),
            record_store: default_record_store(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Storage(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            AppError::Validation(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("sessions.sqlite")
    }

    pub fn json_path(&self) -> PathBuf {
        self.data_dir.join("sessions.json")
    }
}
