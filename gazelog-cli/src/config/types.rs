use std::path::PathBuf;

use gazelog_core::DEFAULT_SPECIAL_CONDITION;
use gazelog_server::{DEFAULT_CSV_PATH, DEFAULT_HOST, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawGazelogConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub recording: RawRecordingConfig,
}

/// Server config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    /// Host to bind to
    pub host: Option<String>,

    /// Port to listen on
    pub port: Option<u16>,
}

/// Recording config as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRecordingConfig {
    /// CSV file completed records are appended to
    pub csv_path: Option<PathBuf>,

    /// Robot label whose durations are shortened by two seconds
    pub special_condition: Option<String>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GazelogConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub recording: RecordingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSection {
    pub csv_path: PathBuf,
    pub special_condition: String,
}

impl Default for RecordingSection {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            special_condition: DEFAULT_SPECIAL_CONDITION.to_string(),
        }
    }
}

impl GazelogConfig {
    /// Server configuration for these settings
    pub fn server_config(&self) -> gazelog_server::ServerConfig {
        gazelog_server::ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            csv_path: self.recording.csv_path.clone(),
            special_condition: self.recording.special_condition.clone(),
        }
    }
}
