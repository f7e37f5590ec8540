use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use super::types::{
    GazelogConfig, RawGazelogConfig, RawRecordingConfig, RawServerConfig, RecordingSection,
    ServerSection,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<GazelogConfig> {
        Self::load_layers(
            Self::user_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Load from explicit paths; missing files are skipped
    pub fn load_layers(user_path: Option<&Path>, project_path: &Path) -> Result<GazelogConfig> {
        let mut raw = RawGazelogConfig::default();

        // Layer 1: User config
        if let Some(user_path) = user_path
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read(user_path)?);
        }

        // Layer 2: Project config
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read(project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "gazelog").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with GAZELOG_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("GAZELOG_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".gazelog/config.toml")
        }
    }

    fn read(path: &Path) -> Result<RawGazelogConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawGazelogConfig, overlay: RawGazelogConfig) -> RawGazelogConfig {
        RawGazelogConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
            },
            recording: RawRecordingConfig {
                csv_path: overlay.recording.csv_path.or(base.recording.csv_path),
                special_condition: overlay
                    .recording
                    .special_condition
                    .or(base.recording.special_condition),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawGazelogConfig) -> GazelogConfig {
        let server = ServerSection::default();
        let recording = RecordingSection::default();
        GazelogConfig {
            server: ServerSection {
                host: raw.server.host.unwrap_or(server.host),
                port: raw.server.port.unwrap_or(server.port),
            },
            recording: RecordingSection {
                csv_path: raw.recording.csv_path.unwrap_or(recording.csv_path),
                special_condition: raw
                    .recording
                    .special_condition
                    .unwrap_or(recording.special_condition),
            },
        }
    }
}
