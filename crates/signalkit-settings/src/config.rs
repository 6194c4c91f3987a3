//! Settings file handling for SignalKit
//!
//! A settings file carries two sections:
//! - `bus`: tuning of the event bus queue and subscriber housekeeping
//! - `channels`: the channel manifest, registered in order at startup
//!
//! Supports JSON and TOML file formats, chosen by file extension.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use signalkit_core::{event_bus, init_event_bus, BusConfig, ChannelDescriptor, EventBus};

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};

/// Directory name under the platform config dir
const APP_DIR: &str = "signalkit";
/// Default settings file name
const SETTINGS_FILE: &str = "settings.toml";

/// On-disk format of a settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Bus tuning plus the channel manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bus: BusConfig,
    /// Channels registered at startup, in order.
    #[serde(default)]
    pub channels: Vec<ChannelDescriptor>,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings text in the given format and validate it
    pub fn from_str_with_format(content: &str, format: ConfigFormat) -> SettingsResult<Self> {
        let settings: Self = match format {
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let settings = Self::from_str_with_format(&content, format)?;
        tracing::debug!(
            path = %path.display(),
            channels = settings.channels.len(),
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Load settings from file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!(path = %path.display(), "No settings file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save settings to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bus.queue_warn_depth == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "bus.queue_warn_depth".to_string(),
                value: self.bus.queue_warn_depth.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.id.as_str().trim().is_empty() {
                return Err(ConfigError::MissingKey(format!("channels[{}].name", index)));
            }

            if channel.category.trim().is_empty() {
                return Err(ConfigError::MissingKey(format!(
                    "channels[{}].category",
                    index
                )));
            }

            if let Some(position) = channel
                .signature
                .params()
                .iter()
                .position(|param| param.name.trim().is_empty())
            {
                return Err(ConfigError::MissingKey(format!(
                    "channels[{}].signature[{}].name",
                    index, position
                )));
            }

            if !seen.insert(channel.id.clone()) {
                return Err(ConfigError::DuplicateChannel(channel.id.to_string()));
            }
        }

        Ok(())
    }

    /// Register every manifest channel on `bus`, in order
    pub fn apply(&self, bus: &EventBus) {
        bus.register_all(self.channels.iter().cloned());
        tracing::info!(channels = self.channels.len(), "Channel manifest applied");
    }

    /// A fresh bus configured and populated from these settings
    pub fn build_bus(&self) -> EventBus {
        let bus = EventBus::with_config(self.bus.clone());
        self.apply(&bus);
        bus
    }

    /// Register the manifest channels `bus` does not already know.
    ///
    /// Returns how many were registered. Channels already present keep their
    /// existing descriptor and raise no duplicate report.
    pub fn apply_missing(&self, bus: &EventBus) -> usize {
        let missing: Vec<ChannelDescriptor> = self
            .channels
            .iter()
            .filter(|channel| bus.channel(&channel.id).is_none())
            .cloned()
            .collect();
        let registered = missing.len();

        if registered < self.channels.len() {
            tracing::debug!(
                skipped = self.channels.len() - registered,
                "Manifest channels already registered"
            );
        }
        bus.register_all(missing);
        registered
    }

    /// Initialize the global bus from these settings and register the manifest.
    ///
    /// If the global bus already exists its configuration is kept and only
    /// the manifest channels it lacks are registered, so installing the same
    /// settings twice is quiet.
    pub fn install_global(&self) -> &'static EventBus {
        if let Err(rejected) = init_event_bus(self.bus.clone()) {
            tracing::warn!(
                ?rejected,
                "Global event bus already initialized, keeping its configuration"
            );
        }

        let bus = event_bus();
        let registered = self.apply_missing(bus);
        tracing::info!(channels = registered, "Channel manifest installed");
        bus
    }

    /// Directory holding SignalKit configuration
    pub fn config_dir() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no config or home directory".to_string())
            })
    }

    /// Default location of the settings file
    pub fn config_path() -> SettingsResult<PathBuf> {
        Ok(Self::config_dir()?.join(SETTINGS_FILE))
    }

    /// Create the configuration directory if needed
    pub fn ensure_config_dir() -> SettingsResult<PathBuf> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| SettingsError::ConfigDirectory(format!("{}: {}", dir.display(), e)))?;
        Ok(dir)
    }
}
