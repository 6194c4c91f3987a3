//! SignalKit Settings Crate
//!
//! Loads the bus tuning section and the channel manifest that bootstraps
//! the registry at startup.

pub mod config;
pub mod error;

pub use config::{ConfigFormat, Settings};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
