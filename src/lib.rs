//! # SignalKit
//!
//! A typed, in-process publish/subscribe event bus.
//!
//! ## Architecture
//!
//! SignalKit is organized as a workspace with multiple crates:
//!
//! 1. **signalkit-core** - Values, channels, subscriptions, the command queue and drain loop
//! 2. **signalkit-settings** - Bus tuning and the channel manifest (JSON or TOML)
//! 3. **signalkit** - Re-exports, logging setup and a small manifest inspection binary
//!
//! ## Features
//!
//! - **Channel Registry**: channels grouped by category, discoverable by name
//! - **Listeners and Watchers**: dispatch arguments plus pre-bound arguments
//! - **Reentrancy-safe Dispatch**: handlers may subscribe, forget or dispatch mid-dispatch
//! - **Typed Channels**: compile-time argument tuples via the `channel!` macro

use std::fmt::Write as _;

pub use signalkit_core::{
    channel, dispatch, event_bus, init_event_bus, listen, Argument, Arguments, BusConfig,
    BusError, Callback, CallbackIdentity, Channel, ChannelDescriptor, ChannelId, ChannelRef,
    DiagnosticSink, EventBus, Object, Param, RecordingSink, Role, Scheduler, Severity, Signature,
    SubscribeFlags, Target, TracingSink, Value, ValueType,
};
pub use signalkit_settings::{ConfigError, ConfigFormat, Settings, SettingsError, SettingsResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Cargo profile the binary was built with
pub const BUILD_PROFILE: &str = env!("BUILD_PROFILE");

/// Render the registered channels as an indented tree, one category per
/// block, channels in registration order.
pub fn discovery_tree(bus: &EventBus) -> String {
    let mut out = String::new();

    for category in bus.list_categories() {
        let _ = writeln!(out, "{}", category);
        for name in bus.list_channel_names(&category) {
            let id = ChannelId::from(name.as_str());
            let signature = bus
                .channel(&id)
                .map(|descriptor| descriptor.signature.to_string())
                .unwrap_or_default();
            let description = bus.describe_channel(&id);

            if description.is_empty() {
                let _ = writeln!(out, "  {}{}", name, signature);
            } else {
                let _ = writeln!(out, "  {}{} - {}", name, signature, description);
            }
        }
    }

    out
}

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
