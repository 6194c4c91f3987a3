use std::path::PathBuf;

use anyhow::{bail, Context};
use signalkit::{
    discovery_tree, init_logging, listen, Callback, ChannelId, Settings, Value, BUILD_DATE,
    BUILD_PROFILE, VERSION,
};

const USAGE: &str = "usage: signalkit [--version] [SETTINGS_FILE] [CHANNEL [JSON_ARGS]]";

fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging()?;

    let mut args = std::env::args().skip(1);
    let path = match args.next() {
        Some(arg) if arg == "-h" || arg == "--help" => {
            println!("{}", USAGE);
            return Ok(());
        }
        Some(arg) if arg == "-V" || arg == "--version" => {
            println!("signalkit {} ({}, built {})", VERSION, BUILD_PROFILE, BUILD_DATE);
            return Ok(());
        }
        Some(arg) => PathBuf::from(arg),
        None => Settings::config_path()?,
    };

    tracing::info!(
        version = VERSION,
        profile = BUILD_PROFILE,
        built = BUILD_DATE,
        "Starting signalkit"
    );

    let settings = Settings::load_or_default(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    let bus = settings.install_global();

    print!("{}", discovery_tree(bus));

    let Some(channel) = args.next() else {
        return Ok(());
    };

    let id = ChannelId::from(channel);
    let Some(descriptor) = bus.channel(&id) else {
        bail!("Channel not found: {}", id);
    };

    let raw = args.next().unwrap_or_else(|| "[]".to_string());
    let values: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("Dispatch arguments must be a JSON array, got {}", raw))?;

    let printed = id.clone();
    listen!(
        &id,
        Callback::free("print", descriptor.signature.clone(), move |args: &[Value]| {
            let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
            println!("{} <- [{}]", printed, rendered.join(", "));
        })
    );

    bus.dispatch(&id, values.into_iter().map(Value::from).collect());

    Ok(())
}
