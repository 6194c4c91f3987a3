use signalkit_core::{
    thread_safe, BusConfig, Callback, ChannelDescriptor, EventBus, RecordingSink, Signature,
    Target, ThreadSafe, Value, ValueType,
};
use std::sync::Arc;

/// Calls observed across every witness of a test, in invocation order.
pub type Log = ThreadSafe<Vec<(String, Vec<Value>)>>;

pub struct Witness {
    pub name: String,
    pub log: Log,
}

impl Target for Witness {}

pub fn new_log() -> Log {
    thread_safe(Vec::new())
}

pub fn witness(name: &str, log: &Log) -> Arc<Witness> {
    Arc::new(Witness {
        name: name.to_string(),
        log: log.clone(),
    })
}

/// Callback on `target` that records its arguments under the witness name
pub fn record(target: &Arc<Witness>, entry: &'static str, params: Signature) -> Callback {
    Callback::method(target, entry, params, |witness: &Witness, args: &[Value]| {
        witness.log.lock().push((witness.name.clone(), args.to_vec()));
    })
}

pub fn names(log: &Log) -> Vec<String> {
    log.lock().iter().map(|(name, _)| name.clone()).collect()
}

pub fn damage_params() -> Signature {
    Signature::new()
        .param("amount", ValueType::Int)
        .param("source", ValueType::Str)
}

/// Bus with a recording sink and a small manifest:
/// `Damaged(amount: int, source: str)` and `Healed(amount: int)` under
/// "Combat", `Tick()` under "Loop".
pub fn test_bus() -> (Arc<EventBus>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let bus = EventBus::with_sink(BusConfig::default(), sink.clone());
    bus.register_all([
        ChannelDescriptor::new("Damaged", "Combat")
            .with_description("Player took damage")
            .with_signature(damage_params()),
        ChannelDescriptor::new("Healed", "Combat")
            .with_description("Player was healed")
            .with_signature(Signature::new().param("amount", ValueType::Int)),
        ChannelDescriptor::new("Tick", "Loop").with_description("Frame boundary"),
    ]);
    (Arc::new(bus), sink)
}
