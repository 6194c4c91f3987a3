//! # SignalKit Core
//!
//! In-process publish/subscribe event bus.
//! Provides the channel registry, the dynamic value model that arguments
//! travel in, typed channel declarations, and the reentrancy-safe command
//! queue that orders every bus operation.

pub mod error;
pub mod event_bus;
pub mod types;
pub mod value;

pub use error::{BusError, BusResult, Severity};

// Re-export event bus for convenience
pub use event_bus::{
    event_bus, init_event_bus, Argument, Arguments, BusConfig, Callback, CallbackIdentity,
    Channel, ChannelDescriptor, ChannelId, ChannelRef, CommandKind, DiagnosticSink, EventBus,
    RecordingSink, Role, Scheduler, SubscribeFlags, Target, TracingSink,
};

pub use types::{thread_safe, ArgCheckFn, DeferredCall, HandlerFn, ThreadSafe};

pub use value::{Object, Param, ShapeError, Signature, Value, ValueType};
