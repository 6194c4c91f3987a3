//! Event Bus implementation.
//!
//! Provides the core EventBus struct, its command queue and drain loop, and
//! the global instance for application-wide event distribution.
//!
//! Every public operation becomes a [`Command`] appended to a FIFO queue.
//! The first caller to find the bus idle drains the queue on its own stack;
//! anything enqueued while a drain is running (typically from inside a
//! handler) is picked up by that same drain, in arrival order. No lock is
//! held while user callbacks run.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};

use super::channel::{ChannelDescriptor, ChannelId, ChannelRegistry};
use super::command::{Command, CommandKind, SubscribeRequest};
use super::diagnostics::{DiagnosticSink, TracingSink};
use super::subscription::{
    Callback, CallbackIdentity, Invocation, Role, Scheduler, SubscribeFlags, Subscription,
};
use super::typed::{Arguments, Channel};
use crate::error::{BusError, BusResult};
use crate::value::Value;

/// Configuration for the event bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Initial capacity of the command queue.
    pub queue_capacity: usize,
    /// Queue depth at which a possible dispatch feedback loop is reported.
    pub queue_warn_depth: usize,
    /// Remove subscriptions whose target has been dropped when a dispatch
    /// reaches them.
    pub prune_dead_targets: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            queue_warn_depth: 1024,
            prune_dead_targets: true,
        }
    }
}

/// FIFO of pending commands plus the drain state
struct CommandQueue {
    pending: VecDeque<Command>,
    draining: bool,
}

/// Listener and watcher lists keyed by channel
#[derive(Default)]
struct SubscriberTable {
    listeners: HashMap<ChannelId, Vec<Arc<Subscription>>>,
    watchers: HashMap<ChannelId, Vec<Arc<Subscription>>>,
}

impl SubscriberTable {
    fn list(&self, role: Role, channel: &ChannelId) -> Option<&Vec<Arc<Subscription>>> {
        match role {
            Role::Listener => self.listeners.get(channel),
            Role::Watcher => self.watchers.get(channel),
        }
    }

    fn list_mut(
        &mut self,
        role: Role,
        channel: &ChannelId,
    ) -> Option<&mut Vec<Arc<Subscription>>> {
        match role {
            Role::Listener => self.listeners.get_mut(channel),
            Role::Watcher => self.watchers.get_mut(channel),
        }
    }
}

/// Resets the drain flag if a handler unwinds through the drain loop, so
/// the commands still queued are picked up by the next enqueue.
struct DrainGuard<'a> {
    queue: &'a Mutex<CommandQueue>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.queue.lock().draining = false;
        }
    }
}

/// Central event bus: channel registry, subscriber lists and command queue
pub struct EventBus {
    registry: RwLock<ChannelRegistry>,
    subscribers: RwLock<SubscriberTable>,
    queue: Mutex<CommandQueue>,
    scheduler: RwLock<Option<Arc<dyn Scheduler>>>,
    sink: Arc<dyn DiagnosticSink>,
    config: BusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: BusConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create a new event bus reporting failures to `sink`
    pub fn with_sink(config: BusConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            registry: RwLock::new(ChannelRegistry::default()),
            subscribers: RwLock::new(SubscriberTable::default()),
            queue: Mutex::new(CommandQueue {
                pending: VecDeque::with_capacity(config.queue_capacity),
                draining: false,
            }),
            scheduler: RwLock::new(None),
            sink,
            config,
        }
    }

    /// Install the host facility used for deferred subscriptions
    pub fn set_scheduler(&self, scheduler: Arc<dyn Scheduler>) {
        *self.scheduler.write() = Some(scheduler);
    }

    /// Remove the host scheduler; deferred subscriptions then run inline
    pub fn clear_scheduler(&self) {
        *self.scheduler.write() = None;
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Register an event kind.
    ///
    /// Registering an id twice reports `DuplicateChannel` and keeps the
    /// first descriptor.
    pub fn register_channel(&self, descriptor: ChannelDescriptor) {
        self.enqueue(Command::Register(descriptor));
    }

    /// Register a whole bootstrap table, in order
    pub fn register_all<I>(&self, descriptors: I)
    where
        I: IntoIterator<Item = ChannelDescriptor>,
    {
        for descriptor in descriptors {
            self.register_channel(descriptor);
        }
    }

    /// Register a statically declared channel
    pub fn register<C: Channel>(&self) {
        self.register_channel(C::descriptor());
    }

    // ---------------------------------------------------------------------
    // Subscription
    // ---------------------------------------------------------------------

    /// Subscribe `callback` as a listener of `channel`.
    ///
    /// The callback's declared parameters are checked against the channel
    /// signature followed by `binds`.
    pub fn listen(
        &self,
        channel: impl Into<ChannelId>,
        callback: Callback,
        flags: SubscribeFlags,
        binds: Vec<Value>,
    ) {
        self.enqueue(Command::Listen(SubscribeRequest {
            channel: channel.into(),
            callback,
            flags,
            binds,
        }));
    }

    /// Subscribe `callback` as a watcher of `channel`.
    ///
    /// Watchers receive only `binds`, never the dispatch arguments, so they
    /// are not checked against the channel signature.
    pub fn watch(
        &self,
        channel: impl Into<ChannelId>,
        callback: Callback,
        flags: SubscribeFlags,
        binds: Vec<Value>,
    ) {
        self.enqueue(Command::Watch(SubscribeRequest {
            channel: channel.into(),
            callback,
            flags,
            binds,
        }));
    }

    /// Remove the first listener and the first watcher matching `identity`.
    ///
    /// Forgetting something that is not subscribed is not an error.
    pub fn forget(&self, channel: impl Into<ChannelId>, identity: impl Into<CallbackIdentity>) {
        self.enqueue(Command::Forget {
            channel: channel.into(),
            identity: identity.into(),
        });
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Deliver `args` to every listener of `channel`, then notify watchers
    pub fn dispatch(&self, channel: impl Into<ChannelId>, args: Vec<Value>) {
        self.enqueue(Command::Dispatch {
            channel: channel.into(),
            args,
        });
    }

    /// Dispatch a statically declared channel
    pub fn emit<C: Channel>(&self, args: C::Args) {
        self.dispatch(C::id(), args.into_values());
    }

    // ---------------------------------------------------------------------
    // Discovery
    // ---------------------------------------------------------------------

    /// Known categories, in first-registration order
    pub fn list_categories(&self) -> Vec<String> {
        self.registry.read().categories()
    }

    /// Channel names under `category`; empty if the category is unknown
    pub fn list_channel_names(&self, category: &str) -> Vec<String> {
        self.registry.read().channel_names(category)
    }

    /// Find a channel by category and name
    pub fn resolve_channel(&self, category: &str, name: &str) -> Option<ChannelId> {
        self.registry.read().resolve(category, name)
    }

    /// Description of a channel; empty if unknown
    pub fn describe_channel(&self, channel: &ChannelId) -> String {
        self.registry.read().description(channel)
    }

    /// Full descriptor of a registered channel
    pub fn channel(&self, channel: &ChannelId) -> Option<ChannelDescriptor> {
        self.registry.read().get(channel).cloned()
    }

    /// Number of registered channels
    pub fn channel_count(&self) -> usize {
        self.registry.read().len()
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// Listeners currently subscribed to `channel`
    pub fn listener_count(&self, channel: &ChannelId) -> usize {
        self.subscribers
            .read()
            .list(Role::Listener, channel)
            .map_or(0, Vec::len)
    }

    /// Watchers currently subscribed to `channel`
    pub fn watcher_count(&self, channel: &ChannelId) -> usize {
        self.subscribers
            .read()
            .list(Role::Watcher, channel)
            .map_or(0, Vec::len)
    }

    /// Whether a drain loop is running
    pub fn is_draining(&self) -> bool {
        self.queue.lock().draining
    }

    /// Commands waiting behind the one being applied
    pub fn pending_commands(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Get the current configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Queue and drain loop
    // ---------------------------------------------------------------------

    fn enqueue(&self, command: Command) {
        {
            let mut queue = self.queue.lock();
            tracing::trace!(
                kind = %command.kind(),
                channel = %command.channel(),
                draining = queue.draining,
                "Command queued"
            );
            queue.pending.push_back(command);

            let depth = queue.pending.len();
            if depth == self.config.queue_warn_depth {
                tracing::warn!(
                    depth,
                    "Command queue is deep, handlers may be dispatching in a loop"
                );
            }

            if queue.draining {
                return;
            }
            queue.draining = true;
        }

        self.drain();
    }

    fn drain(&self) {
        let _guard = DrainGuard { queue: &self.queue };
        let mut applied = 0usize;

        loop {
            let command = {
                let mut queue = self.queue.lock();
                match queue.pending.pop_front() {
                    Some(command) => command,
                    None => {
                        queue.draining = false;
                        break;
                    }
                }
            };

            self.apply(command);
            applied += 1;
        }

        tracing::trace!(applied, "Drain finished");
    }

    fn apply(&self, command: Command) {
        let result = match command {
            Command::Register(descriptor) => self.apply_register(descriptor),
            Command::Listen(request) => self.apply_listen(request),
            Command::Watch(request) => self.apply_watch(request),
            Command::Dispatch { channel, args } => self.apply_dispatch(&channel, &args),
            Command::Forget { channel, identity } => self.apply_forget(&channel, &identity),
        };

        if let Err(error) = result {
            self.sink.report(&error);
        }
    }

    fn apply_register(&self, descriptor: ChannelDescriptor) -> BusResult<()> {
        let channel = descriptor.id.clone();
        let category = descriptor.category.clone();
        self.registry.write().insert(descriptor)?;

        let mut table = self.subscribers.write();
        table.listeners.entry(channel.clone()).or_default();
        table.watchers.entry(channel.clone()).or_default();

        tracing::debug!(channel = %channel, category = %category, "Registered channel");
        Ok(())
    }

    fn apply_listen(&self, request: SubscribeRequest) -> BusResult<()> {
        let SubscribeRequest {
            channel,
            callback,
            flags,
            binds,
        } = request;

        let signature = self
            .registry
            .read()
            .get(&channel)
            .map(|descriptor| descriptor.signature.clone())
            .ok_or_else(|| BusError::UnknownChannel {
                channel: channel.clone(),
                operation: CommandKind::Listen,
            })?;

        callback
            .params()
            .check_listener(&signature, &binds)
            .map_err(|reason| BusError::ParameterMismatch {
                channel: channel.clone(),
                entry: callback.entry().to_string(),
                reason,
            })?;

        self.add_subscription(channel, Role::Listener, callback, flags, binds)
    }

    fn apply_watch(&self, request: SubscribeRequest) -> BusResult<()> {
        let SubscribeRequest {
            channel,
            callback,
            flags,
            binds,
        } = request;

        if !self.registry.read().contains(&channel) {
            return Err(BusError::UnknownChannel {
                channel,
                operation: CommandKind::Watch,
            });
        }

        self.add_subscription(channel, Role::Watcher, callback, flags, binds)
    }

    fn add_subscription(
        &self,
        channel: ChannelId,
        role: Role,
        callback: Callback,
        flags: SubscribeFlags,
        binds: Vec<Value>,
    ) -> BusResult<()> {
        let operation = match role {
            Role::Listener => CommandKind::Listen,
            Role::Watcher => CommandKind::Watch,
        };

        let mut table = self.subscribers.write();
        let Some(list) = table.list_mut(role, &channel) else {
            return Err(BusError::UnknownChannel { channel, operation });
        };

        if list.iter().any(|existing| existing.matches(callback.identity())) {
            return Err(BusError::DuplicateSubscription {
                channel,
                entry: callback.entry().to_string(),
                role,
            });
        }

        tracing::debug!(
            channel = %channel,
            entry = callback.entry(),
            %role,
            %flags,
            "Subscribed"
        );
        list.push(Arc::new(Subscription::new(callback, flags, role, binds)));
        Ok(())
    }

    fn apply_dispatch(&self, channel: &ChannelId, args: &[Value]) -> BusResult<()> {
        if !self.registry.read().contains(channel) {
            return Err(BusError::UnknownChannel {
                channel: channel.clone(),
                operation: CommandKind::Dispatch,
            });
        }

        let scheduler = self.scheduler.read().clone();
        let listeners = self.run_phase(channel, Role::Listener, args, scheduler.as_ref());

        if !self.subscribers.read().watchers.contains_key(channel) {
            return Err(BusError::UnknownChannel {
                channel: channel.clone(),
                operation: CommandKind::Dispatch,
            });
        }

        // Watchers never see the dispatch arguments
        let watchers = self.run_phase(channel, Role::Watcher, &[], scheduler.as_ref());

        tracing::trace!(channel = %channel, listeners, watchers, "Dispatched");
        Ok(())
    }

    /// Invoke one role's subscriptions from last-added to first-added.
    ///
    /// Lists only change inside the drain loop, so walking indices downward
    /// keeps every not-yet-visited index valid across one-shot removals.
    /// Returns how many subscriptions accepted the call.
    fn run_phase(
        &self,
        channel: &ChannelId,
        role: Role,
        args: &[Value],
        scheduler: Option<&Arc<dyn Scheduler>>,
    ) -> usize {
        let len = self
            .subscribers
            .read()
            .list(role, channel)
            .map_or(0, Vec::len);
        let mut delivered = 0;

        for index in (0..len).rev() {
            let subscription = {
                let table = self.subscribers.read();
                match table.list(role, channel).and_then(|list| list.get(index)) {
                    Some(subscription) => Arc::clone(subscription),
                    None => continue,
                }
            };

            if !subscription.is_alive() {
                if self.config.prune_dead_targets {
                    tracing::debug!(
                        channel = %channel,
                        entry = subscription.entry(),
                        role = %subscription.role(),
                        "Pruned subscription of dropped target"
                    );
                    self.remove_at(role, channel, index, &subscription);
                }
                continue;
            }

            match subscription.invoke(args, scheduler) {
                Ok(invocation) => {
                    delivered += 1;
                    if invocation == Invocation::Deferred {
                        tracing::trace!(entry = subscription.entry(), "Invocation deferred");
                    }
                    if subscription.is_one_shot() {
                        self.remove_at(role, channel, index, &subscription);
                    }
                }
                Err(reason) => self.sink.report(&BusError::ParameterMismatch {
                    channel: channel.clone(),
                    entry: subscription.entry().to_string(),
                    reason,
                }),
            }
        }

        delivered
    }

    fn remove_at(
        &self,
        role: Role,
        channel: &ChannelId,
        index: usize,
        subscription: &Arc<Subscription>,
    ) {
        let mut table = self.subscribers.write();
        if let Some(list) = table.list_mut(role, channel) {
            if list
                .get(index)
                .is_some_and(|current| Arc::ptr_eq(current, subscription))
            {
                list.remove(index);
            }
        }
    }

    fn apply_forget(&self, channel: &ChannelId, identity: &CallbackIdentity) -> BusResult<()> {
        if !self.registry.read().contains(channel) {
            return Err(BusError::UnknownChannel {
                channel: channel.clone(),
                operation: CommandKind::Forget,
            });
        }

        let mut table = self.subscribers.write();
        let listener = table
            .listeners
            .get_mut(channel)
            .is_some_and(|list| remove_first(list, identity));
        let watcher = table
            .watchers
            .get_mut(channel)
            .is_some_and(|list| remove_first(list, identity));

        tracing::debug!(
            channel = %channel,
            entry = identity.entry(),
            listener,
            watcher,
            "Forgot subscription"
        );
        Ok(())
    }
}

fn remove_first(list: &mut Vec<Arc<Subscription>>, identity: &CallbackIdentity) -> bool {
    match list.iter().position(|subscription| subscription.matches(identity)) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channel_count())
            .field("draining", &self.is_draining())
            .field("config", &self.config)
            .finish()
    }
}

/// Global event bus instance
static EVENT_BUS: OnceLock<EventBus> = OnceLock::new();

/// Get or initialize the global event bus
///
/// Created lazily, at most once, on first access; lives for the rest of the
/// process. Tests should prefer their own [`EventBus::new`] instances.
pub fn event_bus() -> &'static EventBus {
    EVENT_BUS.get_or_init(EventBus::new)
}

/// Initialize the global event bus with custom configuration
///
/// Must be called before any calls to `event_bus()`. Hands the rejected
/// configuration back if the bus has already been initialized.
pub fn init_event_bus(config: BusConfig) -> Result<(), BusConfig> {
    EVENT_BUS
        .set(EventBus::with_config(config))
        .map_err(|bus| bus.config)
}

/// Convenience macro to dispatch on the global event bus
///
/// Each argument is converted with `Value::from`.
#[macro_export]
macro_rules! dispatch {
    ($channel:expr $(, $arg:expr)* $(,)?) => {
        $crate::event_bus::event_bus().dispatch($channel, vec![$($crate::Value::from($arg)),*])
    };
}

/// Convenience macro to listen on the global event bus
#[macro_export]
macro_rules! listen {
    ($channel:expr, $callback:expr) => {
        $crate::event_bus::event_bus().listen(
            $channel,
            $callback,
            $crate::SubscribeFlags::NONE,
            ::std::vec::Vec::new(),
        )
    };
    ($channel:expr, $callback:expr, $flags:expr $(, $bind:expr)* $(,)?) => {
        $crate::event_bus::event_bus().listen(
            $channel,
            $callback,
            $flags,
            vec![$($crate::Value::from($bind)),*],
        )
    };
}
