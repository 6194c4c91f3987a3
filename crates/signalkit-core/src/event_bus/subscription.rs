//! Callbacks, subscription flags and bound subscriptions.

use std::borrow::Cow;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::{Arc, Weak};

use crate::types::{ArgCheckFn, DeferredCall, HandlerFn};
use crate::value::{ShapeError, Signature, Value};

/// A host object that owns event handlers.
///
/// The bus only ever holds a [`Weak`] reference to a target; dropping the
/// last strong handle silently retires every subscription it owns.
pub trait Target: Send + Sync + 'static {
    /// Whether calls flagged [`SubscribeFlags::DEFERRED`] may be handed to
    /// the host scheduler instead of running synchronously.
    fn accepts_deferred(&self) -> bool {
        false
    }
}

/// Host facility that runs a call later, on the host's own schedule
pub trait Scheduler: Send + Sync {
    fn defer(&self, call: DeferredCall);
}

/// Behavior flags of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubscribeFlags(u8);

impl SubscribeFlags {
    pub const NONE: Self = Self(0);
    /// Remove the subscription after its first successful invocation.
    pub const ONE_SHOT: Self = Self(1);
    /// Run through the host scheduler when the target supports it.
    pub const DEFERRED: Self = Self(1 << 1);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_one_shot(self) -> bool {
        self.contains(Self::ONE_SHOT)
    }

    pub const fn is_deferred(self) -> bool {
        self.contains(Self::DEFERRED)
    }
}

impl BitOr for SubscribeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SubscribeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for SubscribeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_one_shot(), self.is_deferred()) {
            (false, false) => write!(f, "none"),
            (true, false) => write!(f, "one-shot"),
            (false, true) => write!(f, "deferred"),
            (true, true) => write!(f, "one-shot|deferred"),
        }
    }
}

/// Whether a subscription consumes dispatch arguments or only observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Receives the dispatch arguments followed by its bound arguments.
    Listener,
    /// Receives only its bound arguments.
    Watcher,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Listener => write!(f, "listener"),
            Role::Watcher => write!(f, "watcher"),
        }
    }
}

/// Identity of a callback: the target's address and the entry point name.
///
/// Two callbacks with the same identity are the same registration regardless
/// of their flags or bound arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackIdentity {
    target: Option<usize>,
    entry: Cow<'static, str>,
}

impl CallbackIdentity {
    /// Identity of a method on `target`
    pub fn method<T: Target>(target: &Arc<T>, entry: impl Into<Cow<'static, str>>) -> Self {
        Self {
            target: Some(target_addr(target)),
            entry: entry.into(),
        }
    }

    /// Identity of a target-less function
    pub fn free(entry: impl Into<Cow<'static, str>>) -> Self {
        Self {
            target: None,
            entry: entry.into(),
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl From<&Callback> for CallbackIdentity {
    fn from(callback: &Callback) -> Self {
        callback.identity.clone()
    }
}

fn target_addr<T>(target: &Arc<T>) -> usize {
    Arc::as_ptr(target) as *const () as usize
}

/// A bound entry point plus its declared parameter shape
#[derive(Clone)]
pub struct Callback {
    target: Option<Weak<dyn Target>>,
    identity: CallbackIdentity,
    params: Signature,
    guard: Option<ArgCheckFn>,
    func: HandlerFn,
}

impl Callback {
    /// Callback on a method of `target`.
    ///
    /// Only a weak reference to the target is kept.
    pub fn method<T, F>(
        target: &Arc<T>,
        entry: impl Into<Cow<'static, str>>,
        params: Signature,
        f: F,
    ) -> Self
    where
        T: Target,
        F: Fn(&T, &[Value]) + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(target);
        let handle = weak.clone();
        let func: HandlerFn = Arc::new(move |args: &[Value]| {
            if let Some(target) = handle.upgrade() {
                f(&*target, args);
            }
        });
        let owner: Weak<dyn Target> = weak;

        Self {
            target: Some(owner),
            identity: CallbackIdentity::method(target, entry),
            params,
            guard: None,
            func,
        }
    }

    /// Callback with no owning target
    pub fn free<F>(entry: impl Into<Cow<'static, str>>, params: Signature, f: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        Self {
            target: None,
            identity: CallbackIdentity::free(entry),
            params,
            guard: None,
            func: Arc::new(f),
        }
    }

    pub fn identity(&self) -> &CallbackIdentity {
        &self.identity
    }

    pub fn entry(&self) -> &str {
        self.identity.entry()
    }

    /// Declared parameter shape
    pub fn params(&self) -> &Signature {
        &self.params
    }

    /// Add a check that runs after the declared parameter check. A failing
    /// guard rejects the call the same way a shape mismatch does.
    pub fn with_guard<G>(mut self, guard: G) -> Self
    where
        G: Fn(&[Value]) -> Result<(), ShapeError> + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Validate a combined argument list without calling
    pub fn check_args(&self, args: &[Value]) -> Result<(), ShapeError> {
        self.params.check_args(args)?;
        match &self.guard {
            Some(guard) => guard(args),
            None => Ok(()),
        }
    }

    /// False once the owning target has been dropped
    pub fn is_alive(&self) -> bool {
        match &self.target {
            Some(weak) => weak.strong_count() > 0,
            None => true,
        }
    }

    /// Capability check for deferred invocation
    pub fn accepts_deferred(&self) -> bool {
        self.target
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|target| target.accepts_deferred())
    }

    /// Run the callback synchronously, unchecked.
    pub fn call(&self, args: &[Value]) {
        (self.func)(args)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("entry", &self.identity.entry)
            .field("target", &self.identity.target)
            .field("params", &self.params)
            .field("guarded", &self.guard.is_some())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// How an accepted invocation was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invocation {
    Immediate,
    Deferred,
}

/// A callback registered on one channel, in one role
#[derive(Debug)]
pub(crate) struct Subscription {
    callback: Callback,
    flags: SubscribeFlags,
    role: Role,
    binds: Vec<Value>,
}

impl Subscription {
    pub fn new(callback: Callback, flags: SubscribeFlags, role: Role, binds: Vec<Value>) -> Self {
        Self {
            callback,
            flags,
            role,
            binds,
        }
    }

    /// Same registration as `identity`. A dropped target's address may be
    /// reused, so dead subscriptions never match.
    pub fn matches(&self, identity: &CallbackIdentity) -> bool {
        self.callback.is_alive() && self.callback.identity() == identity
    }

    pub fn entry(&self) -> &str {
        self.callback.entry()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_one_shot(&self) -> bool {
        self.flags.is_one_shot()
    }

    pub fn is_alive(&self) -> bool {
        self.callback.is_alive()
    }

    /// Append bound arguments, validate against the callback's shape, then
    /// either defer through `scheduler` or call synchronously.
    pub fn invoke(
        &self,
        dispatch_args: &[Value],
        scheduler: Option<&Arc<dyn Scheduler>>,
    ) -> Result<Invocation, ShapeError> {
        let mut args = Vec::with_capacity(dispatch_args.len() + self.binds.len());
        args.extend_from_slice(dispatch_args);
        args.extend(self.binds.iter().cloned());

        self.callback.check_args(&args)?;

        if self.flags.is_deferred() && self.callback.accepts_deferred() {
            match scheduler {
                Some(scheduler) => {
                    let callback = self.callback.clone();
                    scheduler.defer(Box::new(move || callback.call(&args)));
                    return Ok(Invocation::Deferred);
                }
                None => tracing::trace!(
                    entry = self.entry(),
                    "No scheduler installed, calling deferred subscription synchronously"
                ),
            }
        }

        self.callback.call(&args);
        Ok(Invocation::Immediate)
    }
}
