//! Type aliases for commonly used complex types.
//!
//! Complex types like `Arc<dyn Fn(&[Value]) + Send + Sync>` are hard to read
//! at a glance. The aliases below give them names that convey intent and
//! keep the underlying type in one place.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::value::{ShapeError, Value};

// =============================================================================
// CALLBACK TYPES
// =============================================================================

/// Type-erased handler body invoked with the combined argument list.
///
/// Shared rather than boxed so a deferred call can keep its own handle.
pub type HandlerFn = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Extra argument check run after the declared parameter check.
pub type ArgCheckFn = Arc<dyn Fn(&[Value]) -> Result<(), ShapeError> + Send + Sync>;

/// A call handed to the host scheduler, run at most once.
pub type DeferredCall = Box<dyn FnOnce() + Send>;

// =============================================================================
// THREAD-SAFE SHARED TYPES
// =============================================================================

/// A thread-safe, mutex-protected wrapper for cross-thread sharing.
///
/// Uses `parking_lot::Mutex` for better performance than `std::sync::Mutex`.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// Create a new ThreadSafe wrapper
#[inline]
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}
