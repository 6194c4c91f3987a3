//! Type system utilities and aliases.
//!
//! This module provides type aliases for the closure and lock types that
//! appear throughout the bus.
//!
//! ## Modules
//!
//! - [`aliases`]: Handler, argument guard and deferred-call closures, the
//!   shared mutex wrapper.

pub mod aliases;

pub use aliases::*;
