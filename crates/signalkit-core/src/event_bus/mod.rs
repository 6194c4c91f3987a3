//! # Event Bus Module
//!
//! Named channels with typed arguments, decoupling the code that reports an
//! occurrence from the code that reacts to it.
//!
//! ## Overview
//!
//! - Channels are registered once, with a category and a parameter signature
//! - Listeners receive the dispatch arguments followed by their bound arguments
//! - Watchers are told that a dispatch happened and receive only bound arguments
//! - Every operation goes through one FIFO queue, so handlers may freely
//!   listen, forget or dispatch while a dispatch is running
//!
//! ## Usage
//!
//! ```rust,ignore
//! use signalkit_core::event_bus::{
//!     event_bus, Callback, CallbackIdentity, ChannelDescriptor, SubscribeFlags,
//! };
//! use signalkit_core::value::{Signature, ValueType};
//!
//! let bus = event_bus();
//! bus.register_channel(
//!     ChannelDescriptor::new("Damaged", "Combat")
//!         .with_signature(Signature::new().param("amount", ValueType::Int)),
//! );
//!
//! bus.listen(
//!     "Damaged",
//!     Callback::method(
//!         &hud,
//!         "on_damaged",
//!         Signature::new().param("amount", ValueType::Int),
//!         |hud, args| hud.flash(args[0].as_int().unwrap_or_default()),
//!     ),
//!     SubscribeFlags::NONE,
//!     vec![],
//! );
//!
//! bus.dispatch("Damaged", vec![12.into()]);
//! bus.forget("Damaged", CallbackIdentity::method(&hud, "on_damaged"));
//! ```

mod bus;
mod channel;
mod command;
mod diagnostics;
mod subscription;
mod typed;

pub use bus::*;
pub use channel::*;
pub use command::CommandKind;
pub use diagnostics::*;
pub use subscription::{Callback, CallbackIdentity, Role, Scheduler, SubscribeFlags, Target};
pub use typed::*;
