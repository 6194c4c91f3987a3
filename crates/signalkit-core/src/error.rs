//! Error handling for SignalKit
//!
//! The bus never returns these across its public boundary. Every failure
//! is handed to the bus's [`DiagnosticSink`](crate::DiagnosticSink) and the
//! triggering operation becomes a no-op, so a single misconfigured
//! subscriber cannot block delivery to the others.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::event_bus::{ChannelId, CommandKind, Role};
use crate::value::ShapeError;

/// How loudly a failure is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Recoverable misuse; the operation was ignored.
    Warning,
    /// A handler or subscription was rejected outright.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Bus error type
///
/// One variant per failure kind the bus can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    /// A channel with this id is already registered
    #[error("Duplicated channel: {channel}")]
    DuplicateChannel {
        /// The id that was registered twice.
        channel: ChannelId,
    },

    /// The operation referenced a channel that was never registered
    #[error("Channel not found: {channel} ({operation})")]
    UnknownChannel {
        /// The unknown channel id.
        channel: ChannelId,
        /// The operation that referenced it.
        operation: CommandKind,
    },

    /// A callback's declared shape disagrees with a channel or a call
    #[error("Failed to validate params of '{entry}' @ {channel}: {reason}")]
    ParameterMismatch {
        /// The channel being listened to or dispatched.
        channel: ChannelId,
        /// Entry point name of the callback.
        entry: String,
        /// What exactly did not fit.
        #[source]
        reason: ShapeError,
    },

    /// The same (target, entry point) is already subscribed in this role
    #[error("Duplicated {role} '{entry}' @ {channel}")]
    DuplicateSubscription {
        /// The channel subscribed to.
        channel: ChannelId,
        /// Entry point name of the callback.
        entry: String,
        /// Listener or watcher list that already holds it.
        role: Role,
    },
}

impl BusError {
    /// Severity this failure is reported at
    pub fn severity(&self) -> Severity {
        match self {
            BusError::ParameterMismatch { .. } => Severity::Error,
            BusError::DuplicateChannel { .. }
            | BusError::UnknownChannel { .. }
            | BusError::DuplicateSubscription { .. } => Severity::Warning,
        }
    }

    /// The channel this failure concerns
    pub fn channel(&self) -> &ChannelId {
        match self {
            BusError::DuplicateChannel { channel }
            | BusError::UnknownChannel { channel, .. }
            | BusError::ParameterMismatch { channel, .. }
            | BusError::DuplicateSubscription { channel, .. } => channel,
        }
    }

    /// Short stable name of the failure kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            BusError::DuplicateChannel { .. } => "duplicate_channel",
            BusError::UnknownChannel { .. } => "unknown_channel",
            BusError::ParameterMismatch { .. } => "parameter_mismatch",
            BusError::DuplicateSubscription { .. } => "duplicate_subscription",
        }
    }

    pub fn is_unknown_channel(&self) -> bool {
        matches!(self, BusError::UnknownChannel { .. })
    }

    pub fn is_parameter_mismatch(&self) -> bool {
        matches!(self, BusError::ParameterMismatch { .. })
    }
}

/// Result type using BusError
pub type BusResult<T> = std::result::Result<T, BusError>;
