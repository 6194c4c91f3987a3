//! Queued bus operations.

use std::fmt;

use super::channel::{ChannelDescriptor, ChannelId};
use super::subscription::{Callback, CallbackIdentity, SubscribeFlags};
use crate::value::Value;

/// Operation kind of a queued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Register,
    Listen,
    Watch,
    Dispatch,
    Forget,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Register => write!(f, "register"),
            CommandKind::Listen => write!(f, "listen"),
            CommandKind::Watch => write!(f, "watch"),
            CommandKind::Dispatch => write!(f, "dispatch"),
            CommandKind::Forget => write!(f, "forget"),
        }
    }
}

/// Payload shared by listen and watch
#[derive(Debug)]
pub(crate) struct SubscribeRequest {
    pub channel: ChannelId,
    pub callback: Callback,
    pub flags: SubscribeFlags,
    pub binds: Vec<Value>,
}

/// One bus operation, consumed exactly once by the drain loop
#[derive(Debug)]
pub(crate) enum Command {
    Register(ChannelDescriptor),
    Listen(SubscribeRequest),
    Watch(SubscribeRequest),
    Dispatch {
        channel: ChannelId,
        args: Vec<Value>,
    },
    Forget {
        channel: ChannelId,
        identity: CallbackIdentity,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Register(_) => CommandKind::Register,
            Command::Listen(_) => CommandKind::Listen,
            Command::Watch(_) => CommandKind::Watch,
            Command::Dispatch { .. } => CommandKind::Dispatch,
            Command::Forget { .. } => CommandKind::Forget,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        match self {
            Command::Register(descriptor) => &descriptor.id,
            Command::Listen(request) | Command::Watch(request) => &request.channel,
            Command::Dispatch { channel, .. } | Command::Forget { channel, .. } => channel,
        }
    }
}
