//! Channel identifiers, descriptors and the registry that indexes them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::bus::EventBus;
use crate::error::{BusError, BusResult};
use crate::value::Signature;

/// Opaque key of a registered event kind.
///
/// Cheap to clone. The key doubles as the channel's display name, which is
/// what [`EventBus::resolve_channel`] matches within a category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&ChannelId> for ChannelId {
    fn from(id: &ChannelId) -> Self {
        id.clone()
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0.to_string()
    }
}

/// Static metadata for one event kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Unique id; written as `name` in manifests.
    #[serde(rename = "name")]
    pub id: ChannelId,
    /// Grouping used for discovery.
    pub category: String,
    /// Human readable purpose of the event.
    #[serde(default)]
    pub description: String,
    /// Parameters every dispatch carries.
    #[serde(default)]
    pub signature: Signature,
}

impl ChannelDescriptor {
    pub fn new(id: impl Into<ChannelId>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            description: String::new(),
            signature: Signature::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }
}

/// Registry of channels: id -> descriptor, plus category -> channels in
/// registration order.
#[derive(Debug, Default)]
pub(crate) struct ChannelRegistry {
    channels: HashMap<ChannelId, ChannelDescriptor>,
    categories: IndexMap<String, Vec<ChannelId>>,
}

impl ChannelRegistry {
    /// Add a channel; an existing id is never overwritten.
    pub fn insert(&mut self, descriptor: ChannelDescriptor) -> BusResult<()> {
        if self.channels.contains_key(&descriptor.id) {
            return Err(BusError::DuplicateChannel {
                channel: descriptor.id,
            });
        }

        self.categories
            .entry(descriptor.category.clone())
            .or_default()
            .push(descriptor.id.clone());
        self.channels.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, id: &ChannelId) -> Option<&ChannelDescriptor> {
        self.channels.get(id)
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.channels.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    pub fn channel_names(&self, category: &str) -> Vec<String> {
        self.categories
            .get(category)
            .map(|ids| ids.iter().map(|id| id.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn resolve(&self, category: &str, name: &str) -> Option<ChannelId> {
        self.categories
            .get(category)?
            .iter()
            .find(|id| id.as_str() == name)
            .cloned()
    }

    pub fn description(&self, id: &ChannelId) -> String {
        self.channels
            .get(id)
            .map(|descriptor| descriptor.description.clone())
            .unwrap_or_default()
    }
}

/// A channel referenced by category and name.
///
/// Stored in configuration and editor data where the channel's Rust type is
/// not known; resolved against a live bus when needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChannelRef {
    pub category: String,
    pub name: String,
}

impl ChannelRef {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Whether both parts have been filled in
    pub fn is_set(&self) -> bool {
        !self.category.is_empty() && !self.name.is_empty()
    }

    /// Look the channel up, warning when it does not exist
    pub fn resolve(&self, bus: &EventBus) -> Option<ChannelId> {
        let resolved = bus.resolve_channel(&self.category, &self.name);
        if resolved.is_none() {
            tracing::warn!(
                category = %self.category,
                name = %self.name,
                "Invalid channel reference, check the category and select a channel"
            );
        }
        resolved
    }

    /// Description of the referenced channel, empty if unresolved
    pub fn description(&self, bus: &EventBus) -> String {
        bus.resolve_channel(&self.category, &self.name)
            .map(|id| bus.describe_channel(&id))
            .unwrap_or_default()
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}
