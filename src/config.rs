//! Runtime configuration
//!
//! Configuration is plain serde data so applications can keep it in a JSON
//! file next to their assets. Missing fields fall back to the defaults.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::view::DelegationStrategy;

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The fixed set of events an `EventSubscriber` listens to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventSubscriberConfig {
    pub events: Vec<String>,
}

impl EventSubscriberConfig {
    pub fn new<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            events: events.into_iter().map(Into::into).collect(),
        }
    }
}

/// Element name to property name to the events that signal a change
pub type SubscriberTable = HashMap<String, HashMap<String, EventSubscriberConfig>>;

/// Settings for an Orbit runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Strategy used by listener bindings that do not pick one
    pub default_strategy: DelegationStrategy,

    /// Number of views each factory keeps for reuse
    pub view_cache_size: usize,

    /// Events observed for two-way bound element properties
    pub subscribers: SubscriberTable,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_strategy: DelegationStrategy::Bubbling,
            view_cache_size: 0,
            subscribers: default_subscribers(),
        }
    }
}

fn default_subscribers() -> SubscriberTable {
    let rules: [(&str, &str, &[&str]); 6] = [
        ("input", "value", &["change", "input"]),
        ("input", "checked", &["change"]),
        ("input", "files", &["change"]),
        ("select", "value", &["change"]),
        ("textarea", "value", &["change", "input"]),
        (
            "[contenteditable]",
            "textContent",
            &["change", "input", "blur", "keyup", "paste"],
        ),
    ];

    let mut table = SubscriberTable::new();
    for (element, property, events) in rules {
        table
            .entry(element.to_owned())
            .or_default()
            .insert(property.to_owned(), EventSubscriberConfig::new(events.iter().copied()));
    }
    table
}

impl RuntimeConfig {
    /// Parse configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Events to observe for `property` on elements named `element`
    pub fn subscriber_config(&self, element: &str, property: &str) -> Option<&EventSubscriberConfig> {
        self.subscribers
            .get(&element.to_ascii_lowercase())
            .and_then(|properties| properties.get(property))
    }
}
