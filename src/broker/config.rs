//! Broker configuration.

use crate::broker::error::BrokerError;
use crate::broker::strategy::QueueStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Where queue drains run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// On the thread that triggered the drain
    #[default]
    Inline,
    /// On one dedicated dispatcher thread
    Thread,
    /// On one task of the current Tokio runtime
    Tokio,
}

/// Settings used by [`Broker::from_config`](crate::broker::engine::Broker::from_config)
///
/// ```
/// use broker_rs::broker::config::{BrokerConfig, DispatchMode};
///
/// let config = BrokerConfig::from_json_str(r#"{ "name": "night-desk", "dispatch": "thread" }"#)?;
/// assert_eq!(config.dispatch, DispatchMode::Thread);
/// # Ok::<(), broker_rs::BrokerError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker name, used in log output
    pub name: String,
    /// Dispatch model of every queue the broker creates
    pub dispatch: DispatchMode,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: "broker".to_string(),
            dispatch: DispatchMode::Inline,
        }
    }
}

impl BrokerConfig {
    /// Create a configuration with the given name and inline dispatch
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set the dispatch mode
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Parse a JSON document. Missing fields take their default.
    ///
    /// # Errors
    ///
    /// `Config` when the document is not valid.
    pub fn from_json_str(json: &str) -> Result<Self, BrokerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file
    ///
    /// # Errors
    ///
    /// `Config` when the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BrokerError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading broker configuration");
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize to pretty-printed JSON
    ///
    /// # Errors
    ///
    /// `Config` if serialization fails.
    pub fn to_json(&self) -> Result<String, BrokerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the queue strategy for the configured dispatch mode.
    ///
    /// # Errors
    ///
    /// `Configuration` when the dispatcher thread cannot be spawned, or for
    /// [`DispatchMode::Tokio`] outside a Tokio runtime.
    pub fn strategy(&self) -> Result<QueueStrategy, BrokerError> {
        match self.dispatch {
            DispatchMode::Inline => Ok(QueueStrategy::Inline),
            DispatchMode::Thread => QueueStrategy::thread(),
            DispatchMode::Tokio => {
                let handle = tokio::runtime::Handle::try_current().map_err(|e| {
                    BrokerError::Configuration(format!("tokio dispatch needs a runtime: {e}"))
                })?;
                Ok(QueueStrategy::tokio(handle))
            }
        }
    }
}
