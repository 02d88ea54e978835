//! JSON configuration of failover groups and message transport.

use crate::error::{FailoverError, FailoverResult};
use crate::group::{FailoverGroup, GroupRegistry, MIN_BACKENDS};
use crate::retry::{RetryPolicy, DEFAULT_MAX_DELAY};
use fsfailover_storage::{InMemoryBackend, LocalBackend, StorageBackend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How propagation messages are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Handle messages on the dispatching thread. Failures are not retried.
    #[default]
    Sync,
    /// Queue messages in process and let a worker drain them, retrying
    /// failures with backoff.
    Queue,
}

/// One backend of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Directory on local disk.
    Local {
        /// Root directory.
        root: PathBuf,
        /// Create the root directory if it is missing.
        #[serde(default)]
        create: bool,
    },
    /// Ephemeral in-memory storage.
    Memory,
}

impl BackendConfig {
    /// Instantiates the backend.
    pub fn build(&self) -> FailoverResult<Arc<dyn StorageBackend>> {
        let backend: Arc<dyn StorageBackend> = match self {
            BackendConfig::Local { root, create: true } => {
                Arc::new(LocalBackend::open_with_create_dirs(root)?)
            }
            BackendConfig::Local { root, create: false } => Arc::new(LocalBackend::open(root)?),
            BackendConfig::Memory => Arc::new(InMemoryBackend::new()),
        };
        Ok(backend)
    }

    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            BackendConfig::Local { root, .. } => format!("local:{}", root.display()),
            BackendConfig::Memory => "memory".to_string(),
        }
    }
}

/// Backends of one group, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Backends; the first one is the primary.
    pub backends: Vec<BackendConfig>,
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Ceiling of the retry delay in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Maximum retry count, unbounded when absent.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

fn default_max_delay_secs() -> u64 {
    DEFAULT_MAX_DELAY.as_secs()
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_delay_secs: default_max_delay_secs(),
            max_retries: None,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        RetryPolicy {
            max_delay: Duration::from_secs(settings.max_delay_secs),
            max_retries: settings.max_retries,
        }
    }
}

/// Top-level configuration.
///
/// ```json
/// {
///   "groups": {
///     "media": { "backends": [ {"type": "local", "root": "/srv/a"}, {"type": "local", "root": "/srv/b"} ] }
///   },
///   "transport": "queue",
///   "retry": { "max_delay_secs": 600 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Groups by name.
    pub groups: BTreeMap<String, GroupConfig>,
    /// Message transport.
    #[serde(default)]
    pub transport: TransportKind,
    /// Retry settings.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl FailoverConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> FailoverResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: &Path) -> FailoverResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Adds a group.
    pub fn with_group(mut self, name: impl Into<String>, backends: Vec<BackendConfig>) -> Self {
        self.groups.insert(name.into(), GroupConfig { backends });
        self
    }

    /// Sets the transport.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Checks group count, names and sizes.
    pub fn validate(&self) -> FailoverResult<()> {
        if self.groups.is_empty() {
            return Err(FailoverError::Config(
                "at least one failover group must be configured".into(),
            ));
        }
        for (name, group) in &self.groups {
            if name.is_empty() {
                return Err(FailoverError::Config("group names must not be empty".into()));
            }
            if group.backends.len() < MIN_BACKENDS {
                return Err(FailoverError::Config(format!(
                    "group {name} must have at least {MIN_BACKENDS} backends, {} configured",
                    group.backends.len()
                )));
            }
        }
        Ok(())
    }

    /// Returns the retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    /// Instantiates every backend and builds the registry.
    pub fn build_registry(&self) -> FailoverResult<GroupRegistry> {
        self.validate()?;
        let mut registry = GroupRegistry::default();
        for (name, group) in &self.groups {
            let backends = group
                .backends
                .iter()
                .map(BackendConfig::build)
                .collect::<FailoverResult<Vec<_>>>()?;
            registry.insert(FailoverGroup::new(name.clone(), backends)?)?;
        }
        Ok(registry)
    }
}
