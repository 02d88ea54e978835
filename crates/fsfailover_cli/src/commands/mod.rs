//! CLI command implementations.

pub mod groups;
pub mod sync;

use fsfailover_core::{FailoverError, FailoverGroup, GroupRegistry};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the commands themselves.
#[derive(Debug, Error)]
pub enum CliError {
    /// Several groups are configured and none was named.
    #[error("several failover groups are configured, name one of: {}", .available.join(", "))]
    GroupRequired {
        /// Configured group names.
        available: Vec<String>,
    },

    /// Unknown output format.
    #[error("unknown output format {0:?} (expected text or json)")]
    UnknownFormat(String),

    /// Error from the failover core.
    #[error(transparent)]
    Failover(#[from] FailoverError),
}

/// Output format of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name.
    pub fn parse(format: &str) -> Result<Self, CliError> {
        match format {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(CliError::UnknownFormat(other.to_string())),
        }
    }
}

/// Resolves the group to operate on, defaulting to the only configured one.
pub fn resolve_group<'a>(
    registry: &'a GroupRegistry,
    name: Option<&str>,
) -> Result<&'a Arc<FailoverGroup>, CliError> {
    match name {
        Some(name) => Ok(registry.get(name)?),
        None => registry.sole().ok_or_else(|| CliError::GroupRequired {
            available: registry.names().into_iter().map(String::from).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsfailover_storage::{InMemoryBackend, StorageBackend};

    fn group(name: &str) -> FailoverGroup {
        let backends: Vec<Arc<dyn StorageBackend>> = vec![
            Arc::new(InMemoryBackend::new()),
            Arc::new(InMemoryBackend::new()),
        ];
        FailoverGroup::new(name, backends).unwrap()
    }

    #[test]
    fn sole_group_is_the_default() {
        let registry = GroupRegistry::new([group("media")]).unwrap();
        assert_eq!(resolve_group(&registry, None).unwrap().name(), "media");
    }

    #[test]
    fn several_groups_need_a_name() {
        let registry = GroupRegistry::new([group("a"), group("b")]).unwrap();
        let err = resolve_group(&registry, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "several failover groups are configured, name one of: a, b"
        );
        assert!(matches!(
            resolve_group(&registry, Some("c")),
            Err(CliError::Failover(FailoverError::GroupNotFound { .. }))
        ));
    }

    #[test]
    fn output_formats() {
        assert_eq!(OutputFormat::parse("json").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::parse("yaml").is_err());
    }
}
