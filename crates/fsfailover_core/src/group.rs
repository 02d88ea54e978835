//! Failover groups and their registry.

use crate::error::{FailoverError, FailoverResult};
use fsfailover_storage::StorageBackend;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Minimum number of backends in a group.
pub const MIN_BACKENDS: usize = 2;

/// A named, ordered list of interchangeable backends.
///
/// Backends have no identity outside the group: they are addressed by their
/// zero-based position. Index 0 is the primary used as the reference by
/// reconciliation. The group is immutable once built.
#[derive(Clone)]
pub struct FailoverGroup {
    name: String,
    backends: Vec<Arc<dyn StorageBackend>>,
}

impl FailoverGroup {
    /// Creates a group.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::InvalidArgument`] if the name is empty or
    /// fewer than two backends are given.
    pub fn new(
        name: impl Into<String>,
        backends: Vec<Arc<dyn StorageBackend>>,
    ) -> FailoverResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(FailoverError::InvalidArgument(
                "failover group name must not be empty".into(),
            ));
        }
        if backends.len() < MIN_BACKENDS {
            return Err(FailoverError::InvalidArgument(format!(
                "failover group {name} needs at least {MIN_BACKENDS} backends, got {}",
                backends.len()
            )));
        }
        Ok(Self { name, backends })
    }

    /// Returns the group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backend at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::IndexNotFound`] for an out-of-range index.
    pub fn backend(&self, index: usize) -> FailoverResult<&Arc<dyn StorageBackend>> {
        self.backends
            .get(index)
            .ok_or_else(|| FailoverError::IndexNotFound {
                group: self.name.clone(),
                index,
            })
    }

    /// Returns all backends in priority order.
    pub fn backends(&self) -> &[Arc<dyn StorageBackend>] {
        &self.backends
    }

    /// Returns the number of backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false; a group holds at least two backends.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl fmt::Debug for FailoverGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverGroup")
            .field("name", &self.name)
            .field("backends", &self.backends.len())
            .finish()
    }
}

/// Groups indexed by name.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<String, Arc<FailoverGroup>>,
}

impl GroupRegistry {
    /// Creates a registry from a set of groups.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::DuplicateGroup`] if two groups share a name.
    pub fn new(groups: impl IntoIterator<Item = FailoverGroup>) -> FailoverResult<Self> {
        let mut registry = Self::default();
        for group in groups {
            registry.insert(group)?;
        }
        Ok(registry)
    }

    /// Adds a group.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::DuplicateGroup`] if the name is taken.
    pub fn insert(&mut self, group: FailoverGroup) -> FailoverResult<()> {
        if self.groups.contains_key(group.name()) {
            return Err(FailoverError::DuplicateGroup {
                name: group.name().to_string(),
            });
        }
        self.groups.insert(group.name().to_string(), Arc::new(group));
        Ok(())
    }

    /// Resolves a group by name.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::GroupNotFound`] for an unknown name.
    pub fn get(&self, name: &str) -> FailoverResult<&Arc<FailoverGroup>> {
        self.groups
            .get(name)
            .ok_or_else(|| FailoverError::group_not_found(name))
    }

    /// Resolves a backend by group name and index.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::GroupNotFound`] or
    /// [`FailoverError::IndexNotFound`].
    pub fn backend(&self, group: &str, index: usize) -> FailoverResult<&Arc<dyn StorageBackend>> {
        self.get(group)?.backend(index)
    }

    /// Returns the only registered group, if there is exactly one.
    pub fn sole(&self) -> Option<&Arc<FailoverGroup>> {
        if self.groups.len() == 1 {
            self.groups.values().next()
        } else {
            None
        }
    }

    /// Returns the sorted group names.
    pub fn names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Iterates over the groups in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FailoverGroup>> {
        self.groups.values()
    }

    /// Returns the number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no group is registered.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
