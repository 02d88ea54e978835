//! Reconciliation engine.
//!
//! A run lists every backend of a group, diffs the inventories and schedules
//! replicate or delete messages. Runs hold no lock: concurrent runs on the
//! same group, or a run racing live writes, may issue duplicate messages.

use crate::bus::MessageBus;
use crate::error::{FailoverError, FailoverResult};
use crate::event::{SyncEvent, SyncObserver};
use crate::group::{FailoverGroup, GroupRegistry};
use crate::inventory::InventorySnapshot;
use crate::message::{DeleteFile, FailoverMessage, ReplicateFile};
use fsfailover_storage::StorageResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// How files present on a secondary backend but not on the primary are
/// handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraFilesPolicy {
    /// Leave them alone.
    #[default]
    Ignore,
    /// Delete them from the backend holding them.
    Delete,
    /// Copy them to every backend lacking them.
    Copy,
}

impl ExtraFilesPolicy {
    /// All accepted policy names.
    pub const NAMES: [&'static str; 3] = ["ignore", "delete", "copy"];

    /// Returns the policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtraFilesPolicy::Ignore => "ignore",
            ExtraFilesPolicy::Delete => "delete",
            ExtraFilesPolicy::Copy => "copy",
        }
    }
}

impl fmt::Display for ExtraFilesPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtraFilesPolicy {
    type Err = FailoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(ExtraFilesPolicy::Ignore),
            "delete" => Ok(ExtraFilesPolicy::Delete),
            "copy" => Ok(ExtraFilesPolicy::Copy),
            other => Err(FailoverError::InvalidArgument(format!(
                "extra files policy must be one of \"{}\", \"{other}\" given",
                Self::NAMES.join("\", \"")
            ))),
        }
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Group name.
    pub group: String,
    /// Policy the run used.
    pub policy: ExtraFilesPolicy,
    /// Files listed per backend index.
    pub listed: BTreeMap<usize, usize>,
    /// Backends excluded because their listing failed.
    pub excluded: Vec<usize>,
    /// Replicate messages dispatched per destination index.
    pub replicated: BTreeMap<usize, usize>,
    /// Delete messages dispatched per target index.
    pub deleted: BTreeMap<usize, usize>,
    /// Messages the bus rejected.
    pub failed_dispatches: usize,
}

impl SyncSummary {
    fn new(group: &str, policy: ExtraFilesPolicy) -> Self {
        Self {
            group: group.to_string(),
            policy,
            ..Self::default()
        }
    }

    /// Total number of replicate messages dispatched.
    pub fn total_replicated(&self) -> usize {
        self.replicated.values().sum()
    }

    /// Total number of delete messages dispatched.
    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }

    /// Backend indexes with at least one message, in ascending order.
    pub fn touched_backends(&self) -> Vec<usize> {
        self.replicated
            .keys()
            .chain(self.deleted.keys())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Compares backend inventories and schedules repairs.
pub struct Reconciler {
    registry: Arc<GroupRegistry>,
    bus: Arc<dyn MessageBus>,
    observers: Vec<Arc<dyn SyncObserver>>,
}

impl Reconciler {
    /// Creates a reconciler dispatching on `bus`.
    pub fn new(registry: Arc<GroupRegistry>, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            registry,
            bus,
            observers: Vec::new(),
        }
    }

    /// Registers an observer.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Reconciles a group with a policy given by name.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::InvalidArgument`] for an unknown policy name
    /// and [`FailoverError::GroupNotFound`] for an unknown group.
    pub fn sync_named(&self, group: &str, policy: &str) -> FailoverResult<SyncSummary> {
        let policy = policy.parse()?;
        self.sync(group, policy)
    }

    /// Reconciles a group.
    ///
    /// Every path on the primary (index 0) is replicated to each listed
    /// backend that lacks it or holds an older copy. Files found only on
    /// secondaries are then handled according to `policy`; a path the
    /// primary holds is never an extra file, and extra files are left alone
    /// when the primary could not be listed. Backends whose listing fails are
    /// left out of the run entirely.
    ///
    /// # Errors
    ///
    /// Returns [`FailoverError::GroupNotFound`] for an unknown group. Listing
    /// and dispatch failures do not fail the run.
    pub fn sync(&self, group: &str, policy: ExtraFilesPolicy) -> FailoverResult<SyncSummary> {
        let group = Arc::clone(self.registry.get(group)?);
        let mut summary = SyncSummary::new(group.name(), policy);

        let snapshot = self.list_backends(&group, &mut summary);
        self.emit(SyncEvent::SearchStarted {
            group: group.name().to_string(),
        });

        for (path, destination) in snapshot.diff(0) {
            self.replicate(ReplicateFile::new(group.name(), path, 0, destination), &mut summary);
        }

        if policy != ExtraFilesPolicy::Ignore {
            if snapshot.contains_backend(0) {
                let secondaries: Vec<usize> = snapshot.indexes().filter(|&i| i >= 1).collect();
                for source in secondaries {
                    self.handle_extra_files(&group, &snapshot, source, policy, &mut summary);
                }
            } else {
                warn!(
                    group = group.name(),
                    policy = %policy,
                    "primary listing failed, extra files left untouched"
                );
            }
        }

        info!(
            group = group.name(),
            policy = %policy,
            replicated = summary.total_replicated(),
            deleted = summary.total_deleted(),
            excluded = summary.excluded.len(),
            "reconciliation finished"
        );
        Ok(summary)
    }

    fn list_backends(&self, group: &FailoverGroup, summary: &mut SyncSummary) -> InventorySnapshot {
        let mut snapshot = InventorySnapshot::new();

        for (index, backend) in group.backends().iter().enumerate() {
            self.emit(SyncEvent::ListingStarted {
                group: group.name().to_string(),
                index,
            });

            snapshot.initialize(index);
            let listed: StorageResult<()> = backend.list_contents("", true).and_then(|listing| {
                for entry in listing {
                    let entry = entry?;
                    if entry.is_file() {
                        snapshot.record(index, entry.path, entry.last_modified);
                    }
                }
                Ok(())
            });

            match listed {
                Ok(()) => {
                    let count = snapshot.file_count(index);
                    summary.listed.insert(index, count);
                    self.emit(SyncEvent::ListingSucceeded {
                        group: group.name().to_string(),
                        index,
                        count,
                    });
                }
                Err(e) => {
                    snapshot.discard(index);
                    summary.excluded.push(index);
                    self.emit(SyncEvent::ListingFailed {
                        group: group.name().to_string(),
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        snapshot
    }

    fn handle_extra_files(
        &self,
        group: &FailoverGroup,
        snapshot: &InventorySnapshot,
        source: usize,
        policy: ExtraFilesPolicy,
        summary: &mut SyncSummary,
    ) {
        let pairs = snapshot.diff_excluding(source, 0);
        match policy {
            ExtraFilesPolicy::Ignore => {}
            ExtraFilesPolicy::Copy => {
                for (path, destination) in pairs {
                    self.replicate(
                        ReplicateFile::new(group.name(), path, source, destination),
                        summary,
                    );
                }
            }
            ExtraFilesPolicy::Delete => {
                let paths: BTreeSet<String> = pairs.into_iter().map(|(path, _)| path).collect();
                for path in paths {
                    self.delete(DeleteFile::new(group.name(), path, source), summary);
                }
            }
        }
    }

    fn replicate(&self, message: ReplicateFile, summary: &mut SyncSummary) {
        let destination = message.destination;
        self.emit(SyncEvent::ReplicatePreDispatch(message.clone()));
        let message = FailoverMessage::from(message);
        match self.bus.dispatch(message.clone()) {
            Ok(envelope) => {
                *summary.replicated.entry(destination).or_insert(0) += 1;
                self.emit(SyncEvent::ReplicateDispatched(envelope));
            }
            Err(e) => self.dispatch_failed(message, e, summary),
        }
    }

    fn delete(&self, message: DeleteFile, summary: &mut SyncSummary) {
        let target = message.target;
        self.emit(SyncEvent::DeletePreDispatch(message.clone()));
        let message = FailoverMessage::from(message);
        match self.bus.dispatch(message.clone()) {
            Ok(envelope) => {
                *summary.deleted.entry(target).or_insert(0) += 1;
                self.emit(SyncEvent::DeleteDispatched(envelope));
            }
            Err(e) => self.dispatch_failed(message, e, summary),
        }
    }

    fn dispatch_failed(&self, message: FailoverMessage, err: FailoverError, summary: &mut SyncSummary) {
        summary.failed_dispatches += 1;
        self.emit(SyncEvent::DispatchFailed {
            message,
            reason: err.to_string(),
        });
    }

    fn emit(&self, event: SyncEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}
