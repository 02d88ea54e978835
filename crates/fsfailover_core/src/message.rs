//! Propagation messages.
//!
//! A message is a unit of asynchronous work targeting one backend of a
//! group. Messages carry a retry count that starts at 0 and grows by one per
//! failed delivery; handlers re-dispatch a copy with [`FailoverMessage::next_attempt`]
//! and never alter anything else.

use serde::{Deserialize, Serialize};

/// Copy a file from one backend of a group to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicateFile {
    /// Failover group name.
    pub group: String,
    /// File path.
    pub path: String,
    /// Index of the backend to read from.
    pub source: usize,
    /// Index of the backend to write to.
    pub destination: usize,
    /// Number of failed delivery attempts so far.
    #[serde(default)]
    pub retry_count: u32,
}

impl ReplicateFile {
    /// Creates a first-attempt message.
    pub fn new(
        group: impl Into<String>,
        path: impl Into<String>,
        source: usize,
        destination: usize,
    ) -> Self {
        Self {
            group: group.into(),
            path: path.into(),
            source,
            destination,
            retry_count: 0,
        }
    }
}

/// Delete a file from one backend of a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeleteFile {
    /// Failover group name.
    pub group: String,
    /// File path.
    pub path: String,
    /// Index of the backend to delete from.
    pub target: usize,
    /// Number of failed delivery attempts so far.
    #[serde(default)]
    pub retry_count: u32,
}

impl DeleteFile {
    /// Creates a first-attempt message.
    pub fn new(group: impl Into<String>, path: impl Into<String>, target: usize) -> Self {
        Self {
            group: group.into(),
            path: path.into(),
            target,
            retry_count: 0,
        }
    }
}

/// Delete a directory subtree from one backend of a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeleteDirectory {
    /// Failover group name.
    pub group: String,
    /// Directory path.
    pub path: String,
    /// Index of the backend to delete from.
    pub target: usize,
    /// Number of failed delivery attempts so far.
    #[serde(default)]
    pub retry_count: u32,
}

impl DeleteDirectory {
    /// Creates a first-attempt message.
    pub fn new(group: impl Into<String>, path: impl Into<String>, target: usize) -> Self {
        Self {
            group: group.into(),
            path: path.into(),
            target,
            retry_count: 0,
        }
    }
}

/// Any propagation message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailoverMessage {
    /// See [`ReplicateFile`].
    ReplicateFile(ReplicateFile),
    /// See [`DeleteFile`].
    DeleteFile(DeleteFile),
    /// See [`DeleteDirectory`].
    DeleteDirectory(DeleteDirectory),
}

impl FailoverMessage {
    /// Returns a short name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FailoverMessage::ReplicateFile(_) => "replicate_file",
            FailoverMessage::DeleteFile(_) => "delete_file",
            FailoverMessage::DeleteDirectory(_) => "delete_directory",
        }
    }

    /// Returns the group name.
    pub fn group(&self) -> &str {
        match self {
            FailoverMessage::ReplicateFile(m) => &m.group,
            FailoverMessage::DeleteFile(m) => &m.group,
            FailoverMessage::DeleteDirectory(m) => &m.group,
        }
    }

    /// Returns the path.
    pub fn path(&self) -> &str {
        match self {
            FailoverMessage::ReplicateFile(m) => &m.path,
            FailoverMessage::DeleteFile(m) => &m.path,
            FailoverMessage::DeleteDirectory(m) => &m.path,
        }
    }

    /// Returns the retry count.
    pub fn retry_count(&self) -> u32 {
        match self {
            FailoverMessage::ReplicateFile(m) => m.retry_count,
            FailoverMessage::DeleteFile(m) => m.retry_count,
            FailoverMessage::DeleteDirectory(m) => m.retry_count,
        }
    }

    /// Returns the backend index the message modifies.
    pub fn target(&self) -> usize {
        match self {
            FailoverMessage::ReplicateFile(m) => m.destination,
            FailoverMessage::DeleteFile(m) => m.target,
            FailoverMessage::DeleteDirectory(m) => m.target,
        }
    }

    /// Returns a copy with the retry count incremented by exactly one.
    pub fn next_attempt(&self) -> Self {
        let mut next = self.clone();
        match &mut next {
            FailoverMessage::ReplicateFile(m) => m.retry_count = m.retry_count.saturating_add(1),
            FailoverMessage::DeleteFile(m) => m.retry_count = m.retry_count.saturating_add(1),
            FailoverMessage::DeleteDirectory(m) => {
                m.retry_count = m.retry_count.saturating_add(1)
            }
        }
        next
    }
}

impl From<ReplicateFile> for FailoverMessage {
    fn from(message: ReplicateFile) -> Self {
        FailoverMessage::ReplicateFile(message)
    }
}

impl From<DeleteFile> for FailoverMessage {
    fn from(message: DeleteFile) -> Self {
        FailoverMessage::DeleteFile(message)
    }
}

impl From<DeleteDirectory> for FailoverMessage {
    fn from(message: DeleteDirectory) -> Self {
        FailoverMessage::DeleteDirectory(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_attempt_only_bumps_retry_count() {
        let message: FailoverMessage = ReplicateFile::new("g", "a/b.txt", 2, 0).into();
        let next = message.next_attempt().next_attempt();

        assert_eq!(next.retry_count(), 2);
        match next {
            FailoverMessage::ReplicateFile(m) => {
                assert_eq!(m.group, "g");
                assert_eq!(m.path, "a/b.txt");
                assert_eq!(m.source, 2);
                assert_eq!(m.destination, 0);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn accessors() {
        let message: FailoverMessage = DeleteDirectory::new("g", "dir", 1).into();
        assert_eq!(message.kind(), "delete_directory");
        assert_eq!(message.group(), "g");
        assert_eq!(message.path(), "dir");
        assert_eq!(message.target(), 1);
        assert_eq!(message.retry_count(), 0);
    }

    #[test]
    fn json_shape_is_tagged() {
        let message: FailoverMessage = DeleteFile::new("g", "f", 1).into();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "delete_file");
        assert_eq!(json["target"], 1);

        let parsed: FailoverMessage =
            serde_json::from_str(r#"{"type":"replicate_file","group":"g","path":"p","source":0,"destination":1}"#)
                .unwrap();
        assert_eq!(parsed.retry_count(), 0);
    }
}
