use super::types::{Mutation, OplogEntry, OplogError, OplogResult};
use super::Oplog;
use crate::cluster::types::NodeAddr;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

/// Map-backed modification log store
///
/// Same observable contract as `FileOplog`, plus per-node fault switches
/// so tests can exercise the degraded paths.
#[derive(Default)]
pub struct MemoryOplog {
    logs: RwLock<HashMap<NodeAddr, Vec<OplogEntry>>>,
    append_faults: RwLock<HashSet<NodeAddr>>,
    removal_faults: RwLock<HashSet<NodeAddr>>,
}

impl MemoryOplog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future append for `node` fail with a write error
    pub fn fail_appends_for(&self, node: &NodeAddr) {
        self.append_faults.write().insert(node.clone());
    }

    /// Make every future remove and recreate for `node` fail with a
    /// removal error
    pub fn fail_removals_for(&self, node: &NodeAddr) {
        self.removal_faults.write().insert(node.clone());
    }

    /// Number of entries currently logged for `node`
    pub fn entry_count(&self, node: &NodeAddr) -> usize {
        self.logs.read().get(node).map_or(0, Vec::len)
    }

    /// Whether a log exists for `node` (a recreated log exists but is empty)
    pub fn has_log(&self, node: &NodeAddr) -> bool {
        self.logs.read().contains_key(node)
    }
}

#[async_trait]
impl Oplog for MemoryOplog {
    async fn append(&self, node: &NodeAddr, mutation: &Mutation) -> OplogResult<()> {
        if self.append_faults.read().contains(node) {
            return Err(OplogError::Write {
                node: node.clone(),
                source: std::io::Error::other("append fault injected"),
            });
        }

        let entry = OplogEntry {
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_secs(),
            mutation: mutation.clone(),
        };

        self.logs.write().entry(node.clone()).or_default().push(entry);
        Ok(())
    }

    async fn read_all(&self, node: &NodeAddr) -> OplogResult<Vec<OplogEntry>> {
        Ok(self.logs.read().get(node).cloned().unwrap_or_default())
    }

    async fn remove(&self, node: &NodeAddr) -> OplogResult<()> {
        if self.removal_faults.read().contains(node) {
            return Err(OplogError::Removal {
                node: node.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "removal fault injected",
                ),
            });
        }

        self.logs.write().remove(node);
        Ok(())
    }

    async fn recreate(&self, node: &NodeAddr) -> OplogResult<()> {
        if self.removal_faults.read().contains(node) {
            return Err(OplogError::Removal {
                node: node.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "removal fault injected",
                ),
            });
        }

        self.logs.write().insert(node.clone(), Vec::new());
        Ok(())
    }
}
