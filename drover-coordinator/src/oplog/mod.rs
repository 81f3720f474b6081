//! Per-node modification logs
//!
//! Every node admitted to the cluster gets an append-only log of the writes
//! it committed. Replaying a log in order rebuilds the node's current key
//! set, so the logs are what migration and resharding redistribute: when a
//! master dies, its log is the surviving copy of its data.
//!
//! - `FileOplog`: framed files, one per node, checksummed and crash-tolerant
//! - `MemoryOplog`: map-backed store with fault injection for tests

pub mod file;
pub mod memory;
pub mod types;

pub use file::FileOplog;
pub use memory::MemoryOplog;
pub use types::{FsyncMode, Mutation, OplogConfig, OplogEntry, OplogError, OplogResult};

use crate::cluster::hash_slot::hash_slot;
use crate::cluster::types::NodeAddr;
use async_trait::async_trait;
use std::collections::HashMap;

/// Keyed, durable storage for per-node modification logs.
///
/// Logs are keyed by node address. Concurrent appends to different nodes are
/// safe; `remove` and `recreate` assume the caller's exclusive
/// topology-change section (see crate docs), matching how the engines use
/// them.
#[async_trait]
pub trait Oplog: Send + Sync {
    /// Durably append one mutation to `node`'s log.
    async fn append(&self, node: &NodeAddr, mutation: &Mutation) -> OplogResult<()>;

    /// All of `node`'s entries in append order.
    ///
    /// A node with no log reads as empty, not as an error.
    async fn read_all(&self, node: &NodeAddr) -> OplogResult<Vec<OplogEntry>>;

    /// Delete `node`'s log entirely. Removing an absent log succeeds.
    async fn remove(&self, node: &NodeAddr) -> OplogResult<()>;

    /// Reset `node`'s log to empty, creating it if absent.
    async fn recreate(&self, node: &NodeAddr) -> OplogResult<()>;

    /// Replay `node`'s log into its latest key set, grouped by hash slot.
    ///
    /// SET upserts, DEL removes, last writer wins. Slots emptied by deletes
    /// are pruned, so a fully-deleted node reads as the empty map.
    async fn read_grouped_by_slot(
        &self,
        node: &NodeAddr,
    ) -> OplogResult<HashMap<u16, HashMap<String, Vec<u8>>>> {
        let mut grouped: HashMap<u16, HashMap<String, Vec<u8>>> = HashMap::new();
        for entry in self.read_all(node).await? {
            match entry.mutation {
                Mutation::Set { key, value } => {
                    grouped.entry(hash_slot(&key)).or_default().insert(key, value);
                }
                Mutation::Del { key } => {
                    let slot = hash_slot(&key);
                    if let Some(keys) = grouped.get_mut(&slot) {
                        keys.remove(&key);
                        if keys.is_empty() {
                            grouped.remove(&slot);
                        }
                    }
                }
            }
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests;
