//! Testing utilities for the coordination layer
//!
//! Scriptable fakes for the coordinator's collaborator seams:
//! - `FakeStore`: an in-memory store node with injectable write failures
//! - `FakeMonitor`: a liveness oracle answering from a verdict table
//!
//! The log seam is covered by `oplog::MemoryOplog`, which carries its own
//! fault switches.

use crate::cluster::quorum::{MonitorClient, MonitorError};
use crate::cluster::types::{NodeAddr, StoreNode};
use crate::command::{CommandError, CommandExecutor};
use crate::oplog::types::Mutation;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory store node with scriptable write failures
#[derive(Default)]
pub struct FakeStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
    fail_next: AtomicUsize,
    fail_always: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` commands with a connection error, then recover
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every command from now on, as a crashed node would
    pub fn go_down(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// All keys currently stored, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CommandExecutor for FakeStore {
    async fn execute(&self, mutation: &Mutation) -> Result<(), CommandError> {
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(CommandError::Connection("node is down".to_string()));
        }
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Err(CommandError::Connection(
                "injected connection failure".to_string(),
            ));
        }

        match mutation {
            Mutation::Set { key, value } => {
                self.data.write().insert(key.clone(), value.clone());
            }
            Mutation::Del { key } => {
                self.data.write().remove(key);
            }
        }
        Ok(())
    }
}

/// Build a `StoreNode` backed by a fresh `FakeStore`, returning both
/// handles so tests can script and inspect the store directly
pub fn fake_node(addr: &str) -> (Arc<StoreNode>, Arc<FakeStore>) {
    let store = Arc::new(FakeStore::new());
    let node = Arc::new(StoreNode::new(addr, store.clone()));
    (node, store)
}

/// Monitor fake answering from a scripted verdict table
pub struct FakeMonitor {
    verdicts: RwLock<HashMap<NodeAddr, bool>>,
    default_verdict: bool,
    unreachable: AtomicBool,
}

impl FakeMonitor {
    /// A monitor that answers `verdict` for every node not overridden
    pub fn answering(verdict: bool) -> Self {
        Self {
            verdicts: RwLock::new(HashMap::new()),
            default_verdict: verdict,
            unreachable: AtomicBool::new(false),
        }
    }

    /// Override the verdict for one node
    pub fn set_verdict(&self, node: NodeAddr, alive: bool) {
        self.verdicts.write().insert(node, alive);
    }

    /// Make every future ping fail, as a monitor outage would
    pub fn go_dark(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MonitorClient for FakeMonitor {
    async fn ping(&self, target: &NodeAddr) -> Result<bool, MonitorError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(MonitorError::Unreachable(
                "injected monitor outage".to_string(),
            ));
        }
        Ok(self
            .verdicts
            .read()
            .get(target)
            .copied()
            .unwrap_or(self.default_verdict))
    }
}
