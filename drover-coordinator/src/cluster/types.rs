use super::quorum::MonitorError;
use crate::command::{CommandError, CommandExecutor};
use crate::oplog::types::{Mutation, OplogError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Total number of hash slots (Redis-compatible)
pub const TOTAL_SLOTS: u16 = 16384;

/// Store node address (host:port)
///
/// The address is the node's identity everywhere: slot map, replica
/// registry, log store keys, and error payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddr(String);

impl NodeAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeAddr {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

/// A registered store node: its address plus the connection that owns it
///
/// The coordinator holds exactly one live connection per node and never
/// reconnects on its own; a failed command surfaces as an error instead.
pub struct StoreNode {
    addr: NodeAddr,
    conn: Arc<dyn CommandExecutor>,
}

impl StoreNode {
    pub fn new(addr: impl Into<NodeAddr>, conn: Arc<dyn CommandExecutor>) -> Self {
        Self {
            addr: addr.into(),
            conn,
        }
    }

    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }

    /// Execute one mutation against this node's store
    pub async fn execute(&self, mutation: &Mutation) -> Result<(), CommandError> {
        self.conn.execute(mutation).await
    }
}

impl fmt::Debug for StoreNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreNode").field("addr", &self.addr).finish()
    }
}

/// Slot range (inclusive start, inclusive end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
}

impl SlotRange {
    pub fn new(start: u16, end: u16) -> Self {
        assert!(start <= end && end < TOTAL_SLOTS);
        Self { start, end }
    }

    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot <= self.end
    }

    pub fn count(&self) -> u16 {
        self.end - self.start + 1
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Cluster error types
///
/// Anything here aborts the pass that hit it. Degraded-but-successful
/// outcomes travel as `ClusterWarning`s in the pass report instead.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A store command failed and no recovery rule applied
    #[error("Command `{command}` against {node} failed: {source}")]
    StoreCommand {
        node: NodeAddr,
        command: Mutation,
        source: CommandError,
    },

    #[error(transparent)]
    Oplog(#[from] OplogError),

    /// A liveness vote could not be completed
    #[error("Quorum check for {node} did not complete: {source}")]
    QuorumCheck {
        node: NodeAddr,
        source: MonitorError,
    },

    #[error("Invalid slot assignment: {0}")]
    InvalidAssignment(String),

    #[error("Unknown master: {0}")]
    UnknownMaster(NodeAddr),

    #[error("Cannot retire {0}: it is the last registered master")]
    LastMaster(NodeAddr),
}

/// Cluster result type
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Degraded-but-successful outcome of a single step in a pass
///
/// Best-effort steps never abort the pass; they record one of these in
/// the pass report so callers can see exactly what was given up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterWarning {
    /// A master's replica did not take a propagated write
    ReplicaPropagation {
        master: NodeAddr,
        replica: NodeAddr,
        key: String,
        reason: String,
    },

    /// A node's log could not be removed; stale entries remain behind
    StaleOplog { node: NodeAddr, reason: String },

    /// The quorum wrote off a destination mid-pass, so this key was
    /// written nowhere
    KeyDropped { node: NodeAddr, key: String },

    /// The single liveness retry also failed; the write is unconfirmed
    RetryUnconfirmed {
        node: NodeAddr,
        key: String,
        reason: String,
    },
}

/// Outcome of a completed dead-master migration pass
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Keys written at their new owner
    pub keys_moved: usize,
    /// Keys dropped after the quorum wrote off their destination
    pub keys_dropped: usize,
    /// Distinct slots that had data to move
    pub slots_visited: usize,
    pub warnings: Vec<ClusterWarning>,
}

/// Outcome of a completed resharding pass
#[derive(Debug, Default)]
pub struct ReshardReport {
    /// Keys moved to the newly admitted master
    pub keys_moved: usize,
    /// Keys re-logged in place at their existing owner
    pub keys_kept: usize,
    pub warnings: Vec<ClusterWarning>,
}
