//! Cluster coordination - sharding, liveness, and data redistribution
//!
//! Implements hash-slot cluster coordination with:
//! - Hash slot algorithm (CRC16 mod 16384)
//! - Total slot map with master/replica registries
//! - Quorum liveness voting across monitor processes
//! - Dead-master migration driven by modification logs
//! - Resharding when a new master joins

pub mod hash_slot;
pub mod migration;
pub mod quorum;
pub mod reshard;
pub mod topology;
pub mod types;

pub use hash_slot::hash_slot;
pub use migration::Migrator;
pub use quorum::{LivenessVote, MonitorClient, MonitorError, QuorumDetector};
pub use reshard::Resharder;
pub use topology::Topology;
pub use types::{
    ClusterError, ClusterResult, ClusterWarning, MigrationReport, NodeAddr, ReshardReport,
    SlotRange, StoreNode, TOTAL_SLOTS,
};
