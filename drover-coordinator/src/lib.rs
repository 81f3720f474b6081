pub mod cluster;
pub mod command;
pub mod config;
pub mod oplog;
pub mod replication;
pub mod testing;

// Re-export commonly used types
pub use cluster::{
    ClusterError, ClusterResult, ClusterWarning, LivenessVote, MigrationReport, Migrator,
    MonitorClient, MonitorError, NodeAddr, QuorumDetector, ReshardReport, Resharder, SlotRange,
    StoreNode, TOTAL_SLOTS, Topology, hash_slot,
};
pub use command::{CommandError, CommandExecutor};
pub use config::CoordinatorConfig;
pub use oplog::{
    FileOplog, FsyncMode, MemoryOplog, Mutation, Oplog, OplogConfig, OplogEntry, OplogError,
};
pub use replication::Propagator;
