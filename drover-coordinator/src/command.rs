//! Store command execution seam
//!
//! The coordinator never speaks a wire protocol itself. Whatever owns a
//! node's connection (a client library, a pooled channel, a test fake)
//! implements `CommandExecutor`, and the coordinator hands it mutations.

use crate::oplog::types::Mutation;
use async_trait::async_trait;
use thiserror::Error;

/// Command execution error types
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Command rejected by node: {0}")]
    Rejected(String),

    #[error("Timed out waiting for node: {0}")]
    Timeout(String),
}

/// One store node's connection.
///
/// `execute` resolves when the node has acknowledged the mutation.
/// Implementations decide nothing about retries or liveness; recovery
/// rules live in the engines that call this.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, mutation: &Mutation) -> Result<(), CommandError>;
}
