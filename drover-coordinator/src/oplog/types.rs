use crate::cluster::types::NodeAddr;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Modification log error types
#[derive(Debug, Error)]
pub enum OplogError {
    #[error("Log append for {node} failed: {source}")]
    Write {
        node: NodeAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Log removal for {node} failed: {source}")]
    Removal {
        node: NodeAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Log read for {node} failed: {source}")]
    Read {
        node: NodeAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Log entry for {node} is corrupt: {reason}")]
    Corrupt { node: NodeAddr, reason: String },

    #[error("Log directory {dir:?} unavailable: {source}")]
    Directory {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type OplogResult<T> = std::result::Result<T, OplogError>;

/// A committed write, as store nodes execute it and logs record it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Upsert a key
    Set { key: String, value: Vec<u8> },

    /// Remove a key (removing an absent key succeeds on every supported store)
    Del { key: String },
}

impl Mutation {
    /// The key this mutation touches
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } => key,
            Self::Del { key } => key,
        }
    }

    /// Wire verb for logs and error payloads
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Set { .. } => "SET",
            Self::Del { .. } => "DEL",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.key())
    }
}

/// Log entry representing a single committed mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OplogEntry {
    /// Seconds since the epoch at append time
    pub timestamp: u64,
    pub mutation: Mutation,
}

/// File log store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OplogConfig {
    /// Directory holding one log file per node
    pub dir: PathBuf,
    pub fsync_mode: FsyncMode,
}

impl Default for OplogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/oplog"),
            fsync_mode: FsyncMode::Always,
        }
    }
}

/// Fsync mode for log appends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FsyncMode {
    /// Fsync after every append (safest, slowest)
    Always,
    /// Let the OS flush on its own schedule
    Never,
}
