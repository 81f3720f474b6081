use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::cluster::types::NodeAddr;
use crate::oplog::types::OplogConfig;

/// Main coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub oplog: OplogConfig,
    pub monitors: MonitorsConfig,
    pub logging: LoggingConfig,
}

/// Failure detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorsConfig {
    /// Addresses of the monitor processes polled for liveness votes.
    /// The set is fixed at startup; quorum size never changes at runtime.
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            oplog: OplogConfig::default(),
            monitors: MonitorsConfig {
                addresses: Vec::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CoordinatorConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Monitor addresses as node addresses
    pub fn monitor_addrs(&self) -> Vec<NodeAddr> {
        self.monitors
            .addresses
            .iter()
            .map(NodeAddr::new)
            .collect()
    }
}
