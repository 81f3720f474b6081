//! Replica propagation
//!
//! Best-effort fan-out of a master's committed writes to its paired
//! replica. The master write has already succeeded by the time this runs,
//! so a replica failure degrades the pair instead of failing the
//! operation. Divergence is surfaced as a warning, never healed here:
//! there is no resync path in this layer.

use crate::cluster::topology::Topology;
use crate::cluster::types::{ClusterWarning, NodeAddr};
use crate::oplog::types::Mutation;
use std::sync::Arc;
use tracing::{debug, warn};

/// Forwards committed writes from a master to its paired replica
pub struct Propagator {
    topology: Arc<Topology>,
}

impl Propagator {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self { topology }
    }

    /// Offer `mutation` to `master`'s replica, if one is paired.
    ///
    /// Returns `None` on success or when the master has no replica, and a
    /// warning when the replica write fails.
    pub async fn propagate(
        &self,
        master: &NodeAddr,
        mutation: &Mutation,
    ) -> Option<ClusterWarning> {
        let replica = self.topology.replica_of(master)?;

        match replica.execute(mutation).await {
            Ok(()) => {
                debug!(
                    "Propagated {} from {} to replica {}",
                    mutation,
                    master,
                    replica.addr()
                );
                None
            }
            Err(err) => {
                warn!(
                    "Replica {} of {} rejected {}: {}",
                    replica.addr(),
                    master,
                    mutation,
                    err
                );
                Some(ClusterWarning::ReplicaPropagation {
                    master: master.clone(),
                    replica: replica.addr().clone(),
                    key: mutation.key().to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }
}
