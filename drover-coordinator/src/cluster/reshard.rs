//! Resharding
//!
//! Admitting a new master reassigns slot ranges away from the incumbents;
//! a resharding pass then moves exactly the data that changed owners. Each
//! incumbent's log is replayed and rebuilt: keys whose slot stayed put are
//! re-logged in place, keys whose slot moved are deleted at the source and
//! written, logged, and replicated at the new owner.
//!
//! Like migration, a pass is sequential, aborts on the first unrecoverable
//! error, and leaves partial work in place for a re-run to converge.

use super::topology::Topology;
use super::types::{ClusterError, ClusterResult, ReshardReport, SlotRange, StoreNode};
use crate::oplog::{Mutation, Oplog};
use crate::replication::Propagator;
use std::sync::Arc;
use tracing::{debug, info};

/// Drives resharding passes for joining masters
pub struct Resharder {
    topology: Arc<Topology>,
    oplog: Arc<dyn Oplog>,
    propagator: Propagator,
}

impl Resharder {
    pub fn new(topology: Arc<Topology>, oplog: Arc<dyn Oplog>) -> Self {
        let propagator = Propagator::new(Arc::clone(&topology));
        Self {
            topology,
            oplog,
            propagator,
        }
    }

    /// Admit `node` as a master owning `ranges` and rebalance data onto it.
    ///
    /// Registers the node (with its replica, if any) in the slot map, gives
    /// it a fresh empty log, then walks every incumbent master and moves the
    /// keys whose slots now belong to `node`. Keys that stayed put are
    /// re-logged onto the incumbent's rebuilt log, so every log ends the
    /// pass holding exactly the keys its node still owns.
    ///
    /// If the new owner dies mid-pass, keys already deleted at their source
    /// but not yet durable at the target are lost; there is no two-phase
    /// handoff between the stores. Re-running after an abort is safe.
    pub async fn admit_master(
        &self,
        node: Arc<StoreNode>,
        replica: Option<Arc<StoreNode>>,
        ranges: Vec<SlotRange>,
    ) -> ClusterResult<ReshardReport> {
        let target = node.addr().clone();
        info!(
            "Admitting master {} and resharding {} ranges onto it",
            target,
            ranges.len()
        );

        self.topology.register_master(node, replica, &ranges)?;

        // The joining node starts empty: its log records only what this
        // pass and later writes put there.
        self.oplog.recreate(&target).await?;

        let mut report = ReshardReport::default();

        let sources: Vec<Arc<StoreNode>> = self
            .topology
            .masters()
            .into_iter()
            .filter(|m| *m.addr() != target)
            .collect();

        for source in sources {
            self.rebalance_source(&source, &mut report).await?;
        }

        info!(
            "Resharding onto {} complete: {} keys moved, {} kept in place, {} warnings",
            target,
            report.keys_moved,
            report.keys_kept,
            report.warnings.len()
        );
        Ok(report)
    }

    /// Rebuild `source`'s log, moving out the keys it no longer owns.
    ///
    /// The log is replayed into the latest key set, recreated empty, and
    /// refilled: kept keys are re-logged as SETs, moved keys go through the
    /// full handoff. Recreating the log here is a primary step, not
    /// cleanup, so its failure aborts the pass.
    async fn rebalance_source(
        &self,
        source: &Arc<StoreNode>,
        report: &mut ReshardReport,
    ) -> ClusterResult<()> {
        let grouped = self.oplog.read_grouped_by_slot(source.addr()).await?;
        self.oplog.recreate(source.addr()).await?;

        let mut slots: Vec<u16> = grouped.keys().copied().collect();
        slots.sort_unstable();

        for slot in slots {
            let owner = self.topology.owner_of(slot);
            let mut keys: Vec<&String> = grouped[&slot].keys().collect();
            keys.sort();

            if owner.addr() == source.addr() {
                for key in keys {
                    let mutation = Mutation::Set {
                        key: key.clone(),
                        value: grouped[&slot][key].clone(),
                    };
                    self.oplog.append(source.addr(), &mutation).await?;
                    report.keys_kept += 1;
                }
            } else {
                for key in keys {
                    self.move_key(source, &owner, slot, key, grouped[&slot][key].clone(), report)
                        .await?;
                }
            }
        }

        Ok(())
    }

    /// Hand one key from `source` to `owner`: DEL at the source, SET at
    /// the owner, append to the owner's log, offer to the owner's replica
    async fn move_key(
        &self,
        source: &Arc<StoreNode>,
        owner: &Arc<StoreNode>,
        slot: u16,
        key: &str,
        value: Vec<u8>,
        report: &mut ReshardReport,
    ) -> ClusterResult<()> {
        debug!(
            "Moving {} (slot {}) from {} to {}",
            key,
            slot,
            source.addr(),
            owner.addr()
        );

        let del = Mutation::Del {
            key: key.to_string(),
        };
        source
            .execute(&del)
            .await
            .map_err(|err| ClusterError::StoreCommand {
                node: source.addr().clone(),
                command: del.clone(),
                source: err,
            })?;

        let set = Mutation::Set {
            key: key.to_string(),
            value,
        };
        owner
            .execute(&set)
            .await
            .map_err(|err| ClusterError::StoreCommand {
                node: owner.addr().clone(),
                command: set.clone(),
                source: err,
            })?;

        self.oplog.append(owner.addr(), &set).await?;
        if let Some(warning) = self.propagator.propagate(owner.addr(), &set).await {
            report.warnings.push(warning);
        }

        report.keys_moved += 1;
        Ok(())
    }
}
