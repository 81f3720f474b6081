//! Dead-Master Migration
//!
//! When a master dies its store is unreachable, but its modification log
//! survives. A migration pass retires the node from the slot map, replays
//! its log into the latest key set, and writes every surviving pair at the
//! slot's new owner: store first, then the owner's log, then the owner's
//! replica.
//!
//! A pass runs to completion or aborts on the first unrecoverable error,
//! leaving whatever it already did in place. There is no rollback; because
//! placement is log-driven, re-running the pass converges.

use super::quorum::QuorumDetector;
use super::topology::Topology;
use super::types::{ClusterResult, ClusterWarning, MigrationReport, NodeAddr, StoreNode};
use crate::oplog::{Mutation, Oplog};
use crate::replication::Propagator;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one destination write after the recovery rules ran
enum WriteOutcome {
    Written,
    Dropped,
}

/// Drives dead-master migration passes
pub struct Migrator {
    topology: Arc<Topology>,
    oplog: Arc<dyn Oplog>,
    detector: Arc<QuorumDetector>,
    propagator: Propagator,
}

impl Migrator {
    pub fn new(
        topology: Arc<Topology>,
        oplog: Arc<dyn Oplog>,
        detector: Arc<QuorumDetector>,
    ) -> Self {
        let propagator = Propagator::new(Arc::clone(&topology));
        Self {
            topology,
            oplog,
            detector,
            propagator,
        }
    }

    /// Move everything `dead` owned to the masters now responsible for
    /// its slots.
    ///
    /// Retires `dead` from the slot map first (its slots are dealt to the
    /// survivors), removes the dead node's log and its replica's log, then
    /// replays the captured log slot by slot and SETs each surviving pair
    /// at the slot's current owner, appending to the owner's log and
    /// propagating to the owner's replica as it goes.
    ///
    /// Log cleanup failures degrade to warnings; everything the pass still
    /// needs was already read. A destination write failure triggers the
    /// monitors: an alive verdict buys one retry whose own failure is
    /// accepted, a dead verdict drops the pair entirely and the pass moves
    /// on. Both outcomes are visible in the returned report.
    pub async fn migrate_dead_master(&self, dead: &NodeAddr) -> ClusterResult<MigrationReport> {
        info!("Migrating data away from dead master {}", dead);
        let mut report = MigrationReport::default();

        // The log outlives the node. Capture it before anything is torn
        // down.
        let grouped = self.oplog.read_grouped_by_slot(dead).await?;

        let replica = self.topology.replica_of(dead).map(|r| r.addr().clone());
        self.topology.retire_master(dead)?;

        if let Err(err) = self.oplog.remove(dead).await {
            warn!("Leaving stale log behind for {}: {}", dead, err);
            report.warnings.push(ClusterWarning::StaleOplog {
                node: dead.clone(),
                reason: err.to_string(),
            });
        }
        if let Some(replica) = replica {
            if let Err(err) = self.oplog.remove(&replica).await {
                warn!("Leaving stale log behind for replica {}: {}", replica, err);
                report.warnings.push(ClusterWarning::StaleOplog {
                    node: replica.clone(),
                    reason: err.to_string(),
                });
            }
        }

        let mut slots: Vec<u16> = grouped.keys().copied().collect();
        slots.sort_unstable();

        for slot in slots {
            let destination = self.topology.owner_of(slot);
            report.slots_visited += 1;

            let mut keys: Vec<&String> = grouped[&slot].keys().collect();
            keys.sort();

            for key in keys {
                let mutation = Mutation::Set {
                    key: key.clone(),
                    value: grouped[&slot][key].clone(),
                };
                debug!(
                    "Moving {} (slot {}) from {} to {}",
                    key,
                    slot,
                    dead,
                    destination.addr()
                );

                match self
                    .write_checking_liveness(&destination, &mutation, &mut report)
                    .await?
                {
                    WriteOutcome::Dropped => {
                        report.keys_dropped += 1;
                        continue;
                    }
                    WriteOutcome::Written => {}
                }

                self.oplog.append(destination.addr(), &mutation).await?;
                if let Some(warning) =
                    self.propagator.propagate(destination.addr(), &mutation).await
                {
                    report.warnings.push(warning);
                }
                report.keys_moved += 1;
            }
        }

        info!(
            "Migration from {} complete: {} keys moved, {} dropped, {} warnings",
            dead,
            report.keys_moved,
            report.keys_dropped,
            report.warnings.len()
        );
        Ok(report)
    }

    /// Write `mutation` at `destination`, consulting the monitors if the
    /// first attempt fails.
    ///
    /// Alive verdict: one retry, its error accepted as unconfirmed. Dead
    /// verdict: the pair is dropped, on the grounds that a destination the
    /// quorum wrote off will itself be migrated shortly and its data has
    /// nowhere consistent to land. A vote that cannot complete aborts the
    /// pass.
    async fn write_checking_liveness(
        &self,
        destination: &Arc<StoreNode>,
        mutation: &Mutation,
        report: &mut MigrationReport,
    ) -> ClusterResult<WriteOutcome> {
        if destination.execute(mutation).await.is_ok() {
            return Ok(WriteOutcome::Written);
        }

        warn!(
            "Write of {} to {} failed, polling monitors",
            mutation,
            destination.addr()
        );
        let vote = self.detector.is_alive(destination.addr()).await?;

        if vote.is_alive() {
            if let Err(err) = destination.execute(mutation).await {
                warn!(
                    "Retry of {} to {} failed, continuing unconfirmed: {}",
                    mutation,
                    destination.addr(),
                    err
                );
                report.warnings.push(ClusterWarning::RetryUnconfirmed {
                    node: destination.addr().clone(),
                    key: mutation.key().to_string(),
                    reason: err.to_string(),
                });
            }
            Ok(WriteOutcome::Written)
        } else {
            warn!(
                "Quorum voted {} dead ({}/{} alive), dropping {}",
                destination.addr(),
                vote.alive_votes,
                vote.total_voters,
                mutation.key()
            );
            report.warnings.push(ClusterWarning::KeyDropped {
                node: destination.addr().clone(),
                key: mutation.key().to_string(),
            });
            Ok(WriteOutcome::Dropped)
        }
    }
}
