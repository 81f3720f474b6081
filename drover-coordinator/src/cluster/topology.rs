//! Cluster Topology Management
//!
//! The slot map and the master/replica registries, behind one shared
//! handle. Reads are lock-cheap and safe from any task; the map itself
//! changes only inside the migration and resharding engines, and callers
//! serialize those (one topology change at a time, client writes
//! suspended while it runs).

use super::types::{ClusterError, ClusterResult, NodeAddr, SlotRange, StoreNode, TOTAL_SLOTS};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Slot map and node registries
///
/// The slot map is total: every slot has exactly one registered master as
/// its owner at all times. `bootstrap` refuses anything else, and the
/// engines keep it that way across every update.
pub struct Topology {
    /// Owner of each slot, indexed by slot number
    slots: RwLock<Vec<NodeAddr>>,

    /// Registered masters by address
    masters: RwLock<HashMap<NodeAddr, Arc<StoreNode>>>,

    /// Master address -> its replica, for the masters that have one
    replicas: RwLock<HashMap<NodeAddr, Arc<StoreNode>>>,
}

impl Topology {
    /// Build the initial topology from `(master, range)` seats.
    ///
    /// The ranges must tile the whole slot space: no gaps, no overlaps.
    /// A master may appear in several seats to claim several ranges.
    pub fn bootstrap(seats: Vec<(Arc<StoreNode>, SlotRange)>) -> ClusterResult<Self> {
        let mut slots: Vec<Option<NodeAddr>> = vec![None; TOTAL_SLOTS as usize];
        let mut masters = HashMap::new();

        for (node, range) in seats {
            for slot in range.start..=range.end {
                if let Some(owner) = &slots[slot as usize] {
                    return Err(ClusterError::InvalidAssignment(format!(
                        "slot {} assigned to both {} and {}",
                        slot,
                        owner,
                        node.addr()
                    )));
                }
                slots[slot as usize] = Some(node.addr().clone());
            }
            masters.insert(node.addr().clone(), node);
        }

        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(slot, owner)| {
                owner.ok_or_else(|| {
                    ClusterError::InvalidAssignment(format!("slot {} has no owner", slot))
                })
            })
            .collect::<ClusterResult<Vec<NodeAddr>>>()?;

        info!(
            "Topology bootstrapped: {} masters covering {} slots",
            masters.len(),
            TOTAL_SLOTS
        );

        Ok(Self {
            slots: RwLock::new(slots),
            masters: RwLock::new(masters),
            replicas: RwLock::new(HashMap::new()),
        })
    }

    /// Pair `replica` with an already-registered master.
    ///
    /// A master has at most one replica; pairing again replaces the old
    /// one. Replicas never appear in the slot map.
    pub fn pair_replica(&self, master: &NodeAddr, replica: Arc<StoreNode>) -> ClusterResult<()> {
        if !self.masters.read().contains_key(master) {
            return Err(ClusterError::UnknownMaster(master.clone()));
        }

        debug!("Pairing replica {} with master {}", replica.addr(), master);
        self.replicas.write().insert(master.clone(), replica);
        Ok(())
    }

    /// Owner of `slot`.
    ///
    /// Total over the slot space. A slot whose recorded owner is not a
    /// registered master means the map invariant was broken, which is a
    /// bug in this crate, so it panics rather than returning an error.
    pub fn owner_of(&self, slot: u16) -> Arc<StoreNode> {
        assert!(slot < TOTAL_SLOTS);
        let addr = self.slots.read()[slot as usize].clone();
        match self.masters.read().get(&addr) {
            Some(node) => Arc::clone(node),
            None => panic!("slot {} owned by unregistered master {}", slot, addr),
        }
    }

    /// Look up a registered master by address
    pub fn master(&self, addr: &NodeAddr) -> Option<Arc<StoreNode>> {
        self.masters.read().get(addr).cloned()
    }

    /// The replica paired with `master`, if any
    pub fn replica_of(&self, master: &NodeAddr) -> Option<Arc<StoreNode>> {
        self.replicas.read().get(master).cloned()
    }

    /// All registered masters, sorted by address so passes visit them in
    /// a stable order
    pub fn masters(&self) -> Vec<Arc<StoreNode>> {
        let mut all: Vec<_> = self.masters.read().values().cloned().collect();
        all.sort_by(|a, b| a.addr().cmp(b.addr()));
        all
    }

    pub fn master_count(&self) -> usize {
        self.masters.read().len()
    }

    /// Contiguous slot ranges currently owned by `addr`
    pub fn slots_owned_by(&self, addr: &NodeAddr) -> Vec<SlotRange> {
        let slots = self.slots.read();
        let mut ranges = Vec::new();
        let mut start: Option<u16> = None;

        for slot in 0..TOTAL_SLOTS {
            let owned = slots[slot as usize] == *addr;
            match (owned, start) {
                (true, None) => start = Some(slot),
                (false, Some(s)) => {
                    ranges.push(SlotRange::new(s, slot - 1));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            ranges.push(SlotRange::new(s, TOTAL_SLOTS - 1));
        }

        ranges
    }

    /// Unregister `dead` and hand its slots to the survivors.
    ///
    /// The orphaned slots are split into even contiguous chunks and dealt
    /// to the survivors in address order, keeping the map total in one
    /// step. Returns the survivors in the order they were dealt chunks.
    pub(crate) fn retire_master(&self, dead: &NodeAddr) -> ClusterResult<Vec<NodeAddr>> {
        let mut masters = self.masters.write();
        let mut slots = self.slots.write();

        if !masters.contains_key(dead) {
            return Err(ClusterError::UnknownMaster(dead.clone()));
        }
        if masters.len() == 1 {
            // Nobody left to own its slots; the map must stay total
            return Err(ClusterError::LastMaster(dead.clone()));
        }

        let mut survivors: Vec<NodeAddr> =
            masters.keys().filter(|a| *a != dead).cloned().collect();
        survivors.sort();

        let orphaned: Vec<u16> =
            (0..TOTAL_SLOTS).filter(|s| slots[*s as usize] == *dead).collect();

        if !orphaned.is_empty() {
            let chunk = orphaned.len().div_ceil(survivors.len());
            for (i, slot) in orphaned.iter().enumerate() {
                let owner = &survivors[(i / chunk).min(survivors.len() - 1)];
                slots[*slot as usize] = owner.clone();
            }
        }

        masters.remove(dead);
        drop(slots);
        self.replicas.write().remove(dead);

        info!(
            "Retired master {}: {} slots redistributed across {} survivors",
            dead,
            orphaned.len(),
            survivors.len()
        );
        Ok(survivors)
    }

    /// Register a joining master and point `ranges` at it.
    ///
    /// The previous owners simply lose those slots from the map; moving
    /// the data they hold is the resharding engine's job.
    pub(crate) fn register_master(
        &self,
        node: Arc<StoreNode>,
        replica: Option<Arc<StoreNode>>,
        ranges: &[SlotRange],
    ) -> ClusterResult<()> {
        let mut masters = self.masters.write();
        let mut slots = self.slots.write();

        if masters.contains_key(node.addr()) {
            return Err(ClusterError::InvalidAssignment(format!(
                "{} is already a registered master",
                node.addr()
            )));
        }
        if ranges.is_empty() {
            return Err(ClusterError::InvalidAssignment(
                "a joining master must take at least one slot range".to_string(),
            ));
        }

        for range in ranges {
            for slot in range.start..=range.end {
                slots[slot as usize] = node.addr().clone();
            }
        }

        let addr = node.addr().clone();
        masters.insert(addr.clone(), node);
        drop(slots);
        drop(masters);

        if let Some(replica) = replica {
            debug!("Pairing replica {} with master {}", replica.addr(), addr);
            self.replicas.write().insert(addr.clone(), replica);
        }

        info!("Registered master {} owning {} ranges", addr, ranges.len());
        Ok(())
    }
}
