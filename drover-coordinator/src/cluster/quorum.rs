//! Quorum liveness voting
//!
//! Monitors are separate processes that hold no cluster state; each one is
//! asked to ping the target node and the answers are tallied against a
//! strict majority. The verdict is advisory, not consensus: it gates
//! recovery decisions, it does not elect anything.

use super::types::{ClusterError, ClusterResult, NodeAddr};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Monitor query error types
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Monitor unreachable: {0}")]
    Unreachable(String),

    #[error("Monitor returned a malformed reply: {0}")]
    MalformedReply(String),
}

/// One liveness oracle: answers whether a target currently responds to pings
#[async_trait]
pub trait MonitorClient: Send + Sync {
    async fn ping(&self, target: &NodeAddr) -> Result<bool, MonitorError>;
}

/// Tally of one liveness vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessVote {
    /// Monitors that answered "alive"
    pub alive_votes: usize,
    /// Monitor count plus the coordinator's own seat
    pub total_voters: usize,
}

impl LivenessVote {
    /// Strict majority: an even split counts as not alive
    pub fn is_alive(&self) -> bool {
        self.alive_votes * 2 > self.total_voters
    }
}

/// Majority-vote failure detector over a fixed monitor set
pub struct QuorumDetector {
    monitors: Vec<Arc<dyn MonitorClient>>,
}

impl QuorumDetector {
    pub fn new(monitors: Vec<Arc<dyn MonitorClient>>) -> Self {
        Self { monitors }
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    /// Poll every monitor about `node` and tally the votes.
    ///
    /// The coordinator holds a seat in `total_voters` but casts no counted
    /// vote, so with two monitors the bar is two "alive" answers out of
    /// three voters. A monitor that fails to answer fails the whole check:
    /// an incomplete tally must never be mistaken for a verdict.
    pub async fn is_alive(&self, node: &NodeAddr) -> ClusterResult<LivenessVote> {
        let total_voters = self.monitors.len() + 1;
        let answers = join_all(self.monitors.iter().map(|m| m.ping(node))).await;

        let mut alive_votes = 0;
        for answer in answers {
            match answer {
                Ok(true) => alive_votes += 1,
                Ok(false) => {}
                Err(source) => {
                    warn!("Liveness poll for {} did not complete: {}", node, source);
                    return Err(ClusterError::QuorumCheck {
                        node: node.clone(),
                        source,
                    });
                }
            }
        }

        let vote = LivenessVote {
            alive_votes,
            total_voters,
        };
        debug!(
            "Liveness vote for {}: {}/{} alive, verdict {}",
            node,
            vote.alive_votes,
            vote.total_voters,
            if vote.is_alive() { "alive" } else { "dead" }
        );
        Ok(vote)
    }
}
