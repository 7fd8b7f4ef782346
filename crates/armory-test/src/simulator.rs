//! Cluster simulator - one authority and a set of replicas over the hub

use std::sync::Arc;
use std::time::{Duration, Instant};

use armory_core::{ArmoryResult, ItemCatalog};
use armory_runtime::{AuthorityNode, NodeConfig, ReplicaNode};
use armory_state::SessionState;

/// Cluster configuration
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Number of replicas
    pub replica_count: usize,
    pub node: NodeConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            replica_count: 3,
            node: NodeConfig::default(),
        }
    }
}

/// In-process authority with attached replicas
pub struct Cluster {
    authority: AuthorityNode,
    replicas: Vec<ReplicaNode>,
}

impl Cluster {
    pub fn new(catalog: Arc<dyn ItemCatalog>, config: ClusterConfig) -> Self {
        let replicas = (0..config.replica_count)
            .map(|_| ReplicaNode::new(catalog.clone()))
            .collect();
        Cluster {
            authority: AuthorityNode::with_config(catalog, config.node),
            replicas,
        }
    }

    pub fn authority(&self) -> &AuthorityNode {
        &self.authority
    }

    pub fn replica(&self, index: usize) -> Option<&ReplicaNode> {
        self.replicas.get(index)
    }

    pub fn replicas(&self) -> &[ReplicaNode] {
        &self.replicas
    }

    /// Connect every replica to the authority
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_all(&self) -> ArmoryResult<()> {
        for replica in &self.replicas {
            replica.attach(self.authority.accept_replica()?);
        }
        Ok(())
    }

    /// Drop and re-establish one replica's link
    pub fn reconnect(&self, index: usize) -> ArmoryResult<bool> {
        match self.replicas.get(index) {
            Some(replica) => {
                replica.attach(self.authority.accept_replica()?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Indices of replicas that are not synced to the authority's state
    pub fn divergent(&self) -> Vec<usize> {
        let reference = self.authority.registry().snapshot();
        self.replicas
            .iter()
            .enumerate()
            .filter(|(_, replica)| {
                replica.state() != SessionState::Synced
                    || replica.registry().snapshot() != reference
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Wait until every replica matches the authority
    pub async fn wait_converged(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.divergent().is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}
