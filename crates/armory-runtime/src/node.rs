//! Armory nodes - wiring of registry, adapters and replica links
//!
//! An `AuthorityNode` owns the source-of-truth registry and fans changes
//! out to replicas. A `ReplicaNode` holds a disposable copy that it rebuilds
//! from the authority on every connect.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use armory_core::{ArmoryResult, Identifier, ItemCatalog, ItemInstance, WeaponKind};
use armory_state::{Replica, ReplicaStats, SessionState, WeaponRegistry};
use armory_transport::{start_receive_loop, HubStats, ReplicaEndpoint, ReplicaHub};

use crate::{
    log_enabled, AdminFacade, BatchReport, InboundMessage, MessageAdapter, NodeConfig,
    RegistryConfig,
};

/// The process holding the source-of-truth registry
pub struct AuthorityNode {
    config: NodeConfig,
    registry: Arc<WeaponRegistry>,
    hub: Arc<ReplicaHub>,
    adapter: MessageAdapter,
}

impl AuthorityNode {
    pub fn new(catalog: Arc<dyn ItemCatalog>) -> Self {
        Self::with_config(catalog, NodeConfig::default())
    }

    pub fn with_config(catalog: Arc<dyn ItemCatalog>, config: NodeConfig) -> Self {
        let hub = Arc::new(ReplicaHub::with_capacity(config.link_capacity));
        let registry = Arc::new(WeaponRegistry::new(catalog).with_sink(hub.clone()));
        let adapter = MessageAdapter::new(registry.clone());
        AuthorityNode {
            config,
            registry,
            hub,
            adapter,
        }
    }

    pub fn registry(&self) -> &Arc<WeaponRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<ReplicaHub> {
        &self.hub
    }

    pub fn adapter(&self) -> &MessageAdapter {
        &self.adapter
    }

    /// Register the lists of a loaded config
    pub fn load_config(&self, config: &RegistryConfig) -> BatchReport {
        let report = config.apply(&self.adapter, &self.config.config_name);
        info!(
            registered = report.registered,
            skipped = report.skipped,
            "Loaded registry config"
        );
        report
    }

    /// Load a config file, register it, and write it back
    ///
    /// Writing back fills in any keys missing from the file.
    pub fn load_config_file(&self, path: impl AsRef<Path>) -> ArmoryResult<BatchReport> {
        let path = path.as_ref();
        let config = RegistryConfig::load(path)?;
        let report = self.load_config(&config);
        config.save(path)?;
        Ok(report)
    }

    /// Current registry contents as a config
    pub fn export_config(&self) -> RegistryConfig {
        RegistryConfig::from_snapshot(&self.registry.snapshot(), log_enabled())
    }

    /// Apply inbound registration messages in order
    pub fn process_messages<'a>(
        &self,
        messages: impl IntoIterator<Item = &'a InboundMessage>,
    ) -> BatchReport {
        self.adapter.process_all(messages)
    }

    /// Administrative access as `caller`
    pub fn admin(&self, caller: &str) -> AdminFacade {
        AdminFacade::new(self.registry.clone(), caller)
    }

    /// Startup loading is done; push changes from now on
    pub fn start_serving(&self) {
        self.registry.start_serving();
    }

    /// Attach a replica; it receives the full state first
    pub fn accept_replica(&self) -> ArmoryResult<ReplicaEndpoint> {
        self.hub.accept(&self.registry)
    }

    pub fn replica_count(&self) -> usize {
        self.hub.len()
    }

    pub fn hub_stats(&self) -> HubStats {
        self.hub.stats()
    }
}

/// A process holding a replica copy of the registry
pub struct ReplicaNode {
    replica: Arc<Replica>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReplicaNode {
    pub fn new(catalog: Arc<dyn ItemCatalog>) -> Self {
        ReplicaNode {
            replica: Arc::new(Replica::new(catalog)),
            task: Mutex::new(None),
        }
    }

    /// Start consuming an authority link, dropping any previous one
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(&self, endpoint: ReplicaEndpoint) {
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
        }
        *task = Some(start_receive_loop(self.replica.clone(), endpoint));
    }

    /// Is a receive loop still running?
    pub fn is_attached(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn state(&self) -> SessionState {
        self.replica.state()
    }

    pub fn stats(&self) -> ReplicaStats {
        self.replica.stats()
    }

    pub fn registry(&self) -> &Arc<WeaponRegistry> {
        self.replica.registry()
    }

    pub fn is_sword(&self, id: &Identifier) -> bool {
        self.registry().is_sword(id)
    }

    pub fn is_weapon(&self, id: &Identifier) -> bool {
        self.registry().is_weapon(id)
    }

    pub fn query_stack(&self, kind: WeaponKind, item: &dyn ItemInstance) -> bool {
        self.registry().query_stack(kind, item)
    }
}

impl Drop for ReplicaNode {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
