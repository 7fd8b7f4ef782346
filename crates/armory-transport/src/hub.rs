//! Replica hub - authority-side fan-out
//!
//! Every replica link is a bounded queue of encoded frames. Sends use
//! `try_send`: a link whose queue is full or whose receiver is gone is
//! detached on the spot. The replica sees its channel close, drops back to
//! disconnected, and gets a fresh full state when it reconnects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use armory_core::{ArmoryError, ArmoryResult, Category, Identifier};
use armory_state::{entry_message, full_state_message, SyncSink, WeaponRegistry};
use armory_wire::SyncMessage;

use crate::ReplicaEndpoint;

/// Default per-link queue capacity
pub const DEFAULT_LINK_CAPACITY: usize = 1024;

/// Identifies one replica link
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

/// Hub statistics
#[derive(Clone, Debug, Default)]
pub struct HubStats {
    pub accepted: u64,
    pub frames_sent: u64,
    pub detached_lagging: u64,
    pub detached_closed: u64,
}

/// Authority-side set of replica links
pub struct ReplicaHub {
    links: Mutex<HashMap<LinkId, mpsc::Sender<Bytes>>>,
    next_id: AtomicU64,
    capacity: usize,
    stats: Mutex<HubStats>,
}

impl ReplicaHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LINK_CAPACITY)
    }

    /// Create a hub whose links queue at most `capacity` frames
    pub fn with_capacity(capacity: usize) -> Self {
        ReplicaHub {
            links: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            stats: Mutex::new(HubStats::default()),
        }
    }

    /// Accept a replica: queue the full state and attach the link
    ///
    /// Both happen under the registry's read lock, so every later change is
    /// queued behind the full state and none is missed.
    pub fn accept(&self, registry: &WeaponRegistry) -> ArmoryResult<ReplicaEndpoint> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = LinkId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let entries = registry.snapshot_then(|snapshot| -> ArmoryResult<usize> {
            let frame = full_state_message(&snapshot).encode()?;
            tx.try_send(frame)
                .map_err(|e| ArmoryError::Transport(e.to_string()))?;
            self.links.lock().insert(id, tx);
            Ok(snapshot.len())
        })?;

        {
            let mut stats = self.stats.lock();
            stats.accepted += 1;
            stats.frames_sent += 1;
        }
        info!(link = id.0, entries, "Replica connected, full state queued");
        Ok(ReplicaEndpoint::new(id, rx))
    }

    /// Drop a link; its replica sees the channel close
    pub fn detach(&self, id: LinkId) -> bool {
        let removed = self.links.lock().remove(&id).is_some();
        if removed {
            debug!(link = id.0, "Replica link detached");
        }
        removed
    }

    /// Queue a message on every link without waiting
    pub fn broadcast(&self, message: &SyncMessage) {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode sync message: {}", e);
                return;
            }
        };

        let mut links = self.links.lock();
        let mut stats = self.stats.lock();
        links.retain(|id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => {
                stats.frames_sent += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(link = id.0, "Replica is lagging, detaching it");
                stats.detached_lagging += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(link = id.0, "Replica went away");
                stats.detached_closed += 1;
                false
            }
        });
    }

    /// Number of attached replicas
    pub fn len(&self) -> usize {
        self.links.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.lock().is_empty()
    }

    pub fn stats(&self) -> HubStats {
        self.stats.lock().clone()
    }
}

impl Default for ReplicaHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncSink for ReplicaHub {
    fn push_entry(&self, category: Category, id: &Identifier) {
        self.broadcast(&entry_message(category, id));
    }
}
