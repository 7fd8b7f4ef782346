//! Replica session - applies authority messages to a local registry copy
//!
//! Disconnected -> AwaitingFullSync -> Synced
//!
//! A replica trusts its authority: entries are written straight into the
//! store with no conflict policy. Anything received while disconnected is
//! discarded, and single entries that arrive before the first full state are
//! superseded by it.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use armory_core::{Category, Identifier, ItemCatalog};
use armory_wire::{FullState, SyncEntry, SyncMessage};

use crate::{Snapshot, WeaponRegistry};

/// Connection state of a replica
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    AwaitingFullSync,
    Synced,
}

/// What happened to an inbound message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Full state swapped in; `dropped` unreadable identifiers skipped
    FullSync { applied: usize, dropped: usize },
    /// Single entry written
    Entry,
    /// Entry named an unreadable identifier
    Dropped,
    /// Not accepted in the current session state
    Discarded,
    /// Frame could not be decoded
    Rejected,
}

/// Replica statistics
#[derive(Clone, Debug, Default)]
pub struct ReplicaStats {
    pub full_syncs: u64,
    pub entries_applied: u64,
    pub fields_dropped: u64,
    pub discarded: u64,
    pub rejected: u64,
}

/// Identifies one connection of a replica to its authority
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionToken(u64);

struct Session {
    state: SessionState,
    generation: u64,
    stats: ReplicaStats,
}

/// Replica side of the replication protocol
pub struct Replica {
    registry: Arc<WeaponRegistry>,
    session: Mutex<Session>,
}

impl Replica {
    /// Create a disconnected replica with an empty registry
    pub fn new(catalog: Arc<dyn ItemCatalog>) -> Self {
        Replica {
            registry: Arc::new(WeaponRegistry::new(catalog)),
            session: Mutex::new(Session {
                state: SessionState::Disconnected,
                generation: 0,
                stats: ReplicaStats::default(),
            }),
        }
    }

    /// Local registry copy, for classification queries
    pub fn registry(&self) -> &Arc<WeaponRegistry> {
        &self.registry
    }

    pub fn state(&self) -> SessionState {
        self.session.lock().state
    }

    pub fn stats(&self) -> ReplicaStats {
        self.session.lock().stats.clone()
    }

    /// Connected or logged in; wait for the authority's full state
    ///
    /// The returned token identifies this connection; any earlier token
    /// is stale from here on.
    pub fn on_connect(&self) -> SessionToken {
        let mut session = self.session.lock();
        session.generation += 1;
        session.state = SessionState::AwaitingFullSync;
        SessionToken(session.generation)
    }

    pub fn on_disconnect(&self) {
        self.session.lock().state = SessionState::Disconnected;
    }

    /// Disconnect only if `token` is still the current connection
    ///
    /// Returns false when a newer connection has replaced it.
    pub fn on_link_closed(&self, token: SessionToken) -> bool {
        let mut session = self.session.lock();
        if session.generation != token.0 {
            return false;
        }
        session.state = SessionState::Disconnected;
        true
    }

    /// Decode and apply one frame
    pub fn handle_frame(&self, frame: &[u8]) -> ApplyOutcome {
        match SyncMessage::decode(frame) {
            Ok(message) => self.handle(message),
            Err(e) => {
                warn!("Rejected sync message: {}", e);
                self.session.lock().stats.rejected += 1;
                ApplyOutcome::Rejected
            }
        }
    }

    /// Apply one decoded message
    pub fn handle(&self, message: SyncMessage) -> ApplyOutcome {
        // Session lock is held through the apply so state changes and
        // store writes are serialized
        let mut session = self.session.lock();
        let outcome = match (session.state, message) {
            (SessionState::Disconnected, message) => {
                debug!("Discarding {:?} message while disconnected", message.tag());
                ApplyOutcome::Discarded
            }
            (_, SyncMessage::FullState(state)) => {
                let (snapshot, dropped) = parse_full_state(&state);
                let applied = snapshot.len();
                self.registry.replace_all(snapshot);
                session.state = SessionState::Synced;
                ApplyOutcome::FullSync { applied, dropped }
            }
            (SessionState::AwaitingFullSync, SyncMessage::Entry(entry)) => {
                debug!(
                    "Discarding entry for {:?} before full sync",
                    entry.identifier
                );
                ApplyOutcome::Discarded
            }
            (SessionState::Synced, SyncMessage::Entry(entry)) => self.apply_entry(entry),
        };

        let stats = &mut session.stats;
        match outcome {
            ApplyOutcome::FullSync { dropped, .. } => {
                stats.full_syncs += 1;
                stats.fields_dropped += dropped as u64;
            }
            ApplyOutcome::Entry => stats.entries_applied += 1,
            ApplyOutcome::Dropped => stats.fields_dropped += 1,
            ApplyOutcome::Discarded => stats.discarded += 1,
            ApplyOutcome::Rejected => stats.rejected += 1,
        }
        outcome
    }

    fn apply_entry(&self, entry: SyncEntry) -> ApplyOutcome {
        let Some(raw) = entry.identifier else {
            warn!("Dropping unreadable sync entry for the {} list", entry.category);
            return ApplyOutcome::Dropped;
        };
        match Identifier::parse(&raw) {
            Ok(id) => {
                self.registry.apply_entry(entry.category, id);
                ApplyOutcome::Entry
            }
            Err(e) => {
                warn!("Dropping sync entry for the {} list: {}", entry.category, e);
                ApplyOutcome::Dropped
            }
        }
    }
}

/// Parse every list, skipping unreadable identifiers
fn parse_full_state(state: &FullState) -> (Snapshot, usize) {
    let mut snapshot = Snapshot::new();
    let mut dropped = 0;
    for (category, list) in state.iter() {
        let unreadable = state.unreadable(category);
        if unreadable > 0 {
            warn!(
                "Dropping {} unreadable full sync fields in the {} list",
                unreadable, category
            );
            dropped += unreadable;
        }
        for raw in list {
            match Identifier::parse(raw) {
                Ok(id) => snapshot.push(category, id),
                Err(e) => {
                    warn!("Dropping full sync field in the {} list: {}", category, e);
                    dropped += 1;
                }
            }
        }
    }
    (snapshot, dropped)
}

/// Build the message an authority sends for one change
pub fn entry_message(category: Category, id: &Identifier) -> SyncMessage {
    SyncMessage::Entry(SyncEntry::new(category, id))
}

/// Build the message an authority sends on connect
pub fn full_state_message(snapshot: &Snapshot) -> SyncMessage {
    SyncMessage::FullState(snapshot.to_full_state())
}
