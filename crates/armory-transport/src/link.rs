//! Replica endpoint and receive loop

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use armory_state::{ApplyOutcome, Replica};

use crate::LinkId;

/// Receiving end of one replica link
#[derive(Debug)]
pub struct ReplicaEndpoint {
    id: LinkId,
    rx: mpsc::Receiver<Bytes>,
}

impl ReplicaEndpoint {
    pub(crate) fn new(id: LinkId, rx: mpsc::Receiver<Bytes>) -> Self {
        ReplicaEndpoint { id, rx }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Next frame; `None` once the authority detached the link
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Next frame if one is already queued
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

/// Connect `replica` to an endpoint and apply frames in the background
///
/// The replica moves to awaiting-full-sync before this returns and back to
/// disconnected when the link closes, unless a newer link has replaced it.
pub fn start_receive_loop(replica: Arc<Replica>, mut endpoint: ReplicaEndpoint) -> JoinHandle<()> {
    let token = replica.on_connect();
    let link = endpoint.id();

    tokio::spawn(async move {
        while let Some(frame) = endpoint.recv().await {
            match replica.handle_frame(&frame) {
                ApplyOutcome::FullSync { applied, dropped } => {
                    info!(link = link.0, applied, dropped, "Replica synced");
                }
                outcome => debug!(link = link.0, ?outcome, "Sync frame handled"),
            }
        }
        if replica.on_link_closed(token) {
            info!(link = link.0, "Replica link closed");
        } else {
            debug!(link = link.0, "Superseded replica link closed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use armory_core::{Category, Identifier, StaticCatalog};
    use armory_state::{Registration, SessionState, WeaponRegistry};

    use crate::ReplicaHub;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_receive_loop_converges() {
        let hub = Arc::new(ReplicaHub::new());
        let registry = WeaponRegistry::new(Arc::new(StaticCatalog::new())).with_sink(hub.clone());
        registry.register(&Registration::new("Config", id("modx:club"), Category::AllowedWeapon));
        registry.start_serving();

        let replica = Arc::new(Replica::new(Arc::new(StaticCatalog::new())));
        let endpoint = hub.accept(&registry).unwrap();
        let link = endpoint.id();
        let handle = start_receive_loop(replica.clone(), endpoint);
        assert_ne!(replica.state(), SessionState::Disconnected);

        registry.register(
            &Registration::new("Command", id("modx:club"), Category::ForbiddenWeapon)
                .with_override(true),
        );

        wait_for(|| replica.registry().snapshot() == registry.snapshot()).await;
        assert_eq!(replica.state(), SessionState::Synced);

        assert!(hub.detach(link));
        handle.await.unwrap();
        assert_eq!(replica.state(), SessionState::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_superseded_loop_leaves_new_link_connected() {
        let hub = Arc::new(ReplicaHub::new());
        let registry = WeaponRegistry::new(Arc::new(StaticCatalog::new())).with_sink(hub.clone());
        registry.register(&Registration::new("Config", id("modx:club"), Category::AllowedWeapon));
        registry.start_serving();

        let replica = Arc::new(Replica::new(Arc::new(StaticCatalog::new())));
        let old = hub.accept(&registry).unwrap();
        let old_link = old.id();
        let old_handle = start_receive_loop(replica.clone(), old);
        let new_handle = start_receive_loop(replica.clone(), hub.accept(&registry).unwrap());

        // The old loop only ends after the new link is live
        assert!(hub.detach(old_link));
        old_handle.await.unwrap();
        assert_ne!(replica.state(), SessionState::Disconnected);

        registry.register(&Registration::new("Command", id("modx:saber"), Category::AllowedSword));
        wait_for(|| {
            replica.state() == SessionState::Synced
                && replica.registry().snapshot() == registry.snapshot()
        })
        .await;
        assert!(!new_handle.is_finished());
    }
}
