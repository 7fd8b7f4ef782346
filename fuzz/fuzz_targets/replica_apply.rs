//! Fuzz target for the replica apply step
//!
//! Feeds arbitrary frames and session transitions into a replica and checks
//! that every identifier stays in at most one category.
//!
//! ```bash
//! cargo +nightly fuzz run replica_apply
//! ```

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use armory_core::{Category, StaticCatalog};
use armory_state::Replica;

#[derive(Debug, arbitrary::Arbitrary)]
enum Step {
    Connect,
    Disconnect,
    Frame(Vec<u8>),
}

fuzz_target!(|steps: Vec<Step>| {
    let replica = Replica::new(Arc::new(StaticCatalog::new()));

    for step in steps {
        match step {
            Step::Connect => {
                replica.on_connect();
            }
            Step::Disconnect => replica.on_disconnect(),
            Step::Frame(frame) => {
                replica.handle_frame(&frame);
            }
        }

        let snapshot = replica.registry().snapshot();
        for (category, list) in snapshot.iter() {
            for id in list {
                let holders = Category::ALL
                    .iter()
                    .filter(|other| snapshot.list(**other).contains(id))
                    .count();
                assert_eq!(holders, 1, "{id} listed twice, first seen in {category}");
            }
        }
    }
});
