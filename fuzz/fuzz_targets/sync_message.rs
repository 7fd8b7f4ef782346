//! Fuzz target for sync message decoding
//!
//! ```bash
//! cargo +nightly fuzz run sync_message
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

use armory_wire::SyncMessage;

fuzz_target!(|data: &[u8]| {
    // Decoding must never panic
    if let Ok(message) = SyncMessage::decode(data) {
        if message.unreadable_fields() > 0 {
            return;
        }
        // Anything that decodes cleanly re-encodes to the same bytes
        let encoded = message.encode().expect("decoded message re-encodes");
        assert_eq!(&encoded[..], data);
    }
});
