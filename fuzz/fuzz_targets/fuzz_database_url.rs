//! Fuzz target for database URL derivation.
//!
//! Arbitrary credentials and database names must never panic, and the
//! encoded name must decode back to the input and stay one path segment.

#![no_main]

use libfuzzer_sys::fuzz_target;
use percent_encoding::percent_decode_str;
use replication_orchestrator::instance::{encode_database_name, InstanceHandle};

fuzz_target!(|data: (&str, &str, &str, u16)| {
    let (user, password, name, port) = data;

    let handle = InstanceHandle::new("db.local", port, user, password);
    let url = handle.database_url(name);

    let encoded = encode_database_name(name);
    assert!(url.ends_with(&encoded));
    assert!(!encoded.contains('/'));

    let decoded = percent_decode_str(&encoded).decode_utf8().unwrap();
    assert_eq!(decoded, name);

    // Credentials never reach Display
    let shown = handle.to_string();
    assert_eq!(shown, format!("db.local:{}", port));
});
