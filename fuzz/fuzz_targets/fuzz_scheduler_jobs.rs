//! Fuzz target for scheduler and replicator response decoding.
//!
//! Whatever the server sends, decoding returns Ok or Err, never panics.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_orchestrator::controller::{ReplicatorDocument, SchedulerJobs};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    if let Ok(jobs) = serde_json::from_value::<SchedulerJobs>(value.clone()) {
        let ids: Vec<&str> = jobs.doc_ids().collect();
        assert!(ids.len() <= jobs.jobs.len());
    }

    let _ = serde_json::from_value::<ReplicatorDocument>(value);
});
