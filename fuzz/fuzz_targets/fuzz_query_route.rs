//! Fuzz target: query server request routing
//!
//! Feeds arbitrary bytes through the same lossy UTF-8 decode and router
//! the query server applies to a raw request.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A request whose target lacks all three route names is never routed
//!
//! cargo fuzz run fuzz_query_route

#![no_main]

use gatecount::adapters::query_server::{route, MAX_REQUEST_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_REQUEST_LEN)];
    let request = String::from_utf8_lossy(data);

    if route(&request).is_some() {
        let target = request
            .lines()
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .unwrap_or("");
        assert!(
            ["/data", "/reset", "/calibrate"]
                .iter()
                .any(|p| target.contains(p)),
            "routed a request for {target:?}"
        );
    }
});
