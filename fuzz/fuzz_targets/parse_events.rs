#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    let _ = ktest_domain::parse_event_stream(data, "FuzzTest", Path::new("FuzzTest.php"));
});
