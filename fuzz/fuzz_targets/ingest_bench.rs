#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut store = ktest_domain::SampleStore::new("fuzz");
    store.ingest(&text, &["pkg".to_string()]);
    let tables = ktest_domain::compare(&[store.clone(), store], &ktest_domain::CompareOptions::default());
    let _ = ktest_domain::sample_warnings(&tables);
});
