#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(src) = std::str::from_utf8(data)
        && let Ok(file) = ktest_phpsyntax::parse(src)
    {
        let _ = ktest_domain::extract_benchmark(&file, "BenchmarkFuzz.php");
        if let Some(unit) = ktest_domain::extract_test(&file) {
            let _ = ktest_domain::apply_text_edits(data, &unit.edits);
        }
    }
});
