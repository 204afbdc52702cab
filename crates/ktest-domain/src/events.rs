//! Test driver event stream.
//!
//! One JSON array per line, first element is the operation tag:
//!
//! ```text
//! ["START","testConcat"]
//! ["ASSERT_OK"]
//! ["ASSERT_SAME_FAILED","abc","abd","",14]
//! ["FINISHED"]
//! ```

use crate::DomainError;
use ktest_types::{EventSummary, TestFailure};
use serde_json::Value;
use std::path::Path;

pub fn parse_event_stream(
    output: &[u8],
    class_name: &str,
    file: &Path,
) -> Result<EventSummary, DomainError> {
    let mut summary = EventSummary::default();
    let mut current_test = String::new();

    for (i, raw) in output.split(|b| *b == b'\n').enumerate() {
        if raw.is_empty() {
            continue;
        }
        let fail = |reason: String| DomainError::EventStream {
            line: i + 1,
            text: String::from_utf8_lossy(raw).into_owned(),
            reason,
        };

        let fields: Vec<Value> = serde_json::from_slice(raw).map_err(|e| fail(e.to_string()))?;
        let Some(op) = fields.first() else {
            return Err(fail("empty fields".to_string()));
        };
        let op = op
            .as_str()
            .ok_or_else(|| fail(format!("operation tag {op} is not a string")))?;

        match op {
            "START" => {
                current_test = string_field(&fields, 1).map_err(fail)?.to_string();
                summary.tests += 1;
            }
            "ASSERT_OK" => summary.assertions += 1,
            "FINISHED" => summary.finished = true,
            "ASSERT_EQUALS_FAILED"
            | "ASSERT_NOT_EQUALS_FAILED"
            | "ASSERT_SAME_FAILED"
            | "ASSERT_NOT_SAME_FAILED"
            | "ASSERT_BOOL_FAILED" => {
                summary.assertions += 1;
                let expected = field(&fields, 1).map_err(fail)?;
                let actual = field(&fields, 2).map_err(fail)?;
                let message = string_field(&fields, 3).map_err(fail)?;
                let line = line_field(&fields, 4).map_err(fail)?;
                let reason = failure_reason(op, expected, actual);
                summary.failures.push(TestFailure {
                    name: format!("{class_name}::{current_test}"),
                    reason,
                    message: message.to_string(),
                    file: file.to_path_buf(),
                    line,
                });
            }
            other => return Err(fail(format!("unexpected op {other}"))),
        }
    }

    Ok(summary)
}

fn field(fields: &[Value], i: usize) -> Result<&Value, String> {
    fields.get(i).ok_or_else(|| format!("missing field {i}"))
}

fn string_field(fields: &[Value], i: usize) -> Result<&str, String> {
    field(fields, i)?
        .as_str()
        .ok_or_else(|| format!("field {i} is not a string"))
}

/// Source line numbers arrive as JSON integers (or integral floats).
fn line_field(fields: &[Value], i: usize) -> Result<u32, String> {
    let value = field(fields, i)?;
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).map_err(|_| format!("line {n} is out of range"));
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) => Ok(f as u32),
        Some(f) => Err(format!("line {f} is not a valid line number")),
        None => Err("line field is not a number".to_string()),
    }
}

fn failure_reason(op: &str, expected: &Value, actual: &Value) -> String {
    match op {
        "ASSERT_EQUALS_FAILED" => {
            format!("Failed asserting that {actual} matches expected {expected}")
        }
        "ASSERT_NOT_EQUALS_FAILED" => {
            format!("Failed asserting that {actual} is not equal to {expected}")
        }
        "ASSERT_SAME_FAILED" => format!("Failed asserting that {actual} is identical to {expected}"),
        "ASSERT_NOT_SAME_FAILED" => {
            format!("Failed asserting that {actual} is not identical to {expected}")
        }
        // the expected side is a bare word: true or false
        _ => {
            let expected = expected.as_str().map_or_else(|| expected.to_string(), str::to_string);
            format!("Failed asserting that {actual} is {expected}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(out: &str) -> Result<EventSummary, DomainError> {
        parse_event_stream(out.as_bytes(), "FooTest", Path::new("/p/tests/FooTest.php"))
    }

    #[test]
    fn well_formed_stream_counts_tests_and_assertions() {
        let summary = parse("[\"START\",\"testFoo\"]\n[\"ASSERT_OK\"]\n[\"FINISHED\"]\n").unwrap();
        assert_eq!(summary.tests, 1);
        assert_eq!(summary.assertions, 1);
        assert!(summary.failures.is_empty());
        assert!(summary.finished);
    }

    #[test]
    fn invalid_line_numbers_are_malformed_events() {
        for line in ["-3", "4.5", "4294967296", "\"12\""] {
            let out = format!("[\"START\",\"testA\"]\n[\"ASSERT_SAME_FAILED\",1,2,\"\",{line}]\n");
            let err = parse(&out).unwrap_err();
            assert!(matches!(err, DomainError::EventStream { line: 2, .. }), "{line}: {err}");
        }
        let summary = parse("[\"START\",\"testA\"]\n[\"ASSERT_SAME_FAILED\",1,2,\"\",7.0]\n").unwrap();
        assert_eq!(summary.failures[0].line, 7);
    }

    #[test]
    fn failures_carry_json_rendered_values() {
        let out = concat!(
            "[\"START\",\"testA\"]\n",
            "[\"ASSERT_SAME_FAILED\",\"abc\",\"abd\",\"\",14]\n",
            "[\"START\",\"testB\"]\n",
            "[\"ASSERT_EQUALS_FAILED\",[1,2],[1,3],\"arrays differ\",20]\n",
            "[\"ASSERT_BOOL_FAILED\",\"true\",false,\"\",21]\n",
            "[\"FINISHED\"]\n",
        );
        let summary = parse(out).unwrap();
        assert_eq!(summary.tests, 2);
        assert_eq!(summary.assertions, 3);
        let f = &summary.failures;
        assert_eq!(f[0].name, "FooTest::testA");
        assert_eq!(f[0].reason, "Failed asserting that \"abd\" is identical to \"abc\"");
        assert_eq!(f[0].line, 14);
        assert_eq!(f[1].name, "FooTest::testB");
        assert_eq!(f[1].reason, "Failed asserting that [1,3] matches expected [1,2]");
        assert_eq!(f[1].message, "arrays differ");
        assert_eq!(f[2].reason, "Failed asserting that false is true");
        assert_eq!(f[2].file, Path::new("/p/tests/FooTest.php"));
    }

    #[test]
    fn not_equal_and_not_same_reasons() {
        let out = "[\"START\",\"t\"]\n[\"ASSERT_NOT_EQUALS_FAILED\",1,1,\"\",3]\n[\"ASSERT_NOT_SAME_FAILED\",null,null,\"\",4]\n";
        let f = parse(out).unwrap().failures;
        assert_eq!(f[0].reason, "Failed asserting that 1 is not equal to 1");
        assert_eq!(f[1].reason, "Failed asserting that null is not identical to null");
    }

    #[test]
    fn unknown_tag_rejects_whole_output() {
        let err = parse("[\"START\",\"t\"]\n[\"ASSERT_OK\"]\n[\"BOGUS\"]\n[\"FINISHED\"]\n").unwrap_err();
        assert_eq!(err.to_string(), "output line 3: [\"BOGUS\"]: unexpected op BOGUS");
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(parse("PHP Fatal error: oops\n").is_err());
        assert!(parse("[]\n").unwrap_err().to_string().contains("empty fields"));
        assert!(parse("[\"START\"]\n").unwrap_err().to_string().contains("missing field 1"));
        assert!(parse("[42]\n").is_err());
        assert!(parse("{\"op\":\"START\"}\n").is_err());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let summary = parse("\n\n[\"ASSERT_OK\"]\n\n").unwrap();
        assert_eq!(summary.assertions, 1);
        assert!(!summary.finished);
    }

    proptest! {
        #[test]
        fn never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = parse_event_stream(&bytes, "X", Path::new("x"));
        }
    }
}
