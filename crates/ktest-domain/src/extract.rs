//! Benchmark and test unit discovery over the PHP syntax tree.

use crate::DomainError;
use ktest_phpsyntax::{ClassKind, ClassLike, Name, Node, SourceFile, UseKind};
use ktest_types::{
    BENCH_CLASS_PREFIX, BENCH_METHOD_PREFIX, BenchMethod, BenchmarkUnit, ExtractionIssue,
    IssueKind, PHP_EXT, TEST_CLASS_SUFFIX, TEST_METHOD_PREFIX, TestUnit, TextEdit,
};
use regex::Regex;
use std::path::Path;

const PHPUNIT_TEST_CASE: &str = "PHPUnit\\Framework\\TestCase";
const KPHPUNIT_TEST_CASE: &str = "KPHPUnit\\Framework\\TestCase";

/// Assertions that have a line-aware `...WithLine` twin in the compiled framework.
const LINE_AWARE_ASSERTS: &[&str] = &[
    "assertTrue",
    "assertFalse",
    "assertSame",
    "assertNotSame",
    "assertEquals",
    "assertNotEquals",
];

const SETUP_HOOK: &str = "setUpBeforeClass";
const TEARDOWN_HOOK: &str = "tearDownAfterClass";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchExtraction {
    pub unit: Option<BenchmarkUnit>,
    pub issues: Vec<ExtractionIssue>,
}

impl BenchExtraction {
    pub fn blocks_build(&self) -> bool {
        self.issues.iter().any(ExtractionIssue::blocks_build)
    }
}

/// `benchmark_concat` -> `concat`, `benchmarkConcat` -> `Concat`.
pub fn method_key(name: &str) -> String {
    let rest = name.strip_prefix(BENCH_METHOD_PREFIX).unwrap_or(name);
    rest.strip_prefix('_').unwrap_or(rest).to_string()
}

/// A class together with the namespace it was declared in.
struct Declared<'a> {
    namespace: &'a str,
    class: &'a ClassLike,
}

impl Declared<'_> {
    fn fqn(&self) -> String {
        if self.namespace.is_empty() {
            format!("\\{}", self.class.name.value)
        } else {
            format!("\\{}\\{}", self.namespace, self.class.name.value)
        }
    }
}

fn collect_classes<'a>(nodes: &'a [Node], namespace: &'a str, out: &mut Vec<Declared<'a>>) {
    for node in nodes {
        match node {
            Node::Namespace(ns) => {
                let name = ns.name.as_ref().map_or("", Name::unqualified);
                collect_classes(&ns.body, name, out);
            }
            Node::ClassLike(class) if class.kind == ClassKind::Class => {
                out.push(Declared { namespace, class });
            }
            Node::Function(f) => collect_classes(&f.body, namespace, out),
            Node::ClassLike(_) | Node::Use(_) | Node::MethodCall(_) => {}
        }
    }
}

pub fn extract_benchmark(file: &SourceFile, short_name: &str) -> BenchExtraction {
    let mut classes = Vec::new();
    collect_classes(&file.nodes, "", &mut classes);

    let mut out = BenchExtraction::default();
    for declared in &classes {
        let name = declared.class.name.value.as_str();
        if !name.starts_with(BENCH_CLASS_PREFIX) {
            if let Some(stem) = name.strip_suffix(BENCH_CLASS_PREFIX) {
                out.issues.push(ExtractionIssue {
                    kind: IssueKind::MisplacedMarker,
                    message: format!(
                        "perhaps you meant '{BENCH_CLASS_PREFIX}{stem}', class name should be prefixed with '{BENCH_CLASS_PREFIX}' and not suffixed"
                    ),
                });
            }
            continue;
        }

        if let Some(unit) = &out.unit {
            out.issues.push(ExtractionIssue {
                kind: IssueKind::ExtraClass,
                message: format!(
                    "class '{name}' ignored: only one benchmark class per file is supported, using '{}'",
                    unit.class_name
                ),
            });
            continue;
        }

        let file_name = Path::new(short_name)
            .file_name()
            .map_or_else(|| short_name.to_string(), |f| f.to_string_lossy().into_owned());
        let expected = format!("{name}{PHP_EXT}");
        if file_name != expected {
            out.issues.push(ExtractionIssue {
                kind: IssueKind::FileNameMismatch,
                message: format!(
                    "filename '{file_name}' does not match the class name '{name}' of the benchmark.\n\
                     KPHP will not be able to find the class.\n\n\
                     To fix, name the file '{expected}'"
                ),
            });
        }

        let methods = declared
            .class
            .methods
            .iter()
            .filter(|m| m.name.value.starts_with(BENCH_METHOD_PREFIX))
            .map(|m| BenchMethod {
                name: m.name.value.clone(),
                key: method_key(&m.name.value),
            })
            .collect();
        out.unit = Some(BenchmarkUnit {
            class_name: name.to_string(),
            class_fqn: declared.fqn(),
            methods,
        });
    }
    out
}

/// Keep only methods whose `Class::key` matches `filter`; returns how many survived
/// across all units.
pub fn select_methods(units: &mut [BenchmarkUnit], filter: &str) -> Result<usize, DomainError> {
    let re = Regex::new(filter).map_err(|source| DomainError::Pattern {
        pattern: filter.to_string(),
        source,
    })?;
    let mut selected = 0;
    for unit in units.iter_mut() {
        let class = unit.class_name.clone();
        unit.methods
            .retain(|m| re.is_match(&format!("{class}::{}", m.key)));
        selected += unit.methods.len();
    }
    if selected == 0 {
        return Err(DomainError::NothingSelected);
    }
    Ok(selected)
}

/// Find the test class of a file and the rewrites that make it build against the
/// compiled test framework. `None` when the file declares no `*Test` class.
pub fn extract_test(file: &SourceFile) -> Option<TestUnit> {
    let mut classes = Vec::new();
    collect_classes(&file.nodes, "", &mut classes);
    let declared = classes
        .iter()
        .find(|d| d.class.name.value.ends_with(TEST_CLASS_SUFFIX))?;
    let class = declared.class;

    let mut edits = Vec::new();
    collect_import_edits(&file.nodes, true, &mut edits);

    if let Some(parent) = class.extends.first() {
        let global = declared.namespace.is_empty();
        if parent.unqualified() == PHPUNIT_TEST_CASE && (parent.is_fully_qualified() || global) {
            edits.push(TextEdit::new(
                parent.span.start,
                parent.span.end,
                qualified_like(parent, KPHPUNIT_TEST_CASE),
            ));
        }
    }

    for method in &class.methods {
        for call in method.calls() {
            if call.receiver != "this" || call.nullsafe {
                continue;
            }
            let name = call.method.value.as_str();
            if LINE_AWARE_ASSERTS.contains(&name) {
                edits.push(TextEdit::new(
                    call.method.span.start,
                    call.open_paren.end,
                    format!("{name}WithLine({}, ", call.method.span.line),
                ));
            }
        }
    }
    edits.sort_by_key(|e| e.start);

    let has_method = |hook: &str| class.methods.iter().any(|m| m.name.value == hook);
    Some(TestUnit {
        class_name: class.name.value.clone(),
        class_fqn: declared.fqn(),
        methods: class
            .methods
            .iter()
            .map(|m| m.name.value.clone())
            .filter(|name| name.starts_with(TEST_METHOD_PREFIX))
            .collect(),
        has_setup_before_class: has_method(SETUP_HOOK),
        has_teardown_after_class: has_method(TEARDOWN_HOOK),
        edits,
    })
}

fn qualified_like(original: &Name, replacement: &str) -> String {
    if original.is_fully_qualified() {
        format!("\\{replacement}")
    } else {
        replacement.to_string()
    }
}

fn collect_import_edits(nodes: &[Node], top_level: bool, edits: &mut Vec<TextEdit>) {
    for node in nodes {
        match node {
            Node::Namespace(ns) if top_level => collect_import_edits(&ns.body, false, edits),
            Node::Use(decl) if decl.kind == UseKind::Class => {
                for clause in decl.clauses.iter().filter(|c| !c.grouped) {
                    if clause.name.unqualified() == PHPUNIT_TEST_CASE {
                        edits.push(TextEdit::new(
                            clause.name.span.start,
                            clause.name.span.end,
                            qualified_like(&clause.name, KPHPUNIT_TEST_CASE),
                        ));
                    }
                }
            }
            _ => {}
        }
    }
}
