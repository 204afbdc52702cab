//! Tolerant PHP syntax tree for unit discovery.
//!
//! Parses the declaration skeleton of a PHP file: namespaces, `use` imports, classes
//! with their methods, and `$var->method(` calls inside method bodies. Expressions and
//! statements are skipped by bracket matching, so any file a PHP engine accepts parses
//! here; the converse does not hold.

pub mod ast;
pub mod lexer;
mod parser;

pub use ast::{
    ClassKind, ClassLike, Function, Ident, Method, MethodCall, Name, Namespace, Node,
    SourceFile, Span, UseClause, UseDecl, UseKind,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl ParseError {
    pub(crate) fn at(src: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(src.len());
        let line = src.as_bytes()[..offset]
            .iter()
            .filter(|b| **b == b'\n')
            .count() as u32
            + 1;
        Self {
            message: message.into(),
            line,
        }
    }
}

pub fn parse(src: &str) -> Result<SourceFile, ParseError> {
    let tokens = lexer::tokenize(src)?;
    let nodes = parser::Parser::new(src, tokens).parse_file()?;
    Ok(SourceFile { nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classes(nodes: &[Node]) -> Vec<&ClassLike> {
        let mut out = Vec::new();
        for node in nodes {
            match node {
                Node::ClassLike(c) => out.push(c),
                Node::Namespace(ns) => out.extend(classes(&ns.body)),
                _ => {}
            }
        }
        out
    }

    #[test]
    fn parses_namespace_class_and_methods() {
        let src = r#"<?php
namespace Acme\Bench;

use Acme\Util\Strings;

class BenchmarkConcat {
    private $parts = ['a', 'b'];
    const N = 10;

    public function benchmarkImplode() {
        return implode('', $this->parts);
    }

    public static function helper(): int { return 1; }
}
"#;
        let file = parse(src).unwrap();
        let Node::Namespace(ns) = &file.nodes[0] else {
            panic!("expected namespace, got {:?}", file.nodes[0]);
        };
        assert_eq!(ns.name.as_ref().unwrap().value, "Acme\\Bench");
        assert!(!ns.braced);
        assert!(matches!(ns.body[0], Node::Use(_)));

        let class = classes(&file.nodes)[0];
        assert_eq!(class.kind, ClassKind::Class);
        assert_eq!(class.name.value, "BenchmarkConcat");
        let names: Vec<&str> = class.methods.iter().map(|m| m.name.value.as_str()).collect();
        assert_eq!(names, vec!["benchmarkImplode", "helper"]);
        assert!(class.methods[1].is_static());
        assert_eq!(class.name.span.line, 6);
    }

    #[test]
    fn records_method_calls_with_spans() {
        let src = "<?php\nclass FooTest extends TestCase {\n  function testA() {\n    $this->assertSame(1, f(2));\n    $other?->go();\n    $this->prop->notACall;\n  }\n}\n";
        let file = parse(src).unwrap();
        let class = classes(&file.nodes)[0];
        let calls: Vec<&MethodCall> = class.methods[0].calls().collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].receiver, "this");
        assert_eq!(calls[0].method.value, "assertSame");
        assert_eq!(calls[0].method.span.line, 4);
        assert_eq!(&src[calls[0].method.span.start..calls[0].open_paren.end], "assertSame(");
        assert!(calls[1].nullsafe);
        assert_eq!(class.extends[0].value, "TestCase");
    }

    #[test]
    fn parses_use_forms() {
        let src = "<?php\nuse PHPUnit\\Framework\\TestCase;\nuse function Foo\\bar as baz;\nuse Acme\\{A, B as C};\n";
        let file = parse(src).unwrap();
        let uses: Vec<&UseDecl> = file
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Use(u) => Some(u),
                _ => None,
            })
            .collect();
        assert_eq!(uses.len(), 3);
        let clause = &uses[0].clauses[0];
        assert_eq!(clause.name.value, "PHPUnit\\Framework\\TestCase");
        assert_eq!(
            &src[clause.name.span.start..clause.name.span.end],
            "PHPUnit\\Framework\\TestCase"
        );
        assert_eq!(uses[1].kind, UseKind::Function);
        assert_eq!(uses[1].clauses[0].alias.as_ref().unwrap().value, "baz");
        assert_eq!(uses[2].clauses.len(), 2);
        assert_eq!(uses[2].clauses[1].name.value, "Acme\\B");
        assert!(uses[2].clauses[1].grouped);
    }

    #[test]
    fn finds_classes_inside_braced_namespaces_and_conditionals() {
        let src = r#"<?php
namespace A { class First {} }
namespace B {
    if (!class_exists('Second')) {
        final class Second { public function x() {} }
    } else {
        $f = function () use ($y) { return [1, 2]; };
    }
}
"#;
        let file = parse(src).unwrap();
        let names: Vec<&str> = classes(&file.nodes)
            .iter()
            .map(|c| c.name.value.as_str())
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn skips_anonymous_classes_class_constants_and_attributes() {
        let src = r#"<?php
#[Attribute(Attribute::TARGET_CLASS)]
class Real {
    use SomeTrait { foo as bar; }
    #[Pure]
    public function f() { $x = new class { public function g() {} }; return Real::class; }
    abstract protected function h(): void;
}
$anon = new class extends Real {};
"#;
        let file = parse(src).unwrap();
        let found = classes(&file.nodes);
        assert_eq!(found.len(), 1);
        let methods: Vec<&str> = found[0].methods.iter().map(|m| m.name.value.as_str()).collect();
        assert_eq!(methods, vec!["f", "h"]);
        assert!(found[0].methods[1].body.is_none());
    }

    #[test]
    fn unbalanced_braces_are_parse_errors() {
        let err = parse("<?php\nclass A {\n  function f() {\n").unwrap_err();
        assert!(err.message.contains("expected '}'"), "{err}");
        assert!(parse("<?php\n}\n").is_err());
    }

    #[test]
    fn html_only_file_has_no_nodes() {
        assert_eq!(parse("<html>hello</html>").unwrap(), SourceFile::default());
    }

    proptest! {
        #[test]
        fn parse_never_panics(src in "\\PC{0,200}") {
            let _ = parse(&src);
        }

        #[test]
        fn parse_never_panics_on_php_like_input(
            body in prop::collection::vec(
                prop::sample::select(vec![
                    "class ", "A ", "{", "}", "(", ")", ";", "$this", "->", "f", "'", "\"",
                    "/*", "*/", "<<<X\n", "\nX", "namespace ", "use ", "\\", "#[", "]", "?>",
                ]),
                0..60,
            )
        ) {
            let src = format!("<?php {}", body.concat());
            let _ = parse(&src);
        }
    }
}
