//! Syntax tree produced by the structural parser.
//!
//! Only declarations are modelled. Statement bodies are reduced to the method calls
//! found inside them; everything else is skipped by brace matching.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    /// 1-based line of `start`.
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub value: String,
    pub span: Span,
}

/// A possibly qualified name exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub value: String,
    pub span: Span,
}

impl Name {
    pub fn is_fully_qualified(&self) -> bool {
        self.value.starts_with('\\')
    }

    /// The name without a leading separator.
    pub fn unqualified(&self) -> &str {
        self.value.trim_start_matches('\\')
    }

    pub fn last_segment(&self) -> &str {
        self.value.rsplit('\\').next().unwrap_or(&self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFile {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Namespace(Namespace),
    Use(UseDecl),
    ClassLike(ClassLike),
    Function(Function),
    MethodCall(MethodCall),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// `None` for the global namespace block `namespace { ... }`.
    pub name: Option<Name>,
    pub braced: bool,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Class,
    Function,
    Const,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseDecl {
    pub kind: UseKind,
    pub clauses: Vec<UseClause>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseClause {
    /// Full imported name. For group uses this joins prefix and member, while `span`
    /// covers only the member as written inside the braces.
    pub name: Name,
    pub alias: Option<Ident>,
    pub grouped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLike {
    pub kind: ClassKind,
    pub name: Ident,
    pub modifiers: Vec<String>,
    pub extends: Vec<Name>,
    pub implements: Vec<Name>,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: Ident,
    pub modifiers: Vec<String>,
    /// `None` for abstract and interface methods.
    pub body: Option<Vec<Node>>,
}

impl Method {
    pub fn is_static(&self) -> bool {
        self.modifiers.iter().any(|m| m.eq_ignore_ascii_case("static"))
    }

    pub fn calls(&self) -> impl Iterator<Item = &MethodCall> {
        self.body.iter().flatten().filter_map(|node| match node {
            Node::MethodCall(call) => Some(call),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: Ident,
    pub body: Vec<Node>,
}

/// `$receiver->method(` or `$receiver?->method(`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    /// Variable name without the `$`.
    pub receiver: String,
    pub method: Ident,
    pub open_paren: Span,
    pub nullsafe: bool,
}
