use crate::ParseError;
use crate::ast::{
    ClassKind, ClassLike, Function, Ident, Method, MethodCall, Name, Namespace, Node, Span,
    UseClause, UseDecl, UseKind,
};
use crate::lexer::{Token, TokenKind};

const CLASS_MODIFIERS: &[&str] = &["abstract", "final", "readonly"];
const MEMBER_MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "abstract",
    "final",
    "var",
    "readonly",
];
const BLOCK_CONTINUATIONS: &[&str] = &["else", "elseif", "catch", "finally", "while"];

pub(crate) struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    line_starts: Vec<usize>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, tokens: Vec<Token>) -> Self {
        let line_starts = std::iter::once(0)
            .chain(src.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            src,
            tokens: tokens.into_iter().filter(|t| !t.is_trivia()).collect(),
            pos: 0,
            line_starts,
        }
    }

    pub(crate) fn parse_file(mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        while !self.eof() {
            if self.at_namespace_decl() {
                nodes.push(Node::Namespace(self.namespace()?));
            } else {
                self.statement(&mut nodes)?;
            }
        }
        Ok(nodes)
    }

    // ------------------------------------------------------------------
    // token helpers
    // ------------------------------------------------------------------

    fn eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_at(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).copied()
    }

    fn text(&self, tok: Token) -> &'a str {
        tok.text(self.src)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek_at(0);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn is_punct(&self, tok: Option<Token>, p: &str) -> bool {
        tok.is_some_and(|t| t.kind == TokenKind::Punct && self.text(t) == p)
    }

    fn is_keyword(&self, tok: Option<Token>, kw: &str) -> bool {
        tok.is_some_and(|t| t.kind == TokenKind::Ident && self.text(t).eq_ignore_ascii_case(kw))
    }

    fn is_name(tok: Option<Token>) -> bool {
        tok.is_some_and(|t| matches!(t.kind, TokenKind::Ident | TokenKind::Name))
    }

    fn at_punct(&self, p: &str) -> bool {
        self.is_punct(self.peek_at(0), p)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        self.is_keyword(self.peek_at(0), kw)
    }

    fn at_semi(&self) -> bool {
        self.at_punct(";") || self.peek_at(0).is_some_and(|t| t.kind == TokenKind::CloseTag)
    }

    fn line(&self, offset: usize) -> u32 {
        self.line_starts.partition_point(|s| *s <= offset) as u32
    }

    fn span(&self, tok: Token) -> Span {
        Span {
            start: tok.start,
            end: tok.end,
            line: self.line(tok.start),
        }
    }

    fn ident(&self, tok: Token) -> Ident {
        Ident {
            value: self.text(tok).to_string(),
            span: self.span(tok),
        }
    }

    fn name(&self, tok: Token) -> Name {
        Name {
            value: self.text(tok).to_string(),
            span: self.span(tok),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let offset = self
            .peek_at(0)
            .map_or(self.src.len(), |t| t.start);
        ParseError::at(self.src, offset, message)
    }

    fn expect_name(&mut self, what: &str) -> Result<Token, ParseError> {
        match self.peek_at(0) {
            Some(tok) if Self::is_name(Some(tok)) => {
                self.pos += 1;
                Ok(tok)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    fn at_namespace_decl(&self) -> bool {
        self.at_keyword("namespace")
            && (Self::is_name(self.peek_at(1)) || self.is_punct(self.peek_at(1), "{"))
    }

    fn namespace(&mut self) -> Result<Namespace, ParseError> {
        self.bump();
        let name = if Self::is_name(self.peek_at(0)) {
            self.bump().map(|t| self.name(t))
        } else {
            None
        };
        if self.at_punct("{") {
            self.bump();
            let body = self.block_body()?;
            return Ok(Namespace {
                name,
                braced: true,
                body,
            });
        }
        if !self.at_semi() {
            return Err(self.error("expected ';' or '{' after namespace name"));
        }
        self.bump();
        let mut body = Vec::new();
        while !self.eof() && !self.at_namespace_decl() {
            self.statement(&mut body)?;
        }
        Ok(Namespace {
            name,
            braced: false,
            body,
        })
    }

    /// Statements up to and including the closing `}`.
    fn block_body(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            if self.eof() {
                return Err(self.error("unexpected end of file, expected '}'"));
            }
            if self.at_punct("}") {
                self.bump();
                return Ok(nodes);
            }
            self.statement(&mut nodes)?;
        }
    }

    fn statement(&mut self, out: &mut Vec<Node>) -> Result<(), ParseError> {
        self.skip_attributes()?;
        if self.eof() {
            return Ok(());
        }
        if self.at_semi() {
            self.bump();
            return Ok(());
        }
        if self.at_punct("}") {
            return Err(self.error("unexpected '}'"));
        }
        if self.at_punct("{") {
            self.bump();
            out.extend(self.block_body()?);
            return Ok(());
        }
        if self.at_keyword("use") {
            out.push(Node::Use(self.use_decl()?));
            return Ok(());
        }
        if let Some(class) = self.class_like()? {
            out.push(Node::ClassLike(class));
            return Ok(());
        }
        if self.at_keyword("function") {
            let name_at = if self.is_punct(self.peek_at(1), "&") { 2 } else { 1 };
            if self.peek_at(name_at).is_some_and(|t| t.kind == TokenKind::Ident) {
                out.push(Node::Function(self.function()?));
                return Ok(());
            }
        }
        self.skip_statement(out)
    }

    fn skip_attributes(&mut self) -> Result<(), ParseError> {
        while self.at_punct("#[") {
            self.bump();
            let mut depth = 1usize;
            while depth > 0 {
                let Some(tok) = self.bump() else {
                    return Err(self.error("unterminated attribute"));
                };
                match (tok.kind, self.text(tok)) {
                    (TokenKind::Punct, "[" | "#[") => depth += 1,
                    (TokenKind::Punct, "]") => depth -= 1,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Consume one expression or control statement. Braced blocks at statement level
    /// are parsed recursively so conditional declarations are still found.
    fn skip_statement(&mut self, out: &mut Vec<Node>) -> Result<(), ParseError> {
        let mut depth = 0usize;
        while let Some(tok) = self.peek_at(0) {
            if depth == 0 && self.at_semi() {
                self.bump();
                return Ok(());
            }
            if tok.kind != TokenKind::Punct {
                self.bump();
                continue;
            }
            match self.text(tok) {
                "(" | "[" | "#[" => depth += 1,
                ")" | "]" => depth = depth.saturating_sub(1),
                "}" if depth == 0 => return Ok(()),
                "}" => depth -= 1,
                "{" if depth == 0 => {
                    self.bump();
                    out.extend(self.block_body()?);
                    if !self.continues_after_block() {
                        return Ok(());
                    }
                    continue;
                }
                "{" => depth += 1,
                _ => {}
            }
            self.bump();
        }
        if depth > 0 {
            return Err(self.error("unexpected end of file inside an expression"));
        }
        Ok(())
    }

    fn continues_after_block(&self) -> bool {
        let Some(next) = self.peek_at(0) else {
            return false;
        };
        match next.kind {
            TokenKind::CloseTag => true,
            TokenKind::Punct => !matches!(self.text(next), "{" | "}" | "#["),
            TokenKind::Ident => BLOCK_CONTINUATIONS
                .iter()
                .any(|kw| self.text(next).eq_ignore_ascii_case(kw)),
            _ => false,
        }
    }

    fn use_decl(&mut self) -> Result<UseDecl, ParseError> {
        self.bump();
        let kind = self.use_kind();
        let mut clauses = Vec::new();
        loop {
            let tok = self.expect_name("imported name")?;
            let prefix = self.name(tok);
            if self.at_punct("\\") && self.is_punct(self.peek_at(1), "{") {
                self.bump();
                self.bump();
                self.group_use(&prefix, &mut clauses)?;
            } else {
                let alias = self.alias()?;
                clauses.push(UseClause {
                    name: prefix,
                    alias,
                    grouped: false,
                });
            }
            if self.at_punct(",") {
                self.bump();
                continue;
            }
            break;
        }
        if !self.at_semi() {
            return Err(self.error("expected ';' after use declaration"));
        }
        self.bump();
        Ok(UseDecl { kind, clauses })
    }

    fn use_kind(&mut self) -> UseKind {
        let kind = if self.at_keyword("function") {
            UseKind::Function
        } else if self.at_keyword("const") {
            UseKind::Const
        } else {
            return UseKind::Class;
        };
        if Self::is_name(self.peek_at(1)) {
            self.bump();
            kind
        } else {
            UseKind::Class
        }
    }

    fn group_use(&mut self, prefix: &Name, clauses: &mut Vec<UseClause>) -> Result<(), ParseError> {
        loop {
            if self.at_punct("}") {
                self.bump();
                return Ok(());
            }
            self.use_kind();
            let tok = self.expect_name("name inside group use")?;
            let member = self.name(tok);
            let alias = self.alias()?;
            clauses.push(UseClause {
                name: Name {
                    value: format!("{}\\{}", prefix.value, member.value),
                    span: member.span,
                },
                alias,
                grouped: true,
            });
            if self.at_punct(",") {
                self.bump();
            } else if !self.at_punct("}") {
                return Err(self.error("expected ',' or '}' in group use"));
            }
        }
    }

    fn alias(&mut self) -> Result<Option<Ident>, ParseError> {
        if !self.at_keyword("as") {
            return Ok(None);
        }
        self.bump();
        let tok = self.expect_name("alias")?;
        Ok(Some(self.ident(tok)))
    }

    // ------------------------------------------------------------------
    // declarations
    // ------------------------------------------------------------------

    fn class_like(&mut self) -> Result<Option<ClassLike>, ParseError> {
        let mut n = 0;
        while CLASS_MODIFIERS
            .iter()
            .any(|m| self.is_keyword(self.peek_at(n), m))
        {
            n += 1;
        }
        let kind_tok = self.peek_at(n);
        let kind = if self.is_keyword(kind_tok, "class") {
            ClassKind::Class
        } else if self.is_keyword(kind_tok, "interface") {
            ClassKind::Interface
        } else if self.is_keyword(kind_tok, "trait") {
            ClassKind::Trait
        } else if self.is_keyword(kind_tok, "enum") {
            ClassKind::Enum
        } else {
            return Ok(None);
        };
        if !self.peek_at(n + 1).is_some_and(|t| t.kind == TokenKind::Ident) {
            return Ok(None);
        }

        let mut modifiers = Vec::with_capacity(n);
        for _ in 0..n {
            if let Some(tok) = self.bump() {
                modifiers.push(self.text(tok).to_ascii_lowercase());
            }
        }
        self.bump();
        let name_tok = self.expect_name("class name")?;
        let name = self.ident(name_tok);

        let mut extends = Vec::new();
        let mut implements = Vec::new();
        while !self.at_punct("{") {
            if self.eof() {
                return Err(self.error(format!("expected '{{' to open body of {}", name.value)));
            }
            if self.at_keyword("extends") {
                self.bump();
                extends = self.name_list()?;
            } else if self.at_keyword("implements") {
                self.bump();
                implements = self.name_list()?;
            } else {
                self.bump();
            }
        }
        self.bump();
        let methods = self.class_body(&name.value)?;
        Ok(Some(ClassLike {
            kind,
            name,
            modifiers,
            extends,
            implements,
            methods,
        }))
    }

    fn name_list(&mut self) -> Result<Vec<Name>, ParseError> {
        let mut names = Vec::new();
        loop {
            let tok = self.expect_name("type name")?;
            names.push(self.name(tok));
            if !self.at_punct(",") {
                return Ok(names);
            }
            self.bump();
        }
    }

    fn class_body(&mut self, class: &str) -> Result<Vec<Method>, ParseError> {
        let mut methods = Vec::new();
        loop {
            self.skip_attributes()?;
            if self.eof() {
                return Err(self.error(format!("unterminated body of {class}")));
            }
            if self.at_punct("}") {
                self.bump();
                return Ok(methods);
            }
            if self.at_keyword("use") {
                self.skip_member()?;
                continue;
            }
            let mut modifiers = Vec::new();
            while let Some(tok) = self.peek_at(0) {
                let text = self.text(tok);
                if tok.kind != TokenKind::Ident
                    || !MEMBER_MODIFIERS.iter().any(|m| text.eq_ignore_ascii_case(m))
                {
                    break;
                }
                modifiers.push(text.to_ascii_lowercase());
                self.bump();
            }
            if self.at_keyword("function") {
                methods.push(self.method(modifiers)?);
            } else {
                self.skip_member()?;
            }
        }
    }

    /// Properties, constants, enum cases and trait uses. A member ends at `;` or at
    /// the `}` closing a block it opened (trait adaptations, property hooks).
    fn skip_member(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        while let Some(tok) = self.peek_at(0) {
            if tok.kind == TokenKind::Punct {
                match self.text(tok) {
                    ";" if depth == 0 => {
                        self.bump();
                        return Ok(());
                    }
                    "}" if depth == 0 => return Ok(()),
                    "}" => {
                        depth -= 1;
                        if depth == 0 {
                            self.bump();
                            return Ok(());
                        }
                    }
                    "(" | "[" | "{" | "#[" => depth += 1,
                    ")" | "]" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            self.bump();
        }
        Err(self.error("unexpected end of file inside class body"))
    }

    fn method(&mut self, modifiers: Vec<String>) -> Result<Method, ParseError> {
        self.bump();
        if self.at_punct("&") {
            self.bump();
        }
        let name_tok = self.expect_name("method name")?;
        let name = self.ident(name_tok);
        self.skip_parens()?;
        loop {
            if self.at_semi() {
                self.bump();
                return Ok(Method {
                    name,
                    modifiers,
                    body: None,
                });
            }
            if self.at_punct("{") {
                self.bump();
                let body = self.scan_body()?;
                return Ok(Method {
                    name,
                    modifiers,
                    body: Some(body),
                });
            }
            if self.eof() || self.at_punct("}") {
                return Err(self.error(format!("expected body of method {}", name.value)));
            }
            self.bump();
        }
    }

    fn function(&mut self) -> Result<Function, ParseError> {
        self.bump();
        if self.at_punct("&") {
            self.bump();
        }
        let name_tok = self.expect_name("function name")?;
        let name = self.ident(name_tok);
        self.skip_parens()?;
        while !self.at_punct("{") {
            if self.eof() || self.at_semi() {
                return Err(self.error(format!("expected body of function {}", name.value)));
            }
            self.bump();
        }
        self.bump();
        let body = self.scan_body()?;
        Ok(Function { name, body })
    }

    fn skip_parens(&mut self) -> Result<(), ParseError> {
        if !self.at_punct("(") {
            return Err(self.error("expected '('"));
        }
        let mut depth = 0usize;
        while let Some(tok) = self.bump() {
            if tok.kind != TokenKind::Punct {
                continue;
            }
            match self.text(tok) {
                "(" => depth += 1,
                ")" => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(self.error("unbalanced parentheses"))
    }

    /// Body after its opening `{`, through the matching `}`. Only method calls on a
    /// variable receiver are kept.
    fn scan_body(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        let mut depth = 1usize;
        while depth > 0 {
            let Some(tok) = self.peek_at(0) else {
                return Err(self.error("unexpected end of file, expected '}'"));
            };
            match tok.kind {
                TokenKind::Punct if self.text(tok) == "{" => depth += 1,
                TokenKind::Punct if self.text(tok) == "}" => depth -= 1,
                TokenKind::Variable => {
                    if let Some(call) = self.method_call_at(tok) {
                        nodes.push(Node::MethodCall(call));
                    }
                }
                _ => {}
            }
            self.bump();
        }
        Ok(nodes)
    }

    fn method_call_at(&self, var: Token) -> Option<MethodCall> {
        let arrow = self.peek_at(1)?;
        let nullsafe = match (arrow.kind, self.text(arrow)) {
            (TokenKind::Punct, "->") => false,
            (TokenKind::Punct, "?->") => true,
            _ => return None,
        };
        let method = self.peek_at(2).filter(|t| t.kind == TokenKind::Ident)?;
        let paren = self.peek_at(3)?;
        if !self.is_punct(Some(paren), "(") {
            return None;
        }
        Some(MethodCall {
            receiver: self.text(var).trim_start_matches('$').to_string(),
            method: self.ident(method),
            open_paren: self.span(paren),
            nullsafe,
        })
    }
}
