//! Byte-level PHP tokenizer.
//!
//! Produces just enough token kinds for structural parsing: names, variables, literals
//! and punctuation. Strings, comments and heredocs are opaque single tokens so that
//! braces inside them never confuse the parser.

use crate::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    InlineHtml,
    OpenTag,
    CloseTag,
    /// Unqualified identifier or keyword.
    Ident,
    /// Name containing a namespace separator (`Foo\Bar`, `\Foo`).
    Name,
    Variable,
    Number,
    String,
    Comment,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Comment | TokenKind::InlineHtml | TokenKind::OpenTag
        )
    }
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    Lexer {
        src,
        bytes: src.as_bytes(),
        pos: 0,
        tokens: Vec::new(),
    }
    .run()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while self.pos < self.bytes.len() {
            self.inline_html();
            self.php()?;
        }
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            start,
            end: self.pos,
        });
    }

    fn at(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error(&self, message: &str, offset: usize) -> ParseError {
        ParseError::at(self.src, offset, message)
    }

    fn inline_html(&mut self) {
        let start = self.pos;
        let rest = &self.bytes[start..];
        let Some(offset) = rest.windows(2).position(|w| w == b"<?") else {
            self.pos = self.bytes.len();
            self.push(TokenKind::InlineHtml, start);
            return;
        };
        if offset > 0 {
            self.pos = start + offset;
            self.push(TokenKind::InlineHtml, start);
        }
        let tag_start = start + offset;
        self.pos = tag_start + 2;
        let after = &self.bytes[self.pos..];
        if after.len() >= 3 && after[..3].eq_ignore_ascii_case(b"php") {
            self.pos += 3;
        } else if after.first() == Some(&b'=') {
            self.pos += 1;
        }
        self.push(TokenKind::OpenTag, tag_start);
    }

    fn php(&mut self) -> Result<(), ParseError> {
        while let Some(b) = self.byte_at(0) {
            let start = self.pos;
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'?' if self.at("?>") => {
                    self.pos += 2;
                    if self.byte_at(0) == Some(b'\n') {
                        self.pos += 1;
                    }
                    self.push(TokenKind::CloseTag, start);
                    return Ok(());
                }
                b'#' if self.at("#[") => {
                    self.pos += 2;
                    self.push(TokenKind::Punct, start);
                }
                b'#' => self.line_comment(),
                b'/' if self.at("//") => self.line_comment(),
                b'/' if self.at("/*") => self.block_comment()?,
                b'\'' | b'"' | b'`' => self.quoted(b)?,
                b'<' if self.at("<<<") && self.heredoc()? => {}
                b'$' if self.byte_at(1).is_some_and(is_ident_start) => {
                    self.pos += 1;
                    self.eat_ident_chars();
                    self.push(TokenKind::Variable, start);
                }
                b'\\' if self.byte_at(1).is_some_and(is_ident_start) => self.name(),
                b if is_ident_start(b) => self.name(),
                b'0'..=b'9' => {
                    while let Some(c) = self.byte_at(0) {
                        let fraction = c == b'.' && self.byte_at(1).is_some_and(|d| d.is_ascii_digit());
                        if !(is_ident_char(c) || fraction) {
                            break;
                        }
                        self.pos += 1;
                    }
                    self.push(TokenKind::Number, start);
                }
                _ => {
                    let len = ["?->", "->", "::", "=>"]
                        .iter()
                        .find(|op| self.at(op))
                        .map_or(1, |op| op.len());
                    self.pos += len;
                    self.push(TokenKind::Punct, start);
                }
            }
        }
        Ok(())
    }

    fn eat_ident_chars(&mut self) {
        while self.byte_at(0).is_some_and(is_ident_char) {
            self.pos += 1;
        }
    }

    fn name(&mut self) {
        let start = self.pos;
        let mut qualified = false;
        if self.byte_at(0) == Some(b'\\') {
            self.pos += 1;
            qualified = true;
        }
        loop {
            self.eat_ident_chars();
            if self.byte_at(0) == Some(b'\\') && self.byte_at(1).is_some_and(is_ident_start) {
                self.pos += 1;
                qualified = true;
            } else {
                break;
            }
        }
        let kind = if qualified {
            TokenKind::Name
        } else {
            TokenKind::Ident
        };
        self.push(kind, start);
    }

    fn line_comment(&mut self) {
        let start = self.pos;
        while let Some(b) = self.byte_at(0) {
            if b == b'\n' || self.at("?>") {
                break;
            }
            self.pos += 1;
        }
        self.push(TokenKind::Comment, start);
    }

    fn block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let body = &self.bytes[start + 2..];
        let Some(offset) = body.windows(2).position(|w| w == b"*/") else {
            return Err(self.error("unterminated comment", start));
        };
        self.pos = start + 2 + offset + 2;
        self.push(TokenKind::Comment, start);
        Ok(())
    }

    fn quoted(&mut self, quote: u8) -> Result<(), ParseError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.byte_at(0) {
                None => return Err(self.error("unterminated string literal", start)),
                Some(b'\\') => self.pos += 2,
                Some(b) if b == quote => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.pos += 1,
            }
        }
        self.push(TokenKind::String, start);
        Ok(())
    }

    /// Heredoc or nowdoc. Returns `false` (consuming nothing) when `<<<` is not
    /// followed by a valid label.
    fn heredoc(&mut self) -> Result<bool, ParseError> {
        let start = self.pos;
        let mut p = start + 3;
        while matches!(self.bytes.get(p), Some(b' ' | b'\t')) {
            p += 1;
        }
        let quote = match self.bytes.get(p) {
            Some(q @ (b'\'' | b'"')) => {
                p += 1;
                Some(*q)
            }
            _ => None,
        };
        let label_start = p;
        while self.bytes.get(p).copied().is_some_and(is_ident_char) {
            p += 1;
        }
        if p == label_start || !is_ident_start(self.bytes[label_start]) {
            return Ok(false);
        }
        let label = &self.bytes[label_start..p];
        if let Some(q) = quote {
            if self.bytes.get(p) != Some(&q) {
                return Ok(false);
            }
            p += 1;
        }
        if self.bytes.get(p) == Some(&b'\r') {
            p += 1;
        }
        if self.bytes.get(p) != Some(&b'\n') {
            return Ok(false);
        }
        p += 1;

        // the closing label starts a line, optionally indented
        loop {
            let mut q = p;
            while matches!(self.bytes.get(q), Some(b' ' | b'\t')) {
                q += 1;
            }
            if self.bytes[q..].starts_with(label)
                && !self
                    .bytes
                    .get(q + label.len())
                    .copied()
                    .is_some_and(is_ident_char)
            {
                self.pos = q + label.len();
                self.push(TokenKind::String, start);
                return Ok(true);
            }
            match self.bytes[p..].iter().position(|b| *b == b'\n') {
                Some(nl) => p += nl + 1,
                None => return Err(self.error("unterminated heredoc", start)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, &str)> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text(src)))
            .collect()
    }

    #[test]
    fn splits_inline_html_and_tags() {
        let toks = kinds("<html><?php echo 1; ?>\n<p>");
        assert_eq!(toks[0], (TokenKind::InlineHtml, "<html>"));
        assert_eq!(toks[1], (TokenKind::OpenTag, "<?php"));
        assert_eq!(toks[2], (TokenKind::Ident, "echo"));
        assert_eq!(toks[5], (TokenKind::CloseTag, "?>\n"));
        assert_eq!(toks[6], (TokenKind::InlineHtml, "<p>"));
    }

    #[test]
    fn qualified_names_are_single_tokens() {
        let toks = kinds("<?php use \\PHPUnit\\Framework\\TestCase;");
        assert_eq!(toks[2], (TokenKind::Name, "\\PHPUnit\\Framework\\TestCase"));
    }

    #[test]
    fn braces_inside_strings_and_comments_are_opaque() {
        let toks = kinds("<?php $a = '{'; /* } */ \"}\\\"{\"; // }\n#}\n");
        let puncts: Vec<&str> = toks
            .iter()
            .filter(|(k, _)| *k == TokenKind::Punct)
            .map(|(_, t)| *t)
            .collect();
        assert_eq!(puncts, vec!["=", ";", ";"]);
    }

    #[test]
    fn arrows_are_one_token() {
        let toks = kinds("<?php $this->assertTrue(true); $x?->y; A::b;");
        assert!(toks.contains(&(TokenKind::Punct, "->")));
        assert!(toks.contains(&(TokenKind::Punct, "?->")));
        assert!(toks.contains(&(TokenKind::Punct, "::")));
        assert!(toks.contains(&(TokenKind::Variable, "$this")));
    }

    #[test]
    fn heredoc_and_nowdoc_swallow_their_body() {
        let src = "<?php $a = <<<EOT\n  } class X {\n  EOT;\n$b = <<<'RAW'\n{\nRAW;\n";
        let toks = kinds(src);
        let strings: Vec<&str> = toks
            .iter()
            .filter(|(k, _)| *k == TokenKind::String)
            .map(|(_, t)| *t)
            .collect();
        assert_eq!(strings.len(), 2);
        assert!(strings[0].ends_with("EOT"));
        assert!(!toks.iter().any(|(k, t)| *k == TokenKind::Ident && *t == "class"));
    }

    #[test]
    fn shift_operator_is_not_a_heredoc() {
        let toks = kinds("<?php $a = 1 <<< 2;");
        assert!(toks.iter().any(|(_, t)| *t == "<"));
    }

    #[test]
    fn unterminated_string_reports_its_line() {
        let err = tokenize("<?php\n\n$a = 'oops;\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        assert!(tokenize("<?php /* never closed").is_err());
    }
}
