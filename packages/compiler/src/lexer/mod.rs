//! The lexer (spec §4.1): one-token lookahead, arbitrary-depth
//! checkpointing for the parser's speculative template-argument lookahead,
//! and the `>>`-splitting toggle needed to tell `TEMPLATEEND` apart from
//! `GREATER`/`RIGHT`.

mod token;

pub use token::{Token, TokenKind};

use crate::diagnostics::{CompileError, ErrorKind, Phase, Position, SourceRange};

/// Known GULC keywords (spec §6's "Source language surface").
const KEYWORDS: &[&str] = &[
    "namespace", "import", "as", "struct", "class", "union", "trait", "enum", "extension",
    "func", "init", "deinit", "call", "operator", "prefix", "infix", "postfix", "subscript",
    "property", "get", "set", "ref", "typealias", "typesuffix", "var", "let", "const",
    "public", "private", "protected", "internal", "static", "extern", "mut", "immut",
    "volatile", "abstract", "virtual", "override", "val", "in", "out", "inout", "where",
    "requires", "ensures", "throws", "has", "is", "copy", "move", "self", "true", "false",
    "if", "else", "while", "do", "for", "switch", "case", "default", "fallthrough", "break",
    "continue", "goto", "return", "catch", "finally", "void", "bool",
];

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[derive(Clone)]
struct Checkpoint {
    position: usize,
    line: u32,
    column: u32,
    /// The pending one-token lookahead at the time of the checkpoint, if
    /// any — without this, rewinding after a `peek()` would restore the
    /// scan cursor but silently drop the already-scanned lookahead token.
    lookahead: Option<Token>,
    right_shift_enabled: bool,
}

/// Tokenizes source text on demand with one-token lookahead.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    position: usize,
    line: u32,
    column: u32,
    lookahead: Option<Token>,
    /// When `false`, a physical `>` always yields `TemplateEnd` and two
    /// adjacent `>` yield two `TemplateEnd`s rather than being merged into
    /// `>>` (spec §4.1).
    right_shift_enabled: bool,
    checkpoints: Vec<Checkpoint>,
    file: String,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: impl Into<String>) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            position: 0,
            line: 1,
            column: 1,
            lookahead: None,
            right_shift_enabled: true,
            checkpoints: Vec::new(),
            file: file.into(),
        }
    }

    pub fn set_right_shift_enabled(&mut self, enabled: bool) {
        self.right_shift_enabled = enabled;
    }

    pub fn right_shift_enabled(&self) -> bool {
        self.right_shift_enabled
    }

    /// Push a speculative checkpoint; `rewind` returns to it, `commit`
    /// discards it. Nestable to arbitrary depth (spec §4.1). Safe to call
    /// right after a `peek()` — the pending lookahead token is captured
    /// too, so rewinding never loses an already-scanned token.
    pub fn checkpoint(&mut self) {
        self.checkpoints.push(Checkpoint {
            position: self.position,
            line: self.line,
            column: self.column,
            lookahead: self.lookahead.clone(),
            right_shift_enabled: self.right_shift_enabled,
        });
    }

    pub fn commit(&mut self) {
        self.checkpoints.pop();
    }

    pub fn rewind(&mut self) {
        if let Some(cp) = self.checkpoints.pop() {
            self.position = cp.position;
            self.line = cp.line;
            self.column = cp.column;
            self.lookahead = cp.lookahead;
            self.right_shift_enabled = cp.right_shift_enabled;
        }
    }

    pub fn peek(&mut self) -> Result<Token, CompileError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.scan_token()?);
        }
        Ok(self.lookahead.clone().unwrap())
    }

    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        if let Some(t) = self.lookahead.take() {
            return Ok(t);
        }
        self.scan_token()
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn error(&self, start: Position, kind: ErrorKind) -> CompileError {
        CompileError::fatal(Phase::Lex, self.file.clone(), SourceRange::new(start, self.pos()), kind)
    }

    fn current_char(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current_char()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.current_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.bytes.get(self.position + 1) == Some(&b'/') => {
                    while !matches!(self.current_char(), None | Some('\n')) {
                        self.advance();
                    }
                }
                Some('/') if self.bytes.get(self.position + 1) == Some(&b'*') => {
                    self.advance();
                    self.advance();
                    while let Some(c) = self.current_char() {
                        if c == '*' && self.bytes.get(self.position + 1) == Some(&b'/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_token(&mut self) -> Result<Token, CompileError> {
        self.skip_trivia();
        let start = self.pos();
        let start_byte = self.position;
        let Some(c) = self.current_char() else {
            return Ok(Token::new(TokenKind::Eof, SourceRange::new(start, start)));
        };

        if is_ident_start(c) {
            return Ok(self.scan_identifier(start));
        }
        if c.is_ascii_digit() {
            return self.scan_number(start);
        }
        if c == '"' {
            return self.scan_string(start);
        }
        if c == '\'' {
            return self.scan_char(start);
        }

        self.advance();
        let kind = match c {
            '>' => {
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenKind::GreaterEq
                } else if self.right_shift_enabled && self.current_char() == Some('>') {
                    self.advance();
                    TokenKind::RightShift
                } else {
                    TokenKind::TemplateEnd
                }
            }
            '<' => {
                if self.current_char() == Some('=') {
                    self.advance();
                    TokenKind::LessEq
                } else {
                    self.two_char('<', TokenKind::LeftShift, TokenKind::Less)
                }
            }
            '=' => self.two_char('=', TokenKind::EqEq, TokenKind::Eq),
            '!' => self.two_char('=', TokenKind::NotEq, TokenKind::Bang),
            '+' => self.two_char('=', TokenKind::PlusEq, TokenKind::Plus),
            '-' => self.two_char('=', TokenKind::MinusEq, TokenKind::Minus),
            '*' => self.two_char('=', TokenKind::StarEq, TokenKind::Star),
            '/' => self.two_char('=', TokenKind::SlashEq, TokenKind::Slash),
            '%' => self.two_char('=', TokenKind::PercentEq, TokenKind::Percent),
            '^' => self.two_char('=', TokenKind::CaretEq, TokenKind::Caret),
            '&' => {
                if self.current_char() == Some('&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    self.two_char('=', TokenKind::AmpEq, TokenKind::Amp)
                }
            }
            '|' => {
                if self.current_char() == Some('|') {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    self.two_char('=', TokenKind::PipeEq, TokenKind::Pipe)
                }
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '?' => TokenKind::Question,
            '@' => TokenKind::At,
            '~' => TokenKind::Tilde,
            '.' => TokenKind::Dot,
            _ => return Err(self.error(start, ErrorKind::UnexpectedToken(c.to_string()))),
        };
        let _ = start_byte;
        Ok(Token::new(kind, SourceRange::new(start, self.pos())))
    }

    fn two_char(&mut self, expect: char, two: TokenKind, one: TokenKind) -> TokenKind {
        if self.current_char() == Some(expect) {
            self.advance();
            two
        } else {
            one
        }
    }

    fn scan_identifier(&mut self, start: Position) -> Token {
        let start_byte = self.position;
        while matches!(self.current_char(), Some(c) if is_ident_continue(c)) {
            self.advance();
        }
        let text = &self.source[start_byte..self.position];
        let kind = if KEYWORDS.contains(&text) {
            TokenKind::Keyword(text.to_string())
        } else {
            TokenKind::Identifier(text.to_string())
        };
        Token::new(kind, SourceRange::new(start, self.pos()))
    }

    /// Numeric literals absorb a trailing word as a type suffix when there
    /// is no intervening whitespace; `1.toString()` (period followed by a
    /// non-digit) must rewind so `1` stays an integer literal (spec §4.1).
    fn scan_number(&mut self, start: Position) -> Result<Token, CompileError> {
        let start_byte = self.position;
        while matches!(self.current_char(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.current_char() == Some('.') {
            let save = (self.position, self.line, self.column);
            self.advance();
            if matches!(self.current_char(), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                while matches!(self.current_char(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                // Rewind: the `.` belongs to a following member access, not
                // this literal (e.g. `1.toString()`).
                self.position = save.0;
                self.line = save.1;
                self.column = save.2;
            }
        }
        if matches!(self.current_char(), Some('e') | Some('E')) {
            let save = (self.position, self.line, self.column);
            self.advance();
            if matches!(self.current_char(), Some('+') | Some('-')) {
                self.advance();
            }
            if matches!(self.current_char(), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                while matches!(self.current_char(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.position = save.0;
                self.line = save.1;
                self.column = save.2;
            }
        }
        let text = self.source[start_byte..self.position].to_string();

        // Absorb a trailing word with no intervening whitespace as a
        // type-suffix identifier.
        let mut suffix = None;
        if matches!(self.current_char(), Some(c) if is_ident_start(c)) {
            let suffix_start_byte = self.position;
            let suffix_start_pos = self.pos();
            while matches!(self.current_char(), Some(c) if is_ident_continue(c)) {
                self.advance();
            }
            let suffix_text = self.source[suffix_start_byte..self.position].to_string();
            suffix = Some((suffix_text, SourceRange::new(suffix_start_pos, self.pos())));
        }

        let kind = if is_float {
            TokenKind::FloatLiteral { text, suffix }
        } else {
            TokenKind::IntLiteral { text, suffix }
        };
        Ok(Token::new(kind, SourceRange::new(start, self.pos())))
    }

    fn scan_string(&mut self, start: Position) -> Result<Token, CompileError> {
        self.advance(); // opening quote
        let mut buf = String::new();
        loop {
            match self.current_char() {
                None | Some('\n') => return Err(self.error(start, ErrorKind::UnterminatedString)),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => buf.push('\n'),
                        Some('t') => buf.push('\t'),
                        Some('r') => buf.push('\r'),
                        Some('0') => buf.push('\0'),
                        Some(other) => buf.push(other),
                        None => return Err(self.error(start, ErrorKind::UnterminatedString)),
                    }
                }
                Some(c) => {
                    buf.push(c);
                    self.advance();
                }
            }
        }
        Ok(Token::new(TokenKind::StringLiteral(buf), SourceRange::new(start, self.pos())))
    }

    fn scan_char(&mut self, start: Position) -> Result<Token, CompileError> {
        self.advance(); // opening quote
        let c = match self.advance() {
            Some('\\') => match self.advance() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('0') => '\0',
                Some(other) => other,
                None => return Err(self.error(start, ErrorKind::UnterminatedString)),
            },
            Some(c) => c,
            None => return Err(self.error(start, ErrorKind::UnterminatedString)),
        };
        if self.current_char() != Some('\'') {
            return Err(self.error(start, ErrorKind::IllegalLiteral("char literal".into())));
        }
        self.advance();
        Ok(Token::new(TokenKind::CharLiteral(c), SourceRange::new(start, self.pos())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src, "t.gulc");
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token().unwrap();
            if t.kind == TokenKind::Eof {
                break;
            }
            out.push(t.kind);
        }
        out
    }

    #[test]
    fn right_shift_splits_template_close_by_default() {
        // `>>` should split into two TemplateEnd tokens when the toggle is
        // disabled (as it is while parsing a nested template-argument list).
        let mut lexer = Lexer::new(">>", "t.gulc");
        lexer.set_right_shift_enabled(false);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::TemplateEnd);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::TemplateEnd);
    }

    #[test]
    fn right_shift_merges_when_enabled() {
        let mut lexer = Lexer::new(">>", "t.gulc");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::RightShift);
    }

    #[test]
    fn numeric_suffix_is_absorbed_without_whitespace() {
        let toks = tokens("42i32");
        assert_eq!(toks.len(), 1);
        match &toks[0] {
            TokenKind::IntLiteral { text, suffix: Some((suffix_text, _)) } => {
                assert_eq!(text, "42");
                assert_eq!(suffix_text, "i32");
            }
            other => panic!("expected suffixed int literal, got {other:?}"),
        }
    }

    #[test]
    fn period_then_non_digit_keeps_integer_and_rewinds() {
        let toks = tokens("1.toString");
        assert_eq!(
            toks,
            vec![
                TokenKind::IntLiteral { text: "1".into(), suffix: None },
                TokenKind::Dot,
                TokenKind::Identifier("toString".into()),
            ]
        );
    }

    #[test]
    fn period_then_digit_forms_float() {
        let toks = tokens("1.5");
        assert_eq!(toks, vec![TokenKind::FloatLiteral { text: "1.5".into(), suffix: None }]);
    }

    #[test]
    fn checkpoint_and_rewind_restores_position() {
        let mut lexer = Lexer::new("a b c", "t.gulc");
        let first = lexer.next_token().unwrap();
        lexer.checkpoint();
        let _ = lexer.next_token().unwrap();
        lexer.rewind();
        let replayed = lexer.next_token().unwrap();
        assert_eq!(replayed.kind, TokenKind::Identifier("b".into()));
        assert_eq!(first.kind, TokenKind::Identifier("a".into()));
    }
}
