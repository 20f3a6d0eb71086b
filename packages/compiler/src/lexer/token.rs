use crate::diagnostics::SourceRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Identifier(String),
    Keyword(String),
    IntLiteral { text: String, suffix: Option<(String, SourceRange)> },
    FloatLiteral { text: String, suffix: Option<(String, SourceRange)> },
    StringLiteral(String),
    CharLiteral(char),

    // Punctuation
    LParen, RParen, LBrace, RBrace, LBracket, RBracket,
    Comma, Colon, Semicolon, Question, At, Tilde, Dot,

    // Operators
    Plus, Minus, Star, Slash, Percent,
    Amp, Pipe, Caret, AndAnd, OrOr, Bang,
    Less, LessEq, TemplateEnd, GreaterEq, RightShift, LeftShift,
    Eq, EqEq, NotEq,
    PlusEq, MinusEq, StarEq, SlashEq, PercentEq, AmpEq, PipeEq, CaretEq,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        format!("{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: SourceRange,
}

impl Token {
    pub fn new(kind: TokenKind, range: SourceRange) -> Self {
        Token { kind, range }
    }
}
