//! Tokenizer for unit source text.

use adhesive_core::{Diagnostic, Position};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    Package,
    Unit,
    Let,
    If,
    Else,
    True,
    False,
    Null,
    As,
    Row,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Semi,
    Comma,
    Dot,
    Arrow,
    Assign,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    Eof,
}

impl TokenKind {
    /// Spelling used in "expected ..., found ..." messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::Int(v) => format!("integer `{v}`"),
            TokenKind::Float(v) => format!("float `{v}`"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Package => "package",
            TokenKind::Unit => "unit",
            TokenKind::Let => "let",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::As => "as",
            TokenKind::Row => "row",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Semi => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Arrow => "->",
            TokenKind::Assign => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Ident(_)
            | TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::Eof => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
    /// Byte range of the token in the source.
    pub start: usize,
    pub end: usize,
}

/// Splits `source` into tokens, always terminated by [`TokenKind::Eof`].
///
/// Malformed input is reported and skipped so that every lexical error in
/// the source is collected in one pass.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer {
        source,
        chars: source.char_indices().peekable(),
        line: 1,
        column: 1,
        tokens: Vec::new(),
        diagnostics: Vec::new(),
    };
    lexer.run();
    (lexer.tokens, lexer.diagnostics)
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl Lexer<'_> {
    fn run(&mut self) {
        while let Some(&(start, c)) = self.chars.peek() {
            let pos = Position::new(self.line, self.column);
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if c == '/' && self.peek_second() == Some('/') {
                while let Some(&(_, c)) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }

            let kind = if c.is_ascii_digit() {
                self.number(start, pos)
            } else if c.is_alphabetic() || c == '_' {
                Some(self.word(start))
            } else if c == '"' {
                self.string(pos)
            } else {
                self.punct(c, pos)
            };

            if let Some(kind) = kind {
                let end = self.offset();
                self.tokens.push(Token {
                    kind,
                    pos,
                    start,
                    end,
                });
            }
        }
        let end = self.source.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            pos: Position::new(self.line, self.column),
            start: end,
            end,
        });
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|&(_, c)| c) == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn take_digits(&mut self) {
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn number(&mut self, start: usize, pos: Position) -> Option<TokenKind> {
        self.take_digits();
        let mut is_float = false;

        if self.chars.peek().map(|&(_, c)| c) == Some('.')
            && self.peek_second().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.bump();
            self.take_digits();
        }
        if matches!(self.chars.peek(), Some(&(_, 'e' | 'E'))) {
            let mut ahead = self.chars.clone();
            ahead.next();
            let exponent_follows = match ahead.next() {
                Some((_, '+' | '-')) => ahead.next().is_some_and(|(_, c)| c.is_ascii_digit()),
                Some((_, c)) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                is_float = true;
                self.bump();
                if matches!(self.chars.peek(), Some(&(_, '+' | '-'))) {
                    self.bump();
                }
                self.take_digits();
            }
        }

        let end = self.offset();
        let text: String = self.source[start..end].chars().filter(|&c| c != '_').collect();
        if is_float {
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() => Some(TokenKind::Float(v)),
                _ => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("float literal `{text}` is out of range"),
                        Some(pos),
                    ));
                    None
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Some(TokenKind::Int(v)),
                Err(_) => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("integer literal `{text}` is out of range for i64"),
                        Some(pos),
                    ));
                    None
                }
            }
        }
    }

    fn word(&mut self, start: usize) -> TokenKind {
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let end = self.offset();
        match &self.source[start..end] {
            "package" => TokenKind::Package,
            "unit" => TokenKind::Unit,
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "as" => TokenKind::As,
            "row" => TokenKind::Row,
            ident => TokenKind::Ident(ident.to_string()),
        }
    }

    fn string(&mut self, pos: Position) -> Option<TokenKind> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Some(TokenKind::Str(value)),
                Some('\\') => {
                    let escape_pos = Position::new(self.line, self.column.saturating_sub(1));
                    match self.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some(other) => self.diagnostics.push(Diagnostic::error(
                            format!("unknown escape `\\{other}`"),
                            Some(escape_pos),
                        )),
                        None => break,
                    }
                }
                Some('\n') | None => break,
                Some(c) => value.push(c),
            }
        }
        self.diagnostics.push(Diagnostic::error(
            "unterminated string literal",
            Some(pos),
        ));
        None
    }

    fn punct(&mut self, c: char, pos: Position) -> Option<TokenKind> {
        self.bump();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '-' if self.bump_if('>') => TokenKind::Arrow,
            '-' => TokenKind::Minus,
            '!' if self.bump_if('=') => TokenKind::NotEq,
            '!' => TokenKind::Bang,
            '=' if self.bump_if('=') => TokenKind::EqEq,
            '=' => TokenKind::Assign,
            '<' if self.bump_if('=') => TokenKind::Le,
            '<' => TokenKind::Lt,
            '>' if self.bump_if('=') => TokenKind::Ge,
            '>' => TokenKind::Gt,
            '&' if self.bump_if('&') => TokenKind::AndAnd,
            '|' if self.bump_if('|') => TokenKind::OrOr,
            other => {
                self.diagnostics.push(Diagnostic::error(
                    format!("unexpected character `{other}`"),
                    Some(pos),
                ));
                return None;
            }
        };
        Some(kind)
    }
}
