//! Tokenizer for template source.
//!
//! Newlines are significant (they separate declarations) and are emitted as
//! [`Token::Newline`]; the parser decides where they may be skipped.
//! String interpolations `\(expr)` are captured as raw source and parsed by
//! the parser in a second pass.

use crate::error::LangError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Str(Vec<StrSeg>),
    Int(i64),
    Float(f64),
    Newline,
    Comma,
    Colon,
    Question,
    Dot,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Star,
    Slash,
    Plus,
    Minus,
    Not,
    Amp,
    Pipe,
    AndAnd,
    OrOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Bottom,
    Eof,
}

/// A segment of a string literal.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StrSeg {
    Lit(String),
    /// Raw source of an interpolated expression, with its position.
    Interp { source: String, line: usize, col: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

pub(crate) struct Lexer<'a> {
    file: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(file: &'a str, src: &str) -> Self {
        Self::at(file, src, 1, 1)
    }

    /// Lexer whose positions start at `line:col` (used for interpolations).
    pub fn at(file: &'a str, src: &str, line: usize, col: usize) -> Self {
        Lexer {
            file,
            chars: src.chars().collect(),
            pos: 0,
            line,
            col,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LangError> {
        let mut out = Vec::new();
        loop {
            self.skip_blank();
            let (line, col) = (self.line, self.col);
            let Some(c) = self.peek() else {
                out.push(Spanned { token: Token::Eof, line, col });
                return Ok(out);
            };
            let token = match c {
                '\n' => {
                    self.bump();
                    Token::Newline
                }
                '"' => self.string()?,
                '0'..='9' => self.number()?,
                '_' if self.starts_with("_|_") => {
                    self.advance(3);
                    Token::Bottom
                }
                c if is_ident_start(c) => self.ident()?,
                _ => self.punct()?,
            };
            out.push(Spanned { token, line, col });
        }
    }

    fn err(&self, message: impl Into<String>) -> LangError {
        LangError::Syntax {
            file: self.file.to_string(),
            line: self.line,
            col: self.col,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn skip_blank(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.bump();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn ident(&mut self) -> Result<Token, LangError> {
        let mut name = String::new();
        if self.peek() == Some('#') {
            name.push('#');
            self.bump();
            if !self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                return Err(self.err("expected identifier after '#'"));
            }
        }
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(Token::Ident(name))
    }

    fn number(&mut self) -> Result<Token, LangError> {
        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    text.push(c);
                }
                self.bump();
            } else if c == '.' && !is_float && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                is_float = true;
                text.push(c);
                self.bump();
            } else if c == 'e' || c == 'E' {
                is_float = true;
                text.push(c);
                self.bump();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    text.push(sign);
                    self.bump();
                }
            } else {
                break;
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.err(format!("invalid number {text}")))
        } else {
            // Integers beyond i64 (JSON allows them) degrade to floats.
            match text.parse::<i64>() {
                Ok(n) => Ok(Token::Int(n)),
                Err(_) => text
                    .parse::<f64>()
                    .map(Token::Float)
                    .map_err(|_| self.err(format!("invalid number {text}"))),
            }
        }
    }

    fn string(&mut self) -> Result<Token, LangError> {
        self.bump(); // opening quote
        let mut segs = Vec::new();
        let mut lit = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.err("unterminated string literal"));
            };
            match c {
                '"' => break,
                '\n' => return Err(self.err("newline in string literal")),
                '\\' => {
                    let Some(esc) = self.bump() else {
                        return Err(self.err("unterminated escape sequence"));
                    };
                    match esc {
                        'n' => lit.push('\n'),
                        't' => lit.push('\t'),
                        'r' => lit.push('\r'),
                        'b' => lit.push('\u{8}'),
                        'f' => lit.push('\u{c}'),
                        '"' => lit.push('"'),
                        '\\' => lit.push('\\'),
                        '/' => lit.push('/'),
                        'u' => lit.push(self.unicode_escape()?),
                        '(' => {
                            if !lit.is_empty() {
                                segs.push(StrSeg::Lit(std::mem::take(&mut lit)));
                            }
                            let (line, col) = (self.line, self.col);
                            let source = self.interpolation()?;
                            segs.push(StrSeg::Interp { source, line, col });
                        }
                        other => return Err(self.err(format!("unknown escape sequence \\{other}"))),
                    }
                }
                c => lit.push(c),
            }
        }
        if !lit.is_empty() || segs.is_empty() {
            segs.push(StrSeg::Lit(lit));
        }
        Ok(Token::Str(segs))
    }

    fn unicode_escape(&mut self) -> Result<char, LangError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.err("invalid \\u escape"))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| self.err("invalid unicode code point"))
    }

    /// Capture the raw source between `\(` and its matching `)`.
    fn interpolation(&mut self) -> Result<String, LangError> {
        let mut depth = 1usize;
        let mut source = String::new();
        let mut in_str = false;
        loop {
            let Some(c) = self.bump() else {
                return Err(self.err("unterminated interpolation"));
            };
            if in_str {
                source.push(c);
                if c == '\\' {
                    if let Some(next) = self.bump() {
                        source.push(next);
                    }
                } else if c == '"' {
                    in_str = false;
                }
                continue;
            }
            match c {
                '"' => {
                    in_str = true;
                    source.push(c);
                }
                '(' => {
                    depth += 1;
                    source.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(source);
                    }
                    source.push(c);
                }
                '\n' => return Err(self.err("newline in interpolation")),
                c => source.push(c),
            }
        }
    }

    fn punct(&mut self) -> Result<Token, LangError> {
        let two = |a: char, b: char| (a, b);
        let c = self.peek().unwrap_or('\0');
        let next = self.peek_at(1).unwrap_or('\0');
        let (token, width) = match two(c, next) {
            ('&', '&') => (Token::AndAnd, 2),
            ('|', '|') => (Token::OrOr, 2),
            ('=', '=') => (Token::Eq, 2),
            ('!', '=') => (Token::Ne, 2),
            ('<', '=') => (Token::Le, 2),
            ('>', '=') => (Token::Ge, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Not, 1),
            ('&', _) => (Token::Amp, 1),
            ('|', _) => (Token::Pipe, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            ('?', _) => (Token::Question, 1),
            ('.', _) => (Token::Dot, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            (other, _) => return Err(self.err(format!("unexpected character '{other}'"))),
        };
        self.advance(width);
        Ok(token)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '#' || c == '$'
}
