//! Recursive-descent parser.
//!
//! Precedence, loosest first: `|`, `&`, `||`, `&&`, comparisons, `+ -`,
//! `* /`, unary, postfix (selectors, indexes, calls).
//!
//! Declarations inside `{}` and at file level are separated by commas or
//! newlines. Inside `()` and `[]` newlines are insignificant, and a newline
//! directly after a binary operator continues the expression.

use std::rc::Rc;

use crate::ast::{BinaryOp, Comprehension, Decl, Expr, FieldDecl, Label, ListElem, StrPart, UnaryOp};
use crate::error::LangError;
use crate::lexer::{Lexer, Spanned, StrSeg, Token};

/// Parse a whole file into its top-level declarations.
pub(crate) fn parse_file(file: &str, src: &str) -> Result<Vec<Decl>, LangError> {
    let tokens = Lexer::new(file, src).tokenize()?;
    let mut parser = Parser::new(file, tokens);
    let decls = parser.decls(None)?;
    parser.expect(&Token::Eof, "end of file")?;
    Ok(decls)
}

struct Parser<'a> {
    file: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    /// One entry per open bracket; `true` when newlines are insignificant.
    nesting: Vec<bool>,
}

impl<'a> Parser<'a> {
    fn new(file: &'a str, tokens: Vec<Spanned>) -> Self {
        Parser {
            file,
            tokens,
            pos: 0,
            nesting: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Token cursor
    // -----------------------------------------------------------------------

    fn skips_newlines(&self) -> bool {
        self.nesting.last().copied().unwrap_or(false)
    }

    fn skip_insignificant(&mut self) {
        if self.skips_newlines() {
            self.skip_newlines();
        }
    }

    fn skip_newlines(&mut self) {
        while self.tokens[self.pos].token == Token::Newline {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> &Token {
        self.skip_insignificant();
        &self.tokens[self.pos].token
    }

    fn peek_raw(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn next(&mut self) -> Token {
        self.skip_insignificant();
        let tok = self.tokens[self.pos].token.clone();
        if tok != Token::Eof {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), LangError> {
        if self.eat(token) {
            Ok(())
        } else {
            let found = self.peek().clone();
            Err(self.err(format!("expected {what}, found {}", describe(&found))))
        }
    }

    fn err(&self, message: impl Into<String>) -> LangError {
        let tok = &self.tokens[self.pos];
        LangError::Syntax {
            file: self.file.to_string(),
            line: tok.line,
            col: tok.col,
            message: message.into(),
        }
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    /// Parse declarations until `end` (or end of file when `None`).
    fn decls(&mut self, end: Option<Token>) -> Result<Vec<Decl>, LangError> {
        let mut decls = Vec::new();
        loop {
            while matches!(self.peek_raw(0), Token::Newline | Token::Comma) {
                self.pos += 1;
            }
            let at_end = match &end {
                Some(tok) => self.peek_raw(0) == tok,
                None => *self.peek_raw(0) == Token::Eof,
            };
            if at_end {
                return Ok(decls);
            }
            decls.push(self.decl()?);
            match self.peek_raw(0) {
                Token::Newline | Token::Comma => {}
                tok if Some(tok) == end.as_ref() => {}
                Token::Eof if end.is_none() => {}
                other => {
                    let found = describe(other);
                    return Err(self.err(format!("expected ',' or newline after declaration, found {found}")));
                }
            }
        }
    }

    fn decl(&mut self) -> Result<Decl, LangError> {
        if matches!(self.peek_raw(0), Token::Ident(name) if name == "if")
            && *self.peek_raw(1) != Token::Colon
        {
            self.pos += 1;
            let cond = self.expr()?;
            self.expect(&Token::LBrace, "'{' after if condition")?;
            self.nesting.push(false);
            let body = self.decls(Some(Token::RBrace))?;
            self.nesting.pop();
            self.expect(&Token::RBrace, "'}'")?;
            return Ok(Decl::If(Rc::new(cond), body.into()));
        }
        if self.at_pattern_start() {
            return self.pattern();
        }
        self.field().map(Decl::Field)
    }

    fn field(&mut self) -> Result<FieldDecl, LangError> {
        let label = self.label()?;
        let optional = self.eat(&Token::Question);
        self.expect(&Token::Colon, "':' after label")?;
        let value = self.field_value()?;
        Ok(FieldDecl {
            label,
            optional,
            value: Rc::new(value),
        })
    }

    /// `[pattern]: value`
    fn pattern(&mut self) -> Result<Decl, LangError> {
        self.expect(&Token::LBracket, "'['")?;
        self.nesting.push(true);
        let pattern = self.expr();
        let close = pattern.and_then(|p| self.expect(&Token::RBracket, "']' after pattern").map(|_| p));
        self.nesting.pop();
        let pattern = close?;
        self.expect(&Token::Colon, "':' after pattern")?;
        let value = self.field_value()?;
        Ok(Decl::Pattern(Rc::new(pattern), Rc::new(value)))
    }

    fn field_value(&mut self) -> Result<Expr, LangError> {
        if self.at_field_start() {
            // shorthand `a: b: value`
            let inner = self.field()?;
            Ok(Expr::Struct(vec![Decl::Field(inner)].into()))
        } else if self.at_pattern_start() {
            // shorthand `env: [string]: value`
            let inner = self.pattern()?;
            Ok(Expr::Struct(vec![inner].into()))
        } else {
            self.expr()
        }
    }

    fn label(&mut self) -> Result<Label, LangError> {
        match self.next() {
            Token::Ident(name) => Ok(Label { name, quoted: false }),
            Token::Str(segs) => match segs.as_slice() {
                [StrSeg::Lit(name)] => Ok(Label {
                    name: name.clone(),
                    quoted: true,
                }),
                _ => Err(self.err("interpolated labels are not supported")),
            },
            other => Err(self.err(format!("expected label, found {}", describe(&other)))),
        }
    }

    fn at_field_start(&self) -> bool {
        let is_label = matches!(self.peek_raw(0), Token::Ident(_))
            || matches!(self.peek_raw(0), Token::Str(segs) if matches!(segs.as_slice(), [StrSeg::Lit(_)]));
        is_label
            && (*self.peek_raw(1) == Token::Colon
                || (*self.peek_raw(1) == Token::Question && *self.peek_raw(2) == Token::Colon))
    }

    /// `[` whose matching `]` is followed by `:`, as opposed to a list.
    fn at_pattern_start(&self) -> bool {
        if *self.peek_raw(0) != Token::LBracket {
            return false;
        }
        let mut depth = 0usize;
        for (offset, spanned) in self.tokens[self.pos..].iter().enumerate() {
            match spanned.token {
                Token::LBracket => depth += 1,
                Token::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        return *self.peek_raw(offset + 1) == Token::Colon;
                    }
                }
                Token::Eof => return false,
                _ => {}
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn expr(&mut self) -> Result<Expr, LangError> {
        self.disjunction()
    }

    fn disjunction(&mut self) -> Result<Expr, LangError> {
        let mut lhs = self.disjunct()?;
        while self.eat(&Token::Pipe) {
            self.skip_newlines();
            let rhs = self.disjunct()?;
            lhs = Expr::Binary(BinaryOp::Disjoin, Rc::new(lhs), Rc::new(rhs));
        }
        Ok(lhs)
    }

    fn disjunct(&mut self) -> Result<Expr, LangError> {
        if self.eat(&Token::Star) {
            let inner = self.unification()?;
            return Ok(Expr::Default(Rc::new(inner)));
        }
        self.unification()
    }

    fn unification(&mut self) -> Result<Expr, LangError> {
        self.binary_level(0)
    }

    /// Left-associative binary operators, one precedence level per call depth.
    fn binary_level(&mut self, level: usize) -> Result<Expr, LangError> {
        const LEVELS: usize = 6;
        if level == LEVELS {
            return self.unary();
        }
        let mut lhs = self.binary_level(level + 1)?;
        loop {
            let Some(op) = binary_op(level, self.peek()) else {
                return Ok(lhs);
            };
            self.next();
            self.skip_newlines();
            let rhs = self.binary_level(level + 1)?;
            lhs = Expr::Binary(op, Rc::new(lhs), Rc::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, LangError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Unary(UnaryOp::Not, Rc::new(self.unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(match self.unary()? {
                Expr::Int(i) => Expr::Int(-i),
                Expr::Float(f) => Expr::Float(-f),
                other => Expr::Unary(UnaryOp::Neg, Rc::new(other)),
            });
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, LangError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek_raw(0) {
                Token::Dot => {
                    self.pos += 1;
                    match self.next() {
                        Token::Ident(name) => expr = Expr::Select(Rc::new(expr), name),
                        other => {
                            return Err(self.err(format!("expected field name after '.', found {}", describe(&other))))
                        }
                    }
                }
                Token::LBracket => {
                    self.pos += 1;
                    self.nesting.push(true);
                    let index = self.expr()?;
                    self.expect(&Token::RBracket, "']'")?;
                    self.nesting.pop();
                    expr = Expr::Index(Rc::new(expr), Rc::new(index));
                }
                Token::LParen => {
                    let Expr::Ident(name) = &expr else {
                        return Ok(expr);
                    };
                    let name = name.clone();
                    self.pos += 1;
                    self.nesting.push(true);
                    let mut args = Vec::new();
                    while *self.peek() != Token::RParen {
                        args.push(Rc::new(self.expr()?));
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RParen, "')'")?;
                    self.nesting.pop();
                    expr = Expr::Call(name, args);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, LangError> {
        let line = self.tokens[self.pos].line;
        match self.next() {
            Token::Int(i) => Ok(Expr::Int(i)),
            Token::Float(f) => Ok(Expr::Float(f)),
            Token::Bottom => Ok(Expr::Bottom),
            Token::Str(segs) => self.string(segs),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                _ => Expr::Ident(name),
            }),
            Token::LParen => {
                self.nesting.push(true);
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                self.nesting.pop();
                Ok(inner)
            }
            Token::LBrace => {
                self.nesting.push(false);
                let decls = self.decls(Some(Token::RBrace))?;
                self.nesting.pop();
                self.expect(&Token::RBrace, "'}'")?;
                Ok(Expr::Struct(decls.into()))
            }
            Token::LBracket => self.list(),
            other => Err(LangError::Syntax {
                file: self.file.to_string(),
                line,
                col: self.tokens[self.pos.saturating_sub(1)].col,
                message: format!("unexpected {}", describe(&other)),
            }),
        }
    }

    fn list(&mut self) -> Result<Expr, LangError> {
        self.nesting.push(true);
        let mut elems = Vec::new();
        while *self.peek() != Token::RBracket {
            if matches!(self.peek(), Token::Ident(name) if name == "for") {
                elems.push(ListElem::For(self.comprehension()?));
            } else {
                elems.push(ListElem::Item(Rc::new(self.expr()?)));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBracket, "']'")?;
        self.nesting.pop();
        Ok(Expr::List(elems))
    }

    fn comprehension(&mut self) -> Result<Comprehension, LangError> {
        self.next(); // `for`
        let first = self.ident()?;
        let (key, value) = if self.eat(&Token::Comma) {
            (Some(first), self.ident()?)
        } else {
            (None, first)
        };
        match self.next() {
            Token::Ident(kw) if kw == "in" => {}
            other => return Err(self.err(format!("expected 'in', found {}", describe(&other)))),
        }
        let source = self.unification()?;
        let filter = if matches!(self.peek(), Token::Ident(kw) if kw == "if") {
            self.next();
            Some(Rc::new(self.unification()?))
        } else {
            None
        };
        if *self.peek() != Token::LBrace {
            return Err(self.err("expected '{' to start comprehension body"));
        }
        let body = self.primary()?;
        Ok(Comprehension {
            key,
            value,
            source: Rc::new(source),
            filter,
            body: Rc::new(body),
        })
    }

    fn ident(&mut self) -> Result<String, LangError> {
        match self.next() {
            Token::Ident(name) => Ok(name),
            other => Err(self.err(format!("expected identifier, found {}", describe(&other)))),
        }
    }

    fn string(&mut self, segs: Vec<StrSeg>) -> Result<Expr, LangError> {
        let mut parts = Vec::with_capacity(segs.len());
        for seg in segs {
            match seg {
                StrSeg::Lit(s) => parts.push(StrPart::Lit(s)),
                StrSeg::Interp { source, line, col } => {
                    let tokens = Lexer::at(self.file, &source, line, col).tokenize()?;
                    let mut sub = Parser::new(self.file, tokens);
                    sub.nesting.push(true);
                    let expr = sub.expr()?;
                    sub.expect(&Token::Eof, "end of interpolation")?;
                    parts.push(StrPart::Interp(Rc::new(expr)));
                }
            }
        }
        Ok(Expr::Str(parts))
    }
}

fn binary_op(level: usize, token: &Token) -> Option<BinaryOp> {
    let op = match (level, token) {
        (0, Token::Amp) => BinaryOp::Unify,
        (1, Token::OrOr) => BinaryOp::Or,
        (2, Token::AndAnd) => BinaryOp::And,
        (3, Token::Eq) => BinaryOp::Eq,
        (3, Token::Ne) => BinaryOp::Ne,
        (3, Token::Lt) => BinaryOp::Lt,
        (3, Token::Le) => BinaryOp::Le,
        (3, Token::Gt) => BinaryOp::Gt,
        (3, Token::Ge) => BinaryOp::Ge,
        (4, Token::Plus) => BinaryOp::Add,
        (4, Token::Minus) => BinaryOp::Sub,
        (5, Token::Star) => BinaryOp::Mul,
        (5, Token::Slash) => BinaryOp::Div,
        _ => return None,
    };
    Some(op)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("identifier '{name}'"),
        Token::Str(_) => "string".to_string(),
        Token::Int(i) => format!("number {i}"),
        Token::Float(f) => format!("number {f}"),
        Token::Newline => "newline".to_string(),
        Token::Eof => "end of input".to_string(),
        other => format!("{other:?}"),
    }
}
