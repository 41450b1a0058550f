//! Syntax tree produced by the parser.

use std::rc::Rc;

use crate::value::FieldAttrs;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Vec<StrPart>),
    Ident(String),
    /// `_|_`
    Bottom,
    Select(Rc<Expr>, String),
    Index(Rc<Expr>, Rc<Expr>),
    Call(String, Vec<Rc<Expr>>),
    Struct(Rc<[Decl]>),
    List(Vec<ListElem>),
    Unary(UnaryOp, Rc<Expr>),
    Binary(BinaryOp, Rc<Expr>, Rc<Expr>),
    /// `*expr` inside a disjunction.
    Default(Rc<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StrPart {
    Lit(String),
    Interp(Rc<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ListElem {
    Item(Rc<Expr>),
    For(Comprehension),
}

/// `for key, value in source if filter { body }`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Comprehension {
    pub key: Option<String>,
    pub value: String,
    pub source: Rc<Expr>,
    pub filter: Option<Rc<Expr>>,
    pub body: Rc<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Unify,
    Disjoin,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Unify => "&",
            BinaryOp::Disjoin => "|",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Decl {
    Field(FieldDecl),
    /// `if cond { decls }`. The body's fields join the enclosing struct.
    If(Rc<Expr>, Rc<[Decl]>),
    /// `[pattern]: value`: constrains every regular field whose label
    /// unifies with `pattern`.
    Pattern(Rc<Expr>, Rc<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldDecl {
    pub label: Label,
    pub optional: bool,
    pub value: Rc<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Label {
    pub name: String,
    pub quoted: bool,
}

impl Label {
    /// Definition/hidden flags only apply to unquoted identifiers.
    pub fn attrs(&self, optional: bool) -> FieldAttrs {
        FieldAttrs {
            definition: !self.quoted && self.name.starts_with('#'),
            hidden: !self.quoted && self.name.starts_with('_') && self.name != "_",
            optional,
        }
    }
}
