//! Lazy, lexically scoped evaluation.
//!
//! Every struct literal (and the file-level package) becomes a [`Frame`].
//! When several struct literals are unified under one label, their bodies are
//! merged into a single frame, so a reference inside any of them sees the
//! unified result (`a: {x: int, y: x}` & `a: {x: 1}` gives `y: 1`).
//! Fields are evaluated on first use and memoized; a field that is re-entered
//! while still being evaluated is a cycle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{BinaryOp, Decl, Expr, ListElem, StrPart, UnaryOp};
use crate::error::LangError;
use crate::value::{BasicKind, Disjunction, Field, FieldAttrs, Struct, Value};

/// Evaluate the merged top-level declarations of a package.
pub(crate) fn eval_package(files: Vec<Rc<[Decl]>>) -> Result<Value, LangError> {
    let parts = files
        .into_iter()
        .map(|decls| Part {
            decls,
            env: Env::default(),
        })
        .collect();
    Frame::new(parts).to_value()
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Env(Option<Rc<Scope>>);

struct Scope {
    kind: ScopeKind,
    parent: Env,
}

enum ScopeKind {
    Struct(Rc<Frame>),
    Bindings(Vec<(String, Value)>),
}

impl Env {
    fn with_frame(&self, frame: &Rc<Frame>) -> Env {
        Env(Some(Rc::new(Scope {
            kind: ScopeKind::Struct(Rc::clone(frame)),
            parent: self.clone(),
        })))
    }

    fn with_bindings(&self, bindings: Vec<(String, Value)>) -> Env {
        Env(Some(Rc::new(Scope {
            kind: ScopeKind::Bindings(bindings),
            parent: self.clone(),
        })))
    }

    fn lookup(&self, name: &str) -> Option<Result<Value, LangError>> {
        let mut cur = self.0.clone();
        while let Some(scope) = cur {
            match &scope.kind {
                ScopeKind::Bindings(bindings) => {
                    if let Some((_, v)) = bindings.iter().find(|(k, _)| k == name) {
                        return Some(Ok(v.clone()));
                    }
                }
                ScopeKind::Struct(frame) => {
                    if frame.declares(name) {
                        return Some(frame.field(name));
                    }
                }
            }
            cur = scope.parent.0.clone();
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// One struct-literal body and the scope it was written in.
struct Part {
    decls: Rc<[Decl]>,
    env: Env,
}

enum Slot {
    Pending,
    Ready(Result<Option<Field>, LangError>),
}

struct Frame {
    parts: Vec<Part>,
    cache: RefCell<HashMap<String, Slot>>,
}

struct Conjunct {
    expr: Rc<Expr>,
    env: Env,
}

impl Frame {
    fn new(parts: Vec<Part>) -> Rc<Frame> {
        Rc::new(Frame {
            parts,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Labels in first-declaration order, including those inside `if` bodies.
    fn labels(&self) -> Vec<String> {
        fn walk(decls: &[Decl], out: &mut Vec<String>) {
            for decl in decls {
                match decl {
                    Decl::Field(f) => {
                        if !out.contains(&f.label.name) {
                            out.push(f.label.name.clone());
                        }
                    }
                    Decl::If(_, body) => walk(body, out),
                    Decl::Pattern(..) => {}
                }
            }
        }
        let mut out = Vec::new();
        for part in &self.parts {
            walk(&part.decls, &mut out);
        }
        out
    }

    fn declares(&self, name: &str) -> bool {
        self.parts.iter().any(|p| declares_in(&p.decls, name))
    }

    /// Active declarations of `label` plus its flags. `if` conditions guarding
    /// a declaration are evaluated here. Pattern constraints only join a
    /// regular field that is declared.
    fn conjuncts(self: &Rc<Self>, label: &str) -> Result<(Vec<Conjunct>, FieldAttrs), LangError> {
        let mut out = Vec::new();
        let mut attrs: Option<FieldAttrs> = None;
        for part in &self.parts {
            let env = part.env.with_frame(self);
            collect_conjuncts(&part.decls, label, &env, &mut out, &mut attrs)?;
        }
        let attrs = attrs.unwrap_or_default();
        if !out.is_empty() && !attrs.definition && !attrs.hidden {
            for part in &self.parts {
                let env = part.env.with_frame(self);
                collect_patterns(&part.decls, label, &env, &mut out)?;
            }
        }
        Ok((out, attrs))
    }

    /// Evaluate (memoized) the field `label`; `None` when every declaration
    /// of it sits behind a false condition.
    fn resolve(self: &Rc<Self>, label: &str) -> Result<Option<Field>, LangError> {
        match self.cache.borrow().get(label) {
            Some(Slot::Pending) => return Err(LangError::Cycle(label.to_string())),
            Some(Slot::Ready(result)) => return result.clone(),
            None => {}
        }
        self.cache.borrow_mut().insert(label.to_string(), Slot::Pending);
        let result = self.compute(label);
        self.cache
            .borrow_mut()
            .insert(label.to_string(), Slot::Ready(result.clone()));
        result
    }

    fn compute(self: &Rc<Self>, label: &str) -> Result<Option<Field>, LangError> {
        let (conjuncts, attrs) = self.conjuncts(label)?;
        if conjuncts.is_empty() {
            return Ok(None);
        }
        let value = match eval_conjuncts(&conjuncts) {
            Ok(v) => v,
            // missing data is not a conflict: keep the field, fail on use
            Err(e) if e.is_incomplete() || matches!(e.root_cause(), LangError::UndefinedField(_)) => {
                Value::Incomplete(e.to_string())
            }
            Err(e) => return Err(e),
        };
        Ok(Some(Field {
            name: label.to_string(),
            attrs,
            value,
        }))
    }

    /// Value of a field referenced by name.
    fn field(self: &Rc<Self>, label: &str) -> Result<Value, LangError> {
        match self.resolve(label)? {
            Some(f) if f.attrs.optional => Err(LangError::UndefinedField(label.to_string())),
            Some(f) => Ok(f.value),
            None => Err(LangError::UndefinedField(label.to_string())),
        }
    }

    fn to_value(self: &Rc<Self>) -> Result<Value, LangError> {
        let mut fields = Vec::new();
        for label in self.labels() {
            if let Some(f) = self.resolve(&label).map_err(|e| e.at(&label))? {
                fields.push(f);
            }
        }
        Ok(Value::Struct(Struct::new(fields)))
    }
}

fn collect_conjuncts(
    decls: &[Decl],
    label: &str,
    env: &Env,
    out: &mut Vec<Conjunct>,
    attrs: &mut Option<FieldAttrs>,
) -> Result<(), LangError> {
    for decl in decls {
        match decl {
            Decl::Field(f) if f.label.name == label => {
                let next = f.label.attrs(f.optional);
                *attrs = Some(match attrs.take() {
                    Some(prev) => FieldAttrs {
                        optional: prev.optional && next.optional,
                        ..prev
                    },
                    None => next,
                });
                out.push(Conjunct {
                    expr: Rc::clone(&f.value),
                    env: env.clone(),
                });
            }
            Decl::Field(_) | Decl::Pattern(..) => {}
            Decl::If(cond, body) => {
                if declares_in(body, label) && condition(cond, env)? {
                    collect_conjuncts(body, label, env, out, attrs)?;
                }
            }
        }
    }
    Ok(())
}

/// Values of the `[pattern]: value` declarations whose pattern admits `label`.
fn collect_patterns(decls: &[Decl], label: &str, env: &Env, out: &mut Vec<Conjunct>) -> Result<(), LangError> {
    for decl in decls {
        match decl {
            Decl::Pattern(pattern, value) => {
                let pattern = eval_expr(pattern, env)?;
                if pattern.unify(&Value::String(label.to_string())).is_ok() {
                    out.push(Conjunct {
                        expr: Rc::clone(value),
                        env: env.clone(),
                    });
                }
            }
            Decl::If(cond, body) => {
                if has_patterns(body) && condition(cond, env)? {
                    collect_patterns(body, label, env, out)?;
                }
            }
            Decl::Field(_) => {}
        }
    }
    Ok(())
}

fn condition(cond: &Rc<Expr>, env: &Env) -> Result<bool, LangError> {
    match concrete(eval_expr(cond, env)?)? {
        Value::Bool(b) => Ok(b),
        other => Err(LangError::InvalidOperation(format!(
            "if condition must be bool, found {}",
            other.kind_name()
        ))),
    }
}

fn declares_in(decls: &[Decl], label: &str) -> bool {
    decls.iter().any(|d| match d {
        Decl::Field(f) => f.label.name == label,
        Decl::If(_, body) => declares_in(body, label),
        Decl::Pattern(..) => false,
    })
}

fn has_patterns(decls: &[Decl]) -> bool {
    decls.iter().any(|d| match d {
        Decl::Pattern(..) => true,
        Decl::If(_, body) => has_patterns(body),
        Decl::Field(_) => false,
    })
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

enum Atom<'a> {
    Literal(&'a Rc<[Decl]>, &'a Env),
    Other(&'a Rc<Expr>, &'a Env),
}

fn flatten<'a>(expr: &'a Rc<Expr>, env: &'a Env, out: &mut Vec<Atom<'a>>) {
    match expr.as_ref() {
        Expr::Binary(BinaryOp::Unify, lhs, rhs) => {
            flatten(lhs, env, out);
            flatten(rhs, env, out);
        }
        Expr::Struct(decls) => out.push(Atom::Literal(decls, env)),
        _ => out.push(Atom::Other(expr, env)),
    }
}

/// Unify all declarations of one field. Struct literals share a frame.
fn eval_conjuncts(conjuncts: &[Conjunct]) -> Result<Value, LangError> {
    let mut atoms = Vec::new();
    for c in conjuncts {
        flatten(&c.expr, &c.env, &mut atoms);
    }
    let parts: Vec<Part> = atoms
        .iter()
        .filter_map(|a| match a {
            Atom::Literal(decls, env) => Some(Part {
                decls: Rc::clone(decls),
                env: (*env).clone(),
            }),
            Atom::Other(..) => None,
        })
        .collect();
    let mut frame = (!parts.is_empty()).then(|| Frame::new(parts));

    let mut acc = Value::Top;
    for atom in &atoms {
        let v = match atom {
            Atom::Literal(..) => match frame.take() {
                Some(frame) => frame.to_value()?,
                None => continue,
            },
            Atom::Other(expr, env) => eval_expr(expr, env)?,
        };
        acc = acc.unify(&v)?;
    }
    Ok(acc)
}

fn eval_expr(expr: &Rc<Expr>, env: &Env) -> Result<Value, LangError> {
    match expr.as_ref() {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Str(parts) => interpolate(parts, env),
        Expr::Ident(name) => ident(name, env),
        Expr::Bottom => Err(LangError::InvalidOperation("explicit error (_|_ literal)".into())),
        Expr::Select(base, name) => select(&eval_expr(base, env)?, name),
        Expr::Index(base, index) => {
            let base = eval_expr(base, env)?;
            let index = concrete(eval_expr(index, env)?)?;
            match (&index, base.resolve_default()) {
                (Value::String(key), _) => select(&base, key),
                (Value::Int(i), Value::List(items)) => usize::try_from(*i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| LangError::UndefinedField(format!("index {i} out of range"))),
                (_, other) => Err(operand_error(other, || {
                    format!("cannot index {} with {}", other.kind_name(), index.kind_name())
                })),
            }
        }
        Expr::Call(name, args) => call(name, args, env),
        Expr::Struct(decls) => Frame::new(vec![Part {
            decls: Rc::clone(decls),
            env: env.clone(),
        }])
        .to_value(),
        Expr::List(elems) => list(elems, env),
        Expr::Unary(op, operand) => {
            let v = concrete(eval_expr(operand, env)?)?;
            match (op, v) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
                (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                (op, v) => Err(LangError::InvalidOperation(format!(
                    "unary {} on {}",
                    if *op == UnaryOp::Not { "!" } else { "-" },
                    v.kind_name()
                ))),
            }
        }
        Expr::Default(inner) => eval_expr(inner, env),
        Expr::Binary(op, lhs, rhs) => binary(*op, lhs, rhs, env),
    }
}

fn ident(name: &str, env: &Env) -> Result<Value, LangError> {
    if let Some(found) = env.lookup(name) {
        return found;
    }
    if name == "_" {
        return Ok(Value::Top);
    }
    BasicKind::from_ident(name)
        .map(Value::Kind)
        .ok_or_else(|| LangError::UndefinedReference(name.to_string()))
}

fn select(base: &Value, name: &str) -> Result<Value, LangError> {
    match base.resolve_default() {
        Value::Struct(s) => match s.field(name) {
            Some(f) if !f.attrs.optional => Ok(f.value.clone()),
            _ => Err(LangError::UndefinedField(name.to_string())),
        },
        other => Err(operand_error(other, || {
            format!("cannot select field {name} on {}", other.kind_name())
        })),
    }
}

/// Incomplete operands make the result incomplete; anything else is misuse.
fn operand_error(v: &Value, message: impl FnOnce() -> String) -> LangError {
    match v {
        Value::Incomplete(msg) => LangError::Incomplete(msg.clone()),
        Value::Top | Value::Kind(_) | Value::Disjunction(_) => {
            LangError::Incomplete(format!("{v} is not concrete"))
        }
        _ => LangError::InvalidOperation(message()),
    }
}

/// Require a concrete (default-resolved) value.
fn concrete(v: Value) -> Result<Value, LangError> {
    let v = v.resolve_default().clone();
    match v {
        Value::Incomplete(msg) => Err(LangError::Incomplete(msg)),
        Value::Top | Value::Kind(_) | Value::Disjunction(_) => {
            Err(LangError::Incomplete(format!("{v} is not concrete")))
        }
        v => Ok(v),
    }
}

fn interpolate(parts: &[StrPart], env: &Env) -> Result<Value, LangError> {
    let mut out = String::new();
    for part in parts {
        match part {
            StrPart::Lit(s) => out.push_str(s),
            StrPart::Interp(expr) => match concrete(eval_expr(expr, env)?)? {
                Value::String(s) => out.push_str(&s),
                Value::Int(i) => out.push_str(&i.to_string()),
                Value::Float(f) => out.push_str(&f.to_string()),
                Value::Bool(b) => out.push_str(&b.to_string()),
                Value::Null => out.push_str("null"),
                other => {
                    return Err(LangError::InvalidOperation(format!(
                        "cannot interpolate {}",
                        other.kind_name()
                    )))
                }
            },
        }
    }
    Ok(Value::String(out))
}

fn call(name: &str, args: &[Rc<Expr>], env: &Env) -> Result<Value, LangError> {
    match (name, args) {
        ("len", [arg]) => {
            let n = match concrete(eval_expr(arg, env)?)? {
                Value::List(items) => items.len(),
                Value::Struct(s) => s.regular().count(),
                Value::String(s) => s.len(),
                other => {
                    return Err(LangError::InvalidOperation(format!(
                        "len of {}",
                        other.kind_name()
                    )))
                }
            };
            Ok(Value::Int(n as i64))
        }
        ("len", _) => Err(LangError::InvalidOperation("len takes exactly one argument".into())),
        _ => Err(LangError::UndefinedReference(format!("{name}()"))),
    }
}

fn list(elems: &[ListElem], env: &Env) -> Result<Value, LangError> {
    let mut out = Vec::new();
    for elem in elems {
        match elem {
            ListElem::Item(expr) => out.push(eval_expr(expr, env)?),
            ListElem::For(c) => {
                let source = concrete(eval_expr(&c.source, env)?)?;
                let pairs: Vec<(Value, Value)> = match source {
                    Value::List(items) => items
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| (Value::Int(i as i64), v))
                        .collect(),
                    Value::Struct(s) => s
                        .regular()
                        .map(|f| (Value::String(f.name.clone()), f.value.clone()))
                        .collect(),
                    other => {
                        return Err(LangError::InvalidOperation(format!(
                            "cannot iterate over {}",
                            other.kind_name()
                        )))
                    }
                };
                for (key, value) in pairs {
                    let mut bindings = vec![(c.value.clone(), value)];
                    if let Some(k) = &c.key {
                        bindings.push((k.clone(), key));
                    }
                    let scope = env.with_bindings(bindings);
                    if let Some(filter) = &c.filter {
                        if !concrete(eval_expr(filter, &scope)?)?.as_bool()? {
                            continue;
                        }
                    }
                    out.push(eval_expr(&c.body, &scope)?);
                }
            }
        }
    }
    Ok(Value::List(out))
}

fn binary(op: BinaryOp, lhs: &Rc<Expr>, rhs: &Rc<Expr>, env: &Env) -> Result<Value, LangError> {
    match op {
        BinaryOp::Unify => eval_expr(lhs, env)?.unify(&eval_expr(rhs, env)?),
        BinaryOp::Disjoin => disjunction(lhs, rhs, env),
        BinaryOp::And | BinaryOp::Or => {
            let l = concrete(eval_expr(lhs, env)?)?.as_bool()?;
            if (op == BinaryOp::And && !l) || (op == BinaryOp::Or && l) {
                return Ok(Value::Bool(l));
            }
            Ok(Value::Bool(concrete(eval_expr(rhs, env)?)?.as_bool()?))
        }
        BinaryOp::Eq | BinaryOp::Ne if is_bottom(lhs) || is_bottom(rhs) => {
            let other = if is_bottom(lhs) { rhs } else { lhs };
            let exists = matches!(eval_expr(other, env), Ok(v) if !matches!(v, Value::Incomplete(_)));
            Ok(Value::Bool(if op == BinaryOp::Ne { exists } else { !exists }))
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            let l = concrete(eval_expr(lhs, env)?)?;
            let r = concrete(eval_expr(rhs, env)?)?;
            let eq = values_equal(&l, &r)?;
            Ok(Value::Bool(if op == BinaryOp::Eq { eq } else { !eq }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let l = concrete(eval_expr(lhs, env)?)?;
            let r = concrete(eval_expr(rhs, env)?)?;
            let ord = match (&l, &r) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                (a, b) if is_number(a) && is_number(b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
                _ => None,
            };
            let Some(ord) = ord else {
                return Err(LangError::InvalidOperation(format!(
                    "cannot compare {} {} {}",
                    l.kind_name(),
                    op.symbol(),
                    r.kind_name()
                )));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let l = concrete(eval_expr(lhs, env)?)?;
            let r = concrete(eval_expr(rhs, env)?)?;
            arithmetic(op, l, r)
        }
    }
}

fn is_bottom(expr: &Rc<Expr>) -> bool {
    matches!(expr.as_ref(), Expr::Bottom)
}

fn is_number(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Float(_))
}

fn values_equal(l: &Value, r: &Value) -> Result<bool, LangError> {
    Ok(match (l, r) {
        (a, b) if is_number(a) && is_number(b) => match (a, b) {
            (Value::Int(x), Value::Int(y)) => x == y,
            _ => a.as_f64()? == b.as_f64()?,
        },
        (Value::Struct(_) | Value::List(_), Value::Struct(_) | Value::List(_)) => l.to_json()? == r.to_json()?,
        (a, b) => a == b,
    })
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value, LangError> {
    let overflow = || LangError::InvalidOperation(format!("integer overflow in {}", op.symbol()));
    match (op, l, r) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (BinaryOp::Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (BinaryOp::Div, a, b) if is_number(&a) && is_number(&b) => {
            let d = b.as_f64()?;
            if d == 0.0 {
                return Err(LangError::InvalidOperation("division by zero".into()));
            }
            Ok(Value::Float(a.as_f64()? / d))
        }
        (op, Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                _ => a.checked_mul(b),
            };
            result.map(Value::Int).ok_or_else(overflow)
        }
        (op, a, b) if is_number(&a) && is_number(&b) => {
            let (x, y) = (a.as_f64()?, b.as_f64()?);
            Ok(Value::Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                _ => x * y,
            }))
        }
        (op, a, b) => Err(LangError::InvalidOperation(format!(
            "{} {} {}",
            a.kind_name(),
            op.symbol(),
            b.kind_name()
        ))),
    }
}

/// Erroneous disjuncts are dropped; the disjunction fails only when every
/// option fails.
fn disjunction(lhs: &Rc<Expr>, rhs: &Rc<Expr>, env: &Env) -> Result<Value, LangError> {
    fn collect<'a>(expr: &'a Rc<Expr>, out: &mut Vec<(&'a Rc<Expr>, bool)>) {
        match expr.as_ref() {
            Expr::Binary(BinaryOp::Disjoin, l, r) => {
                collect(l, out);
                collect(r, out);
            }
            Expr::Default(inner) => out.push((inner, true)),
            _ => out.push((expr, false)),
        }
    }
    let mut exprs = Vec::new();
    collect(lhs, &mut exprs);
    collect(rhs, &mut exprs);

    let mut options = Vec::new();
    let mut last_err = None;
    for (expr, marked) in exprs {
        match eval_expr(expr, env) {
            Ok(Value::Disjunction(d)) => {
                for (v, inner) in d.marked_options() {
                    options.push((v.clone(), marked || *inner));
                }
            }
            Ok(v) => options.push((v, marked)),
            Err(e) => last_err = Some(e),
        }
    }
    Disjunction::normalize(options)
        .ok_or_else(|| last_err.unwrap_or_else(|| LangError::InvalidOperation("empty disjunction".into())))
}
