//! Evaluated values.
//!
//! [`Value`] is a tagged union: every kind (concrete scalar, basic type
//! constraint, struct, list, disjunction, incomplete) is an explicit variant,
//! and the typed accessors ([`Value::as_bool`], [`Value::as_str`],
//! [`Value::fields`], …) return a [`LangError`] on a kind mismatch.

use std::fmt;

use serde_json::{Map, Number, Value as Json};

use crate::error::LangError;

/// Basic type constraints (`string`, `int`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    String,
    Int,
    Float,
    Number,
    Bool,
}

impl BasicKind {
    pub fn from_ident(name: &str) -> Option<Self> {
        match name {
            "string" => Some(BasicKind::String),
            "int" => Some(BasicKind::Int),
            "float" => Some(BasicKind::Float),
            "number" => Some(BasicKind::Number),
            "bool" => Some(BasicKind::Bool),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::String => "string",
            BasicKind::Int => "int",
            BasicKind::Float => "float",
            BasicKind::Number => "number",
            BasicKind::Bool => "bool",
        }
    }

    fn meet(self, other: BasicKind) -> Option<BasicKind> {
        use BasicKind::*;
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Number, k @ (Int | Float)) | (k @ (Int | Float), Number) => Some(k),
            _ => None,
        }
    }

    fn admits(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (BasicKind::String, Value::String(_))
                | (BasicKind::Int, Value::Int(_))
                | (BasicKind::Float, Value::Float(_))
                | (BasicKind::Number, Value::Int(_) | Value::Float(_))
                | (BasicKind::Bool, Value::Bool(_))
        )
    }
}

/// Flags carried by a struct field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldAttrs {
    /// `#Name`: a definition, never exported.
    pub definition: bool,
    /// `_name`: hidden, never exported.
    pub hidden: bool,
    /// `name?:`: optional, never exported.
    pub optional: bool,
}

impl FieldAttrs {
    /// True when the field is excluded from exports and output collection.
    pub fn is_excluded(&self) -> bool {
        self.definition || self.hidden || self.optional
    }

    fn merge(self, other: FieldAttrs) -> FieldAttrs {
        FieldAttrs {
            definition: self.definition,
            hidden: self.hidden,
            optional: self.optional && other.optional,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub attrs: FieldAttrs,
    pub value: Value,
}

/// Ordered struct: fields keep their first-declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Struct {
    fields: Vec<Field>,
}

impl Struct {
    pub fn new(fields: Vec<Field>) -> Self {
        Struct { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Regular (exported) fields in declaration order.
    pub fn regular(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.attrs.is_excluded())
    }

    fn unify(&self, other: &Struct) -> Result<Struct, LangError> {
        let mut fields = self.fields.clone();
        for f in &other.fields {
            match fields.iter_mut().find(|e| e.name == f.name) {
                Some(existing) => {
                    existing.value = existing.value.unify(&f.value).map_err(|e| e.at(&f.name))?;
                    existing.attrs = existing.attrs.merge(f.attrs);
                }
                None => fields.push(f.clone()),
            }
        }
        Ok(Struct { fields })
    }
}

/// `a | b | *c`: options paired with their default mark.
#[derive(Debug, Clone, PartialEq)]
pub struct Disjunction {
    options: Vec<(Value, bool)>,
}

impl Disjunction {
    /// Collapse `options` into a value: a single survivor is returned as-is.
    pub(crate) fn normalize(options: Vec<(Value, bool)>) -> Option<Value> {
        let mut uniq: Vec<(Value, bool)> = Vec::with_capacity(options.len());
        for (value, marked) in options {
            match uniq.iter_mut().find(|(v, _)| *v == value) {
                Some(existing) => existing.1 |= marked,
                None => uniq.push((value, marked)),
            }
        }
        if uniq.iter().all(|(_, marked)| *marked) {
            for opt in &mut uniq {
                opt.1 = false;
            }
        }
        match uniq.len() {
            0 => None,
            1 => uniq.pop().map(|(v, _)| v),
            _ => Some(Value::Disjunction(Disjunction { options: uniq })),
        }
    }

    pub fn options(&self) -> impl Iterator<Item = &Value> {
        self.options.iter().map(|(v, _)| v)
    }

    pub(crate) fn marked_options(&self) -> &[(Value, bool)] {
        &self.options
    }

    /// The single default-marked option, if there is exactly one.
    pub fn default_value(&self) -> Option<&Value> {
        let mut marked = self.options.iter().filter(|(_, m)| *m);
        match (marked.next(), marked.next()) {
            (Some((v, _)), None) => Some(v),
            _ => None,
        }
    }

    fn has_default(&self) -> bool {
        self.options.iter().any(|(_, m)| *m)
    }

    fn unify_with(&self, other: &Value) -> Result<Value, LangError> {
        let rhs: Vec<(Value, bool)> = match other {
            Value::Disjunction(d) if d.has_default() => d.options.clone(),
            Value::Disjunction(d) => d.options.iter().map(|(v, _)| (v.clone(), true)).collect(),
            v => vec![(v.clone(), true)],
        };
        let lhs_defaults = self.has_default();
        let mut out = Vec::new();
        let mut last_err = None;
        for (a, a_marked) in &self.options {
            let a_marked = *a_marked || !lhs_defaults;
            for (b, b_marked) in &rhs {
                match a.unify(b) {
                    Ok(v) => out.push((v, a_marked && *b_marked)),
                    Err(e) => last_err = Some(e),
                }
            }
        }
        Disjunction::normalize(out).ok_or_else(|| {
            last_err.unwrap_or_else(|| LangError::conflict(Value::Disjunction(self.clone()), other))
        })
    }
}

/// An evaluated value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `_`: unifies with anything.
    Top,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Kind(BasicKind),
    Struct(Struct),
    List(Vec<Value>),
    Disjunction(Disjunction),
    /// A field whose evaluation needed a value that is not yet concrete.
    Incomplete(String),
}

impl Value {
    /// Short kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Top => "_",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Kind(k) => k.name(),
            Value::Struct(_) => "struct",
            Value::List(_) => "list",
            Value::Disjunction(_) => "disjunction",
            Value::Incomplete(_) => "incomplete value",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// Resolve a disjunction to its default (or sole) option; other values
    /// are returned unchanged.
    pub fn resolve_default(&self) -> &Value {
        match self {
            Value::Disjunction(d) => d.default_value().unwrap_or(self),
            other => other,
        }
    }

    /// Unify two values; conflicting concrete values are an error.
    pub fn unify(&self, other: &Value) -> Result<Value, LangError> {
        match (self, other) {
            (Value::Top, v) | (v, Value::Top) => Ok(v.clone()),
            (Value::Incomplete(m), _) | (_, Value::Incomplete(m)) => Ok(Value::Incomplete(m.clone())),
            (Value::Disjunction(d), v) | (v, Value::Disjunction(d)) => d.unify_with(v),
            (Value::Kind(a), Value::Kind(b)) => a
                .meet(*b)
                .map(Value::Kind)
                .ok_or_else(|| LangError::conflict(self, other)),
            (Value::Kind(k), v) | (v, Value::Kind(k)) => {
                if k.admits(v) {
                    Ok(v.clone())
                } else {
                    Err(LangError::conflict(self, other))
                }
            }
            (Value::Struct(a), Value::Struct(b)) => a.unify(b).map(Value::Struct),
            (Value::List(a), Value::List(b)) if a.len() == b.len() => a
                .iter()
                .zip(b)
                .enumerate()
                .map(|(i, (x, y))| x.unify(y).map_err(|e| e.at(&i.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (a, b) if a == b => Ok(a.clone()),
            _ => Err(LangError::conflict(self, other)),
        }
    }

    /// Look up a dotted path (`"output.metadata.name"`) through nested structs.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut cur = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            match cur.resolve_default() {
                Value::Struct(s) => cur = &s.field(segment)?.value,
                _ => return None,
            }
        }
        Some(cur)
    }

    // -----------------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------------

    fn mismatch(&self, expected: &'static str) -> LangError {
        match self {
            Value::Incomplete(msg) => LangError::Incomplete(msg.clone()),
            Value::Kind(_) | Value::Top | Value::Disjunction(_) => LangError::Incomplete(format!(
                "expected concrete {expected}, found {self}"
            )),
            _ => LangError::KindMismatch {
                expected,
                found: self.kind_name().to_string(),
            },
        }
    }

    pub fn as_bool(&self) -> Result<bool, LangError> {
        match self.resolve_default() {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_str(&self) -> Result<&str, LangError> {
        match self.resolve_default() {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_i64(&self) -> Result<i64, LangError> {
        match self.resolve_default() {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, LangError> {
        match self.resolve_default() {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            other => Err(other.mismatch("number")),
        }
    }

    pub fn as_struct(&self) -> Result<&Struct, LangError> {
        match self.resolve_default() {
            Value::Struct(s) => Ok(s),
            other => Err(other.mismatch("struct")),
        }
    }

    /// Declared fields of a struct, with their flags, in declaration order.
    pub fn fields(&self) -> Result<&[Field], LangError> {
        self.as_struct().map(Struct::fields)
    }

    pub fn as_list(&self) -> Result<&[Value], LangError> {
        match self.resolve_default() {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch("list")),
        }
    }

    // -----------------------------------------------------------------------
    // JSON bridge
    // -----------------------------------------------------------------------

    /// Export as JSON. Definition, hidden and optional fields are omitted;
    /// non-concrete values are an [`LangError::Incomplete`] error.
    pub fn to_json(&self) -> Result<Json, LangError> {
        match self.resolve_default() {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Int(i) => Ok(Json::Number((*i).into())),
            Value::Float(f) => Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| LangError::InvalidOperation(format!("{f} is not a finite number"))),
            Value::String(s) => Ok(Json::String(s.clone())),
            Value::Struct(s) => {
                let mut map = Map::new();
                for f in s.regular() {
                    let v = f.value.to_json().map_err(|e| e.at(&f.name))?;
                    map.insert(f.name.clone(), v);
                }
                Ok(Json::Object(map))
            }
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| v.to_json().map_err(|e| e.at(&i.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(Json::Array),
            Value::Incomplete(msg) => Err(LangError::Incomplete(msg.clone())),
            other => Err(LangError::Incomplete(format!("{other} is not concrete"))),
        }
    }

    /// Import a JSON document; every object key becomes a regular field.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Struct(Struct::new(
                map.iter()
                    .map(|(k, v)| Field {
                        name: k.clone(),
                        attrs: FieldAttrs::default(),
                        value: Value::from_json(v),
                    })
                    .collect(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Source formatting
// ---------------------------------------------------------------------------

/// Renders the value back as source text that parses to an equal value.
/// Incomplete values render as `_`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Top | Value::Incomplete(_) => f.write_str("_"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write_quoted(f, s),
            Value::Kind(k) => f.write_str(k.name()),
            Value::Struct(s) => {
                f.write_str("{")?;
                for (i, field) in s.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if field.attrs.definition || field.attrs.hidden {
                        f.write_str(&field.name)?;
                    } else {
                        write_quoted(f, &field.name)?;
                    }
                    if field.attrs.optional {
                        f.write_str("?")?;
                    }
                    write!(f, ": {}", field.value)?;
                }
                f.write_str("}")
            }
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Disjunction(d) => {
                for (i, (v, marked)) in d.options.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    if *marked {
                        f.write_str("*")?;
                    }
                    // parenthesize so nested structure survives re-parsing
                    write!(f, "({v})")?;
                }
                Ok(())
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn st(pairs: &[(&str, Value)]) -> Value {
        Value::Struct(Struct::new(
            pairs
                .iter()
                .map(|(k, v)| Field {
                    name: k.to_string(),
                    attrs: FieldAttrs::default(),
                    value: v.clone(),
                })
                .collect(),
        ))
    }

    #[test]
    fn kind_and_concrete_unify() {
        let v = Value::Kind(BasicKind::Int).unify(&Value::Int(3)).unwrap();
        assert_eq!(v, Value::Int(3));
        let err = Value::Kind(BasicKind::String).unify(&Value::Int(3)).unwrap_err();
        assert!(matches!(err, LangError::Conflict { .. }));
        assert_eq!(
            Value::Kind(BasicKind::Number).unify(&Value::Kind(BasicKind::Float)).unwrap(),
            Value::Kind(BasicKind::Float)
        );
    }

    #[test]
    fn struct_unify_keeps_first_declaration_order() {
        let a = st(&[("b", Value::Int(1)), ("a", Value::Kind(BasicKind::String))]);
        let b = st(&[("c", Value::Bool(true)), ("a", Value::String("x".into()))]);
        let merged = a.unify(&b).unwrap();
        let names: Vec<_> = merged.fields().unwrap().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(merged.lookup("a").unwrap().as_str().unwrap(), "x");
    }

    #[test]
    fn conflicting_fields_report_path() {
        let a = st(&[("spec", st(&[("replicas", Value::Int(1))]))]);
        let b = st(&[("spec", st(&[("replicas", Value::Int(2))]))]);
        let err = a.unify(&b).unwrap_err();
        assert_eq!(err.to_string(), "spec.replicas: conflicting values 1 and 2");
    }

    #[test]
    fn default_survives_type_unification() {
        let d = Disjunction::normalize(vec![
            (Value::Int(1), true),
            (Value::Kind(BasicKind::Int), false),
        ])
        .unwrap();
        let v = d.unify(&Value::Kind(BasicKind::Int)).unwrap();
        assert_eq!(v.to_json().unwrap(), json!(1));
        let overridden = d.unify(&Value::Int(5)).unwrap();
        assert_eq!(overridden, Value::Int(5));
    }

    #[test]
    fn typed_accessors_distinguish_incomplete_from_mismatch() {
        assert!(Value::Kind(BasicKind::Bool).as_bool().unwrap_err().is_incomplete());
        assert!(matches!(
            Value::Int(1).as_bool().unwrap_err(),
            LangError::KindMismatch { expected: "bool", .. }
        ));
    }

    #[test]
    fn export_skips_flagged_fields() {
        let v = Value::Struct(Struct::new(vec![
            Field {
                name: "a".into(),
                attrs: FieldAttrs::default(),
                value: Value::Int(1),
            },
            Field {
                name: "_h".into(),
                attrs: FieldAttrs { hidden: true, ..Default::default() },
                value: Value::Int(2),
            },
            Field {
                name: "o".into(),
                attrs: FieldAttrs { optional: true, ..Default::default() },
                value: Value::Kind(BasicKind::Int),
            },
        ]));
        assert_eq!(v.to_json().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn json_import_export() {
        let doc = json!({"kind": "Pod", "spec": {"replicas": 2, "ratio": 0.5, "tags": ["a"]}});
        assert_eq!(Value::from_json(&doc).to_json().unwrap(), doc);
    }

    #[test]
    fn display_escapes_strings() {
        let v = st(&[("msg", Value::String("say \"hi\"\n".into()))]);
        assert_eq!(v.to_string(), r#"{"msg": "say \"hi\"\n"}"#);
    }
}
