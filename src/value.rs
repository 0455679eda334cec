//! The JSON-shaped value model shared by template input, render data, and
//! render output.
//!
//! `Value` is a recursive tagged union mirroring JSON's shape exactly:
//! null, boolean, number, text, ordered sequence, and an insertion-ordered
//! mapping from text keys to values. Both the template tree the parser
//! consumes and the tree the renderer produces are this same type.

use std::fmt;

/// A JSON-shaped value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn sequence(items: impl Into<Vec<Value>>) -> Self {
        Value::Sequence(items.into())
    }

    pub fn empty_mapping() -> Self {
        Value::Mapping(Mapping::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Truthiness used by `$if`/`$elif`/`$when`/short-circuit operators.
    /// Null, false, 0, empty text, and empty sequence/mapping are falsy;
    /// everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Sequence(items) => !items.is_empty(),
            Value::Mapping(m) => !m.is_empty(),
        }
    }

    /// Coercion used inside `${…}` interpolation segments.
    pub fn to_interpolated_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Sequence(_) | Value::Mapping(_) => {
                serde_json::to_string(&to_json(self)).unwrap_or_default()
            }
        }
    }
}

/// Renders a double the way a JSON serializer would: integral values print
/// without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let mut s = format!("{}", n);
        if s == "inf" || s == "-inf" || s == "NaN" {
            s = n.to_string();
        }
        s
    }
}

/// Loose equality mirroring the comparison operators' semantics: numbers and
/// text compare by numeric coercion where possible, otherwise structurally.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Text(x), Value::Text(y)) => x == y,
        (Value::Number(x), Value::Text(y)) | (Value::Text(y), Value::Number(x)) => {
            y.parse::<f64>().map(|y| y == *x).unwrap_or(false)
        }
        (Value::Sequence(x), Value::Sequence(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| loose_eq(a, b))
        }
        (Value::Mapping(x), Value::Mapping(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|bv| loose_eq(v, bv)).unwrap_or(false))
        }
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        loose_eq(self, other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_interpolated_text())
    }
}

/// An insertion-ordered mapping from text keys to values.
///
/// The teacher crate avoids an `indexmap` dependency for its own small
/// ordered maps; we follow suit with a hand-rolled `Vec`-backed map. Template
/// objects rarely have more than a handful of keys, so linear lookup is not a
/// practical concern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            entries: Vec::with_capacity(cap),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Inserts or updates `key`. Existing keys keep their original position;
    /// new keys are appended, preserving first-insertion order for output.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut m = Mapping::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

/// Converts a `serde_json::Value` into our `Value`. This is the sanctioned
/// bridge callers use to load template/data trees from JSON text; the core
/// itself never parses JSON text.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Converts our `Value` back to `serde_json::Value` for callers that want to
/// serialize the rendered output.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Mapping(m) => {
            serde_json::Value::Object(m.iter().map(|(k, v)| (k.to_string(), to_json(v))).collect())
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        to_json(v)
    }
}
