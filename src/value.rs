//! Runtime values seen by templates

use crate::drop::DropObject;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub type Object = IndexMap<String, Value>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Object(Object),
    /// Inclusive integer range
    Range(i64, i64),
    /// Sandboxed host object
    Drop(Arc<dyn DropObject>),
    /// A value that must be escaped before it reaches the output
    Tainted(Box<Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Mark a value as unsafe to write unescaped
    pub fn tainted(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Tainted(inner) => Value::Tainted(inner),
            Value::Nil => Value::Nil,
            other => Value::Tainted(Box::new(other)),
        }
    }

    pub fn is_tainted(&self) -> bool {
        matches!(self, Value::Tainted(_))
    }

    /// The value without its taint marker
    pub fn untainted(&self) -> &Value {
        match self {
            Value::Tainted(inner) => inner.untainted(),
            other => other,
        }
    }

    pub fn into_untainted(self) -> Value {
        match self {
            Value::Tainted(inner) => inner.into_untainted(),
            other => other,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.untainted(), Value::Nil)
    }

    /// Only `nil` and `false` are falsey
    pub fn is_truthy(&self) -> bool {
        !matches!(self.untainted(), Value::Nil | Value::Bool(false))
    }

    /// Answer to `== empty`
    pub fn is_empty_value(&self) -> bool {
        match self.untainted() {
            Value::Str(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        }
    }

    /// Answer to `== blank`
    pub fn is_blank(&self) -> bool {
        match self.untainted() {
            Value::Nil | Value::Bool(false) => true,
            Value::Str(s) => s.trim().is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        }
    }

    /// Name used in comparison diagnostics
    pub fn type_name(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(_) => "Integer".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::Array(_) => "Array".to_string(),
            Value::Object(_) => "Hash".to_string(),
            Value::Range(..) => "Range".to_string(),
            Value::Drop(drop) => drop.type_name().to_string(),
            Value::Tainted(inner) => inner.type_name(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.untainted() {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.untainted() {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.untainted() {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self.untainted() {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self.untainted() {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Element count for the `size` command
    pub fn size(&self) -> Option<usize> {
        match self.untainted() {
            Value::Str(s) => Some(s.chars().count()),
            Value::Array(a) => Some(a.len()),
            Value::Object(o) => Some(o.len()),
            Value::Range(a, b) => Some(range_len(*a, *b)),
            _ => None,
        }
    }

    pub fn first(&self) -> Option<Value> {
        match self.untainted() {
            Value::Str(s) => s.chars().next().map(|c| Value::Str(c.to_string())),
            Value::Array(a) => a.first().cloned(),
            Value::Object(o) => o
                .first()
                .map(|(k, v)| Value::Array(vec![Value::Str(k.clone()), v.clone()])),
            Value::Range(a, b) if a <= b => Some(Value::Int(*a)),
            _ => None,
        }
    }

    pub fn last(&self) -> Option<Value> {
        match self.untainted() {
            Value::Str(s) => s.chars().last().map(|c| Value::Str(c.to_string())),
            Value::Array(a) => a.last().cloned(),
            Value::Object(o) => o
                .last()
                .map(|(k, v)| Value::Array(vec![Value::Str(k.clone()), v.clone()])),
            Value::Range(a, b) if a <= b => Some(Value::Int(*b)),
            _ => None,
        }
    }

    /// Native element access for arrays, ranges and objects
    pub fn index(&self, key: &Value) -> Option<Value> {
        match self.untainted() {
            Value::Array(items) => {
                let i = key.untainted().integer_key()?;
                let len = items.len() as i64;
                let i = if i < 0 { len + i } else { i };
                if i < 0 {
                    return None;
                }
                items.get(i as usize).cloned()
            }
            Value::Range(a, b) => {
                let i = i128::from(key.untainted().integer_key()?);
                let len = if b >= a { i128::from(*b) - i128::from(*a) + 1 } else { 0 };
                let i = if i < 0 { len + i } else { i };
                if i < 0 || i >= len {
                    return None;
                }
                i64::try_from(i128::from(*a) + i).ok().map(Value::Int)
            }
            Value::Object(map) => map.get(&key.to_output()).cloned(),
            _ => None,
        }
    }

    /// Whether `key` names an entry that native indexing can reach
    pub fn has_key(&self, key: &Value) -> bool {
        match self.untainted() {
            Value::Object(map) => map.contains_key(&key.to_output()),
            Value::Array(_) | Value::Range(..) => key.untainted().integer_key().is_some(),
            _ => false,
        }
    }

    fn integer_key(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Elements visited by a `for` loop over a plain value
    pub fn to_items(&self) -> Vec<Value> {
        match self.untainted() {
            Value::Array(items) => items.clone(),
            Value::Range(a, b) => (*a..=*b).map(Value::Int).collect(),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Value::Array(vec![Value::Str(k.clone()), v.clone()]))
                .collect(),
            Value::Nil => Vec::new(),
            Value::Str(s) if s.is_empty() => Vec::new(),
            other => vec![other.clone()],
        }
    }

    /// Ordering for `<`, `>` and sorting; `None` when the types do not compare
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self.untainted(), other.untainted()) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.untainted(), Value::Int(_) | Value::Float(_))
    }

    /// Text written to the output
    pub fn to_output(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::Array(items) => items.iter().map(Value::to_output).collect(),
            Value::Object(_) => self.inspect(),
            Value::Range(a, b) => format!("{}..{}", a, b),
            Value::Drop(drop) => drop.to_output(),
            Value::Tainted(inner) => inner.to_output(),
        }
    }

    /// Literal-like rendering used inside object output
    pub fn inspect(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Str(s) => format!("{:?}", s),
            Value::Array(items) => format!(
                "[{}]",
                items.iter().map(Value::inspect).collect::<Vec<_>>().join(", ")
            ),
            Value::Object(map) => format!(
                "{{{}}}",
                map.iter()
                    .map(|(k, v)| format!("{:?}=>{}", k, v.inspect()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Value::Tainted(inner) => inner.inspect(),
            other => other.to_output(),
        }
    }
}

/// Number of integers in the inclusive range `a..b`, saturating at `usize::MAX`
pub fn range_len(a: i64, b: i64) -> usize {
    if b < a {
        return 0;
    }
    usize::try_from(i128::from(b) - i128::from(a) + 1).unwrap_or(usize::MAX)
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self.untainted(), other.untainted()) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Range(a1, b1), Value::Range(a2, b2)) => a1 == a2 && b1 == b2,
            (Value::Drop(a), Value::Drop(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Range(a, b) => write!(f, "Range({}..{})", a, b),
            Value::Drop(drop) => write!(f, "Drop({})", drop.type_name()),
            Value::Tainted(inner) => write!(f, "Tainted({:?})", inner),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_output())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Nil)
    }
}
