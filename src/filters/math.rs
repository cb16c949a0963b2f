use super::arg;
use crate::error::{Error, Result};
use crate::strainer::FilterRegistry;
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;

static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\s*-?\d+\.\d+\s*\z").expect("Invalid decimal regex"));

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_value(value: Option<&Value>) -> Number {
        match value.map(Value::untainted) {
            Some(Value::Int(i)) => Number::Int(*i),
            Some(Value::Float(f)) => Number::Float(*f),
            Some(Value::Str(s)) if DECIMAL.is_match(s) => {
                Number::Float(s.trim().parse().unwrap_or(0.0))
            }
            Some(other) => Number::Int(leading_int(&other.to_output())),
            None => Number::Int(0),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

// "12abc" reads as 12, anything unparseable as 0
fn leading_int(text: &str) -> i64 {
    let text = text.trim();
    let end = text
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    text[..end].parse().unwrap_or(0)
}

fn arithmetic(
    input: &Value,
    args: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let left = Number::from_value(Some(input));
    let right = Number::from_value(arg(args, 0));
    let result = match (left, right) {
        (Number::Int(a), Number::Int(b)) => match int_op(a, b) {
            Some(i) => Number::Int(i),
            None => Number::Float(float_op(a as f64, b as f64)),
        },
        (a, b) => Number::Float(float_op(a.as_f64(), b.as_f64())),
    };
    Ok(result.into_value())
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

// sign follows the divisor
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn zero_check(args: &[Value]) -> Result<()> {
    match Number::from_value(arg(args, 0)) {
        Number::Int(0) => Err(Error::standard("divided by 0")),
        _ => Ok(()),
    }
}

pub(super) fn register(registry: &mut FilterRegistry) {
    registry.register_fn("plus", |input, args, _| {
        arithmetic(input, args, i64::checked_add, |a, b| a + b)
    });
    registry.register_fn("minus", |input, args, _| {
        arithmetic(input, args, i64::checked_sub, |a, b| a - b)
    });
    registry.register_fn("times", |input, args, _| {
        arithmetic(input, args, i64::checked_mul, |a, b| a * b)
    });
    registry.register_fn("divided_by", |input, args, _| {
        zero_check(args)?;
        arithmetic(input, args, floor_div, |a, b| a / b)
    });
    registry.register_fn("modulo", |input, args, _| {
        zero_check(args)?;
        arithmetic(input, args, floor_mod, |a, b| a % b)
    });
}
