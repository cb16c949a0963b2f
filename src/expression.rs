//! Expressions and variable lookup
//!
//! [`Expression::parse`] is the lax grammar: it never fails and falls back to
//! a variable lookup for anything that is not a literal. The strict grammar
//! lives in [`crate::parser::expression`] and builds the same tree.

use crate::context::Context;
use crate::drop;
use crate::error::Result;
use crate::grammar::{scan, FLOAT, INTEGER, RANGE, VARIABLE_PARSER};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// `empty`, compared with the emptiness of the other operand
    Empty,
    /// `blank`, compared with the blankness of the other operand
    Blank,
    /// Inclusive range with evaluated bounds
    Range(Box<Expression>, Box<Expression>),
    Lookup(VariableLookup),
}

impl Expression {
    pub fn nil() -> Self {
        Expression::Literal(Value::Nil)
    }

    /// Parse markup with the lax grammar
    pub fn parse(markup: &str) -> Expression {
        let markup = markup.trim();

        match markup {
            "" | "nil" | "null" => return Expression::nil(),
            "true" => return Expression::Literal(Value::Bool(true)),
            "false" => return Expression::Literal(Value::Bool(false)),
            "empty" => return Expression::Empty,
            "blank" => return Expression::Blank,
            _ => {}
        }

        if let Some(text) = quoted(markup) {
            return Expression::Literal(Value::from(text));
        }

        if INTEGER.is_match(markup) {
            return match markup.parse::<i64>() {
                Ok(i) => Expression::Literal(Value::Int(i)),
                Err(_) => Expression::Literal(Value::Float(markup.parse().unwrap_or(0.0))),
            };
        }

        if let Some(caps) = RANGE.captures(markup) {
            return Expression::Range(
                Box::new(Expression::parse(&caps[1])),
                Box::new(Expression::parse(&caps[2])),
            );
        }

        if FLOAT.is_match(markup) {
            return Expression::Literal(Value::Float(parse_float_prefix(markup)));
        }

        Expression::Lookup(VariableLookup::parse(markup))
    }

    pub fn evaluate(&self, ctx: &Context<'_>) -> Result<Value> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Empty | Expression::Blank => Ok(Value::Str(String::new())),
            Expression::Range(start, end) => {
                let start = range_bound(&start.evaluate(ctx)?);
                let end = range_bound(&end.evaluate(ctx)?);
                Ok(Value::Range(start, end))
            }
            Expression::Lookup(lookup) => lookup.evaluate(ctx),
        }
    }

    /// Root variable name, used to name a value in diagnostics
    pub fn name(&self) -> String {
        match self {
            Expression::Lookup(lookup) => lookup.root_name().to_string(),
            Expression::Literal(value) => value.to_output(),
            Expression::Empty => "empty".to_string(),
            Expression::Blank => "blank".to_string(),
            Expression::Range(..) => "range".to_string(),
        }
    }
}

fn quoted(markup: &str) -> Option<&str> {
    let bytes = markup.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return Some(&markup[1..markup.len() - 1]);
        }
    }
    None
}

// `1.2.3` reads as 1.2
fn parse_float_prefix(markup: &str) -> f64 {
    let mut end = markup.len();
    if let Some(first_dot) = markup.find('.') {
        if let Some(second) = markup[first_dot + 1..].find('.') {
            end = first_dot + 1 + second;
        }
    }
    markup[..end].parse().unwrap_or(0.0)
}

fn range_bound(value: &Value) -> i64 {
    value.as_int().unwrap_or(0)
}

/// One step of a variable path
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `.name`; may also be one of the `size`, `first`, `last` commands
    Key(String),
    /// `[expression]`
    Index(Box<Expression>),
}

/// A dotted or indexed path such as `products[0].title`
#[derive(Debug, Clone, PartialEq)]
pub struct VariableLookup {
    pub name: Segment,
    pub lookups: Vec<Segment>,
}

impl VariableLookup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Segment::Key(name.into()),
            lookups: Vec::new(),
        }
    }

    /// Lax path parsing; markup without any path segment looks up nothing
    pub fn parse(markup: &str) -> Self {
        let mut parts = scan(&VARIABLE_PARSER, markup).into_iter().map(|part| {
            if part.starts_with('[') {
                Segment::Index(Box::new(Expression::parse(&part[1..part.len() - 1])))
            } else {
                Segment::Key(part.to_string())
            }
        });

        let name = parts.next().unwrap_or(Segment::Key(String::new()));
        Self {
            name,
            lookups: parts.collect(),
        }
    }

    pub fn root_name(&self) -> &str {
        match &self.name {
            Segment::Key(name) => name,
            Segment::Index(_) => "",
        }
    }

    pub fn evaluate(&self, ctx: &Context<'_>) -> Result<Value> {
        let name = match &self.name {
            Segment::Key(name) => name.clone(),
            Segment::Index(expr) => expr.evaluate(ctx)?.to_output(),
        };
        if name.is_empty() {
            return Ok(Value::Nil);
        }

        let mut object = ctx.resolve(&name);
        for segment in &self.lookups {
            if object.is_nil() {
                return Ok(Value::Nil);
            }
            object = match segment {
                Segment::Key(key) => lookup(&object, &Value::Str(key.clone()), true, ctx)?,
                Segment::Index(expr) => lookup(&object, &expr.evaluate(ctx)?, false, ctx)?,
            };
        }
        Ok(object)
    }
}

/// Read `key` from `object`
///
/// Drops answer every key through the sandbox. Other values use native
/// indexing, then the commands for dotted keys, and otherwise yield nil.
pub fn lookup(object: &Value, key: &Value, command: bool, ctx: &Context<'_>) -> Result<Value> {
    match object {
        Value::Tainted(inner) => Ok(Value::tainted(lookup(inner, key, command, ctx)?)),
        Value::Drop(d) => drop::invoke(d, &key.to_output(), ctx),
        _ if object.has_key(key) => Ok(object.index(key).unwrap_or(Value::Nil)),
        _ if command => {
            let result = match key.as_str() {
                Some("size") => object.size().map(Value::from),
                Some("first") => object.first(),
                Some("last") => object.last(),
                _ => None,
            };
            Ok(result.unwrap_or(Value::Nil))
        }
        _ => Ok(Value::Nil),
    }
}
