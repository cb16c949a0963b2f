//! Boolean conditions for `if`, `unless` and `case`
//!
//! `or` binds loosest, then `and`, then the comparison operators. Both
//! junctions short-circuit.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::grammar::{CONDITION_SYNTAX, CONDITION_WORD};
use crate::i18n::Locale;
use crate::value::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        left: Expression,
        operator: Option<String>,
        right: Option<Expression>,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    /// Always true; the `else` branch of a conditional
    Else,
}

impl Condition {
    /// Truthiness of a single expression
    pub fn truthy(left: Expression) -> Self {
        Condition::Comparison {
            left,
            operator: None,
            right: None,
        }
    }

    pub fn compare(left: Expression, operator: impl Into<String>, right: Expression) -> Self {
        Condition::Comparison {
            left,
            operator: Some(operator.into()),
            right: Some(right),
        }
    }

    pub fn is_else(&self) -> bool {
        matches!(self, Condition::Else)
    }

    /// Combine conditions read left to right, giving `and` precedence over `or`
    pub fn join(first: Condition, rest: Vec<(Junction, Condition)>) -> Condition {
        let mut alternatives: Option<Condition> = None;
        let mut current = first;

        for (junction, next) in rest {
            match junction {
                Junction::And => {
                    current = Condition::And(Box::new(current), Box::new(next));
                }
                Junction::Or => {
                    let finished = std::mem::replace(&mut current, next);
                    alternatives = Some(match alternatives.take() {
                        Some(acc) => Condition::Or(Box::new(acc), Box::new(finished)),
                        None => finished,
                    });
                }
            }
        }

        match alternatives {
            Some(acc) => Condition::Or(Box::new(acc), Box::new(current)),
            None => current,
        }
    }

    pub fn evaluate(&self, ctx: &Context<'_>) -> Result<bool> {
        match self {
            Condition::Else => Ok(true),
            Condition::And(a, b) => Ok(a.evaluate(ctx)? && b.evaluate(ctx)?),
            Condition::Or(a, b) => Ok(a.evaluate(ctx)? || b.evaluate(ctx)?),
            Condition::Comparison {
                left,
                operator,
                right,
            } => match (operator, right) {
                (Some(op), Some(right)) => interpret(left, op, right, ctx),
                (Some(op), None) => interpret(left, op, &Expression::nil(), ctx),
                (None, _) => Ok(left.evaluate(ctx)?.is_truthy()),
            },
        }
    }
}

fn interpret(left: &Expression, op: &str, right: &Expression, ctx: &Context<'_>) -> Result<bool> {
    match op {
        "==" => equal(left, right, ctx),
        "!=" | "<>" => Ok(!equal(left, right, ctx)?),
        "<" | ">" | "<=" | ">=" => {
            let l = left.evaluate(ctx)?;
            let r = right.evaluate(ctx)?;
            order(op, &l, &r, ctx)
        }
        "contains" => {
            let l = left.evaluate(ctx)?;
            let r = right.evaluate(ctx)?;
            Ok(contains(&l, &r))
        }
        other => Err(Error::argument(
            ctx.t("errors.argument.unknown_operator", &[("operator", other)]),
        )),
    }
}

fn special(expr: &Expression, value: &Value) -> Option<bool> {
    match expr {
        Expression::Empty => Some(value.is_empty_value()),
        Expression::Blank => Some(value.is_blank()),
        _ => None,
    }
}

fn equal(left: &Expression, right: &Expression, ctx: &Context<'_>) -> Result<bool> {
    let l = left.evaluate(ctx)?;
    let r = right.evaluate(ctx)?;
    if let Some(answer) = special(left, &r) {
        return Ok(answer);
    }
    if let Some(answer) = special(right, &l) {
        return Ok(answer);
    }
    Ok(l == r)
}

fn order(op: &str, l: &Value, r: &Value, ctx: &Context<'_>) -> Result<bool> {
    if l.is_nil() || r.is_nil() {
        return Ok(false);
    }
    match l.compare(r) {
        Some(ordering) => Ok(match op {
            "<" => ordering == Ordering::Less,
            ">" => ordering == Ordering::Greater,
            "<=" => ordering != Ordering::Greater,
            _ => ordering != Ordering::Less,
        }),
        None => {
            let orderable = |v: &Value| v.is_numeric() || v.as_str().is_some();
            if orderable(l) && orderable(r) {
                Err(Error::argument(ctx.t(
                    "errors.argument.comparison",
                    &[("left", &l.type_name()), ("right", &r.type_name())],
                )))
            } else {
                Ok(false)
            }
        }
    }
}

fn contains(l: &Value, r: &Value) -> bool {
    if r.is_nil() {
        return false;
    }
    match l.untainted() {
        Value::Str(s) => s.contains(&r.to_output()),
        Value::Array(items) => items.contains(r),
        Value::Object(map) => map.contains_key(&r.to_output()),
        Value::Range(a, b) => r.as_int().map_or(false, |i| *a <= i && i <= *b),
        _ => false,
    }
}

/// Split markup on top-level `and` / `or` words, keeping quoted text whole
fn split_junctions(markup: &str) -> (Vec<&str>, Vec<Junction>) {
    let mut chunks = Vec::new();
    let mut junctions = Vec::new();
    let mut start = 0;

    for word in CONDITION_WORD.find_iter(markup) {
        let junction = match word.as_str() {
            "and" => Junction::And,
            "or" => Junction::Or,
            _ => continue,
        };
        chunks.push(&markup[start..word.start()]);
        junctions.push(junction);
        start = word.end();
    }
    chunks.push(&markup[start..]);
    (chunks, junctions)
}

/// Parse conditional markup with the lax grammar
///
/// `syntax_key` names the message used when a part does not parse.
pub fn parse_lax(markup: &str, locale: &Locale, syntax_key: &str) -> Result<Condition> {
    let (chunks, junctions) = split_junctions(markup);
    let mut conditions = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let caps = CONDITION_SYNTAX
            .captures(chunk)
            .ok_or_else(|| Error::syntax(locale.t(syntax_key, &[])))?;
        let left = Expression::parse(&caps[1]);
        let condition = match caps.get(2) {
            Some(op) => Condition::Comparison {
                left,
                operator: Some(op.as_str().to_string()),
                right: caps.get(3).map(|m| Expression::parse(m.as_str())),
            },
            None => Condition::truthy(left),
        };
        conditions.push(condition);
    }

    let mut conditions = conditions.into_iter();
    let first = conditions
        .next()
        .ok_or_else(|| Error::syntax(locale.t(syntax_key, &[])))?;
    Ok(Condition::join(first, junctions.into_iter().zip(conditions).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Registers;
    use serde_json::json;

    fn check(markup: &str, env: serde_json::Value) -> Result<bool> {
        let env = Value::from(env);
        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers).with_environment(&env);
        let condition = parse_lax(markup, &Locale::new(), "errors.syntax.if")?;
        condition.evaluate(&ctx)
    }

    #[test]
    fn test_comparisons() {
        assert!(check("1 == 1", json!({})).unwrap());
        assert!(check("1 == 1.0", json!({})).unwrap());
        assert!(check("1 != 2", json!({})).unwrap());
        assert!(check("1 <> 2", json!({})).unwrap());
        assert!(check("2 > 1", json!({})).unwrap());
        assert!(check("2 >= 2", json!({})).unwrap());
        assert!(check("'a' < 'b'", json!({})).unwrap());
        assert!(!check("x < 1", json!({})).unwrap());
    }

    #[test]
    fn test_contains() {
        assert!(check("'hello' contains 'ell'", json!({})).unwrap());
        assert!(check("list contains 2", json!({"list": [1, 2]})).unwrap());
        assert!(!check("list contains 3", json!({"list": [1, 2]})).unwrap());
        assert!(check("hash contains 'k'", json!({"hash": {"k": 1}})).unwrap());
        assert!(!check("nothing contains 'k'", json!({})).unwrap());
    }

    #[test]
    fn test_empty_and_blank() {
        assert!(check("list == empty", json!({"list": []})).unwrap());
        assert!(check("empty == s", json!({"s": ""})).unwrap());
        assert!(check("s == blank", json!({"s": "  "})).unwrap());
        assert!(check("missing == blank", json!({})).unwrap());
        assert!(!check("missing == empty", json!({})).unwrap());
        assert!(check("s != empty", json!({"s": "x"})).unwrap());
    }

    #[test]
    fn test_precedence_and_over_or() {
        // true or (false and false)
        assert!(check("true or false and false", json!({})).unwrap());
        // (false and true) or true
        assert!(check("false and true or true", json!({})).unwrap());
        assert!(!check("false or true and false", json!({})).unwrap());
    }

    #[test]
    fn test_quoted_junction_words_are_not_split() {
        assert!(check("'a or b' == 'a or b'", json!({})).unwrap());
    }

    #[test]
    fn test_short_circuit_skips_bad_operator() {
        assert!(check("true or 1 =! 2", json!({})).unwrap());
        assert!(!check("false and 1 =! 2", json!({})).unwrap());
    }

    #[test]
    fn test_unknown_operator() {
        let err = check("1 =! 2", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Twig error: Unknown operator =!");
        assert_eq!(err.error_code(), "E_ARGUMENT");
    }

    #[test]
    fn test_incompatible_ordering() {
        let err = check("1 < 'a'", json!({})).unwrap_err();
        assert_eq!(err.message(), "comparison of Integer with String failed");
    }

    #[test]
    fn test_empty_markup_is_syntax_error() {
        let err = parse_lax("", &Locale::new(), "errors.syntax.if").unwrap_err();
        assert_eq!(
            err.message(),
            "Syntax Error in tag 'if' - Valid syntax: if [expression]"
        );
    }
}
