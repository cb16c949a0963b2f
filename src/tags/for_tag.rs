//! `for` loops and the `break` / `continue` tags

use super::{markup_context, BlockTag, Tag};
use crate::ast::Section;
use crate::context::{Context, Scope};
use crate::error::Result;
use crate::expression::Expression;
use crate::grammar::{QUOTED_FRAGMENT, TAG_ATTRIBUTES};
use crate::lexer::TokenKind;
use crate::parser::expression::ExpressionParser;
use crate::parser::ParseContext;
use crate::renderer::{render_nodes, Flow};
use crate::value::{self, Object, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\A([\w\-]+)\s+in\s+((?:{})+)\s*(reversed)?",
        QUOTED_FRAGMENT
    ))
    .expect("Invalid for regex")
});

/// Register holding where each named loop stopped, for `offset: continue`
const OFFSETS_REGISTER: &str = "for";

#[derive(Debug, Clone, PartialEq)]
enum Offset {
    Continue,
    At(Expression),
}

#[derive(Debug)]
pub struct ForTag {
    variable: String,
    collection: Expression,
    /// `variable-collection`, keys the offsets register
    name: String,
    reversed: bool,
    limit: Option<Expression>,
    offset: Option<Offset>,
}

impl ForTag {
    pub fn parse(markup: &str, pctx: &mut ParseContext) -> Result<Self> {
        pctx.select(&markup_context(markup), |p| strict(markup, p), |p| lax(markup, p))
    }

    fn collection(&self, ctx: &Context<'_>) -> Result<Option<Collection>> {
        let collection = self.collection.evaluate(ctx)?;
        let tainted = collection.is_tainted();

        let kind = match collection.untainted() {
            Value::Range(a, b) => Kind::Span {
                start: *a,
                len: value::range_len(*a, *b),
            },
            Value::Array(_) | Value::Object(_) => Kind::Items(collection.to_items()),
            Value::Str(s) if !s.is_empty() => Kind::Items(vec![collection.clone().into_untainted()]),
            Value::Drop(d) => match d.iterate(ctx) {
                Some(items) => Kind::Items(items?),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        Ok(Some(Collection { kind, tainted }))
    }

    fn render_else(sections: &[Section], ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
        match sections.get(1) {
            Some(section) => render_nodes(&section.nodes, ctx, out),
            None => Ok(Flow::Normal),
        }
    }
}

fn strict(markup: &str, pctx: &ParseContext) -> Result<ForTag> {
    let mut p = ExpressionParser::new(markup)?;
    let variable = p.consume(TokenKind::Id)?;
    if p.id("in").is_none() {
        return Err(pctx.syntax_error("errors.syntax.for_invalid_in", &[]));
    }

    let mark = p.mark();
    let collection = p.expression()?;
    let name = format!("{}-{}", variable, p.text_since(mark));
    let reversed = p.id("reversed").is_some();

    let mut limit = None;
    let mut offset = None;
    while p.look(TokenKind::Id, 0) && p.look(TokenKind::Colon, 1) {
        if p.id("limit").is_some() {
            p.consume(TokenKind::Colon)?;
            limit = Some(p.expression()?);
        } else if p.id("offset").is_some() {
            p.consume(TokenKind::Colon)?;
            offset = Some(match p.id("continue") {
                Some(_) => Offset::Continue,
                None => Offset::At(p.expression()?),
            });
        } else {
            return Err(pctx.syntax_error("errors.syntax.for_invalid_attribute", &[]));
        }
    }
    p.finish()?;

    Ok(ForTag {
        variable,
        collection,
        name,
        reversed,
        limit,
        offset,
    })
}

fn lax(markup: &str, pctx: &ParseContext) -> Result<ForTag> {
    let caps = SYNTAX
        .captures(markup)
        .ok_or_else(|| pctx.syntax_error("errors.syntax.for", &[]))?;
    let variable = caps[1].to_string();
    let collection_markup = &caps[2];

    let mut limit = None;
    let mut offset = None;
    for attr in TAG_ATTRIBUTES.captures_iter(markup) {
        match &attr[1] {
            "limit" => limit = Some(Expression::parse(&attr[2])),
            "offset" if &attr[2] == "continue" => offset = Some(Offset::Continue),
            "offset" => offset = Some(Offset::At(Expression::parse(&attr[2]))),
            _ => {}
        }
    }

    Ok(ForTag {
        name: format!("{}-{}", variable, collection_markup),
        variable,
        collection: Expression::parse(collection_markup),
        reversed: caps.get(3).is_some(),
        limit,
        offset,
    })
}

fn to_count(value: &Value) -> usize {
    value.as_int().map_or(0, |i| i.max(0) as usize)
}

impl BlockTag for ForTag {
    fn accepts(&self, name: &str) -> bool {
        name == "else"
    }

    fn render(&self, sections: &[Section], ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
        let items = match self.collection(ctx)? {
            Some(items) => items,
            None => return Self::render_else(sections, ctx, out),
        };

        let from = match &self.offset {
            Some(Offset::Continue) => ctx
                .register::<HashMap<String, usize>>(OFFSETS_REGISTER)
                .get(&self.name)
                .copied()
                .unwrap_or(0),
            Some(Offset::At(expr)) => to_count(&expr.evaluate(ctx)?),
            None => 0,
        };
        let limit = match &self.limit {
            Some(expr) => {
                let value = expr.evaluate(ctx)?;
                if value.is_nil() {
                    None
                } else {
                    Some(to_count(&value))
                }
            }
            None => None,
        };

        let segment = items.slice(from, limit.unwrap_or(usize::MAX));
        let length = segment.len();

        if length == 0 {
            return Self::render_else(sections, ctx, out);
        }
        ctx.register::<HashMap<String, usize>>(OFFSETS_REGISTER)
            .insert(self.name.clone(), from.saturating_add(length));

        let body = match sections.first() {
            Some(section) => &section.nodes,
            None => return Ok(Flow::Normal),
        };

        ctx.with_scope(Scope::new(), |ctx| {
            for index in 0..length {
                let position = if self.reversed { length - 1 - index } else { index };
                ctx.set_local(self.variable.clone(), segment.get(position));
                ctx.set_local("forloop", forloop(&self.name, index, length));

                if render_nodes(body, ctx, out)? == Flow::Break {
                    break;
                }
            }
            Ok(Flow::Normal)
        })
    }
}

/// Loop items; integer ranges are never materialized
struct Collection {
    kind: Kind,
    tainted: bool,
}

enum Kind {
    Items(Vec<Value>),
    /// `len` consecutive integers from `start`
    Span { start: i64, len: usize },
}

impl Collection {
    fn len(&self) -> usize {
        match &self.kind {
            Kind::Items(items) => items.len(),
            Kind::Span { len, .. } => *len,
        }
    }

    fn slice(self, from: usize, limit: usize) -> Self {
        let len = self.len().saturating_sub(from).min(limit);
        let kind = match self.kind {
            Kind::Items(items) => Kind::Items(items.into_iter().skip(from).take(len).collect()),
            Kind::Span { start, .. } => Kind::Span {
                start: offset(start, from),
                len,
            },
        };
        Self {
            kind,
            tainted: self.tainted,
        }
    }

    /// Item at `index`, which must be below `len()`
    fn get(&self, index: usize) -> Value {
        let item = match &self.kind {
            Kind::Items(items) => items.get(index).cloned().unwrap_or(Value::Nil),
            Kind::Span { start, .. } => Value::Int(offset(*start, index)),
        };
        if self.tainted {
            Value::tainted(item)
        } else {
            item
        }
    }
}

// Callers stay inside the range, so the sum always fits
fn offset(start: i64, by: usize) -> i64 {
    i64::try_from(i128::from(start) + by as i128).unwrap_or(i64::MAX)
}

fn forloop(name: &str, index: usize, length: usize) -> Value {
    let mut object = Object::new();
    object.insert("name".into(), Value::from(name));
    object.insert("length".into(), Value::from(length));
    object.insert("index".into(), Value::from(index + 1));
    object.insert("index0".into(), Value::from(index));
    object.insert("rindex".into(), Value::from(length - index));
    object.insert("rindex0".into(), Value::from(length - index - 1));
    object.insert("first".into(), Value::Bool(index == 0));
    object.insert("last".into(), Value::Bool(index + 1 == length));
    Value::Object(object)
}

#[derive(Debug)]
pub struct BreakTag;

impl Tag for BreakTag {
    fn render(&self, _ctx: &mut Context<'_>, _out: &mut String) -> Result<Flow> {
        Ok(Flow::Break)
    }
}

#[derive(Debug)]
pub struct ContinueTag;

impl Tag for ContinueTag {
    fn render(&self, _ctx: &mut Context<'_>, _out: &mut String) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ErrorMode;
    use crate::parser::ParseOptions;

    fn parse(markup: &str, mode: ErrorMode) -> Result<ForTag> {
        let mut pctx = ParseContext::new(&ParseOptions::new().with_error_mode(mode));
        ForTag::parse(markup, &mut pctx)
    }

    #[test]
    fn test_strict_and_lax_agree() {
        for markup in ["item in (1..3) reversed limit: 2 offset: 1", "item in products"] {
            let strict = parse(markup, ErrorMode::Strict).unwrap();
            let lax = parse(markup, ErrorMode::Lax).unwrap();
            assert_eq!(strict.name, lax.name);
            assert_eq!(strict.collection, lax.collection);
            assert_eq!(strict.reversed, lax.reversed);
            assert_eq!(strict.limit, lax.limit);
            assert_eq!(strict.offset, lax.offset);
        }
    }

    #[test]
    fn test_offset_continue() {
        let tag = parse("i in list offset: continue", ErrorMode::Strict).unwrap();
        assert_eq!(tag.offset, Some(Offset::Continue));
        let tag = parse("i in list offset:continue", ErrorMode::Lax).unwrap();
        assert_eq!(tag.offset, Some(Offset::Continue));
    }

    #[test]
    fn test_strict_errors() {
        let err = parse("item of list", ErrorMode::Strict).unwrap_err();
        assert!(err.to_string().contains("For loops require an 'in' clause"));

        let err = parse("item in list step: 2", ErrorMode::Strict).unwrap_err();
        assert!(err.message().starts_with("Invalid attribute in for loop"));

        let err = parse("nothing", ErrorMode::Lax).unwrap_err();
        assert!(err.message().starts_with("Syntax Error in 'for loop'"));
    }
}
