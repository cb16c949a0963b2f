use super::{arg, arg_str};
use crate::context::{Context, Resource};
use crate::drop;
use crate::error::Result;
use crate::strainer::FilterRegistry;
use crate::value::{self, Value};
use std::cmp::Ordering;

pub(super) fn register(registry: &mut FilterRegistry) {
    registry.register_fn("size", |input, _, _| Ok(Value::from(input.size().unwrap_or(0))));

    registry.register_fn("join", |input, args, ctx| {
        let glue = arg_str(args, 0, " ");
        let joined = flatten(input, ctx)?
            .iter()
            .map(Value::to_output)
            .collect::<Vec<_>>()
            .join(&glue);
        Ok(Value::Str(joined))
    });

    registry.register_fn("first", |input, _, _| Ok(element(input, true)));
    registry.register_fn("last", |input, _, _| Ok(element(input, false)));

    registry.register_fn("reverse", |input, _, ctx| {
        let mut items = flatten(input, ctx)?;
        items.reverse();
        Ok(Value::Array(items))
    });

    registry.register_fn("sort", |input, args, ctx| {
        let mut items = flatten(input, ctx)?;
        match arg(args, 0) {
            Some(property) => {
                let key = property.to_output();
                let mut keyed = items
                    .into_iter()
                    .map(|item| Ok((member(&item, &key, ctx)?, item)))
                    .collect::<Result<Vec<_>>>()?;
                keyed.sort_by(|(a, _), (b, _)| order(a, b));
                items = keyed.into_iter().map(|(_, item)| item).collect();
            }
            None => items.sort_by(order),
        }
        Ok(Value::Array(items))
    });

    registry.register_fn("uniq", |input, _, ctx| {
        let mut unique: Vec<Value> = Vec::new();
        for item in flatten(input, ctx)? {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Ok(Value::Array(unique))
    });

    registry.register_fn("map", |input, args, ctx| {
        let key = arg_str(args, 0, "");
        let mapped = flatten(input, ctx)?
            .iter()
            .map(|item| member(item, &key, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(mapped))
    });

    registry.register_fn("default", |input, args, _| {
        let fallback = arg(args, 0).cloned().unwrap_or(Value::Str(String::new()));
        if !input.is_truthy() || input.is_empty_value() {
            Ok(fallback)
        } else {
            Ok(input.clone())
        }
    });
}

/// Sequence view of the input, nested arrays flattened; objects count as one item
///
/// Ranges are charged to the render score before they are expanded.
fn flatten(input: &Value, ctx: &Context<'_>) -> Result<Vec<Value>> {
    match input.untainted() {
        Value::Array(items) => {
            let mut flat = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Array(_) => flat.extend(flatten(item, ctx)?),
                    other => flat.push(other.clone()),
                }
            }
            Ok(flat)
        }
        Value::Range(a, b) => {
            ctx.increment_resource(Resource::RenderScore, value::range_len(*a, *b))?;
            Ok(input.to_items())
        }
        Value::Nil => Ok(Vec::new()),
        other => Ok(vec![other.clone()]),
    }
}

fn element(input: &Value, first: bool) -> Value {
    match input {
        Value::Array(items) => {
            let item = if first { items.first() } else { items.last() };
            item.cloned().unwrap_or(Value::Nil)
        }
        _ => Value::Nil,
    }
}

/// `item.key`, read through the sandbox for drops
fn member(item: &Value, key: &str, ctx: &Context<'_>) -> Result<Value> {
    match item {
        Value::Drop(d) => drop::invoke(d, key, ctx),
        Value::Object(map) => Ok(map.get(key).cloned().unwrap_or(Value::Nil)),
        _ => Ok(Value::Nil),
    }
}

// nil sorts first; mixed types keep their relative order
fn order(a: &Value, b: &Value) -> Ordering {
    match (a.is_nil(), b.is_nil()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.compare(b).unwrap_or(Ordering::Equal),
    }
}
