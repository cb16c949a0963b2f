use super::{arg, arg_str};
use crate::strainer::FilterRegistry;
use crate::value::Value;

pub(super) fn register(registry: &mut FilterRegistry) {
    registry.register_fn("upcase", |input, _, _| Ok(Value::Str(input.to_output().to_uppercase())));
    registry.register_fn("downcase", |input, _, _| {
        Ok(Value::Str(input.to_output().to_lowercase()))
    });
    registry.register_fn("capitalize", |input, _, _| Ok(Value::Str(capitalize(&input.to_output()))));

    registry.register_fn("strip", |input, _, _| Ok(Value::from(input.to_output().trim())));
    registry.register_fn("lstrip", |input, _, _| Ok(Value::from(input.to_output().trim_start())));
    registry.register_fn("rstrip", |input, _, _| Ok(Value::from(input.to_output().trim_end())));

    registry.register_fn("append", |input, args, _| {
        Ok(Value::Str(input.to_output() + &arg_str(args, 0, "")))
    });
    registry.register_fn("prepend", |input, args, _| {
        Ok(Value::Str(arg_str(args, 0, "") + &input.to_output()))
    });

    registry.register_fn("replace", |input, args, _| {
        let pattern = arg_str(args, 0, "");
        let replacement = arg_str(args, 1, "");
        Ok(Value::Str(input.to_output().replace(&pattern, &replacement)))
    });
    registry.register_fn("replace_first", |input, args, _| {
        let pattern = arg_str(args, 0, "");
        let replacement = arg_str(args, 1, "");
        Ok(Value::Str(input.to_output().replacen(&pattern, &replacement, 1)))
    });
    registry.register_fn("remove", |input, args, _| {
        Ok(Value::Str(input.to_output().replace(&arg_str(args, 0, ""), "")))
    });
    registry.register_fn("remove_first", |input, args, _| {
        Ok(Value::Str(input.to_output().replacen(&arg_str(args, 0, ""), "", 1)))
    });

    registry.register_fn("split", |input, args, _| {
        let pattern = arg_str(args, 0, " ");
        Ok(Value::Array(split(&input.to_output(), &pattern)))
    });

    registry.register_fn("truncate", |input, args, _| {
        let length = arg(args, 0).and_then(Value::as_int).unwrap_or(50);
        let ending = arg_str(args, 1, "...");
        Ok(Value::Str(truncate(&input.to_output(), length, &ending)))
    });

    registry.register_fn("newline_to_br", |input, _, _| {
        Ok(Value::Str(input.to_output().replace('\n', "<br />\n")))
    });
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

/// Split on `pattern`; a single space splits on runs of whitespace and an
/// empty pattern splits into characters. Trailing empty parts are dropped.
fn split(text: &str, pattern: &str) -> Vec<Value> {
    let mut parts: Vec<String> = match pattern {
        " " => text.split_whitespace().map(str::to_string).collect(),
        "" => text.chars().map(String::from).collect(),
        _ => text.split(pattern).map(str::to_string).collect(),
    };
    while parts.last().map_or(false, String::is_empty) {
        parts.pop();
    }
    parts.into_iter().map(Value::Str).collect()
}

fn truncate(text: &str, length: i64, ending: &str) -> String {
    let length = length.max(0) as usize;
    if text.chars().count() <= length {
        return text.to_string();
    }
    let keep = length.saturating_sub(ending.chars().count());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ending);
    truncated
}
