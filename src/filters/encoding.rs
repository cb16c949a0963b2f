use crate::error::{Error, Result};
use crate::security::HtmlEscaper;
use crate::strainer::FilterRegistry;
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub(super) fn register(registry: &mut FilterRegistry) {
    registry.register_sanitizer("escape", |input, _, _| Ok(escape(input)));
    registry.register_sanitizer("h", |input, _, _| Ok(escape(input)));
    registry.register_sanitizer("escape_once", |input, _, _| {
        Ok(Value::Str(HtmlEscaper::escape_once(&input.to_output())))
    });
    registry.register_fn("strip_html", |input, _, _| {
        Ok(Value::Str(HtmlEscaper::strip_html(&input.to_output())))
    });

    registry.register_fn("url_encode", |input, _, _| Ok(url_encode(input)));
    registry.register_fn("url_decode", |input, _, _| url_decode(input));

    registry.register_fn("base64_encode", |input, _, _| {
        Ok(Value::Str(STANDARD.encode(input.to_output())))
    });
    registry.register_fn("base64_decode", |input, _, _| base64_decode(input));
}

fn escape(input: &Value) -> Value {
    match input {
        Value::Nil => Value::Nil,
        other => Value::Str(HtmlEscaper::escape(&other.to_output())),
    }
}

// form encoding: spaces become `+`
fn url_encode(input: &Value) -> Value {
    match input {
        Value::Nil => Value::Nil,
        other => Value::Str(urlencoding::encode(&other.to_output()).replace("%20", "+")),
    }
}

fn url_decode(input: &Value) -> Result<Value> {
    if input.is_nil() {
        return Ok(Value::Nil);
    }
    let text = input.to_output().replace('+', " ");
    let decoded = urlencoding::decode(&text)
        .map_err(|e| Error::argument(format!("invalid URL encoding: {}", e)))?;
    Ok(Value::Str(decoded.into_owned()))
}

fn base64_decode(input: &Value) -> Result<Value> {
    let bytes = STANDARD
        .decode(input.to_output())
        .map_err(|_| Error::argument("invalid base64 provided to base64_decode"))?;
    Ok(Value::Str(String::from_utf8_lossy(&bytes).into_owned()))
}
