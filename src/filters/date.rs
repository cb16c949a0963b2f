//! `date`: strftime formatting of timestamps and date strings

use super::arg;
use crate::strainer::FilterRegistry;
use crate::value::Value;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y"];

pub(super) fn register(registry: &mut FilterRegistry) {
    registry.register_fn("date", |input, args, _| {
        let format = match arg(args, 0) {
            Some(format) if !format.to_output().is_empty() => format.to_output(),
            _ => return Ok(input.clone()),
        };
        Ok(match parse_date(input) {
            Some(date) => format_date(&date, &format).map_or_else(|| input.clone(), Value::Str),
            None => input.clone(),
        })
    });
}

fn parse_date(input: &Value) -> Option<DateTime<Utc>> {
    match input {
        Value::Int(seconds) => Utc.timestamp_opt(*seconds, 0).single(),
        Value::Float(seconds) => Utc.timestamp_opt(*seconds as i64, 0).single(),
        Value::Str(text) => parse_date_str(text.trim()),
        _ => None,
    }
}

fn parse_date_str(text: &str) -> Option<DateTime<Utc>> {
    match text {
        "" => return None,
        "now" | "today" => return Some(Local::now().with_timezone(&Utc)),
        _ => {}
    }
    if let Ok(seconds) = text.parse::<i64>() {
        return Utc.timestamp_opt(seconds, 0).single();
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(text) {
        return Some(date.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(date) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&date));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
        }
    }
    None
}

/// `None` when the format contains an unknown directive
fn format_date(date: &DateTime<Utc>, format: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    Some(date.format_with_items(items.into_iter()).to_string())
}
