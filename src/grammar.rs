//! Shared syntax patterns used by the lexer, the lax parsers and the tags

use once_cell::sync::Lazy;
use regex::Regex;

pub const TAG_END: &str = r"/\%\}/";
pub const VARIABLE_END: &str = r"/\}\}/";

pub const QUOTED_STRING: &str = r#""[^"]*"|'[^']*'"#;

/// A quoted string or a run of characters without whitespace, commas or pipes
pub const QUOTED_FRAGMENT: &str = r#""[^"]*"|'[^']*'|(?:[^\s,\|'"]|"[^"]*"|'[^']*')+"#;

/// Characters allowed in an assignment target
pub const VARIABLE_SIGNATURE: &str = r"\(?[\w\-\.\[\]]\)?";

/// Splits raw source into literal text and delimiter fragments
pub static TEMPLATE_PARSER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{%.*?%\}|\{\{.*?\}\}?|\{\{|\{%").expect("Invalid template parser regex")
});

pub static FULL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A\{%-?\s*(\w+)\s*(.*?)-?%\}\z").expect("Invalid full token regex")
});

pub static CONTENT_OF_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A\{\{-?(.*?)-?\}\}\z").expect("Invalid variable content regex")
});

pub static QUOTED_FRAGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(QUOTED_FRAGMENT).expect("Invalid quoted fragment regex"));

pub static QUOTED_STRING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?s)\A(?:{})\z", QUOTED_STRING)).expect("Invalid quoted string regex")
});

/// `name: value` pairs in tag markup
pub static TAG_ATTRIBUTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(\w+)\s*:\s*({})", QUOTED_FRAGMENT)).expect("Invalid tag attributes regex")
});

pub static JUST_TAG_ATTRIBUTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\A(\w+)\s*:\s*({})\z", QUOTED_FRAGMENT))
        .expect("Invalid tag attributes regex")
});

/// Segments of a lax variable path: `[expr]` or `name` with optional `?`
pub static VARIABLE_PARSER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]+\]|[\w\-]+\??").expect("Invalid variable parser regex"));

pub static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A-?\d+\z").expect("Invalid integer regex"));

pub static FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A-?\d[\d\.]+\z").expect("Invalid float regex"));

/// `(a..b)` or `a..b`
pub static RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\(?(\S+)\.\.(\S+?)\)?\z").expect("Invalid range regex"));

/// Lax variable markup: the expression, then everything after it
pub static VARIABLE_MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?s)({})(.*)", QUOTED_FRAGMENT)).expect("Invalid variable markup regex")
});

pub static FILTER_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\|\s*(.*)").expect("Invalid filter separator regex"));

pub static FILTER_PARSER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:\||(?:\s*(?:{}|,)\s*)+)", QUOTED_FRAGMENT))
        .expect("Invalid filter parser regex")
});

pub static FILTER_ARGUMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:[:,])\s*((?:\w+\s*:\s*)?(?:{}))", QUOTED_FRAGMENT))
        .expect("Invalid filter arguments regex")
});

pub static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("Invalid word regex"));

/// One comparison in lax conditional markup
pub static CONDITION_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"({})\s*([=!<>a-z_]+)?\s*({})?",
        QUOTED_FRAGMENT, QUOTED_FRAGMENT
    ))
    .expect("Invalid condition syntax regex")
});

/// Whitespace separated words, keeping quoted strings whole
pub static CONDITION_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:{}|[^\s'\x22])+", QUOTED_STRING)).expect("Invalid condition word regex")
});

/// Strip the surrounding quotes of a quoted string literal
pub fn unquote(text: &str) -> &str {
    if text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')))
    {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Every non-overlapping match of a pattern, like a `scan`
pub fn scan<'a>(re: &Regex, text: &'a str) -> Vec<&'a str> {
    re.find_iter(text).map(|m| m.as_str()).collect()
}
