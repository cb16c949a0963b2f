//! HTML escaping and markup stripping used by the output filters

use once_cell::sync::Lazy;
use regex::Regex;

static UNESCAPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["><']|&(?:[a-zA-Z]+|#\d+);|&"#).expect("Invalid escape regex")
});

static STRIPPED_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script.*?</script>|<!--.*?-->|<style.*?</style>")
        .expect("Invalid strip regex")
});

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<.*?>").expect("Invalid tag regex"));

/// HTML escaper for values written into markup
pub struct HtmlEscaper;

impl HtmlEscaper {
    fn entity(c: char) -> Option<&'static str> {
        match c {
            '&' => Some("&amp;"),
            '<' => Some("&lt;"),
            '>' => Some("&gt;"),
            '"' => Some("&quot;"),
            '\'' => Some("&#39;"),
            _ => None,
        }
    }

    /// Escape HTML characters to prevent XSS
    pub fn escape(input: &str) -> String {
        let mut escaped = String::with_capacity(input.len());
        for c in input.chars() {
            match Self::entity(c) {
                Some(entity) => escaped.push_str(entity),
                None => escaped.push(c),
            }
        }
        escaped
    }

    /// Escape, leaving entities that are already escaped alone
    pub fn escape_once(input: &str) -> String {
        UNESCAPED
            .replace_all(input, |caps: &regex::Captures| {
                let matched = &caps[0];
                if matched.len() > 1 {
                    return matched.to_string();
                }
                matched
                    .chars()
                    .next()
                    .and_then(Self::entity)
                    .unwrap_or(matched)
                    .to_string()
            })
            .into_owned()
    }

    /// Remove tags, comments, scripts and styles
    pub fn strip_html(input: &str) -> String {
        let without_blocks = STRIPPED_BLOCKS.replace_all(input, "");
        TAGS.replace_all(&without_blocks, "").into_owned()
    }
}
