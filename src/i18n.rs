//! Translation of diagnostic messages
//!
//! Messages are looked up by dotted key (`errors.syntax.unknown_tag`) and
//! interpolate `%{name}` placeholders. The English table is embedded; other
//! languages can be loaded from JSON.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

const ENGLISH: &[(&str, &str)] = &[
    ("errors.syntax.set", "Syntax Error in 'set' - Valid syntax: set [var] = [source]"),
    ("errors.syntax.case", "Syntax Error in 'case' - Valid syntax: case [condition]"),
    (
        "errors.syntax.case_invalid_when",
        "Syntax Error in tag 'case' - Valid when condition: {% when [condition] [or condition2...] %}",
    ),
    (
        "errors.syntax.case_invalid_else",
        "Syntax Error in tag 'case' - Valid else condition: {% else %} (no parameters) ",
    ),
    (
        "errors.syntax.cycle",
        "Syntax Error in 'cycle' - Valid syntax: cycle [name :] var [, var2, var3 ...]",
    ),
    (
        "errors.syntax.for",
        "Syntax Error in 'for loop' - Valid syntax: for [item] in [collection]",
    ),
    ("errors.syntax.for_invalid_in", "For loops require an 'in' clause"),
    (
        "errors.syntax.for_invalid_attribute",
        "Invalid attribute in for loop. Valid attributes are limit and offset",
    ),
    ("errors.syntax.if", "Syntax Error in tag 'if' - Valid syntax: if [expression]"),
    (
        "errors.syntax.include",
        "Error in tag 'include' - Valid syntax: include '[template]' (with|for) [object|collection]",
    ),
    (
        "errors.syntax.tag_unexpected_args",
        "Syntax Error in '%{tag}' - Valid syntax: %{tag}",
    ),
    ("errors.syntax.unknown_tag", "Unknown tag '%{tag}'"),
    (
        "errors.syntax.invalid_delimiter",
        "'%{tag}' is not a valid delimiter for %{block_name} tags. use %{block_delimiter}",
    ),
    (
        "errors.syntax.unexpected_else",
        "%{block_name} tag does not expect 'else' tag",
    ),
    ("errors.syntax.unexpected_outer_tag", "Unexpected outer '%{tag}' tag"),
    (
        "errors.syntax.tag_termination",
        "Tag '%{token}' was not properly terminated with regexp: %{tag_end}",
    ),
    (
        "errors.syntax.variable_termination",
        "Variable '%{token}' was not properly terminated with regexp: %{tag_end}",
    ),
    ("errors.syntax.tag_never_closed", "'%{block_name}' tag was never closed"),
    ("errors.argument.unknown_operator", "Unknown operator %{operator}"),
    ("errors.argument.comparison", "comparison of %{left} with %{right} failed"),
    ("errors.argument.undefined_filter", "undefined filter %{name}"),
    (
        "errors.argument.include",
        "Argument error in tag 'include' - Illegal template name",
    ),
    ("errors.argument.assigns", "Expected an object of assigns, got %{type}"),
    ("errors.file_system.blank", "This twig context does not allow includes."),
    ("errors.file_system.illegal_name", "Illegal template name '%{name}'"),
    ("errors.file_system.illegal_path", "Illegal template path '%{path}'"),
    ("errors.file_system.missing", "No such template '%{name}'"),
    ("errors.resource.memory", "Memory limits exceeded"),
    ("errors.resource.nesting", "Nesting too deep"),
    (
        "errors.taint.unescaped",
        "variable '%{name}' is tainted and was not escaped",
    ),
];

static SHARED: Lazy<Arc<Locale>> = Lazy::new(|| Arc::new(Locale::new()));

/// Message catalogue used when building diagnostics
#[derive(Clone, Debug)]
pub struct Locale {
    current_language: String,
    fallback_language: String,
    /// language -> key -> message
    translations: HashMap<String, HashMap<String, String>>,
}

impl Locale {
    /// English catalogue
    pub fn new() -> Self {
        let english = ENGLISH
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut translations = HashMap::new();
        translations.insert("en".to_string(), english);

        Self {
            current_language: "en".to_string(),
            fallback_language: "en".to_string(),
            translations,
        }
    }

    /// The catalogue used when no locale is configured
    pub fn shared() -> Arc<Locale> {
        SHARED.clone()
    }

    pub fn set_language(&mut self, language: &str) {
        self.current_language = language.to_string();
    }

    pub fn language(&self) -> &str {
        &self.current_language
    }

    /// Add or override messages for a language
    pub fn add_translations(&mut self, language: &str, translations: HashMap<String, String>) {
        self.translations
            .entry(language.to_string())
            .or_default()
            .extend(translations);
    }

    /// Load messages from JSON; nested objects are flattened into dotted keys
    pub fn load_from_json(&mut self, language: &str, json: &serde_json::Value) {
        let mut translations = HashMap::new();
        flatten_json("", json, &mut translations);
        self.add_translations(language, translations);
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.translations.contains_key(language)
    }

    fn lookup(&self, key: &str) -> Option<&String> {
        self.translations
            .get(&self.current_language)
            .and_then(|t| t.get(key))
            .or_else(|| {
                self.translations
                    .get(&self.fallback_language)
                    .and_then(|t| t.get(key))
            })
    }

    /// Translate a key, interpolating `%{name}` placeholders
    ///
    /// Missing keys translate to the key itself.
    pub fn translate(&self, key: &str, vars: &[(&str, &str)]) -> String {
        let template = match self.lookup(key) {
            Some(text) => text.as_str(),
            None => key,
        };
        interpolate(template, vars)
    }

    /// Shorthand for [`Locale::translate`]
    pub fn t(&self, key: &str, vars: &[(&str, &str)]) -> String {
        self.translate(key, vars)
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten_json(prefix: &str, json: &serde_json::Value, out: &mut HashMap<String, String>) {
    match json {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                let full = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_json(&full, value, out);
            }
        }
        serde_json::Value::String(text) if !prefix.is_empty() => {
            out.insert(prefix.to_string(), text.clone());
        }
        _ => {}
    }
}

fn interpolate(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => result.push_str(value),
                    None => {
                        result.push_str("%{");
                        result.push_str(name);
                        result.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_translate_with_interpolation() {
        let locale = Locale::new();
        assert_eq!(
            locale.t("errors.syntax.unknown_tag", &[("tag", "foo")]),
            "Unknown tag 'foo'"
        );
        assert_eq!(
            locale.t(
                "errors.syntax.invalid_delimiter",
                &[("tag", "end"), ("block_name", "if"), ("block_delimiter", "endif")]
            ),
            "'end' is not a valid delimiter for if tags. use endif"
        );
    }

    #[test]
    fn test_missing_key_is_identity() {
        let locale = Locale::new();
        assert_eq!(locale.t("errors.nope", &[]), "errors.nope");
    }

    #[test]
    fn test_missing_variable_left_in_place() {
        assert_eq!(interpolate("a %{b} c", &[]), "a %{b} c");
        assert_eq!(interpolate("unterminated %{b", &[("b", "x")]), "unterminated %{b");
    }

    #[test]
    fn test_load_from_json_with_fallback() {
        let mut locale = Locale::new();
        locale.load_from_json(
            "fr",
            &json!({
                "errors": {
                    "syntax": { "unknown_tag": "Balise inconnue '%{tag}'" }
                }
            }),
        );
        locale.set_language("fr");

        assert!(locale.has_language("fr"));
        assert_eq!(
            locale.t("errors.syntax.unknown_tag", &[("tag", "foo")]),
            "Balise inconnue 'foo'"
        );
        // Falls back to English
        assert_eq!(locale.t("errors.resource.nesting", &[]), "Nesting too deep");
    }
}
