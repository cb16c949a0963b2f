//! Template parsing
//!
//! [`parse_document`] walks the fragments of a source string and builds the
//! node tree. Open blocks are kept on a stack; tag markup is handed to the
//! factory registered for the tag name.
//!
//! Whether markup is parsed with the strict or the lax grammar is decided by
//! [`ParseContext::select`]. Structural errors (unknown tags, unclosed
//! blocks, stray delimiters) are raised in every mode.

pub mod expression;

use crate::ast::{BlockNode, Document, Node, Section, TagNode, VariableNode};
use crate::config::{self, EngineConfig, ErrorMode};
use crate::error::{Error, Result};
use crate::grammar::{CONTENT_OF_VARIABLE, FULL_TOKEN, TAG_END, VARIABLE_END};
use crate::i18n::Locale;
use crate::lexer::{Fragment, FragmentKind, Fragments};
use crate::tags::{global_tags, BlockTag, BodyMode, Parsed, TagRegistry};
use crate::variable::Variable;
use std::sync::Arc;

/// Options for one parse
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// `None` uses the process-wide default
    pub error_mode: Option<ErrorMode>,
    pub line_numbers: bool,
    pub tags: Option<Arc<TagRegistry>>,
    pub locale: Option<Arc<Locale>>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            error_mode: None,
            line_numbers: EngineConfig::current().line_numbers,
            tags: None,
            locale: None,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = Some(mode);
        self
    }

    pub fn with_line_numbers(mut self, enabled: bool) -> Self {
        self.line_numbers = enabled;
        self
    }

    pub fn with_tags(mut self, tags: Arc<TagRegistry>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_locale(mut self, locale: Arc<Locale>) -> Self {
        self.locale = Some(locale);
        self
    }
}

/// State shared by the tag factories during one parse
pub struct ParseContext {
    error_mode: ErrorMode,
    line_numbers: bool,
    tags: Arc<TagRegistry>,
    locale: Arc<Locale>,
    line_number: usize,
    warnings: Vec<Error>,
}

impl ParseContext {
    pub fn new(options: &ParseOptions) -> Self {
        Self {
            error_mode: options.error_mode.unwrap_or_else(config::default_error_mode),
            line_numbers: options.line_numbers,
            tags: options.tags.clone().unwrap_or_else(global_tags),
            locale: options.locale.clone().unwrap_or_else(Locale::shared),
            line_number: 1,
            warnings: Vec::new(),
        }
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    pub fn line_numbers(&self) -> bool {
        self.line_numbers
    }

    /// Line of the fragment being parsed, when line numbers are enabled
    pub fn line_number(&self) -> Option<usize> {
        if self.line_numbers {
            Some(self.line_number)
        } else {
            None
        }
    }

    pub fn tags(&self) -> &Arc<TagRegistry> {
        &self.tags
    }

    pub fn locale(&self) -> &Arc<Locale> {
        &self.locale
    }

    pub fn t(&self, key: &str, vars: &[(&str, &str)]) -> String {
        self.locale.translate(key, vars)
    }

    /// Syntax error from a message key, located at the current line
    pub fn syntax_error(&self, key: &str, vars: &[(&str, &str)]) -> Error {
        self.locate(Error::syntax(self.t(key, vars)))
    }

    pub fn locate(&self, err: Error) -> Error {
        err.with_line_number(self.line_number())
    }

    pub fn warn(&mut self, warning: Error) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Error> {
        self.warnings
    }

    /// Run the grammar the error mode asks for
    ///
    /// `strict` only: syntax errors are annotated with `markup_context` and
    /// raised. `warn`: a strict syntax error becomes a warning and the lax
    /// grammar is used instead. `lax`: only the lax grammar runs.
    pub fn select<T>(
        &mut self,
        markup_context: &str,
        strict: impl FnOnce(&Self) -> Result<T>,
        lax: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<T> {
        match self.error_mode {
            ErrorMode::Strict => strict(self).map_err(|err| self.annotate(err, markup_context)),
            ErrorMode::Warn => match strict(self) {
                Ok(parsed) => Ok(parsed),
                Err(err) if err.is_syntax() => {
                    let warning = self.annotate(err, markup_context);
                    self.warn(warning);
                    lax(self)
                }
                Err(err) => Err(err),
            },
            ErrorMode::Lax => lax(self),
        }
    }

    fn annotate(&self, err: Error, markup_context: &str) -> Error {
        let err = if err.is_syntax() {
            err.with_markup_context(markup_context)
        } else {
            err
        };
        self.locate(err)
    }
}

struct OpenBlock {
    name: String,
    markup: String,
    line_number: usize,
    tag: Box<dyn BlockTag>,
    sections: Vec<Section>,
}

impl OpenBlock {
    fn end_tag(&self) -> String {
        format!("end{}", self.name)
    }

    fn close(self) -> Node {
        Node::Block(BlockNode::new(
            self.name,
            self.markup,
            self.line_number,
            self.sections,
            self.tag,
        ))
    }
}

/// Parse a whole template source
pub fn parse_document(source: &str, pctx: &mut ParseContext) -> Result<Document> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<OpenBlock> = Vec::new();

    for fragment in Fragments::new(source) {
        pctx.line_number = fragment.line_number;

        if let Some(open) = stack.last_mut() {
            if open.tag.body() == BodyMode::Raw {
                if closes_raw_block(&fragment, &open.end_tag()) {
                    if let Some(open) = stack.pop() {
                        push_node(&mut root, &mut stack, open.close());
                    }
                } else if let Some(section) = open.sections.last_mut() {
                    section.nodes.push(Node::Literal(fragment.text.to_string()));
                }
                continue;
            }
        }

        match fragment.kind {
            FragmentKind::Text => {
                push_node(&mut root, &mut stack, Node::Literal(fragment.text.to_string()));
            }
            FragmentKind::Variable => {
                let markup = CONTENT_OF_VARIABLE
                    .captures(fragment.text)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str())
                    .ok_or_else(|| {
                        pctx.syntax_error(
                            "errors.syntax.variable_termination",
                            &[("token", fragment.text), ("tag_end", VARIABLE_END)],
                        )
                    })?;
                let variable = Variable::parse(markup, pctx)?;
                let node = Node::Variable(VariableNode {
                    variable,
                    markup: markup.to_string(),
                    line_number: fragment.line_number,
                });
                push_node(&mut root, &mut stack, node);
            }
            FragmentKind::Tag => {
                let caps = FULL_TOKEN.captures(fragment.text).ok_or_else(|| {
                    pctx.syntax_error(
                        "errors.syntax.tag_termination",
                        &[("token", fragment.text), ("tag_end", TAG_END)],
                    )
                })?;
                let name = caps.get(1).map_or("", |m| m.as_str());
                let markup = caps.get(2).map_or("", |m| m.as_str());
                parse_tag(name, markup, fragment.line_number, &mut root, &mut stack, pctx)?;
            }
        }
    }

    if let Some(open) = stack.last() {
        let err = Error::syntax(pctx.t(
            "errors.syntax.tag_never_closed",
            &[("block_name", &open.name)],
        ));
        let line = if pctx.line_numbers {
            Some(open.line_number)
        } else {
            None
        };
        return Err(err.with_line_number(line));
    }

    Ok(Document { nodes: root })
}

fn parse_tag(
    name: &str,
    markup: &str,
    line_number: usize,
    root: &mut Vec<Node>,
    stack: &mut Vec<OpenBlock>,
    pctx: &mut ParseContext,
) -> Result<()> {
    if let Some(open) = stack.last_mut() {
        if name == open.end_tag() {
            if let Some(open) = stack.pop() {
                push_node(root, stack, open.close());
            }
            return Ok(());
        }
        if open.tag.accepts(name) {
            open.tag
                .begin_section(name, markup, pctx)
                .map_err(|err| pctx.locate(err))?;
            open.sections.push(Section::new(name, markup, line_number));
            return Ok(());
        }
    }

    let factory = match pctx.tags().get(name) {
        Some(factory) => factory,
        None => match stack.last() {
            Some(open) if open.tag.ignores_unknown_tags() => return Ok(()),
            open => return Err(unknown_tag(name, open, pctx)),
        },
    };

    match factory.build(name, markup, pctx).map_err(|err| pctx.locate(err))? {
        Parsed::Tag(tag) => {
            let node = Node::Tag(TagNode {
                name: name.to_string(),
                markup: markup.to_string(),
                line_number,
                tag,
            });
            push_node(root, stack, node);
        }
        Parsed::Block(tag) => stack.push(OpenBlock {
            name: name.to_string(),
            markup: markup.to_string(),
            line_number,
            tag,
            sections: vec![Section::new(name, markup, line_number)],
        }),
    }
    Ok(())
}

fn unknown_tag(name: &str, open: Option<&OpenBlock>, pctx: &ParseContext) -> Error {
    match open {
        Some(open) if name == "else" => pctx.syntax_error(
            "errors.syntax.unexpected_else",
            &[("block_name", &open.name)],
        ),
        Some(open) if name.starts_with("end") => pctx.syntax_error(
            "errors.syntax.invalid_delimiter",
            &[
                ("tag", name),
                ("block_name", &open.name),
                ("block_delimiter", &open.end_tag()),
            ],
        ),
        None if name == "else" || name.starts_with("end") => {
            pctx.syntax_error("errors.syntax.unexpected_outer_tag", &[("tag", name)])
        }
        _ => pctx.syntax_error("errors.syntax.unknown_tag", &[("tag", name)]),
    }
}

fn closes_raw_block(fragment: &Fragment<'_>, end_tag: &str) -> bool {
    fragment.kind == FragmentKind::Tag
        && FULL_TOKEN
            .captures(fragment.text)
            .and_then(|caps| caps.get(1))
            .map_or(false, |name| name.as_str() == end_tag)
}

fn push_node(root: &mut Vec<Node>, stack: &mut [OpenBlock], node: Node) {
    match stack.last_mut().and_then(|open| open.sections.last_mut()) {
        Some(section) => section.nodes.push(node),
        None => root.push(node),
    }
}

/// Parse `source` with `options`, returning the tree and any warnings
pub fn parse(source: &str, options: &ParseOptions) -> Result<(Document, Vec<Error>)> {
    let mut pctx = ParseContext::new(options);
    let document = parse_document(source, &mut pctx)?;
    Ok((document, pctx.into_warnings()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_lax(source: &str) -> Result<Document> {
        let options = ParseOptions::new().with_error_mode(ErrorMode::Lax);
        parse(source, &options).map(|(doc, _)| doc)
    }

    #[test]
    fn test_text_and_variables() {
        let doc = parse_lax("Hi {{ name }}!").unwrap();
        assert_eq!(doc.nodes.len(), 3);
        assert!(matches!(doc.nodes[1], Node::Variable(_)));
    }

    #[test]
    fn test_blocks_nest_sections() {
        let doc = parse_lax("{% if a %}x{% else %}y{% endif %}").unwrap();
        match &doc.nodes[0] {
            Node::Block(block) => {
                assert_eq!(block.name, "if");
                assert_eq!(block.sections.len(), 2);
                assert_eq!(block.sections[1].delimiter, "else");
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_structural_errors() {
        let err = parse_lax("{% bogus %}").unwrap_err();
        assert_eq!(err.to_string(), "Twig syntax error: Unknown tag 'bogus'");

        let err = parse_lax("{% for a in b %}").unwrap_err();
        assert_eq!(err.message(), "'for' tag was never closed");

        let err = parse_lax("{% endif %}").unwrap_err();
        assert_eq!(err.message(), "Unexpected outer 'endif' tag");

        let err = parse_lax("{% if true %}{% endfor %}").unwrap_err();
        assert_eq!(
            err.message(),
            "'endfor' is not a valid delimiter for if tags. use endif"
        );

        let err = parse_lax("{% comment %}{% endcomment %}{% else %}").unwrap_err();
        assert_eq!(err.message(), "Unexpected outer 'else' tag");
    }

    #[test]
    fn test_unterminated_fragments() {
        let err = parse_lax("{{ x").unwrap_err();
        assert_eq!(
            err.message(),
            "Variable '{{' was not properly terminated with regexp: /\\}\\}/"
        );

        let err = parse_lax("{% x").unwrap_err();
        assert_eq!(
            err.message(),
            "Tag '{%' was not properly terminated with regexp: /\\%\\}/"
        );
    }

    #[test]
    fn test_never_closed_reports_opening_line() {
        let options = ParseOptions::new()
            .with_error_mode(ErrorMode::Lax)
            .with_line_numbers(true);
        let err = parse("\n\n{% for a in b %}\n\n", &options).unwrap_err();
        assert_eq!(err.line_number(), Some(3));
        assert_eq!(
            err.to_string(),
            "Twig syntax error (line 3): 'for' tag was never closed"
        );
    }

    #[test]
    fn test_warn_mode_collects_warnings() {
        let options = ParseOptions::new().with_error_mode(ErrorMode::Warn);
        let (_, warnings) = parse("{{ %%% }}{{ ok }}", &options).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("in \"{{ %%% }}\""));
    }

    #[test]
    fn test_strict_mode_raises_with_context() {
        let options = ParseOptions::new().with_error_mode(ErrorMode::Strict);
        let err = parse("{{ hello. }}", &options).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Twig syntax error: Expected id but found end_of_string in \"{{ hello. }}\""
        );
    }

    #[test]
    fn test_raw_body_is_verbatim() {
        let doc = parse_lax("{% raw %}{{ a }}{% if %}{% endraw %}").unwrap();
        match &doc.nodes[0] {
            Node::Block(block) => assert_eq!(block.sections[0].text(), "{{ a }}{% if %}"),
            other => panic!("expected block, got {:?}", other),
        }
    }
}
