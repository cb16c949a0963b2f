//! `set`: inline `{% set name = value | filters %}` and block
//! `{% set name %}...{% endset %}` assignment

use super::{BlockTag, Blankness, Parsed, Tag};
use crate::ast::Section;
use crate::context::Context;
use crate::error::Result;
use crate::grammar::VARIABLE_SIGNATURE;
use crate::parser::ParseContext;
use crate::renderer::{render_nodes, Flow};
use crate::value::Value;
use crate::variable::Variable;
use once_cell::sync::Lazy;
use regex::Regex;

static TAG_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?s)\A\s*((?:{})+)\s*=\s*(.*?)\s*\z", VARIABLE_SIGNATURE))
        .expect("Invalid set regex")
});

static BLOCK_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"\A\s*(?:'((?:{sig})+)'|"((?:{sig})+)"|((?:{sig})+))\s*\z"#,
        sig = VARIABLE_SIGNATURE
    ))
    .expect("Invalid set block regex")
});

pub(super) fn build(markup: &str, pctx: &mut ParseContext) -> Result<Parsed> {
    if let Some(caps) = TAG_SYNTAX.captures(markup) {
        let to = caps[1].to_string();
        let from = Variable::parse(&caps[2], pctx)?;
        return Ok(Parsed::Tag(Box::new(SetTag { to, from })));
    }

    if let Some(caps) = BLOCK_SYNTAX.captures(markup) {
        let to = (1..=3)
            .find_map(|i| caps.get(i))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        return Ok(Parsed::Block(Box::new(SetBlockTag { to })));
    }

    Err(pctx.syntax_error("errors.syntax.set", &[]))
}

/// `{% set name = value %}`
#[derive(Debug)]
pub struct SetTag {
    to: String,
    from: Variable,
}

impl Tag for SetTag {
    fn render(&self, ctx: &mut Context<'_>, _out: &mut String) -> Result<Flow> {
        let value = self.from.evaluate(ctx)?;
        ctx.charge_assignment(&value)?;
        ctx.assign(&self.to, value);
        Ok(Flow::Normal)
    }

    fn blank(&self) -> bool {
        true
    }
}

/// `{% set name %}body{% endset %}`; the rendered body is bound as a string
///
/// A block assignment without an existing binding lands in the outermost
/// frame so it outlives the loop or branch it was rendered in.
#[derive(Debug)]
pub struct SetBlockTag {
    to: String,
}

impl BlockTag for SetBlockTag {
    fn blankness(&self) -> Blankness {
        Blankness::Always
    }

    fn render(&self, sections: &[Section], ctx: &mut Context<'_>, _out: &mut String) -> Result<Flow> {
        let mut captured = String::new();
        let flow = match sections.first() {
            Some(section) => render_nodes(&section.nodes, ctx, &mut captured)?,
            None => Flow::Normal,
        };
        let value = Value::Str(captured);
        ctx.charge_assignment(&value)?;
        ctx.assign_outer(&self.to, value);
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseOptions;

    fn build_lax(markup: &str) -> Result<Parsed> {
        let mut pctx = ParseContext::new(&ParseOptions::new());
        build(markup, &mut pctx)
    }

    #[test]
    fn test_inline_and_block_forms() {
        assert!(matches!(build_lax("foo = 'bar'").unwrap(), Parsed::Tag(_)));
        assert!(matches!(build_lax("this-thing = 'x'").unwrap(), Parsed::Tag(_)));
        assert!(matches!(build_lax("foo").unwrap(), Parsed::Block(_)));
        assert!(matches!(build_lax("'var'").unwrap(), Parsed::Block(_)));
    }

    #[test]
    fn test_quoted_block_name_is_unquoted() {
        match build_lax("'var'").unwrap() {
            Parsed::Block(tag) => assert!(format!("{:?}", tag).contains("to: \"var\"")),
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_markup() {
        let err = build_lax("= 'x'").unwrap_err();
        assert_eq!(err.message(), "Syntax Error in 'set' - Valid syntax: set [var] = [source]");
    }
}
