//! `if` / `unless` with `elsif` and `else` branches

use super::{markup_context, BlockTag};
use crate::ast::Section;
use crate::condition::{self, Condition};
use crate::context::Context;
use crate::error::Result;
use crate::parser::expression::ExpressionParser;
use crate::parser::ParseContext;
use crate::renderer::{render_nodes, Flow};

/// Parse conditional markup with the grammar the error mode selects
pub(crate) fn parse_condition(
    markup: &str,
    pctx: &mut ParseContext,
    syntax_key: &str,
) -> Result<Condition> {
    pctx.select(
        &markup_context(markup),
        |_| ExpressionParser::new(markup)?.condition(),
        |p| condition::parse_lax(markup, p.locale(), syntax_key),
    )
}

#[derive(Debug)]
pub struct IfTag {
    /// One condition per section
    conditions: Vec<Condition>,
    /// `unless` negates its first branch
    negated: bool,
}

impl IfTag {
    pub fn parse(markup: &str, negated: bool, pctx: &mut ParseContext) -> Result<Self> {
        let first = parse_condition(markup, pctx, "errors.syntax.if")?;
        Ok(Self {
            conditions: vec![first],
            negated,
        })
    }
}

impl BlockTag for IfTag {
    fn accepts(&self, name: &str) -> bool {
        name == "elsif" || name == "else"
    }

    fn begin_section(&mut self, name: &str, markup: &str, pctx: &mut ParseContext) -> Result<()> {
        let condition = if name == "else" {
            Condition::Else
        } else {
            parse_condition(markup, pctx, "errors.syntax.if")?
        };
        self.conditions.push(condition);
        Ok(())
    }

    fn render(&self, sections: &[Section], ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
        for (index, (condition, section)) in self.conditions.iter().zip(sections).enumerate() {
            let mut matched = condition.evaluate(ctx)?;
            if index == 0 && self.negated {
                matched = !matched;
            }
            if matched {
                return render_nodes(&section.nodes, ctx, out);
            }
        }
        Ok(Flow::Normal)
    }
}
