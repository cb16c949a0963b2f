//! `case` / `when` / `else`

use super::BlockTag;
use crate::ast::Section;
use crate::condition::Condition;
use crate::context::Context;
use crate::error::Result;
use crate::expression::Expression;
use crate::grammar::{QUOTED_FRAGMENT, QUOTED_FRAGMENT_RE};
use crate::parser::ParseContext;
use crate::renderer::{render_nodes, Flow};
use once_cell::sync::Lazy;
use regex::Regex;

static WHEN_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?s)\A\s*({qf})(?:(?:\s+or\s+|\s*,\s*)((?:{qf}).*))?",
        qf = QUOTED_FRAGMENT
    ))
    .expect("Invalid when regex")
});

#[derive(Debug)]
enum Branch {
    /// Body before the first `when`; never rendered
    Leading,
    When(Vec<Condition>),
    Else,
}

#[derive(Debug)]
pub struct CaseTag {
    left: Expression,
    branches: Vec<Branch>,
}

impl CaseTag {
    pub fn parse(markup: &str, pctx: &mut ParseContext) -> Result<Self> {
        let left = QUOTED_FRAGMENT_RE
            .find(markup)
            .map(|m| Expression::parse(m.as_str()))
            .ok_or_else(|| pctx.syntax_error("errors.syntax.case", &[]))?;
        Ok(Self {
            left,
            branches: vec![Branch::Leading],
        })
    }

    fn when_conditions(&self, markup: &str, pctx: &ParseContext) -> Result<Vec<Condition>> {
        let mut conditions = Vec::new();
        let mut rest = Some(markup);

        while let Some(markup) = rest {
            let caps = WHEN_SYNTAX
                .captures(markup)
                .ok_or_else(|| pctx.syntax_error("errors.syntax.case_invalid_when", &[]))?;
            let right = Expression::parse(&caps[1]);
            conditions.push(Condition::compare(self.left.clone(), "==", right));
            rest = caps.get(2).map(|m| m.as_str());
        }
        Ok(conditions)
    }
}

impl BlockTag for CaseTag {
    fn accepts(&self, name: &str) -> bool {
        name == "when" || name == "else"
    }

    fn begin_section(&mut self, name: &str, markup: &str, pctx: &mut ParseContext) -> Result<()> {
        let branch = if name == "else" {
            if !markup.trim().is_empty() {
                return Err(pctx.syntax_error("errors.syntax.case_invalid_else", &[]));
            }
            Branch::Else
        } else {
            Branch::When(self.when_conditions(markup, pctx)?)
        };
        self.branches.push(branch);
        Ok(())
    }

    fn render(&self, sections: &[Section], ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
        let mut matched = false;

        for (branch, section) in self.branches.iter().zip(sections) {
            let render = match branch {
                Branch::Leading => false,
                Branch::Else => !matched,
                Branch::When(conditions) => {
                    let mut any = false;
                    for condition in conditions {
                        if condition.evaluate(ctx)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
            };

            if render {
                matched = true;
                let flow = render_nodes(&section.nodes, ctx, out)?;
                if flow != Flow::Normal {
                    return Ok(flow);
                }
            }
        }
        Ok(Flow::Normal)
    }
}
