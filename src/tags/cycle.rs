//! `{% cycle [group:] a, b, c %}`

use super::Tag;
use crate::context::Context;
use crate::error::Result;
use crate::expression::Expression;
use crate::grammar::{QUOTED_FRAGMENT, QUOTED_FRAGMENT_RE};
use crate::parser::ParseContext;
use crate::renderer::Flow;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static SIMPLE_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\A(?:{})+", QUOTED_FRAGMENT)).expect("Invalid cycle regex")
});

static NAMED_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?s)\A({})\s*:\s*(.*)", QUOTED_FRAGMENT)).expect("Invalid cycle regex")
});

const CYCLE_REGISTER: &str = "cycle";

#[derive(Debug)]
enum Group {
    Named(Expression),
    /// Unnamed cycles are grouped by their value list
    Values(String),
}

#[derive(Debug)]
pub struct CycleTag {
    group: Group,
    values: Vec<Expression>,
}

impl CycleTag {
    pub fn parse(markup: &str, pctx: &mut ParseContext) -> Result<Self> {
        let markup = markup.trim();
        if let Some(caps) = NAMED_SYNTAX.captures(markup) {
            return Ok(Self {
                group: Group::Named(Expression::parse(&caps[1])),
                values: values_from(&caps[2]),
            });
        }
        if SIMPLE_SYNTAX.is_match(markup) {
            let values = values_from(markup);
            let key = values
                .iter()
                .map(|v| format!("{:?}", v))
                .collect::<Vec<_>>()
                .join(",");
            return Ok(Self {
                group: Group::Values(key),
                values,
            });
        }
        Err(pctx.syntax_error("errors.syntax.cycle", &[]))
    }
}

fn values_from(markup: &str) -> Vec<Expression> {
    markup
        .split(',')
        .filter_map(|part| QUOTED_FRAGMENT_RE.find(part))
        .map(|m| Expression::parse(m.as_str()))
        .collect()
}

impl Tag for CycleTag {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
        if self.values.is_empty() {
            return Ok(Flow::Normal);
        }

        let key = match &self.group {
            Group::Named(expr) => expr.evaluate(ctx)?.to_output(),
            Group::Values(key) => key.clone(),
        };
        let iteration = ctx
            .register::<HashMap<String, usize>>(CYCLE_REGISTER)
            .get(&key)
            .copied()
            .unwrap_or(0)
            % self.values.len();

        let value = self.values[iteration].evaluate(ctx)?;
        ctx.register::<HashMap<String, usize>>(CYCLE_REGISTER)
            .insert(key, (iteration + 1) % self.values.len());

        ctx.check_taint(&value, &self.values[iteration].name())?;
        out.push_str(&value.to_output());
        Ok(Flow::Normal)
    }
}
