//! `{% include 'name' [with|for expr] [key: value ...] %}`

use super::Tag;
use crate::ast::Document;
use crate::context::{Context, Scope};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::grammar::{unquote, QUOTED_FRAGMENT, TAG_ATTRIBUTES};
use crate::parser::{self, ParseContext};
use crate::renderer::{render_nodes, Flow};
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

static SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\A\s*((?:{qf})+)(?:\s+(?:with|for)\s+((?:{qf})+))?",
        qf = QUOTED_FRAGMENT
    ))
    .expect("Invalid include regex")
});

/// Register caching parsed partials by name for the duration of a render
const PARTIALS_REGISTER: &str = "cached_partials";

type PartialCache = HashMap<String, Arc<Document>>;

#[derive(Debug)]
pub struct IncludeTag {
    template_name: Expression,
    variable: Expression,
    attributes: Vec<(String, Expression)>,
}

impl IncludeTag {
    pub fn parse(markup: &str, pctx: &mut ParseContext) -> Result<Self> {
        let caps = SYNTAX
            .captures(markup)
            .ok_or_else(|| pctx.syntax_error("errors.syntax.include", &[]))?;
        let template_name = &caps[1];
        let variable = caps
            .get(2)
            .map_or_else(|| unquote(template_name), |m| m.as_str());

        let attributes = TAG_ATTRIBUTES
            .captures_iter(markup)
            .map(|attr| (attr[1].to_string(), Expression::parse(&attr[2])))
            .collect();

        Ok(Self {
            template_name: Expression::parse(template_name),
            variable: Expression::parse(variable),
            attributes,
        })
    }

    fn load_partial(&self, name: &str, ctx: &mut Context<'_>) -> Result<Arc<Document>> {
        if let Some(cached) = ctx.register::<PartialCache>(PARTIALS_REGISTER).get(name) {
            return Ok(cached.clone());
        }

        log::debug!("Loading partial '{}'", name);
        let source = ctx.file_system().read_template_file(name)?;
        let (document, warnings) = parser::parse(&source, &ctx.parse_options())?;
        for warning in warnings {
            ctx.warn(warning);
        }

        let document = Arc::new(document);
        ctx.register::<PartialCache>(PARTIALS_REGISTER)
            .insert(name.to_string(), document.clone());
        Ok(document)
    }
}

impl Tag for IncludeTag {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
        let name = self.template_name.evaluate(ctx)?.to_output();
        if name.is_empty() {
            return Err(Error::argument(ctx.t("errors.argument.include", &[])));
        }

        let partial = self.load_partial(&name, ctx)?;
        let binding = name.rsplit('/').next().unwrap_or(&name).to_string();
        let variable = self.variable.evaluate(ctx)?;

        let mut scope = Scope::new();
        for (key, expr) in &self.attributes {
            scope.insert(key.clone(), expr.evaluate(ctx)?);
        }

        ctx.with_scope(scope, |ctx| {
            match variable.untainted() {
                Value::Array(_) => {
                    for item in variable.to_items() {
                        ctx.set_local(binding.clone(), item);
                        render_nodes(&partial.nodes, ctx, out)?;
                    }
                }
                _ => {
                    ctx.set_local(binding.clone(), variable.clone());
                    render_nodes(&partial.nodes, ctx, out)?;
                }
            }
            Ok(Flow::Normal)
        })
    }
}
