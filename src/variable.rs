//! `{{ expression | filter: args }}` output markup

use crate::context::Context;
use crate::error::Result;
use crate::expression::Expression;
use crate::grammar::{
    scan, FILTER_ARGUMENTS, FILTER_PARSER, FILTER_SEPARATOR, JUST_TAG_ATTRIBUTES, VARIABLE_MARKUP,
    WORD,
};
use crate::parser::expression::ExpressionParser;
use crate::parser::ParseContext;
use crate::value::{Object, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub keyword_args: Vec<(String, Expression)>,
}

impl FilterCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            keyword_args: Vec::new(),
        }
    }

    /// Evaluated arguments; keyword arguments travel as one trailing object
    fn arguments(&self, ctx: &Context<'_>) -> Result<Vec<Value>> {
        let mut args = self
            .args
            .iter()
            .map(|arg| arg.evaluate(ctx))
            .collect::<Result<Vec<_>>>()?;

        if !self.keyword_args.is_empty() {
            let mut keywords = Object::new();
            for (key, expr) in &self.keyword_args {
                keywords.insert(key.clone(), expr.evaluate(ctx)?);
            }
            args.push(Value::Object(keywords));
        }
        Ok(args)
    }
}

/// An expression followed by a filter chain
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub expression: Expression,
    pub filters: Vec<FilterCall>,
}

impl Variable {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression,
            filters: Vec::new(),
        }
    }

    /// Parse with the grammar selected by the error mode
    pub fn parse(markup: &str, pctx: &mut ParseContext) -> Result<Variable> {
        let context = format!("in \"{{{{{}}}}}\"", markup);
        pctx.select(
            &context,
            |_| ExpressionParser::new(markup)?.variable(),
            |_| Ok(Variable::parse_lax(markup)),
        )
    }

    pub fn parse_lax(markup: &str) -> Variable {
        let caps = match VARIABLE_MARKUP.captures(markup) {
            Some(caps) => caps,
            None => return Variable::new(Expression::nil()),
        };

        let mut variable = Variable::new(Expression::parse(&caps[1]));
        let rest = caps.get(2).map_or("", |m| m.as_str());

        if let Some(filter_caps) = FILTER_SEPARATOR.captures(rest) {
            let chain = filter_caps.get(1).map_or("", |m| m.as_str());
            for filter in scan(&FILTER_PARSER, chain) {
                let name = match WORD.find(filter) {
                    Some(word) => word.as_str(),
                    None => continue,
                };
                let args: Vec<&str> = FILTER_ARGUMENTS
                    .captures_iter(filter)
                    .filter_map(|c| c.get(1).map(|m| m.as_str()))
                    .collect();
                variable.filters.push(filter_call(name, &args));
            }
        }
        variable
    }

    /// Evaluate the expression and thread it through the filters
    pub fn evaluate(&self, ctx: &Context<'_>) -> Result<Value> {
        let mut value = self.expression.evaluate(ctx)?;
        for filter in &self.filters {
            let args = filter.arguments(ctx)?;
            value = ctx.invoke_filter(&filter.name, value, args)?;
        }
        Ok(value)
    }

    /// Write the value, subject to the taint policy
    pub fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<()> {
        let value = self.evaluate(ctx)?;
        ctx.check_taint(&value, &self.name())?;
        out.push_str(&value.to_output());
        Ok(())
    }

    pub fn name(&self) -> String {
        self.expression.name()
    }
}

fn filter_call(name: &str, args: &[&str]) -> FilterCall {
    let mut call = FilterCall::new(name);
    for arg in args {
        match JUST_TAG_ATTRIBUTES.captures(arg) {
            Some(caps) => call
                .keyword_args
                .push((caps[1].to_string(), Expression::parse(&caps[2]))),
            None => call.args.push(Expression::parse(arg)),
        }
    }
    call
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lax_filters() {
        let v = Variable::parse_lax(" product.title | truncate: 10, ending: '..' | upcase ");
        assert_eq!(v.name(), "product");
        assert_eq!(v.filters.len(), 2);
        assert_eq!(v.filters[0].name, "truncate");
        assert_eq!(v.filters[0].args, vec![Expression::parse("10")]);
        assert_eq!(
            v.filters[0].keyword_args,
            vec![("ending".to_string(), Expression::parse("'..'"))]
        );
        assert_eq!(v.filters[1].name, "upcase");
    }

    #[test]
    fn test_lax_quoted_separator_argument() {
        let v = Variable::parse_lax("values | split: \",\"");
        assert_eq!(v.filters[0].name, "split");
        assert_eq!(v.filters[0].args, vec![Expression::Literal(Value::from(","))]);
    }

    #[test]
    fn test_lax_garbage_is_nil() {
        let v = Variable::parse_lax("%%%");
        assert!(v.filters.is_empty());
        let v = Variable::parse_lax("   ");
        assert_eq!(v.expression, Expression::nil());
    }
}
