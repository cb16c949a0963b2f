//! Strict markup grammar
//!
//! A recursive-descent parser over the tokens of one fragment. It is used
//! by the `strict` and `warn` error modes and reports the first token that
//! does not fit.

use crate::condition::{Condition, Junction};
use crate::error::{Error, Result};
use crate::expression::{Expression, Segment, VariableLookup};
use crate::lexer::{Token, TokenKind, Tokenizer};
use crate::value::Value;
use crate::variable::{FilterCall, Variable};

/// A positional or `key: value` argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Expression),
    Keyword(String, Expression),
}

pub struct ExpressionParser {
    tokens: Vec<Token>,
    position: usize,
}

impl ExpressionParser {
    pub fn new(markup: &str) -> Result<Self> {
        Ok(Self {
            tokens: Tokenizer::new(markup).tokenize()?,
            position: 0,
        })
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) -> String {
        let lexeme = self.current().lexeme.clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        lexeme
    }

    /// Take a token of `kind` or fail with what was found instead
    pub fn consume(&mut self, kind: TokenKind) -> Result<String> {
        let found = self.current().kind;
        if found != kind {
            return Err(Error::syntax(format!("Expected {} but found {}", kind, found)));
        }
        Ok(self.advance())
    }

    pub fn consume_opt(&mut self, kind: TokenKind) -> Option<String> {
        if self.look(kind, 0) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Take the identifier `name` if it comes next
    pub fn id(&mut self, name: &str) -> Option<String> {
        let token = self.current();
        if token.kind == TokenKind::Id && token.lexeme == name {
            Some(self.advance())
        } else {
            None
        }
    }

    pub fn look(&self, kind: TokenKind, ahead: usize) -> bool {
        self.tokens
            .get(self.position + ahead)
            .map_or(false, |token| token.kind == kind)
    }

    pub fn at_end(&self) -> bool {
        self.look(TokenKind::EndOfString, 0)
    }

    /// Position to pass to [`ExpressionParser::text_since`]
    pub fn mark(&self) -> usize {
        self.position
    }

    /// Markup of the tokens consumed after `mark`, without whitespace
    pub fn text_since(&self, mark: usize) -> String {
        self.tokens[mark..self.position]
            .iter()
            .map(|token| token.lexeme.as_str())
            .collect()
    }

    pub fn finish(&mut self) -> Result<()> {
        self.consume(TokenKind::EndOfString).map(|_| ())
    }

    /// Expression, including the bare `a..b` range form
    pub fn expression(&mut self) -> Result<Expression> {
        let first = self.primary()?;
        if self.consume_opt(TokenKind::DotDot).is_some() {
            let last = self.primary()?;
            return Ok(Expression::Range(Box::new(first), Box::new(last)));
        }
        Ok(first)
    }

    fn primary(&mut self) -> Result<Expression> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Id => self.lookup_or_literal(),
            TokenKind::Str | TokenKind::Number => {
                self.advance();
                Ok(Expression::parse(&token.lexeme))
            }
            TokenKind::OpenRound => {
                self.advance();
                let first = self.primary()?;
                self.consume(TokenKind::DotDot)?;
                let last = self.primary()?;
                self.consume(TokenKind::CloseRound)?;
                Ok(Expression::Range(Box::new(first), Box::new(last)))
            }
            _ => Err(Error::syntax(format!("{} is not a valid expression", token))),
        }
    }

    fn lookup_or_literal(&mut self) -> Result<Expression> {
        let lookup = self.variable_lookup()?;
        if lookup.lookups.is_empty() {
            let literal = match lookup.root_name() {
                "nil" | "null" => Some(Expression::nil()),
                "true" => Some(Expression::Literal(Value::Bool(true))),
                "false" => Some(Expression::Literal(Value::Bool(false))),
                "empty" => Some(Expression::Empty),
                "blank" => Some(Expression::Blank),
                _ => None,
            };
            if let Some(literal) = literal {
                return Ok(literal);
            }
        }
        Ok(Expression::Lookup(lookup))
    }

    /// `name`, `name.key`, `name[expr]` chains
    pub fn variable_lookup(&mut self) -> Result<VariableLookup> {
        let mut lookup = VariableLookup::new(self.consume(TokenKind::Id)?);
        loop {
            if self.consume_opt(TokenKind::OpenSquare).is_some() {
                let index = self.expression()?;
                self.consume(TokenKind::CloseSquare)?;
                lookup.lookups.push(Segment::Index(Box::new(index)));
            } else if self.consume_opt(TokenKind::Dot).is_some() {
                lookup.lookups.push(Segment::Key(self.consume(TokenKind::Id)?));
            } else {
                return Ok(lookup);
            }
        }
    }

    pub fn argument(&mut self) -> Result<Argument> {
        if self.look(TokenKind::Id, 0) && self.look(TokenKind::Colon, 1) {
            let key = self.advance();
            self.advance();
            return Ok(Argument::Keyword(key, self.expression()?));
        }
        Ok(Argument::Positional(self.expression()?))
    }

    /// Comma separated arguments
    pub fn arguments(&mut self) -> Result<Vec<Argument>> {
        let mut args = vec![self.argument()?];
        while self.consume_opt(TokenKind::Comma).is_some() {
            args.push(self.argument()?);
        }
        Ok(args)
    }

    /// Whole `{{ }}` markup; empty markup renders nothing
    pub fn variable(&mut self) -> Result<Variable> {
        let expression = if self.at_end() || self.look(TokenKind::Pipe, 0) {
            Expression::nil()
        } else {
            self.expression()?
        };
        let mut variable = Variable::new(expression);
        variable.filters = self.filters()?;
        self.finish()?;
        Ok(variable)
    }

    /// `| name: args` chain
    pub fn filters(&mut self) -> Result<Vec<FilterCall>> {
        let mut filters = Vec::new();
        while self.consume_opt(TokenKind::Pipe).is_some() {
            let mut call = FilterCall::new(self.consume(TokenKind::Id)?);
            if self.consume_opt(TokenKind::Colon).is_some() {
                for arg in self.arguments()? {
                    match arg {
                        Argument::Positional(expr) => call.args.push(expr),
                        Argument::Keyword(key, expr) => call.keyword_args.push((key, expr)),
                    }
                }
            }
            filters.push(call);
        }
        Ok(filters)
    }

    /// `left [op right]`
    pub fn comparison(&mut self) -> Result<Condition> {
        let left = self.expression()?;
        match self.consume_opt(TokenKind::Comparison) {
            Some(op) => Ok(Condition::compare(left, op, self.expression()?)),
            None => Ok(Condition::truthy(left)),
        }
    }

    /// Whole conditional markup joined by `and` / `or`
    pub fn condition(&mut self) -> Result<Condition> {
        let first = self.comparison()?;
        let mut rest = Vec::new();
        loop {
            let junction = if self.id("and").is_some() {
                Junction::And
            } else if self.id("or").is_some() {
                Junction::Or
            } else {
                break;
            };
            rest.push((junction, self.comparison()?));
        }
        self.finish()?;
        Ok(Condition::join(first, rest))
    }
}
