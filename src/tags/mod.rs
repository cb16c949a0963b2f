//! Tags and the tag registry
//!
//! A tag name maps to a [`TagFactory`] that turns the tag's markup into
//! either a simple [`Tag`] or a [`BlockTag`] that owns a body up to its
//! `end<name>` delimiter.

mod case;
mod comment;
mod cycle;
mod for_tag;
mod if_tag;
mod include;
mod set;

pub use case::CaseTag;
pub use comment::{CommentTag, RawTag};
pub use cycle::CycleTag;
pub use for_tag::{BreakTag, ContinueTag, ForTag};
pub use if_tag::IfTag;
pub use include::IncludeTag;
pub use set::{SetBlockTag, SetTag};

use crate::ast::Section;
use crate::context::Context;
use crate::error::Result;
use crate::parser::ParseContext;
use crate::renderer::Flow;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A tag without a body
pub trait Tag: Send + Sync + fmt::Debug {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<Flow>;

    /// Blank tags never produce visible output
    fn blank(&self) -> bool {
        false
    }
}

/// How the parser reads a block body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Parsed,
    /// Text up to the end tag, unparsed
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blankness {
    Always,
    Never,
    /// Blank when every body node is
    Body,
}

/// A tag with a body
pub trait BlockTag: Send + Sync + fmt::Debug {
    fn body(&self) -> BodyMode {
        BodyMode::Parsed
    }

    /// Whether `name` starts a new section of this block (`else`, `when`, ...)
    fn accepts(&self, _name: &str) -> bool {
        false
    }

    /// Called before the body of an accepted delimiter is parsed
    fn begin_section(&mut self, _name: &str, _markup: &str, _pctx: &mut ParseContext) -> Result<()> {
        Ok(())
    }

    fn ignores_unknown_tags(&self) -> bool {
        false
    }

    fn blankness(&self) -> Blankness {
        Blankness::Body
    }

    fn render(&self, sections: &[Section], ctx: &mut Context<'_>, out: &mut String)
        -> Result<Flow>;
}

/// Result of building a tag from its markup
pub enum Parsed {
    Tag(Box<dyn Tag>),
    Block(Box<dyn BlockTag>),
}

impl fmt::Debug for Parsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parsed::Tag(tag) => f.debug_tuple("Tag").field(tag).finish(),
            Parsed::Block(tag) => f.debug_tuple("Block").field(tag).finish(),
        }
    }
}

/// Builds a tag from `(name, markup)`
pub trait TagFactory: Send + Sync {
    fn build(&self, name: &str, markup: &str, pctx: &mut ParseContext) -> Result<Parsed>;
}

impl<F> TagFactory for F
where
    F: Fn(&str, &str, &mut ParseContext) -> Result<Parsed> + Send + Sync,
{
    fn build(&self, name: &str, markup: &str, pctx: &mut ParseContext) -> Result<Parsed> {
        self(name, markup, pctx)
    }
}

/// Registry of tag factories by name
#[derive(Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<String, Arc<dyn TagFactory>>,
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("tags", &self.list())
            .finish()
    }
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tags
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("if", |_: &str, markup: &str, pctx: &mut ParseContext| {
            Ok(Parsed::Block(Box::new(IfTag::parse(markup, false, pctx)?)))
        });
        registry.register("unless", |_: &str, markup: &str, pctx: &mut ParseContext| {
            Ok(Parsed::Block(Box::new(IfTag::parse(markup, true, pctx)?)))
        });
        registry.register("case", |_: &str, markup: &str, pctx: &mut ParseContext| {
            Ok(Parsed::Block(Box::new(CaseTag::parse(markup, pctx)?)))
        });
        registry.register("for", |_: &str, markup: &str, pctx: &mut ParseContext| {
            Ok(Parsed::Block(Box::new(ForTag::parse(markup, pctx)?)))
        });
        registry.register("break", |name: &str, markup: &str, pctx: &mut ParseContext| {
            no_arguments(name, markup, pctx)?;
            Ok(Parsed::Tag(Box::new(BreakTag)))
        });
        registry.register("continue", |name: &str, markup: &str, pctx: &mut ParseContext| {
            no_arguments(name, markup, pctx)?;
            Ok(Parsed::Tag(Box::new(ContinueTag)))
        });
        registry.register("set", |_: &str, markup: &str, pctx: &mut ParseContext| set::build(markup, pctx));
        registry.register("comment", |_: &str, _: &str, _: &mut ParseContext| {
            Ok(Parsed::Block(Box::new(CommentTag)))
        });
        registry.register("raw", |name: &str, markup: &str, pctx: &mut ParseContext| {
            no_arguments(name, markup, pctx)?;
            Ok(Parsed::Block(Box::new(RawTag)))
        });
        registry.register("cycle", |_: &str, markup: &str, pctx: &mut ParseContext| {
            Ok(Parsed::Tag(Box::new(CycleTag::parse(markup, pctx)?)))
        });
        registry.register("include", |_: &str, markup: &str, pctx: &mut ParseContext| {
            Ok(Parsed::Tag(Box::new(IncludeTag::parse(markup, pctx)?)))
        });
        registry
    }

    pub fn register(&mut self, name: &str, factory: impl TagFactory + 'static) {
        log::debug!("Registering tag '{}'", name);
        self.tags.insert(name.to_string(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TagFactory>> {
        self.tags.get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.tags.len()
    }

    /// Sorted tag names
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tags.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Quoted tag markup appended to strict-mode syntax errors
pub(crate) fn markup_context(markup: &str) -> String {
    format!("in \"{}\"", markup.trim())
}

fn no_arguments(name: &str, markup: &str, pctx: &ParseContext) -> Result<()> {
    if markup.trim().is_empty() {
        Ok(())
    } else {
        Err(pctx.syntax_error("errors.syntax.tag_unexpected_args", &[("tag", name)]))
    }
}

static GLOBAL_TAGS: Lazy<RwLock<Arc<TagRegistry>>> =
    Lazy::new(|| RwLock::new(Arc::new(TagRegistry::standard())));

/// Snapshot of the process-wide tag registry
pub fn global_tags() -> Arc<TagRegistry> {
    GLOBAL_TAGS
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Register a tag process-wide; templates parsed afterwards can use it
pub fn register_tag(name: &str, factory: impl TagFactory + 'static) {
    let mut guard = GLOBAL_TAGS.write().unwrap_or_else(|e| e.into_inner());
    let mut next = (**guard).clone();
    next.register(name, factory);
    *guard = Arc::new(next);
}
