//! Twig - a safe, non-evaluating template language
//!
//! Templates are parsed once into an immutable tree and rendered many times
//! against caller-supplied data. Template authors can only reach data that
//! was explicitly exposed:
//! - host objects through allow-listed [`drop::Descriptor`]s
//! - filters through the registered [`strainer::FilterRegistry`]
//! - partials through the configured [`file_system::FileSystem`]
//!
//! ```
//! use twig::prelude::*;
//!
//! let template = Template::parse("Hello {{ name | upcase }}!").unwrap();
//! let output = template.render(&Value::from(json!({"name": "world"}))).unwrap();
//! assert_eq!(output, "Hello WORLD!");
//! ```

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod ast;
pub mod condition;
pub mod config;
pub mod context;
pub mod drop;
pub mod error;
pub mod expression;
pub mod file_system;
pub mod filters;
pub mod grammar;
pub mod i18n;
pub mod lexer;
pub mod parser;
pub mod renderer;
pub mod security;
pub mod strainer;
pub mod tags;
pub mod template;
pub mod value;
pub mod variable;

// Re-export main types for public API
pub use config::{EngineConfig, ErrorMode, ResourceLimits, TaintMode};
pub use context::{Context, Registers};
pub use drop::{Descriptor, DropObject, Sandboxed};
pub use error::{Error, Result};
pub use file_system::{BlankFileSystem, FileSystem, LocalFileSystem, MemoryFileSystem};
pub use i18n::Locale;
pub use parser::ParseOptions;
pub use strainer::{register_filter, register_filters, Filter, FilterRegistry};
pub use tags::{register_tag, TagRegistry};
pub use template::{RenderOptions, Rendered, Template};
pub use value::Value;

pub mod prelude {
    pub use crate::*;
    pub use serde_json::json;

    // Extension points for custom tags
    pub use crate::ast::Section;
    pub use crate::parser::ParseContext;
    pub use crate::renderer::{render_nodes, Flow};
    pub use crate::tags::{Blankness, BlockTag, BodyMode, Parsed, Tag, TagFactory};
}
