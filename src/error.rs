//! Error types for parsing and rendering
//!
//! Every recoverable error carries a [`Diagnostic`]: the message, the line of
//! the offending fragment (when line numbers are enabled) and the markup it
//! came from. Errors render the way they appear inline in template output,
//! e.g. `Twig syntax error (line 3): Unknown tag 'foo'`.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Message plus optional source location of an error
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line_number: Option<usize>,
    pub markup_context: Option<String>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line_number: None,
            markup_context: None,
        }
    }

    /// Message followed by the markup context, without line or kind prefix
    pub fn text(&self) -> String {
        match &self.markup_context {
            Some(context) => format!("{} {}", self.message, context),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line_number {
            write!(f, " (line {})", line)?;
        }
        write!(f, ": {}", self.text())
    }
}

/// Main error type for the template engine
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Twig syntax error{0}")]
    Syntax(Diagnostic),

    #[error("Twig error{0}")]
    Argument(Diagnostic),

    #[error("Twig error{0}")]
    Standard(Diagnostic),

    #[error("Twig error{0}")]
    FileSystem(Diagnostic),

    #[error("Twig error{0}")]
    ResourceLimit(Diagnostic),

    #[error("Twig error{0}")]
    Tainted(Diagnostic),

    // Failure raised by host code reached through a drop or filter
    #[error("Twig error{diagnostic}")]
    Host {
        diagnostic: Diagnostic,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    // Non-recoverable condition; never collected, never rendered inline
    #[error("{0}")]
    Interrupt(String),
}

impl Error {
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(Diagnostic::new(msg))
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(Diagnostic::new(msg))
    }

    pub fn standard(msg: impl Into<String>) -> Self {
        Self::Standard(Diagnostic::new(msg))
    }

    pub fn file_system(msg: impl Into<String>) -> Self {
        Self::FileSystem(Diagnostic::new(msg))
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(Diagnostic::new(msg))
    }

    pub fn tainted(msg: impl Into<String>) -> Self {
        Self::Tainted(Diagnostic::new(msg))
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn interrupt(msg: impl Into<String>) -> Self {
        Self::Interrupt(msg.into())
    }

    /// Wrap an error produced by host code
    pub fn host<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Host {
            diagnostic: Diagnostic::new(source.to_string()),
            source: Arc::new(source),
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Syntax(d)
            | Self::Argument(d)
            | Self::Standard(d)
            | Self::FileSystem(d)
            | Self::ResourceLimit(d)
            | Self::Tainted(d) => Some(d),
            Self::Host { diagnostic, .. } => Some(diagnostic),
            Self::Config(_) | Self::Interrupt(_) => None,
        }
    }

    fn diagnostic_mut(&mut self) -> Option<&mut Diagnostic> {
        match self {
            Self::Syntax(d)
            | Self::Argument(d)
            | Self::Standard(d)
            | Self::FileSystem(d)
            | Self::ResourceLimit(d)
            | Self::Tainted(d) => Some(d),
            Self::Host { diagnostic, .. } => Some(diagnostic),
            Self::Config(_) | Self::Interrupt(_) => None,
        }
    }

    /// Attach a line number unless one is already recorded
    pub fn with_line_number(mut self, line: Option<usize>) -> Self {
        if let (Some(line), Some(d)) = (line, self.diagnostic_mut()) {
            if d.line_number.is_none() {
                d.line_number = Some(line);
            }
        }
        self
    }

    /// Attach the markup the error was raised for, e.g. `in "{{ x | }}"`
    pub fn with_markup_context(mut self, context: impl Into<String>) -> Self {
        if let Some(d) = self.diagnostic_mut() {
            if d.markup_context.is_none() {
                d.markup_context = Some(context.into());
            }
        }
        self
    }

    pub fn line_number(&self) -> Option<usize> {
        self.diagnostic().and_then(|d| d.line_number)
    }

    pub fn message(&self) -> String {
        match self {
            Self::Config(msg) | Self::Interrupt(msg) => msg.clone(),
            _ => self
                .diagnostic()
                .map(|d| d.message.clone())
                .unwrap_or_default(),
        }
    }

    /// Message and markup context without the `Twig error:` prefix
    pub fn message_without_prefix(&self) -> String {
        match self.diagnostic() {
            Some(d) => d.text(),
            None => self.message(),
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupt(_))
    }

    /// Fatal errors abort the render in every error mode
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ResourceLimit(_) | Self::Tainted(_) | Self::Interrupt(_)
        )
    }

    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "E_SYNTAX",
            Self::Argument(_) => "E_ARGUMENT",
            Self::Standard(_) => "E_STANDARD",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::Tainted(_) => "E_TAINTED",
            Self::Host { .. } => "E_HOST",
            Self::Config(_) => "E_CONFIG",
            Self::Interrupt(_) => "E_INTERRUPT",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::host(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::host(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_line_number() {
        let err = Error::syntax("Unknown tag 'foo'");
        assert_eq!(err.to_string(), "Twig syntax error: Unknown tag 'foo'");

        let err = Error::argument("Unknown operator =!");
        assert_eq!(err.to_string(), "Twig error: Unknown operator =!");
    }

    #[test]
    fn test_display_with_line_number_and_context() {
        let err = Error::syntax("Unexpected character =")
            .with_markup_context("in \"1 =! 2\"")
            .with_line_number(Some(7));
        assert_eq!(
            err.to_string(),
            "Twig syntax error (line 7): Unexpected character = in \"1 =! 2\""
        );
        assert_eq!(
            err.message_without_prefix(),
            "Unexpected character = in \"1 =! 2\""
        );
    }

    #[test]
    fn test_first_line_number_wins() {
        let err = Error::standard("standard error")
            .with_line_number(Some(3))
            .with_line_number(Some(9));
        assert_eq!(err.line_number(), Some(3));
        assert_eq!(err.to_string(), "Twig error (line 3): standard error");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::resource_limit("Memory limits exceeded").is_fatal());
        assert!(Error::tainted("tainted").is_fatal());
        assert!(Error::interrupt("out of memory").is_fatal());
        assert!(!Error::argument("bad").is_fatal());
        assert!(!Error::syntax("bad").is_fatal());
        assert_eq!(Error::file_system("x").error_code(), "E_FILE_SYSTEM");
    }

    #[test]
    fn test_host_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = Error::from(io);
        assert_eq!(err.to_string(), "Twig error: disk on fire");
        assert!(std::error::Error::source(&err).is_some());
    }
}
