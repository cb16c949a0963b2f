//! Parse once, render many
//!
//! A [`Template`] owns its parsed tree, which never changes after parsing.
//! Every render builds a fresh [`Context`], so one template can be shared
//! between threads and rendered concurrently.

use crate::ast::Document;
use crate::config::{EngineConfig, ErrorMode, ResourceLimits, TaintMode};
use crate::context::{Context, Registers};
use crate::error::{Error, Result};
use crate::file_system::{BlankFileSystem, FileSystem, LocalFileSystem};
use crate::i18n::Locale;
use crate::parser::{self, ParseOptions};
use crate::renderer::render_nodes;
use crate::strainer::{global_filters, FilterRegistry, Strainer};
use crate::tags::{global_tags, TagRegistry};
use crate::value::Value;
use std::sync::{Arc, Mutex};

/// Per-call render settings
#[derive(Default)]
pub struct RenderOptions<'r> {
    /// Caller-owned registers, kept after the render
    pub registers: Option<&'r mut Registers>,
    /// Filters layered over the process-wide set for this render only
    pub filters: Option<Arc<FilterRegistry>>,
    /// Extra read-only environments consulted after the assigns
    pub environments: Vec<&'r Value>,
}

impl<'r> RenderOptions<'r> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registers(mut self, registers: &'r mut Registers) -> Self {
        self.registers = Some(registers);
        self
    }

    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = Some(Arc::new(filters));
        self
    }

    pub fn with_environment(mut self, environment: &'r Value) -> Self {
        self.environments.push(environment);
        self
    }
}

/// Output of one render with the diagnostics it collected
#[derive(Debug)]
pub struct Rendered {
    pub output: String,
    pub errors: Vec<Error>,
    pub warnings: Vec<Error>,
}

pub struct Template {
    document: Document,
    warnings: Vec<Error>,
    error_mode: ErrorMode,
    taint_mode: TaintMode,
    line_numbers: bool,
    limits: ResourceLimits,
    file_system: Arc<dyn FileSystem>,
    tags: Arc<TagRegistry>,
    locale: Arc<Locale>,
    last_errors: Mutex<Vec<Error>>,
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("document", &self.document)
            .field("error_mode", &self.error_mode)
            .field("taint_mode", &self.taint_mode)
            .field("line_numbers", &self.line_numbers)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Template {
    /// Parse with the process-wide defaults
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_with(source, &ParseOptions::default())
    }

    pub fn parse_with(source: &str, options: &ParseOptions) -> Result<Self> {
        let defaults = EngineConfig::current();
        let error_mode = options.error_mode.unwrap_or(defaults.error_mode);
        let tags = options.tags.clone().unwrap_or_else(global_tags);
        let locale = options.locale.clone().unwrap_or_else(Locale::shared);

        let options = ParseOptions {
            error_mode: Some(error_mode),
            line_numbers: options.line_numbers,
            tags: Some(tags.clone()),
            locale: Some(locale.clone()),
        };

        log::debug!(
            "Parsing template ({} bytes, error_mode={})",
            source.len(),
            error_mode
        );
        let (document, warnings) = parser::parse(source, &options)?;
        log::debug!(
            "Parsed template: {} top-level nodes, {} warnings",
            document.nodes.len(),
            warnings.len()
        );

        let file_system: Arc<dyn FileSystem> =
            match LocalFileSystem::from_config(&defaults.templates) {
                Some(local) => Arc::new(local),
                None => Arc::new(BlankFileSystem),
            };

        Ok(Self {
            document,
            warnings,
            error_mode,
            taint_mode: defaults.taint_mode,
            line_numbers: options.line_numbers,
            limits: defaults.limits,
            file_system,
            tags,
            locale,
            last_errors: Mutex::new(Vec::new()),
        })
    }

    pub fn root(&self) -> &Document {
        &self.document
    }

    /// Problems recovered while parsing in `warn` mode
    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    /// Errors recorded by the most recent render to finish
    ///
    /// A template shared between threads keeps one such list; concurrent
    /// renders should read [`Rendered::errors`] from [`Template::render_with`]
    /// instead, which always belong to that render.
    pub fn errors(&self) -> Vec<Error> {
        self.last_errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    pub fn set_error_mode(&mut self, mode: ErrorMode) {
        self.error_mode = mode;
    }

    pub fn taint_mode(&self) -> TaintMode {
        self.taint_mode
    }

    pub fn set_taint_mode(&mut self, mode: TaintMode) {
        self.taint_mode = mode;
    }

    pub fn set_resource_limits(&mut self, limits: ResourceLimits) {
        self.limits = limits;
    }

    pub fn set_file_system(&mut self, file_system: impl FileSystem + 'static) {
        self.file_system = Arc::new(file_system);
    }

    pub fn set_shared_file_system(&mut self, file_system: Arc<dyn FileSystem>) {
        self.file_system = file_system;
    }

    /// Render against `assigns`, recovering from non-fatal errors
    pub fn render(&self, assigns: &Value) -> Result<String> {
        self.render_with(assigns, RenderOptions::default())
            .map(|rendered| rendered.output)
    }

    /// Render and fail with the first recorded error, if any
    pub fn render_strict(&self, assigns: &Value) -> Result<String> {
        let rendered = self.render_with(assigns, RenderOptions::default())?;
        match rendered.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(rendered.output),
        }
    }

    pub fn render_with(&self, assigns: &Value, options: RenderOptions<'_>) -> Result<Rendered> {
        if !matches!(assigns.untainted(), Value::Object(_) | Value::Nil) {
            let type_name = assigns.type_name();
            return Err(Error::argument(
                self.locale
                    .translate("errors.argument.assigns", &[("type", &type_name)]),
            ));
        }

        let RenderOptions {
            registers,
            filters,
            environments,
        } = options;

        let mut local_registers = Registers::new();
        let registers = registers.unwrap_or(&mut local_registers);

        let mut strainer = Strainer::new(global_filters());
        if let Some(filters) = filters {
            strainer = strainer.with_layer(filters);
        }

        let mut ctx = Context::new(registers)
            .with_error_mode(self.error_mode)
            .with_taint_mode(self.taint_mode)
            .with_line_numbers(self.line_numbers)
            .with_limits(self.limits.clone())
            .with_strainer(strainer)
            .with_file_system(self.file_system.clone())
            .with_tags(self.tags.clone())
            .with_locale(self.locale.clone())
            .with_environment(assigns);
        for environment in environments {
            ctx = ctx.with_environment(environment);
        }

        let mut output = String::new();
        let result = render_nodes(&self.document.nodes, &mut ctx, &mut output);
        let usage = ctx.usage();
        let (errors, warnings) = ctx.into_diagnostics();

        *self.last_errors.lock().unwrap_or_else(|e| e.into_inner()) = errors.clone();

        if let Err(err) = result {
            log::debug!("Render aborted: {}", err);
            return Err(err);
        }

        log::debug!(
            "Rendered template: {} bytes, score {}, {} errors",
            output.len(),
            usage.render_score,
            errors.len()
        );
        Ok(Rendered {
            output,
            errors,
            warnings,
        })
    }
}
