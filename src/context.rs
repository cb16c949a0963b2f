//! Per-render evaluation state
//!
//! A [`Context`] owns the scope stack and the resource counters of one render
//! call. Assigns are borrowed read-only environments and registers are
//! borrowed from the caller, so nothing here outlives the render.

use crate::config::{EngineConfig, ErrorMode, ResourceLimits, TaintMode};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::file_system::{BlankFileSystem, FileSystem};
use crate::i18n::Locale;
use crate::parser::ParseOptions;
use crate::strainer::Strainer;
use crate::tags::{global_tags, TagRegistry};
use crate::value::Value;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

pub type Scope = HashMap<String, Value>;

/// Named slots where tags keep state across visits without touching scopes
#[derive(Default)]
pub struct Registers {
    slots: HashMap<String, Box<dyn Any + Send>>,
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registers")
            .field("slots", &self.slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send>(&mut self, name: &str, value: T) {
        self.slots.insert(name.to_string(), Box::new(value));
    }

    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.slots.get(name).and_then(|slot| slot.downcast_ref())
    }

    /// Mutable slot, created with `T::default()` when missing or of another type
    pub fn get_mut<T: Any + Send + Default>(&mut self, name: &str) -> &mut T {
        let slot = self
            .slots
            .entry(name.to_string())
            .or_insert_with(|| Box::new(T::default()));
        if !slot.is::<T>() {
            *slot = Box::new(T::default());
        }
        slot.downcast_mut::<T>()
            .expect("register slot type checked above")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.slots.remove(name).is_some()
    }
}

/// Counters bounded by [`ResourceLimits`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Characters written
    RenderLength,
    /// Nodes visited
    RenderScore,
    /// Size of assigned values
    AssignScore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub render_length: usize,
    pub render_score: usize,
    pub assign_score: usize,
}

pub struct Context<'a> {
    scopes: Vec<Scope>,
    environments: Vec<&'a Value>,
    registers: &'a mut Registers,
    strainer: Strainer,
    file_system: Arc<dyn FileSystem>,
    tags: Arc<TagRegistry>,
    locale: Arc<Locale>,
    error_mode: ErrorMode,
    taint_mode: TaintMode,
    line_numbers: bool,
    limits: ResourceLimits,
    usage: Cell<ResourceUsage>,
    errors: Vec<Error>,
    warnings: RefCell<Vec<Error>>,
}

impl<'a> Context<'a> {
    /// A context configured from the process-wide defaults
    pub fn new(registers: &'a mut Registers) -> Self {
        let defaults = EngineConfig::current();
        Self {
            scopes: vec![Scope::new()],
            environments: Vec::new(),
            registers,
            strainer: Strainer::default(),
            file_system: Arc::new(BlankFileSystem),
            tags: global_tags(),
            locale: Locale::shared(),
            error_mode: defaults.error_mode,
            taint_mode: defaults.taint_mode,
            line_numbers: defaults.line_numbers,
            limits: defaults.limits,
            usage: Cell::new(ResourceUsage::default()),
            errors: Vec::new(),
            warnings: RefCell::new(Vec::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(registers: &'a mut Registers) -> Self {
        Self::new(registers)
            .with_error_mode(ErrorMode::Lax)
            .with_taint_mode(TaintMode::Off)
    }

    /// Add a read-only environment, consulted after every scope
    pub fn with_environment(mut self, environment: &'a Value) -> Self {
        self.environments.push(environment);
        self
    }

    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    pub fn with_taint_mode(mut self, mode: TaintMode) -> Self {
        self.taint_mode = mode;
        self
    }

    pub fn with_line_numbers(mut self, enabled: bool) -> Self {
        self.line_numbers = enabled;
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_strainer(mut self, strainer: Strainer) -> Self {
        self.strainer = strainer;
        self
    }

    pub fn with_file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = file_system;
        self
    }

    pub fn with_tags(mut self, tags: Arc<TagRegistry>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_locale(mut self, locale: Arc<Locale>) -> Self {
        self.locale = locale;
        self
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    pub fn taint_mode(&self) -> TaintMode {
        self.taint_mode
    }

    pub fn line_numbers(&self) -> bool {
        self.line_numbers
    }

    pub fn file_system(&self) -> Arc<dyn FileSystem> {
        self.file_system.clone()
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Translate a diagnostic message
    pub fn t(&self, key: &str, vars: &[(&str, &str)]) -> String {
        self.locale.translate(key, vars)
    }

    /// Options for parsing partials with this render's settings
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            error_mode: Some(self.error_mode),
            line_numbers: self.line_numbers,
            tags: Some(self.tags.clone()),
            locale: Some(self.locale.clone()),
        }
    }

    // Scopes

    /// Number of frames on the scope stack, at least 1
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self, scope: Scope) -> Result<()> {
        if self.scopes.len() > self.limits.max_depth {
            return Err(Error::standard(self.t("errors.resource.nesting", &[])));
        }
        self.scopes.push(scope);
        Ok(())
    }

    /// Pop the innermost frame; the base frame is never removed
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Run `f` inside a new frame, popping it whatever `f` returns
    pub fn with_scope<R>(
        &mut self,
        scope: Scope,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.push_scope(scope)?;
        let result = f(self);
        self.pop_scope();
        result
    }

    /// Bind in the innermost frame
    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    fn binding_frame(&self, name: &str) -> Option<usize> {
        self.scopes.iter().rposition(|scope| scope.contains_key(name))
    }

    /// Update the nearest existing binding, else bind in the innermost frame
    pub fn assign(&mut self, name: &str, value: Value) {
        let index = self
            .binding_frame(name)
            .unwrap_or(self.scopes.len().saturating_sub(1));
        if let Some(scope) = self.scopes.get_mut(index) {
            scope.insert(name.to_string(), value);
        }
    }

    /// Update the nearest existing binding, else bind in the base frame
    pub fn assign_outer(&mut self, name: &str, value: Value) {
        let index = self.binding_frame(name).unwrap_or(0);
        if let Some(scope) = self.scopes.get_mut(index) {
            scope.insert(name.to_string(), value);
        }
    }

    /// Search scopes innermost first, then the environments
    pub fn find_variable(&self, name: &str) -> Option<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value.clone());
            }
        }
        self.environments
            .iter()
            .find_map(|env| env.as_object().and_then(|map| map.get(name)).cloned())
    }

    /// Resolve a name, yielding nil when it is bound nowhere
    pub fn resolve(&self, name: &str) -> Value {
        self.find_variable(name).unwrap_or(Value::Nil)
    }

    /// Evaluate a variable path such as `forloop.index` or `list[0]`
    pub fn get(&self, markup: &str) -> Result<Value> {
        Expression::parse(markup).evaluate(self)
    }

    // Registers

    pub fn registers(&mut self) -> &mut Registers {
        &mut *self.registers
    }

    pub fn register<T: Any + Send + Default>(&mut self, name: &str) -> &mut T {
        self.registers.get_mut(name)
    }

    // Filters

    /// Apply a filter, applying the unknown-filter policy of the error mode
    pub fn invoke_filter(&self, name: &str, input: Value, args: Vec<Value>) -> Result<Value> {
        let filter = match self.strainer.get(name) {
            Some(filter) => filter,
            None => {
                let err = Error::argument(self.t("errors.argument.undefined_filter", &[("name", name)]));
                return match self.error_mode {
                    ErrorMode::Strict => Err(err),
                    ErrorMode::Warn => {
                        self.warn(err);
                        Ok(input)
                    }
                    ErrorMode::Lax => Ok(input),
                };
            }
        };

        let tainted = input.is_tainted() || args.iter().any(Value::is_tainted);
        let input = input.into_untainted();
        let args: Vec<Value> = args.into_iter().map(Value::into_untainted).collect();

        let result = filter.call(&input, &args, self)?;
        if tainted && !filter.sanitizes() {
            Ok(Value::tainted(result))
        } else {
            Ok(result)
        }
    }

    // Resources

    pub fn usage(&self) -> ResourceUsage {
        self.usage.get()
    }

    /// Charge a counter; crossing its ceiling is fatal
    pub fn increment_resource(&self, resource: Resource, magnitude: usize) -> Result<()> {
        let mut usage = self.usage.get();
        let (current, limit) = match resource {
            Resource::RenderLength => (&mut usage.render_length, self.limits.render_length),
            Resource::RenderScore => (&mut usage.render_score, self.limits.render_score),
            Resource::AssignScore => (&mut usage.assign_score, self.limits.assign_score),
        };
        *current = current.saturating_add(magnitude);
        let exceeded = matches!(limit, Some(limit) if *current > limit);
        self.usage.set(usage);

        if exceeded {
            Err(Error::resource_limit(self.locale.translate("errors.resource.memory", &[])))
        } else {
            Ok(())
        }
    }

    /// Charge the assignment counter by the size of a value
    pub fn charge_assignment(&self, value: &Value) -> Result<()> {
        let magnitude = match value.untainted() {
            Value::Str(s) => s.len(),
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 1,
        };
        self.increment_resource(Resource::AssignScore, magnitude)
    }

    // Diagnostics

    /// Apply the error policy to a failed node
    ///
    /// Returns the inline text to write in place of the node, or the error
    /// itself when the render must stop.
    pub fn handle_error(&mut self, err: Error, line_number: Option<usize>) -> Result<String> {
        let err = if self.line_numbers {
            err.with_line_number(line_number)
        } else {
            err
        };

        if err.is_fatal() || self.error_mode.is_strict() {
            return Err(err);
        }

        log::debug!("Recovered render error: {}", err);
        let text = err.to_string();
        self.errors.push(err);
        Ok(text)
    }

    /// Record a warning
    pub fn warn(&self, warning: Error) {
        log::warn!("{}", warning);
        self.warnings.borrow_mut().push(warning);
    }

    /// Check a value about to be written unescaped
    pub fn check_taint(&self, value: &Value, name: &str) -> Result<()> {
        if !value.is_tainted() {
            return Ok(());
        }
        let message = self.t("errors.taint.unescaped", &[("name", name)]);
        match self.taint_mode {
            TaintMode::Off => Ok(()),
            TaintMode::Warn => {
                self.warn(Error::tainted(message));
                Ok(())
            }
            TaintMode::Error => Err(Error::tainted(format!("Error - {}", message))),
        }
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn warnings(&self) -> Vec<Error> {
        self.warnings.borrow().clone()
    }

    /// Hand over the collected errors and warnings
    pub fn into_diagnostics(self) -> (Vec<Error>, Vec<Error>) {
        (self.errors, self.warnings.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_search_order() {
        let env = Value::from(json!({"a": "env", "b": "env"}));
        let mut registers = Registers::new();
        let mut ctx = Context::for_test(&mut registers).with_environment(&env);

        ctx.set_local("a", Value::from("outer"));
        ctx.push_scope(Scope::new()).unwrap();
        ctx.set_local("a", Value::from("inner"));

        assert_eq!(ctx.resolve("a"), Value::from("inner"));
        assert_eq!(ctx.resolve("b"), Value::from("env"));
        assert_eq!(ctx.resolve("c"), Value::Nil);

        ctx.pop_scope();
        assert_eq!(ctx.resolve("a"), Value::from("outer"));
    }

    #[test]
    fn test_base_frame_survives_pop() {
        let mut registers = Registers::new();
        let mut ctx = Context::for_test(&mut registers);
        ctx.pop_scope();
        ctx.pop_scope();
        assert_eq!(ctx.scope_depth(), 1);
    }

    #[test]
    fn test_with_scope_pops_on_error() {
        let mut registers = Registers::new();
        let mut ctx = Context::for_test(&mut registers);
        let result: Result<()> = ctx.with_scope(Scope::new(), |ctx| {
            assert_eq!(ctx.scope_depth(), 2);
            Err(Error::standard("boom"))
        });
        assert!(result.is_err());
        assert_eq!(ctx.scope_depth(), 1);
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let mut registers = Registers::new();
        let mut ctx = Context::for_test(&mut registers);
        ctx.set_local("x", Value::from(1));
        ctx.push_scope(Scope::new()).unwrap();

        ctx.assign("x", Value::from(2));
        ctx.assign("y", Value::from(3));
        ctx.assign_outer("z", Value::from(4));
        ctx.pop_scope();

        assert_eq!(ctx.resolve("x"), Value::from(2));
        assert_eq!(ctx.resolve("y"), Value::Nil);
        assert_eq!(ctx.resolve("z"), Value::from(4));
    }

    #[test]
    fn test_nesting_limit() {
        let mut registers = Registers::new();
        let mut ctx = Context::for_test(&mut registers).with_limits(ResourceLimits {
            max_depth: 3,
            ..ResourceLimits::default()
        });
        for _ in 0..3 {
            ctx.push_scope(Scope::new()).unwrap();
        }
        let err = ctx.push_scope(Scope::new()).unwrap_err();
        assert_eq!(err.message(), "Nesting too deep");
    }

    #[test]
    fn test_resource_ceiling_is_fatal() {
        let mut registers = Registers::new();
        let mut ctx = Context::for_test(&mut registers).with_limits(ResourceLimits {
            assign_score: Some(5),
            ..ResourceLimits::default()
        });
        ctx.charge_assignment(&Value::from("abc")).unwrap();
        let err = ctx.charge_assignment(&Value::from("abc")).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.message(), "Memory limits exceeded");
        assert_eq!(ctx.usage().assign_score, 6);
    }

    #[test]
    fn test_registers_persist_typed_state() {
        let mut registers = Registers::new();
        {
            let mut ctx = Context::for_test(&mut registers);
            *ctx.register::<usize>("counter") += 2;
            *ctx.register::<usize>("counter") += 1;
        }
        assert_eq!(registers.get::<usize>("counter"), Some(&3));
        assert!(registers.get::<String>("counter").is_none());
    }

    #[test]
    fn test_handle_error_by_mode() {
        let mut registers = Registers::new();
        let mut ctx = Context::for_test(&mut registers).with_line_numbers(true);
        let text = ctx
            .handle_error(Error::standard("standard error"), Some(3))
            .unwrap();
        assert_eq!(text, "Twig error (line 3): standard error");
        assert_eq!(ctx.errors().len(), 1);

        let mut registers = Registers::new();
        let mut strict = Context::for_test(&mut registers).with_error_mode(ErrorMode::Strict);
        assert!(strict.handle_error(Error::argument("bad"), None).is_err());
        assert!(strict.errors().is_empty());
    }

    #[test]
    fn test_taint_policy() {
        let tainted = Value::tainted("<b>");
        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers);
        assert!(ctx.check_taint(&tainted, "x").is_ok());

        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers).with_taint_mode(TaintMode::Warn);
        ctx.check_taint(&tainted, "x").unwrap();
        assert_eq!(
            ctx.warnings()[0].message(),
            "variable 'x' is tainted and was not escaped"
        );

        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers).with_taint_mode(TaintMode::Error);
        let err = ctx.check_taint(&tainted, "x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Twig error: Error - variable 'x' is tainted and was not escaped"
        );
    }

    #[test]
    fn test_get_evaluates_paths() {
        let env = Value::from(json!({"forloop": {"index": 2}, "list": [1, 2]}));
        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers).with_environment(&env);
        assert_eq!(ctx.get("forloop.index").unwrap(), Value::from(2));
        assert_eq!(ctx.get("list[1]").unwrap(), Value::from(2));
        assert_eq!(ctx.get("list.size").unwrap(), Value::from(2));
    }
}
