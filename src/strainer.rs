//! Filter registry and per-render filter resolution
//!
//! Filters are named callables receiving the piped input, the positional
//! arguments (plus a trailing object when keyword arguments were given) and
//! the render context. A [`Strainer`] layers per-render registries over the
//! process-wide one.

use crate::context::Context;
use crate::error::Result;
use crate::filters;
use crate::value::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type FilterResult = Result<Value>;

/// Trait for template filters
pub trait Filter: Send + Sync {
    fn call(&self, input: &Value, args: &[Value], ctx: &Context<'_>) -> FilterResult;

    /// Get the filter's name (for debugging)
    fn name(&self) -> &str {
        "unnamed"
    }

    /// Sanitizing filters clear the taint of their input
    fn sanitizes(&self) -> bool {
        false
    }
}

/// Function-based filter implementation
struct FunctionFilter<F>
where
    F: Fn(&Value, &[Value], &Context<'_>) -> FilterResult + Send + Sync,
{
    func: F,
    name: String,
    sanitizes: bool,
}

impl<F> Filter for FunctionFilter<F>
where
    F: Fn(&Value, &[Value], &Context<'_>) -> FilterResult + Send + Sync,
{
    fn call(&self, input: &Value, args: &[Value], ctx: &Context<'_>) -> FilterResult {
        (self.func)(input, args, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn sanitizes(&self) -> bool {
        self.sanitizes
    }
}

/// Registry for template filters
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
}

// Manual Debug implementation since Arc<dyn Filter> doesn't implement Debug
impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filter_count", &self.filters.len())
            .field("filter_names", &self.list())
            .finish()
    }
}

impl FilterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the standard filter library
    pub fn standard() -> Self {
        let mut registry = Self::new();
        filters::register_standard(&mut registry);
        registry
    }

    /// Register a filter
    pub fn register(&mut self, name: &str, filter: impl Filter + 'static) {
        log::debug!("Registering template filter: {}", name);
        self.filters.insert(name.to_string(), Arc::new(filter));
    }

    /// Register a function as a filter
    pub fn register_fn<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&Value, &[Value], &Context<'_>) -> FilterResult + Send + Sync + 'static,
    {
        self.register(
            name,
            FunctionFilter {
                func,
                name: name.to_string(),
                sanitizes: false,
            },
        );
    }

    /// Register a function whose output is safe to write unescaped
    pub fn register_sanitizer<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&Value, &[Value], &Context<'_>) -> FilterResult + Send + Sync + 'static,
    {
        self.register(
            name,
            FunctionFilter {
                func,
                name: name.to_string(),
                sanitizes: true,
            },
        );
    }

    /// Copy every filter of `other` into this registry, replacing same names
    pub fn extend(&mut self, other: &FilterRegistry) {
        for (name, filter) in &other.filters {
            log::debug!("Registering template filter: {}", name);
            self.filters.insert(name.clone(), filter.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.filters.len()
    }

    /// Sorted filter names
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.filters.keys().cloned().collect();
        names.sort();
        names
    }
}

static GLOBAL_FILTERS: Lazy<RwLock<Arc<FilterRegistry>>> =
    Lazy::new(|| RwLock::new(Arc::new(FilterRegistry::standard())));

/// Snapshot of the process-wide filter registry
pub fn global_filters() -> Arc<FilterRegistry> {
    GLOBAL_FILTERS
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Add a filter to the process-wide registry
///
/// Renders already running keep the snapshot they started with.
pub fn register_filter(name: &str, filter: impl Filter + 'static) {
    let mut guard = GLOBAL_FILTERS.write().unwrap_or_else(|e| e.into_inner());
    let mut next = (**guard).clone();
    next.register(name, filter);
    *guard = Arc::new(next);
}

/// Add every filter of a set to the process-wide registry
pub fn register_filters(set: &FilterRegistry) {
    let mut guard = GLOBAL_FILTERS.write().unwrap_or_else(|e| e.into_inner());
    let mut next = (**guard).clone();
    next.extend(set);
    *guard = Arc::new(next);
}

/// Filter resolution for one render: later layers shadow earlier ones
#[derive(Debug, Clone)]
pub struct Strainer {
    layers: Vec<Arc<FilterRegistry>>,
}

impl Strainer {
    pub fn new(base: Arc<FilterRegistry>) -> Self {
        Self { layers: vec![base] }
    }

    pub fn with_layer(mut self, registry: Arc<FilterRegistry>) -> Self {
        self.layers.push(registry);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.layers.iter().rev().find_map(|layer| layer.get(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl Default for Strainer {
    fn default() -> Self {
        Self::new(global_filters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = FilterRegistry::new();
        registry.register_fn("shout", |input, _, _| {
            Ok(Value::from(format!("{}!", input.to_output())))
        });

        assert!(registry.exists("shout"));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get("shout").unwrap().name(), "shout");
        assert!(!registry.get("shout").unwrap().sanitizes());
        assert!(registry.get("whisper").is_none());
    }

    #[test]
    fn test_standard_registry() {
        let registry = FilterRegistry::standard();
        for name in ["upcase", "escape", "h", "split", "join", "map", "date"] {
            assert!(registry.exists(name), "missing {}", name);
        }
        assert!(registry.get("escape").unwrap().sanitizes());
    }

    #[test]
    fn test_strainer_layers_shadow_base() {
        let mut extra = FilterRegistry::new();
        extra.register_fn("upcase", |_, _, _| Ok(Value::from("shadowed")));

        let strainer =
            Strainer::new(Arc::new(FilterRegistry::standard())).with_layer(Arc::new(extra));
        assert!(strainer.exists("downcase"));
        assert!(!strainer.exists("bogus"));

        let mut registers = crate::context::Registers::new();
        let ctx = Context::for_test(&mut registers);
        let filter = strainer.get("upcase").unwrap();
        assert_eq!(
            filter.call(&Value::from("x"), &[], &ctx).unwrap(),
            Value::from("shadowed")
        );
    }

    #[test]
    fn test_register_filters_is_additive() {
        let mut set = FilterRegistry::new();
        set.register_fn("strainer_test_twice", |input, _, _| {
            Ok(Value::from(input.to_output().repeat(2)))
        });
        register_filters(&set);

        let global = global_filters();
        assert!(global.exists("strainer_test_twice"));
        assert!(global.exists("upcase"));
    }
}
