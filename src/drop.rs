//! Capability sandbox for host objects
//!
//! A host type becomes reachable from templates by describing itself with a
//! [`Descriptor`]: a type-name label, an allow-list of members, and optionally
//! a fallback for other names and an iteration hook. [`HostDrop`] pairs an
//! object with its descriptor and is the only thing a template ever touches.
//!
//! ```ignore
//! static PRODUCT: Lazy<Arc<Descriptor<Product>>> = Lazy::new(|| {
//!     Descriptor::new("ProductDrop")
//!         .field("title", |p: &Product| Value::from(p.title.as_str()))
//!         .build()
//! });
//!
//! impl Sandboxed for Product {
//!     fn descriptor() -> Arc<Descriptor<Self>> {
//!         PRODUCT.clone()
//!     }
//! }
//! ```

use crate::context::Context;
use crate::error::Result;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Members that are never reachable, whatever a descriptor declares
///
/// These are the introspection and identity names of the object model
/// templates were first written against (`send`, `object_id`, ...). A Rust host
/// has no such members; the list keeps descriptors and fallbacks from
/// answering them, so templates asking for them render empty.
pub const RESERVED_MEMBERS: &[&str] = &[
    "__id__",
    "__send__",
    "class",
    "class_eval",
    "clone",
    "define_singleton_method",
    "dup",
    "eval",
    "extend",
    "freeze",
    "inspect",
    "instance_eval",
    "instance_exec",
    "instance_variable_get",
    "instance_variable_set",
    "instance_variables",
    "method",
    "methods",
    "object_id",
    "pretty_inspect",
    "private_methods",
    "protected_methods",
    "public_method",
    "public_methods",
    "public_send",
    "respond_to?",
    "send",
    "singleton_class",
    "singleton_methods",
    "taint",
    "tap",
    "to_s",
    "type_id",
    "untaint",
];

/// Conversion hook names that resolve to the drop itself
const SELF_MEMBER: &str = "to_twig";

pub fn is_reserved(name: &str) -> bool {
    RESERVED_MEMBERS.contains(&name)
}

/// The fixed interface every sandboxed object exposes to templates
pub trait DropObject: Send + Sync {
    /// Label rendered when the object is output directly
    fn type_name(&self) -> &str;

    /// Allow-listed member, or `None` when `name` is not on the list
    fn member(&self, name: &str, ctx: &Context<'_>) -> Option<Result<Value>>;

    /// Answer for names outside the allow-list
    fn fallback(&self, _name: &str, _ctx: &Context<'_>) -> Option<Result<Value>> {
        None
    }

    /// Items for `for` loops; `None` when the object is not iterable
    fn iterate(&self, _ctx: &Context<'_>) -> Option<Result<Vec<Value>>> {
        None
    }

    fn to_output(&self) -> String {
        self.type_name().to_string()
    }
}

/// Resolve `key` on a drop
///
/// Empty keys, reserved names and unknown members all resolve to nil; only
/// errors raised by the host code itself propagate.
pub fn invoke(drop: &Arc<dyn DropObject>, key: &str, ctx: &Context<'_>) -> Result<Value> {
    if key.is_empty() {
        return Ok(Value::Nil);
    }
    if is_reserved(key) {
        log::debug!("Refused reserved member '{}' on {}", key, drop.type_name());
        return Ok(Value::Nil);
    }
    if key == SELF_MEMBER {
        return Ok(Value::Drop(drop.clone()));
    }
    if let Some(result) = drop.member(key, ctx) {
        return result;
    }
    if let Some(result) = drop.fallback(key, ctx) {
        return result;
    }
    Ok(Value::Nil)
}

type MemberFn<T> = Arc<dyn Fn(&T, &Context<'_>) -> Result<Value> + Send + Sync>;
type FallbackFn<T> = Arc<dyn Fn(&T, &str, &Context<'_>) -> Result<Value> + Send + Sync>;
type IterateFn<T> = Arc<dyn Fn(&T, &Context<'_>) -> Result<Vec<Value>> + Send + Sync>;

/// Capability descriptor compiled into a lookup table
pub struct Descriptor<T> {
    type_name: String,
    members: HashMap<String, MemberFn<T>>,
    fallback: Option<FallbackFn<T>>,
    iterate: Option<IterateFn<T>>,
}

impl<T: 'static> fmt::Debug for Descriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("type_name", &self.type_name)
            .field("members", &self.member_names())
            .field("fallback", &self.fallback.is_some())
            .field("iterate", &self.iterate.is_some())
            .finish()
    }
}

impl<T: 'static> Descriptor<T> {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: HashMap::new(),
            fallback: None,
            iterate: None,
        }
    }

    /// Allow a member computed with access to the render context
    pub fn member<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T, &Context<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        if is_reserved(name) || name == SELF_MEMBER {
            log::warn!(
                "Ignoring reserved member '{}' declared on {}",
                name,
                self.type_name
            );
            return self;
        }
        self.members.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Allow a plain infallible member
    pub fn field<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.member(name, move |object, _| Ok(f(object)))
    }

    /// Handle names that are not on the allow-list
    pub fn fallback<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &str, &Context<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(f));
        self
    }

    pub fn iterate<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &Context<'_>) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        self.iterate = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn allows(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn member_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.members.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A host object bound to its descriptor
pub struct HostDrop<T> {
    object: T,
    descriptor: Arc<Descriptor<T>>,
}

impl<T> HostDrop<T> {
    pub fn new(object: T, descriptor: Arc<Descriptor<T>>) -> Self {
        Self { object, descriptor }
    }

    pub fn object(&self) -> &T {
        &self.object
    }
}

impl<T: Send + Sync + 'static> DropObject for HostDrop<T> {
    fn type_name(&self) -> &str {
        &self.descriptor.type_name
    }

    fn member(&self, name: &str, ctx: &Context<'_>) -> Option<Result<Value>> {
        self.descriptor
            .members
            .get(name)
            .map(|member| member(&self.object, ctx))
    }

    fn fallback(&self, name: &str, ctx: &Context<'_>) -> Option<Result<Value>> {
        self.descriptor
            .fallback
            .as_ref()
            .map(|fallback| fallback(&self.object, name, ctx))
    }

    fn iterate(&self, ctx: &Context<'_>) -> Option<Result<Vec<Value>>> {
        self.descriptor
            .iterate
            .as_ref()
            .map(|iterate| iterate(&self.object, ctx))
    }
}

/// Host types that declare a capability descriptor
pub trait Sandboxed: Send + Sync + Sized + 'static {
    fn descriptor() -> Arc<Descriptor<Self>>;
}

impl Value {
    /// Expose a host object to templates through its descriptor
    pub fn host<T: Sandboxed>(object: T) -> Value {
        Value::Drop(Arc::new(HostDrop::new(object, T::descriptor())))
    }

    pub fn from_drop(drop: impl DropObject + 'static) -> Value {
        Value::Drop(Arc::new(drop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Registers;
    use once_cell::sync::Lazy;

    struct Product {
        title: String,
    }

    static PRODUCT: Lazy<Arc<Descriptor<Product>>> = Lazy::new(|| {
        Descriptor::new("ProductDrop")
            .field("title", |p: &Product| Value::from(p.title.as_str()))
            .field("inspect", |_| Value::from("leaked"))
            .fallback(|_, name, _| Ok(Value::from(format!("method: {}", name))))
            .build()
    });

    impl Sandboxed for Product {
        fn descriptor() -> Arc<Descriptor<Self>> {
            PRODUCT.clone()
        }
    }

    fn product() -> Arc<dyn DropObject> {
        match Value::host(Product {
            title: "Shoe".to_string(),
        }) {
            Value::Drop(drop) => drop,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_allow_listed_member() {
        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers);
        assert_eq!(invoke(&product(), "title", &ctx).unwrap(), Value::from("Shoe"));
    }

    #[test]
    fn test_fallback_for_unknown_names() {
        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers);
        assert_eq!(
            invoke(&product(), "unknown", &ctx).unwrap(),
            Value::from("method: unknown")
        );
    }

    #[test]
    fn test_reserved_names_never_reach_the_host() {
        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers);
        let drop = product();
        for name in ["inspect", "object_id", "send", "class", "instance_variables"] {
            assert_eq!(invoke(&drop, name, &ctx).unwrap(), Value::Nil, "{}", name);
        }
        assert!(!PRODUCT.allows("inspect"));
    }

    #[test]
    fn test_empty_key_is_nil() {
        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers);
        assert_eq!(invoke(&product(), "", &ctx).unwrap(), Value::Nil);
    }

    #[test]
    fn test_self_member_and_label() {
        let mut registers = Registers::new();
        let ctx = Context::for_test(&mut registers);
        let drop = product();
        let same = invoke(&drop, "to_twig", &ctx).unwrap();
        assert_eq!(same, Value::Drop(drop.clone()));
        assert_eq!(drop.to_output(), "ProductDrop");
    }
}
