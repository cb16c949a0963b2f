//! The standard filter library
//!
//! Every filter is a plain function over [`Value`]s registered by name into
//! a [`FilterRegistry`]. Missing arguments fall back to the documented
//! defaults rather than failing.

mod array;
mod date;
mod encoding;
mod math;
mod string;

use crate::strainer::FilterRegistry;
use crate::value::Value;

/// Register the standard filters
pub fn register_standard(registry: &mut FilterRegistry) {
    string::register(registry);
    array::register(registry);
    math::register(registry);
    encoding::register(registry);
    date::register(registry);
}

pub(crate) fn arg(args: &[Value], index: usize) -> Option<&Value> {
    args.get(index).filter(|value| !value.is_nil())
}

/// Positional argument as text, `default` when absent
pub(crate) fn arg_str(args: &[Value], index: usize, default: &str) -> String {
    arg(args, index).map_or_else(|| default.to_string(), Value::to_output)
}
