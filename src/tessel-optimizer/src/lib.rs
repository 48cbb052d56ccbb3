//! Logical optimizer support for tessel.
//!
//! Column pruning asks each node which columns its operand reads from its
//! inputs. The answer comes from a [`SelectorRegistry`] keyed by operand
//! type, with fallback along the type's ancestor chain.

pub mod pruning;
pub mod selector;

pub use pruning::{ColumnRequirement, ColumnRequirements};
pub use selector::{
    exclude_columns, global_selector_registry, register_selector, SelectorFn, SelectorRegistry,
};
