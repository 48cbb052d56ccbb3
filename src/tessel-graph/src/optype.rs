//! Operand type identities with explicit ancestor chains.
//!
//! Every operand type is described by a `'static` [`OpType`] naming its
//! parent, so lookups that fall back to a more general type walk a chain
//! fixed at definition time rather than relying on any runtime reflection.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of an operand type.
///
/// Identity is the address of the `static` defining the type, so two
/// definitions never alias even when they share a name.
pub struct OpType {
    name: &'static str,
    parent: Option<&'static OpType>,
}

impl OpType {
    /// Define a root type.
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// Define a type derived from `parent`.
    pub const fn derived(name: &'static str, parent: &'static OpType) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// Type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Direct parent, if any.
    pub fn parent(&self) -> Option<&'static OpType> {
        self.parent
    }

    /// Strict ancestors, most specific first.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors { next: self.parent }
    }
}

impl PartialEq for OpType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for OpType {}

impl Hash for OpType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl fmt::Debug for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpType({})", self.name)
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over an [`OpType`]'s ancestors.
pub struct Ancestors {
    next: Option<&'static OpType>,
}

impl Iterator for Ancestors {
    type Item = &'static OpType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

/// Root of every operand type.
pub static OPERAND: OpType = OpType::root("Operand");

/// Operands producing tables, columns or indexes.
pub static DATAFRAME_OPERAND: OpType = OpType::derived("DataFrameOperand", &OPERAND);

/// Operands whose values are supplied up front.
pub static DATA_SOURCE: OpType = OpType::derived("DataSource", &OPERAND);
