//! Best-effort metadata shared by logical nodes and their chunks.

use serde::{Deserialize, Serialize};

use crate::types::Shape;

/// Shape and labelling metadata of a node or chunk.
///
/// Any field may be a placeholder until execution refines it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeParams {
    /// Shape, possibly with unknown axes.
    pub shape: Shape,
    /// Column labels of a tabular node, when known.
    pub columns: Option<Vec<String>>,
    /// Name of a single-column node, when known.
    pub name: Option<String>,
}

impl NodeParams {
    /// Params with the given shape and no labels.
    pub fn with_shape(shape: Shape) -> Self {
        Self {
            shape,
            ..Self::default()
        }
    }

    /// Set the column labels.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the series name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Column labels, or an empty slice when unknown.
    pub fn column_labels(&self) -> &[String] {
        self.columns.as_deref().unwrap_or(&[])
    }
}
