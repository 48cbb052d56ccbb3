//! Logical descriptors of dataframe operations.
//!
//! These carry the parameters the optimizer inspects (target columns,
//! requested labels, grouping and join keys) and best-effort output
//! metadata. Lowering them belongs to the dataframe layer.

use std::any::Any;
use std::sync::Arc;

use tessel_core::{Dim, NodeParams, OpKey, OutputType, Shape};

use crate::node::{TileableData, TileableRef};
use crate::operand::Operand;
use crate::optype::{OpType, DATAFRAME_OPERAND};

pub static DATAFRAME_SET_ITEM: OpType = OpType::derived("DataFrameSetItem", &DATAFRAME_OPERAND);
pub static DATAFRAME_INDEX: OpType = OpType::derived("DataFrameIndex", &DATAFRAME_OPERAND);
pub static DATAFRAME_GROUPBY_AGG: OpType =
    OpType::derived("DataFrameGroupByAgg", &DATAFRAME_OPERAND);
pub static DATAFRAME_MERGE: OpType = OpType::derived("DataFrameMerge", &DATAFRAME_OPERAND);

/// One column label or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Labels {
    One(String),
    Many(Vec<String>),
}

impl Labels {
    /// The labels as a slice; a single label is a one-element slice.
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(label) => std::slice::from_ref(label),
            Self::Many(labels) => labels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<&str> for Labels {
    fn from(label: &str) -> Self {
        Self::One(label.to_string())
    }
}

impl From<String> for Labels {
    fn from(label: String) -> Self {
        Self::One(label)
    }
}

impl From<Vec<String>> for Labels {
    fn from(labels: Vec<String>) -> Self {
        Self::Many(labels)
    }
}

impl From<Vec<&str>> for Labels {
    fn from(labels: Vec<&str>) -> Self {
        Self::Many(labels.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Labels {
    fn from(labels: [&str; N]) -> Self {
        Self::Many(labels.iter().map(|l| l.to_string()).collect())
    }
}

/// Table metadata: unknown row count, known columns.
fn frame_params(columns: Vec<String>) -> NodeParams {
    let width = columns.len();
    NodeParams {
        shape: Shape::new(vec![Dim::Unknown, Dim::Known(width)]),
        columns: Some(columns),
        name: None,
    }
}

fn series_params(name: Option<String>) -> NodeParams {
    NodeParams {
        shape: Shape::unknown(1),
        columns: None,
        name,
    }
}

macro_rules! logical_operand {
    ($ty:ident, $op_type:ident) => {
        impl Operand for $ty {
            fn op_type(&self) -> &'static OpType {
                &$op_type
            }

            fn key(&self) -> OpKey {
                self.key
            }

            fn inputs(&self) -> &[TileableRef] {
                &self.inputs
            }

            fn output_types(&self) -> &[OutputType] {
                &self.output_types
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

// ============================================================================
// Column assignment
// ============================================================================

/// `frame[column] = value`.
#[derive(Debug)]
pub struct DataFrameSetItem {
    key: OpKey,
    inputs: Vec<TileableRef>,
    output_types: [OutputType; 1],
    column: String,
}

impl DataFrameSetItem {
    /// Assign `value` (or a scalar, when `None`) to `column` of `frame`.
    pub fn new(
        frame: &TileableRef,
        column: impl Into<String>,
        value: Option<&TileableRef>,
    ) -> TileableRef {
        let column = column.into();
        let mut columns = frame.columns().to_vec();
        if !columns.contains(&column) {
            columns.push(column.clone());
        }
        let mut inputs = vec![frame.clone()];
        inputs.extend(value.cloned());
        let op = Arc::new(Self {
            key: OpKey::generate(),
            inputs,
            output_types: [OutputType::DataFrame],
            column,
        });
        TileableData::new(op, OutputType::DataFrame, 0, frame_params(columns))
    }

    /// Target column label.
    pub fn column(&self) -> &str {
        &self.column
    }
}

logical_operand!(DataFrameSetItem, DATAFRAME_SET_ITEM);

// ============================================================================
// Indexing
// ============================================================================

/// `frame[labels]` or label-based row selection.
#[derive(Debug)]
pub struct DataFrameIndex {
    key: OpKey,
    inputs: Vec<TileableRef>,
    output_types: [OutputType; 1],
    col_names: Option<Labels>,
}

impl DataFrameIndex {
    /// Select columns. A single label yields a series, several a table.
    pub fn columns(frame: &TileableRef, labels: impl Into<Labels>) -> TileableRef {
        let labels = labels.into();
        let (output_type, params) = match &labels {
            Labels::One(label) => (OutputType::Series, series_params(Some(label.clone()))),
            Labels::Many(labels) => (OutputType::DataFrame, frame_params(labels.clone())),
        };
        Self::build(frame, Some(labels), output_type, params)
    }

    /// Select rows, keeping every column of `input`.
    pub fn rows(input: &TileableRef) -> TileableRef {
        let params = NodeParams {
            shape: Shape::new(
                std::iter::once(Dim::Unknown)
                    .chain(input.params().shape.dims().iter().skip(1).copied())
                    .collect(),
            ),
            ..input.params().clone()
        };
        Self::build(input, None, input.output_type(), params)
    }

    fn build(
        input: &TileableRef,
        col_names: Option<Labels>,
        output_type: OutputType,
        params: NodeParams,
    ) -> TileableRef {
        let op = Arc::new(Self {
            key: OpKey::generate(),
            inputs: vec![input.clone()],
            output_types: [output_type],
            col_names,
        });
        TileableData::new(op, output_type, 0, params)
    }

    /// Explicitly requested column labels.
    pub fn col_names(&self) -> Option<&Labels> {
        self.col_names.as_ref()
    }
}

logical_operand!(DataFrameIndex, DATAFRAME_INDEX);

// ============================================================================
// Group-by aggregation
// ============================================================================

/// `input.groupby(by).agg(func)`, keeping the keys as columns.
#[derive(Debug)]
pub struct DataFrameGroupByAgg {
    key: OpKey,
    inputs: Vec<TileableRef>,
    output_types: [OutputType; 1],
    by: Option<Labels>,
    func: String,
}

impl DataFrameGroupByAgg {
    /// Aggregate a table or a series. The result has the input's kind.
    pub fn new(input: &TileableRef, by: Option<Labels>, func: impl Into<String>) -> TileableRef {
        let output_type = match input.output_type() {
            OutputType::Series => OutputType::Series,
            _ => OutputType::DataFrame,
        };
        let params = match output_type {
            OutputType::Series => series_params(input.name().map(str::to_string)),
            _ => frame_params(input.columns().to_vec()),
        };
        let op = Arc::new(Self {
            key: OpKey::generate(),
            inputs: vec![input.clone()],
            output_types: [output_type],
            by,
            func: func.into(),
        });
        TileableData::new(op, output_type, 0, params)
    }

    /// Grouping keys.
    pub fn by(&self) -> Option<&Labels> {
        self.by.as_ref()
    }

    /// Aggregation function name.
    pub fn func(&self) -> &str {
        &self.func
    }
}

logical_operand!(DataFrameGroupByAgg, DATAFRAME_GROUPBY_AGG);

// ============================================================================
// Merge
// ============================================================================

/// `left.merge(right, on=on)`.
#[derive(Debug)]
pub struct DataFrameMerge {
    key: OpKey,
    inputs: Vec<TileableRef>,
    output_types: [OutputType; 1],
    on: Option<Labels>,
}

impl DataFrameMerge {
    /// Join two tables. Join keys appear once in the result.
    pub fn new(left: &TileableRef, right: &TileableRef, on: Option<Labels>) -> TileableRef {
        let mut columns = left.columns().to_vec();
        for column in right.columns() {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        let op = Arc::new(Self {
            key: OpKey::generate(),
            inputs: vec![left.clone(), right.clone()],
            output_types: [OutputType::DataFrame],
            on,
        });
        TileableData::new(op, OutputType::DataFrame, 0, frame_params(columns))
    }

    /// Join keys.
    pub fn on(&self) -> Option<&Labels> {
        self.on.as_ref()
    }
}

logical_operand!(DataFrameMerge, DATAFRAME_MERGE);
