//! Selectors for the built-in dataframe operands.

use std::collections::BTreeSet;
use std::sync::Arc;

use tessel_core::OutputType;
use tessel_graph::ops::{
    DataFrameGroupByAgg, DataFrameIndex, DataFrameMerge, DataFrameSetItem, DATAFRAME_GROUPBY_AGG,
    DATAFRAME_INDEX, DATAFRAME_MERGE, DATAFRAME_SET_ITEM,
};
use tessel_graph::{OpType, TileableData};

use super::utils::exclude_columns;
use super::SelectorFn;

pub(crate) fn builtin_selectors() -> Vec<(&'static OpType, SelectorFn)> {
    vec![
        (&DATAFRAME_SET_ITEM, Arc::new(select_setitem_columns) as SelectorFn),
        (&DATAFRAME_INDEX, Arc::new(select_index_columns) as SelectorFn),
        (&DATAFRAME_GROUPBY_AGG, Arc::new(select_groupby_agg_columns) as SelectorFn),
        (&DATAFRAME_MERGE, Arc::new(select_merge_columns) as SelectorFn),
    ]
}

fn name_set(node: &TileableData) -> BTreeSet<String> {
    node.name().map(str::to_string).into_iter().collect()
}

/// `frame[col] = value` reads and marks the target column.
pub fn select_setitem_columns(node: &TileableData) -> BTreeSet<String> {
    node.op()
        .downcast_ref::<DataFrameSetItem>()
        .map(|op| BTreeSet::from([op.column().to_string()]))
        .unwrap_or_default()
}

/// Indexing reads the requested labels, or everything it passes through.
pub fn select_index_columns(node: &TileableData) -> BTreeSet<String> {
    let Some(op) = node.op().downcast_ref::<DataFrameIndex>() else {
        return BTreeSet::new();
    };
    match op.col_names() {
        Some(labels) if !labels.is_empty() => labels.as_slice().iter().cloned().collect(),
        _ => match node.output_type() {
            OutputType::DataFrame => node.columns().iter().cloned().collect(),
            OutputType::Series => name_set(node),
            _ => BTreeSet::new(),
        },
    }
}

/// Group-by aggregation reads every column but the grouping keys.
///
/// A series result reads its own column, returned as a one-element set.
pub fn select_groupby_agg_columns(node: &TileableData) -> BTreeSet<String> {
    let Some(op) = node.op().downcast_ref::<DataFrameGroupByAgg>() else {
        return BTreeSet::new();
    };
    match node.output_type() {
        OutputType::DataFrame => exclude_columns(node.columns(), op.by()),
        OutputType::Series => name_set(node),
        _ => BTreeSet::new(),
    }
}

/// A merge reads every column but the join keys.
pub fn select_merge_columns(node: &TileableData) -> BTreeSet<String> {
    node.op()
        .downcast_ref::<DataFrameMerge>()
        .map(|op| exclude_columns(node.columns(), op.on()))
        .unwrap_or_default()
}
