//! Built-in operands.
//!
//! [`DataSource`] feeds pre-partitioned values into a graph. The dataframe
//! descriptors carry the parameters column pruning reads; they are lowered
//! by the dataframe layer, not here.

mod dataframe;
mod source;

pub use dataframe::{
    DataFrameGroupByAgg, DataFrameIndex, DataFrameMerge, DataFrameSetItem, Labels,
    DATAFRAME_GROUPBY_AGG, DATAFRAME_INDEX, DATAFRAME_MERGE, DATAFRAME_SET_ITEM,
};
pub use source::{DataSource, DataSourceChunk, DATA_SOURCE_CHUNK};
