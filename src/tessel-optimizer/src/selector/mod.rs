//! Per-operand-type column selectors.

mod builtin;
mod registry;
mod utils;

use std::collections::BTreeSet;
use std::sync::Arc;

use tessel_graph::TileableData;

pub use builtin::{
    select_groupby_agg_columns, select_index_columns, select_merge_columns,
    select_setitem_columns,
};
pub use registry::{global_selector_registry, register_selector, SelectorRegistry};
pub use utils::exclude_columns;

/// Columns a node's operand reads from its inputs. An empty set means the
/// selector knows nothing and the caller must assume every column is read.
pub type SelectorFn = Arc<dyn Fn(&TileableData) -> BTreeSet<String> + Send + Sync>;
