//! Execution context contract supplied by the worker runtime.

use common_error::TesselResult;
use tessel_core::{ChunkIndex, ChunkKey, Value};

use crate::node::TileableData;

/// Key-value store of materialized chunk results.
///
/// Implementations are shared by concurrently executing chunk operands, so
/// both reads and writes go through `&self`.
pub trait ExecutionContext: Send + Sync {
    /// Value stored under `key`; `KeyNotFound` if absent.
    fn get(&self, key: ChunkKey) -> TesselResult<Value>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: ChunkKey, value: Value) -> TesselResult<()>;

    /// Whether a value is stored under `key`.
    fn contains(&self, key: ChunkKey) -> bool;

    /// Every chunk value of a tiled node as `(position-index, value)` pairs,
    /// in position order.
    fn gather(&self, tileable: &TileableData) -> TesselResult<Vec<(ChunkIndex, Value)>> {
        tileable
            .chunk_pairs()
            .into_iter()
            .map(|(index, key)| Ok((index, self.get(key)?)))
            .collect()
    }
}
