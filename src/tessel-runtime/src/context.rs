//! In-memory execution context.

use std::collections::HashMap;
use std::sync::RwLock;

use common_error::{TesselError, TesselResult};
use tessel_core::{ChunkKey, Value};
use tessel_graph::ExecutionContext;

/// Chunk values held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryContext {
    values: RwLock<HashMap<ChunkKey, Value>>,
}

fn poisoned<T>(_: T) -> TesselError {
    TesselError::internal("execution context lock poisoned")
}

impl InMemoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the value under `key`.
    pub fn remove(&self, key: ChunkKey) -> TesselResult<Option<Value>> {
        Ok(self.values.write().map_err(poisoned)?.remove(&key))
    }
}

impl ExecutionContext for InMemoryContext {
    fn get(&self, key: ChunkKey) -> TesselResult<Value> {
        self.values
            .read()
            .map_err(poisoned)?
            .get(&key)
            .cloned()
            .ok_or_else(|| TesselError::key_not_found(key))
    }

    fn set(&self, key: ChunkKey, value: Value) -> TesselResult<()> {
        self.values.write().map_err(poisoned)?.insert(key, value);
        Ok(())
    }

    fn contains(&self, key: ChunkKey) -> bool {
        self.values
            .read()
            .map(|v| v.contains_key(&key))
            .unwrap_or(false)
    }
}
