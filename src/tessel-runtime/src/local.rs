//! Single-process tile-and-execute entry point.

use std::sync::Arc;

use common_config::TesselConfig;
use common_error::{TesselError, TesselResult};
use log::debug;
use tessel_core::{coerce_to_output_type, merge_chunks, Value};
use tessel_graph::{ChunkRef, ExecutionContext, TileableData, TileableGraph, TileableRef};

use crate::context::InMemoryContext;
use crate::driver::TileDriver;
use crate::executor::{ChunkExecutor, LocalExecutor};

/// Tiles logical nodes, executes their chunks and fetches their values, all
/// within this process.
#[derive(Debug)]
pub struct LocalRuntime {
    context: Arc<InMemoryContext>,
    executor: LocalExecutor,
    driver: TileDriver,
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new(TesselConfig::default())
    }
}

impl LocalRuntime {
    pub fn new(config: TesselConfig) -> Self {
        let context = Arc::new(InMemoryContext::new());
        let executor = LocalExecutor::new(context.clone(), config.execution);
        Self {
            context,
            executor,
            driver: TileDriver::new(config.tiling),
        }
    }

    /// The execution context holding chunk values.
    pub fn context(&self) -> &Arc<InMemoryContext> {
        &self.context
    }

    pub fn executor(&self) -> &LocalExecutor {
        &self.executor
    }

    /// Tiled copies of `nodes`, in order.
    pub async fn tile(&self, nodes: &[TileableRef]) -> TesselResult<Vec<TileableRef>> {
        let graph = TileableGraph::from_results(nodes);
        let tiled = self.driver.tile(&graph, &self.executor).await?.into_tiled();
        nodes
            .iter()
            .map(|node| {
                tiled
                    .get(&node.key())
                    .cloned()
                    .ok_or_else(|| TesselError::graph(format!("{} was not tiled", node.key())))
            })
            .collect()
    }

    /// Tile and execute `nodes` together, returning each node's value in
    /// order.
    pub async fn execute(&self, nodes: &[TileableRef]) -> TesselResult<Vec<Value>> {
        let tiled = self.tile(nodes).await?;
        let chunks: Vec<ChunkRef> = tiled
            .iter()
            .flat_map(|t| t.chunks().iter().cloned())
            .collect();
        self.executor.execute_chunks(&chunks).await?;
        debug!("Executed {} nodes ({} chunks)", nodes.len(), chunks.len());
        tiled.iter().map(|t| self.fetch(t)).collect()
    }

    /// Tile and execute a single node.
    pub async fn execute_one(&self, node: &TileableRef) -> TesselResult<Value> {
        let mut values = self.execute(std::slice::from_ref(node)).await?;
        values
            .pop()
            .ok_or_else(|| TesselError::internal("execution returned no value"))
    }

    /// [`LocalRuntime::execute`] from synchronous code.
    pub fn execute_blocking(&self, nodes: &[TileableRef]) -> TesselResult<Vec<Value>> {
        common_runtime::block_on(self.execute(nodes))?
    }

    /// Value of an executed tiled node; several chunks are merged by
    /// position.
    pub fn fetch(&self, tiled: &TileableData) -> TesselResult<Value> {
        match tiled.chunks() {
            [] => Err(TesselError::value_error(format!(
                "{} has no chunks to fetch",
                tiled.key()
            ))),
            [chunk] => self.context.get(chunk.key()),
            _ => {
                let merged = merge_chunks(self.context.gather(tiled)?)?;
                coerce_to_output_type(merged, tiled.output_type())
            }
        }
    }
}
