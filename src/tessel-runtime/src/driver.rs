//! The tiling loop.

use common_config::TilingConfig;
use common_error::{TesselError, TesselResult};
use log::debug;
use tessel_graph::{ChunkRef, TileContext, TileStep, TileableGraph};

use crate::executor::ChunkExecutor;

/// Tiles a logical graph operand by operand, in topological order.
///
/// When a tiling task suspends, the driver executes the chunks of the
/// inputs it named, marks them executed, and resumes it. Only one task is
/// in flight at a time.
#[derive(Debug, Clone, Default)]
pub struct TileDriver {
    config: TilingConfig,
}

impl TileDriver {
    pub fn new(config: TilingConfig) -> Self {
        Self { config }
    }

    /// Tile every node of `graph`.
    pub async fn tile(
        &self,
        graph: &TileableGraph,
        executor: &dyn ChunkExecutor,
    ) -> TesselResult<TileContext> {
        let mut cx = TileContext::new();
        for (op, outputs) in graph.ops_in_order() {
            let mut task = op.tile(&outputs)?;
            let mut suspensions = 0usize;
            loop {
                match task.resume(&cx)? {
                    TileStep::Done(tiled) => {
                        for node in tiled {
                            cx.insert_tiled(node);
                        }
                        break;
                    }
                    TileStep::NeedsInputExecution(keys) => {
                        suspensions += 1;
                        if suspensions > self.config.max_suspensions {
                            return Err(TesselError::internal(format!(
                                "tiling {} suspended more than {} times",
                                op.key(),
                                self.config.max_suspensions
                            )));
                        }
                        let mut chunks: Vec<ChunkRef> = Vec::new();
                        for key in &keys {
                            let tiled = cx.tiled(*key).ok_or_else(|| {
                                TesselError::graph(format!(
                                    "{} requested execution of untiled {key}",
                                    op.key()
                                ))
                            })?;
                            chunks.extend(tiled.chunks().iter().cloned());
                        }
                        debug!(
                            "Executing {} chunks of {} inputs before tiling {}",
                            chunks.len(),
                            keys.len(),
                            op.key()
                        );
                        executor.execute_chunks(&chunks).await?;
                        for key in keys {
                            cx.mark_executed(key);
                        }
                    }
                }
            }

            if let Some(missing) = outputs
                .iter()
                .find(|o| !cx.tiled(o.key()).is_some_and(|t| t.is_tiled()))
            {
                return Err(TesselError::graph(format!(
                    "tiling {} did not produce {}",
                    op.key(),
                    missing.key()
                )));
            }
        }
        debug!("Tiled {} nodes", cx.len());
        Ok(cx)
    }
}
