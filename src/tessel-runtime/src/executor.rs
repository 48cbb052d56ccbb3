//! Chunk graph execution.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common_config::ExecutionConfig;
use common_error::{TesselError, TesselResult};
use common_runtime::JoinSet;
use log::{debug, warn};
use tessel_core::OpKey;
use tessel_graph::{ChunkGraph, ChunkRef, ExecutionContext, OperandRef};

/// Executes chunks, writing their values to an execution context.
#[async_trait]
pub trait ChunkExecutor: Send + Sync {
    /// Execute `chunks` and everything they depend on. Returns once every
    /// requested chunk's value is stored.
    async fn execute_chunks(&self, chunks: &[ChunkRef]) -> TesselResult<()>;
}

/// Runs chunk operands in dependency order on the blocking thread pool.
///
/// Operands whose chunks are already stored are skipped. An operand starts
/// only once every one of its input chunks is stored, whether its value is
/// read or not.
pub struct LocalExecutor {
    ctx: Arc<dyn ExecutionContext>,
    config: ExecutionConfig,
}

impl std::fmt::Debug for LocalExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LocalExecutor {
    pub fn new(ctx: Arc<dyn ExecutionContext>, config: ExecutionConfig) -> Self {
        Self { ctx, config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    fn is_ready(&self, op: &OperandRef) -> bool {
        op.chunk_inputs().iter().all(|c| self.ctx.contains(c.key()))
    }

    /// Run one wave of operands. Returns the failed operands that may be
    /// retried.
    async fn run_wave(
        &self,
        wave: Vec<OperandRef>,
        attempts: &mut HashMap<OpKey, usize>,
    ) -> TesselResult<Vec<OperandRef>> {
        let mut tasks = JoinSet::new();
        for op in wave {
            let ctx = Arc::clone(&self.ctx);
            debug!("Executing {} {}", op.op_type(), op.key());
            tasks.spawn_blocking(move || {
                let result = op.execute(ctx.as_ref());
                (op, result)
            });
        }

        let mut retry = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (op, result) = joined?;
            match result {
                Ok(()) => debug!("Finished {}", op.key()),
                Err(e) => {
                    let used = attempts.entry(op.key()).or_insert(0);
                    if !op.retryable() || *used >= self.config.max_task_retries {
                        return Err(e);
                    }
                    *used += 1;
                    warn!(
                        "{} failed ({e}); retry {} of {}",
                        op.key(),
                        used,
                        self.config.max_task_retries
                    );
                    retry.push(op);
                }
            }
        }
        Ok(retry)
    }
}

#[async_trait]
impl ChunkExecutor for LocalExecutor {
    async fn execute_chunks(&self, chunks: &[ChunkRef]) -> TesselResult<()> {
        let graph = ChunkGraph::from_chunks(chunks);
        let mut pending: Vec<OperandRef> = graph
            .ops_in_order()
            .into_iter()
            .filter(|(_, chunks)| !chunks.iter().all(|c| self.ctx.contains(c.key())))
            .map(|(op, _)| op)
            .collect();
        debug!(
            "Executing {} chunk operands for {} chunks",
            pending.len(),
            chunks.len()
        );

        let parallelism = self.config.parallelism.max(1);
        let mut attempts = HashMap::new();
        while !pending.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|op| self.is_ready(op));
            if ready.is_empty() {
                return Err(TesselError::graph(format!(
                    "{} chunk operands wait on inputs nothing produces",
                    blocked.len()
                )));
            }

            let mut ready = ready.into_iter();
            let wave: Vec<OperandRef> = ready.by_ref().take(parallelism).collect();
            pending = ready.chain(blocked).collect();

            let retry = self.run_wave(wave, &mut attempts).await?;
            pending.extend(retry);
        }
        Ok(())
    }
}
