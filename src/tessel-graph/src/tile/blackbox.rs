//! Tiling for operands that treat their computation as a black box.
//!
//! A black-box operand cannot reason about its inputs' partitioning, so it
//! lowers to exactly one chunk operand that reads every input chunk and
//! writes one chunk per declared output.

use std::collections::HashSet;

use common_error::{TesselError, TesselResult};
use log::debug;
use tessel_core::{ChunkIndex, ChunkKey, NSplits, NodeParams, OpKey, OutputType, Shape, TileableKey};

use super::{TileContext, TileStep, TileTask};
use crate::node::{ChunkData, ChunkRef, TileableRef};
use crate::operand::{Operand, OperandRef};

/// An operand tiled by [`BlackBoxTiler`].
pub trait BlackBoxOperand: Operand + Clone {
    /// Whether `input` must be executed before this operand can be tiled.
    fn needs_execution(&self, input: &TileableRef) -> bool;

    /// Whether `input` is only an ordering dependency whose value is never
    /// fetched.
    fn is_pure_dependency(&self, input: &TileableRef) -> bool;

    /// Build the chunk-level copy of this operand.
    fn to_chunk_op(&self, lowered: LoweredInputs) -> OperandRef;
}

/// Chunk-level wiring handed to [`BlackBoxOperand::to_chunk_op`].
#[derive(Debug, Clone)]
pub struct LoweredInputs {
    /// Key of the logical operand being lowered.
    pub tileable_op_key: OpKey,
    /// Chunks of every input, input by input, each in position order.
    pub chunk_inputs: Vec<ChunkRef>,
    /// Pure-dependency flag of each entry of `chunk_inputs`.
    pub pure_depends: Vec<bool>,
    /// Tiled copies of the logical inputs, in input order.
    pub tiled_inputs: Vec<TileableRef>,
    /// Keys of the chunks the chunk operand writes, one per output position.
    pub output_keys: Vec<ChunkKey>,
}

enum State {
    Start,
    AwaitingInputs,
    Finished,
}

/// Resumable tiling of a [`BlackBoxOperand`].
pub struct BlackBoxTiler<T> {
    op: T,
    outputs: Vec<TileableRef>,
    state: State,
}

impl<T: BlackBoxOperand> BlackBoxTiler<T> {
    pub fn new(op: T, outputs: &[TileableRef]) -> Self {
        Self {
            op,
            outputs: outputs.to_vec(),
            state: State::Start,
        }
    }

    pub fn boxed(op: T, outputs: &[TileableRef]) -> Box<dyn TileTask> {
        Box::new(Self::new(op, outputs))
    }

    /// Inputs that must run before tiling, none of which ran yet.
    fn pending_inputs(&self, cx: &TileContext) -> Vec<TileableKey> {
        let mut seen = HashSet::new();
        self.op
            .inputs()
            .iter()
            .filter(|inp| self.op.needs_execution(inp) && !cx.is_executed(inp.key()))
            .map(|inp| inp.key())
            .filter(|key| seen.insert(*key))
            .collect()
    }

    fn finish(&self, cx: &TileContext) -> TesselResult<Vec<TileableRef>> {
        let mut chunk_inputs = Vec::new();
        let mut pure_depends = Vec::new();
        let mut tiled_inputs = Vec::with_capacity(self.op.inputs().len());
        for input in self.op.inputs() {
            let tiled = cx.tiled_input(input)?;
            let pure = self.op.is_pure_dependency(input);
            pure_depends.extend(std::iter::repeat(pure).take(tiled.chunks().len()));
            chunk_inputs.extend(tiled.chunks().iter().cloned());
            tiled_inputs.push(tiled);
        }

        let n_outputs = self.op.output_limit();
        let output_keys: Vec<ChunkKey> = (0..n_outputs).map(|_| ChunkKey::generate()).collect();
        let n_chunk_inputs = chunk_inputs.len();
        let chunk_op = self.op.to_chunk_op(LoweredInputs {
            tileable_op_key: self.op.key(),
            chunk_inputs,
            pure_depends,
            tiled_inputs,
            output_keys: output_keys.clone(),
        });

        let chunks: Vec<ChunkRef> = output_keys
            .iter()
            .enumerate()
            .map(|(i, key)| self.new_chunk(*key, &chunk_op, i))
            .collect();

        let tiled = self
            .outputs
            .iter()
            .map(|out| {
                let chunk = chunks.get(out.output_index()).cloned().ok_or_else(|| {
                    TesselError::internal(format!(
                        "output {} of {} has no chunk",
                        out.output_index(),
                        self.op.key()
                    ))
                })?;
                let ndim = out.output_type().chunk_ndim();
                Ok(out.with_layout(vec![chunk], NSplits::single_unknown(ndim)))
            })
            .collect::<TesselResult<Vec<_>>>()?;

        debug!(
            "Tiled {} {} into chunk op {} ({} input chunks, {} outputs)",
            self.op.op_type(),
            self.op.key(),
            chunk_op.key(),
            n_chunk_inputs,
            n_outputs
        );
        Ok(tiled)
    }

    /// Chunk for output position `i`: the logical output's metadata with a
    /// single-chunk position and an unknown shape.
    fn new_chunk(&self, key: ChunkKey, chunk_op: &OperandRef, i: usize) -> ChunkRef {
        let output_type = self
            .op
            .output_types()
            .get(i)
            .copied()
            .unwrap_or(OutputType::Object);
        let ndim = output_type.chunk_ndim();
        let mut params = self
            .outputs
            .iter()
            .find(|out| out.output_index() == i)
            .map(|out| out.params().clone())
            .unwrap_or_else(NodeParams::default);
        params.shape = Shape::unknown(ndim);
        let index = ChunkIndex::zeros(ndim);

        match output_type {
            OutputType::DfOrSeries => ChunkData::with_collapse_axis(
                key,
                chunk_op.clone(),
                output_type,
                i,
                index,
                params,
                1,
            ),
            _ => ChunkData::new(key, chunk_op.clone(), output_type, i, index, params),
        }
    }
}

impl<T: BlackBoxOperand> TileTask for BlackBoxTiler<T> {
    fn resume(&mut self, cx: &TileContext) -> TesselResult<TileStep> {
        match self.state {
            State::Start => {
                let pending = self.pending_inputs(cx);
                if !pending.is_empty() {
                    debug!(
                        "Tiling {} suspended until {} input(s) execute",
                        self.op.key(),
                        pending.len()
                    );
                    self.state = State::AwaitingInputs;
                    return Ok(TileStep::NeedsInputExecution(pending));
                }
                self.state = State::Finished;
                self.finish(cx).map(TileStep::Done)
            }
            State::AwaitingInputs => {
                self.state = State::Finished;
                self.finish(cx).map(TileStep::Done)
            }
            State::Finished => Err(TesselError::internal(format!(
                "tiling of {} resumed after completion",
                self.op.key()
            ))),
        }
    }
}
