//! The tiling protocol: lowering logical operands into chunk graphs.
//!
//! Tiling one operand is a resumable computation. The driver calls
//! [`TileTask::resume`] until it returns [`TileStep::Done`]; every
//! [`TileStep::NeedsInputExecution`] in between asks the driver to execute
//! the chunks of the named inputs first. A task is only ever resumed by one
//! driver at a time.

mod blackbox;

pub use blackbox::{BlackBoxOperand, BlackBoxTiler, LoweredInputs};

use std::collections::{HashMap, HashSet};

use common_error::{TesselError, TesselResult};
use tessel_core::TileableKey;

use crate::node::{TileableData, TileableRef};

/// Outcome of one resumption of a [`TileTask`].
#[derive(Debug)]
pub enum TileStep {
    /// Execute the chunks of these (already tiled) inputs, then resume.
    NeedsInputExecution(Vec<TileableKey>),
    /// Tiled copies of the operand's outputs.
    Done(Vec<TileableRef>),
}

/// A suspended tiling computation.
pub trait TileTask: Send {
    /// Advance the computation.
    fn resume(&mut self, cx: &TileContext) -> TesselResult<TileStep>;
}

/// What the driver knows while tiling a graph: the tiled copy of every
/// logical node processed so far and which of them have been executed.
#[derive(Debug, Default)]
pub struct TileContext {
    tiled: HashMap<TileableKey, TileableRef>,
    executed: HashSet<TileableKey>,
}

impl TileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tiled copy of `key`, if tiled.
    pub fn tiled(&self, key: TileableKey) -> Option<&TileableRef> {
        self.tiled.get(&key)
    }

    /// Tiled copy of an operand input.
    ///
    /// Operands are tiled in topological order, so a missing input is a
    /// graph error.
    pub fn tiled_input(&self, input: &TileableData) -> TesselResult<TileableRef> {
        self.tiled
            .get(&input.key())
            .cloned()
            .ok_or_else(|| TesselError::graph(format!("input {} is not tiled yet", input.key())))
    }

    /// Record a tiled node.
    pub fn insert_tiled(&mut self, tileable: TileableRef) {
        self.tiled.insert(tileable.key(), tileable);
    }

    /// Record that every chunk of `key` has been executed.
    pub fn mark_executed(&mut self, key: TileableKey) {
        self.executed.insert(key);
    }

    /// Whether every chunk of `key` has been executed.
    pub fn is_executed(&self, key: TileableKey) -> bool {
        self.executed.contains(&key)
    }

    /// Number of tiled nodes.
    pub fn len(&self) -> usize {
        self.tiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiled.is_empty()
    }

    /// Consume the context, returning the tiled nodes.
    pub fn into_tiled(self) -> HashMap<TileableKey, TileableRef> {
        self.tiled
    }
}

/// A task whose result was computed eagerly.
pub struct Ready(Option<Vec<TileableRef>>);

impl Ready {
    pub fn boxed(outputs: Vec<TileableRef>) -> Box<dyn TileTask> {
        Box::new(Self(Some(outputs)))
    }
}

impl TileTask for Ready {
    fn resume(&mut self, _cx: &TileContext) -> TesselResult<TileStep> {
        self.0
            .take()
            .map(TileStep::Done)
            .ok_or_else(|| TesselError::internal("tile task resumed after completion"))
    }
}
