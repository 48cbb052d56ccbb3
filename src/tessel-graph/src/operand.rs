//! The operand abstraction shared by logical and chunk-level operators.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use common_error::{TesselError, TesselResult};
use serde::{Deserialize, Serialize};
use tessel_core::{ChunkKey, OpKey, OutputType, Value};

use crate::context::ExecutionContext;
use crate::node::{ChunkRef, TileableRef};
use crate::optype::OpType;
use crate::tile::TileTask;

/// Shared handle to an operand.
pub type OperandRef = Arc<dyn Operand>;

/// One computation step.
///
/// A logical operand lists the logical nodes it reads; tiling turns it into
/// chunk-level copies that list the chunks they read and the chunk keys they
/// write. Operands are immutable once shared.
pub trait Operand: fmt::Debug + Send + Sync + 'static {
    /// Type identity used for dispatch.
    fn op_type(&self) -> &'static OpType;

    /// Key of this operand instance.
    fn key(&self) -> OpKey;

    /// Logical inputs.
    fn inputs(&self) -> &[TileableRef];

    /// Chunk inputs of a chunk-level operand, in the same order as the
    /// chunk-expanded logical inputs.
    fn chunk_inputs(&self) -> &[ChunkRef] {
        &[]
    }

    /// Keys this chunk-level operand writes, one per declared output.
    fn output_keys(&self) -> &[ChunkKey] {
        &[]
    }

    /// Declared output kinds, one per output.
    fn output_types(&self) -> &[OutputType];

    /// Number of outputs.
    fn output_limit(&self) -> usize {
        self.output_types().len().max(1)
    }

    /// Whether the runtime may re-run this operand after a failure.
    fn retryable(&self) -> bool {
        false
    }

    /// Key of the logical operand a chunk-level operand was lowered from.
    fn tileable_op_key(&self) -> Option<OpKey> {
        None
    }

    /// Scheduling hints attached at construction.
    fn hints(&self) -> &OperandHints {
        static NONE: OperandHints = OperandHints::EMPTY;
        &NONE
    }

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;

    /// Start lowering this operand into chunks.
    ///
    /// `outputs` are the operand's logical outputs present in the graph being
    /// tiled, in output-position order.
    fn tile(&self, outputs: &[TileableRef]) -> TesselResult<Box<dyn TileTask>> {
        let _ = outputs;
        Err(TesselError::not_implemented(format!(
            "{} cannot be tiled",
            self.op_type()
        )))
    }

    /// Execute this chunk-level operand, reading its inputs from and writing
    /// its outputs to `ctx`.
    fn execute(&self, ctx: &dyn ExecutionContext) -> TesselResult<()> {
        let _ = ctx;
        Err(TesselError::not_implemented(format!(
            "{} cannot be executed",
            self.op_type()
        )))
    }
}

impl dyn Operand {
    /// Downcast to a concrete operand type.
    pub fn downcast_ref<T: Operand>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Optional settings every operand accepts at construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperandHints {
    /// Run on a GPU band.
    pub gpu: bool,
    /// Multiplier on the scheduler's memory estimate.
    pub memory_scale: Option<f64>,
    /// Scheduling priority; higher runs first.
    pub priority: Option<i64>,
    /// Preferred worker address.
    pub expect_worker: Option<String>,
}

impl OperandHints {
    const EMPTY: Self = Self {
        gpu: false,
        memory_scale: None,
        priority: None,
        expect_worker: None,
    };

    /// Names of the extra parameters these hints consume.
    pub const KNOWN: [&'static str; 4] = ["gpu", "memory_scale", "priority", "expect_worker"];

    /// Consume known hints from `extra`, leaving unknown entries behind.
    ///
    /// A known hint with a value of the wrong type is a `TypeError`.
    pub fn take_from(extra: &mut BTreeMap<String, Value>) -> TesselResult<Self> {
        let mut hints = Self::default();
        if let Some(v) = extra.remove("gpu") {
            hints.gpu = v.as_bool().ok_or_else(|| hint_type_error("gpu", "Bool", &v))?;
        }
        if let Some(v) = extra.remove("memory_scale") {
            hints.memory_scale = Some(
                v.as_float64()
                    .ok_or_else(|| hint_type_error("memory_scale", "Float64", &v))?,
            );
        }
        if let Some(v) = extra.remove("priority") {
            hints.priority = Some(
                v.as_int64()
                    .ok_or_else(|| hint_type_error("priority", "Int64", &v))?,
            );
        }
        if let Some(v) = extra.remove("expect_worker") {
            hints.expect_worker = Some(
                v.as_str()
                    .ok_or_else(|| hint_type_error("expect_worker", "String", &v))?
                    .to_string(),
            );
        }
        Ok(hints)
    }
}

fn hint_type_error(name: &str, expected: &str, got: &Value) -> TesselError {
    TesselError::type_error(format!(
        "{name} expects {expected}, got {}",
        got.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_consume_known_keys() {
        let mut extra = BTreeMap::new();
        extra.insert("gpu".to_string(), Value::from(true));
        extra.insert("priority".to_string(), Value::from(3));
        extra.insert("colour".to_string(), Value::from("red"));

        let hints = OperandHints::take_from(&mut extra).unwrap();
        assert!(hints.gpu);
        assert_eq!(hints.priority, Some(3));
        assert_eq!(hints.memory_scale, None);
        assert_eq!(extra.keys().collect::<Vec<_>>(), vec!["colour"]);
    }

    #[test]
    fn test_hint_type_mismatch() {
        let mut extra = BTreeMap::new();
        extra.insert("memory_scale".to_string(), Value::from("big"));
        let err = OperandHints::take_from(&mut extra).unwrap_err();
        assert!(matches!(err, TesselError::TypeError(_)));
    }
}
