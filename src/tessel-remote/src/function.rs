//! The remote-function operand.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use common_error::{type_err, value_err, TesselError, TesselResult};
use log::debug;
use tessel_core::{
    coerce_to_output_type, merge_chunks, ChunkKey, OpKey, OutputType, TileableKey, Value,
};
use tessel_graph::{
    Arg, BlackBoxOperand, BlackBoxTiler, ChunkRef, ExecutionContext, LoweredInputs, OpType,
    Operand, OperandHints, OperandRef, TileTask, TileableData, TileableRef, OPERAND,
};

pub static REMOTE_FUNCTION: OpType = OpType::derived("RemoteFunction", &OPERAND);

/// Signature of a function run by a [`RemoteFunction`].
pub type UserFn = dyn Fn(&[Value], &BTreeMap<String, Value>) -> TesselResult<Value> + Send + Sync;

/// A named, shareable user function.
#[derive(Clone)]
pub struct UserFunction {
    name: String,
    func: Arc<UserFn>,
}

impl UserFunction {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value], &BTreeMap<String, Value>) -> TesselResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value], kwargs: &BTreeMap<String, Value>) -> TesselResult<Value> {
        (self.func)(args, kwargs)
    }
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserFunction({})", self.name)
    }
}

/// Runs a user function over its resolved arguments.
///
/// The logical operand lists the nodes found in its arguments as inputs.
/// Its chunk-level copy additionally carries the chunk wiring produced by
/// tiling and is the one that executes.
#[derive(Debug, Clone)]
pub struct RemoteFunction {
    key: OpKey,
    function: UserFunction,
    args: Vec<Arg>,
    kwargs: BTreeMap<String, Arg>,
    retry_when_fail: bool,
    resolve_tileable_input: bool,
    n_output: Option<usize>,
    output_types: Vec<OutputType>,
    inputs: Vec<TileableRef>,
    hints: OperandHints,
    lowered: Option<LoweredInputs>,
}

impl RemoteFunction {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        function: UserFunction,
        args: Vec<Arg>,
        kwargs: BTreeMap<String, Arg>,
        retry_when_fail: bool,
        resolve_tileable_input: bool,
        n_output: Option<usize>,
        output_types: Vec<OutputType>,
        inputs: Vec<TileableRef>,
        hints: OperandHints,
    ) -> Self {
        Self {
            key: OpKey::generate(),
            function,
            args,
            kwargs,
            retry_when_fail,
            resolve_tileable_input,
            n_output,
            output_types,
            inputs,
            hints,
            lowered: None,
        }
    }

    pub fn function(&self) -> &UserFunction {
        &self.function
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Arg> {
        &self.kwargs
    }

    pub fn n_output(&self) -> Option<usize> {
        self.n_output
    }

    pub fn resolve_tileable_input(&self) -> bool {
        self.resolve_tileable_input
    }

    /// Pure-dependency flag of each chunk input; empty before tiling.
    pub fn pure_depends(&self) -> &[bool] {
        self.lowered.as_ref().map_or(&[], |l| l.pure_depends.as_slice())
    }

    fn lowered(&self) -> TesselResult<&LoweredInputs> {
        self.lowered
            .as_ref()
            .ok_or_else(|| TesselError::internal(format!("{} executed before tiling", self.key)))
    }

    /// Value handed to the function in place of a tiled input.
    fn input_value(
        &self,
        tiled: &TileableData,
        pure: bool,
        ctx: &dyn ExecutionContext,
    ) -> TesselResult<Value> {
        if pure {
            return Ok(Value::Fetch(tiled.fetch_handle()));
        }
        match tiled.chunks() {
            [chunk] if !tiled.output_type().is_distributed() => ctx.get(chunk.key()),
            _ => {
                let merged = merge_chunks(ctx.gather(tiled)?)?;
                coerce_to_output_type(merged, tiled.output_type())
            }
        }
    }

    fn store_outputs(
        &self,
        result: Value,
        keys: &[ChunkKey],
        ctx: &dyn ExecutionContext,
    ) -> TesselResult<()> {
        let Some(n) = self.n_output else {
            let key = keys
                .first()
                .ok_or_else(|| TesselError::internal(format!("{} has no output key", self.key)))?;
            return ctx.set(*key, result);
        };
        if !result.is_iterable() {
            type_err!(
                "Specifying n_output={n}, but result is not iterable, got {}",
                result.type_name()
            );
        }
        let items = result.into_items()?;
        if items.len() != n {
            value_err!("Length of return value should be {n}, got {}", items.len());
        }
        for (key, item) in keys.iter().zip(items) {
            ctx.set(*key, item)?;
        }
        Ok(())
    }
}

impl Operand for RemoteFunction {
    fn op_type(&self) -> &'static OpType {
        &REMOTE_FUNCTION
    }

    fn key(&self) -> OpKey {
        self.key
    }

    fn inputs(&self) -> &[TileableRef] {
        &self.inputs
    }

    fn chunk_inputs(&self) -> &[ChunkRef] {
        self.lowered.as_ref().map_or(&[], |l| l.chunk_inputs.as_slice())
    }

    fn output_keys(&self) -> &[ChunkKey] {
        self.lowered.as_ref().map_or(&[], |l| l.output_keys.as_slice())
    }

    fn output_types(&self) -> &[OutputType] {
        &self.output_types
    }

    fn output_limit(&self) -> usize {
        self.output_types.len()
    }

    fn retryable(&self) -> bool {
        self.retry_when_fail
    }

    fn tileable_op_key(&self) -> Option<OpKey> {
        self.lowered.as_ref().map(|l| l.tileable_op_key)
    }

    fn hints(&self) -> &OperandHints {
        &self.hints
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn tile(&self, outputs: &[TileableRef]) -> TesselResult<Box<dyn TileTask>> {
        Ok(BlackBoxTiler::boxed(self.clone(), outputs))
    }

    fn execute(&self, ctx: &dyn ExecutionContext) -> TesselResult<()> {
        let lowered = self.lowered()?;

        let mut values: HashMap<TileableKey, Value> = HashMap::new();
        let mut offset = 0;
        for tiled in &lowered.tiled_inputs {
            let n = tiled.chunks().len();
            let pure = n > 0
                && lowered
                    .pure_depends
                    .get(offset..offset + n)
                    .is_some_and(|flags| flags.iter().all(|&p| p));
            offset += n;
            values.insert(tiled.key(), self.input_value(tiled, pure, ctx)?);
        }

        let mut lookup = |t: &TileableRef| {
            values.get(&t.key()).cloned().ok_or_else(|| {
                TesselError::internal(format!(
                    "argument {} is not an input of {}",
                    t.key(),
                    self.key
                ))
            })
        };
        let args = self
            .args
            .iter()
            .map(|arg| arg.resolve(&mut lookup))
            .collect::<TesselResult<Vec<_>>>()?;
        let kwargs = self
            .kwargs
            .iter()
            .map(|(name, arg)| Ok((name.clone(), arg.resolve(&mut lookup)?)))
            .collect::<TesselResult<BTreeMap<_, _>>>()?;

        debug!("Calling {} for {}", self.function.name(), self.key);
        let result = self.function.call(&args, &kwargs).map_err(|e| {
            TesselError::task_failed(self.key, format!("{}: {e}", self.function.name()))
        })?;
        self.store_outputs(result, &lowered.output_keys, ctx)
    }
}

impl BlackBoxOperand for RemoteFunction {
    fn needs_execution(&self, input: &TileableRef) -> bool {
        input.output_type().is_distributed()
    }

    fn is_pure_dependency(&self, input: &TileableRef) -> bool {
        input.output_type().is_distributed() && !self.resolve_tileable_input
    }

    fn to_chunk_op(&self, lowered: LoweredInputs) -> OperandRef {
        Arc::new(Self {
            key: OpKey::generate(),
            lowered: Some(lowered),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use tessel_graph::ops::DataSource;

    use super::*;
    use crate::spawn;

    fn noop(_: &[Value], _: &BTreeMap<String, Value>) -> TesselResult<Value> {
        Ok(Value::Null)
    }

    fn remote_op(node: &TileableRef) -> RemoteFunction {
        node.op()
            .downcast_ref::<RemoteFunction>()
            .cloned()
            .expect("remote function operand")
    }

    #[test]
    fn test_dependency_classification() {
        let series = DataSource::series_blocks(
            "s",
            vec![Arc::new(arrow::array::Int64Array::from(vec![1i64])) as arrow::array::ArrayRef],
        )
        .unwrap();
        let object = DataSource::object(Value::from(1));

        let lazy = spawn(noop).arg(&series).arg(&object).build().unwrap().into_single().unwrap();
        let op = remote_op(&lazy);
        assert!(op.needs_execution(&series));
        assert!(op.is_pure_dependency(&series));
        assert!(!op.needs_execution(&object));
        assert!(!op.is_pure_dependency(&object));

        let eager = spawn(noop)
            .arg(&series)
            .resolve_tileable_input(true)
            .build()
            .unwrap()
            .into_single()
            .unwrap();
        let op = remote_op(&eager);
        assert!(op.needs_execution(&series));
        assert!(!op.is_pure_dependency(&series));
    }

    #[test]
    fn test_execute_before_tiling_is_internal_error() {
        struct NoContext;
        impl ExecutionContext for NoContext {
            fn get(&self, key: ChunkKey) -> TesselResult<Value> {
                Err(TesselError::key_not_found(key))
            }
            fn set(&self, _key: ChunkKey, _value: Value) -> TesselResult<()> {
                Ok(())
            }
            fn contains(&self, _key: ChunkKey) -> bool {
                false
            }
        }

        let node = spawn(noop).build().unwrap().into_single().unwrap();
        let err = remote_op(&node).execute(&NoContext).unwrap_err();
        assert!(matches!(err, TesselError::InternalError(_)));
    }

    #[test]
    fn test_chunk_copy_has_fresh_key_and_lineage() {
        let node = spawn(noop).n_output(2).build().unwrap().into_vec();
        let op = remote_op(&node[0]);
        let chunk_op = op.to_chunk_op(LoweredInputs {
            tileable_op_key: op.key(),
            chunk_inputs: vec![],
            pure_depends: vec![],
            tiled_inputs: vec![],
            output_keys: vec![ChunkKey::generate(), ChunkKey::generate()],
        });
        assert_ne!(chunk_op.key(), op.key());
        assert_eq!(chunk_op.tileable_op_key(), Some(op.key()));
        assert_eq!(chunk_op.output_keys().len(), 2);
        assert_eq!(op.output_limit(), 2);
    }
}
