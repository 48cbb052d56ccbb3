//! The user-facing construction call.

use std::collections::BTreeMap;
use std::sync::Arc;

use common_error::{config_err, TesselError, TesselResult};
use log::debug;
use tessel_core::{NodeParams, OutputType, Shape, Value};
use tessel_graph::{find_tileables, Arg, Operand, OperandHints, TileableData, TileableRef};

use crate::function::{RemoteFunction, UserFunction};

/// Wrap `func` into a graph node builder.
pub fn spawn<F>(func: F) -> Spawn
where
    F: Fn(&[Value], &BTreeMap<String, Value>) -> TesselResult<Value> + Send + Sync + 'static,
{
    spawn_named("remote", func)
}

/// Same as [`spawn`], naming the function in logs and errors.
pub fn spawn_named<F>(name: impl Into<String>, func: F) -> Spawn
where
    F: Fn(&[Value], &BTreeMap<String, Value>) -> TesselResult<Value> + Send + Sync + 'static,
{
    Spawn::new(UserFunction::new(name, func))
}

/// Builder for a [`RemoteFunction`] node.
#[derive(Debug)]
pub struct Spawn {
    function: UserFunction,
    args: Option<Arg>,
    extra_args: Vec<Arg>,
    kwargs: Option<Arg>,
    extra_kwargs: BTreeMap<String, Arg>,
    retry_when_fail: bool,
    resolve_tileable_input: bool,
    n_output: Option<usize>,
    output_type: OutputType,
    extra: BTreeMap<String, Value>,
}

impl Spawn {
    pub fn new(function: UserFunction) -> Self {
        Self {
            function,
            args: None,
            extra_args: Vec::new(),
            kwargs: None,
            extra_kwargs: BTreeMap::new(),
            retry_when_fail: false,
            resolve_tileable_input: false,
            n_output: None,
            output_type: OutputType::Object,
            extra: BTreeMap::new(),
        }
    }

    /// Positional arguments. A list or set supplies one argument per item;
    /// anything else is the sole positional argument.
    pub fn args(mut self, args: impl Into<Arg>) -> Self {
        self.args = Some(args.into());
        self
    }

    /// Append one positional argument.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Keyword arguments; must be a mapping.
    pub fn kwargs(mut self, kwargs: impl Into<Arg>) -> Self {
        self.kwargs = Some(kwargs.into());
        self
    }

    /// Add one keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, arg: impl Into<Arg>) -> Self {
        self.extra_kwargs.insert(name.into(), arg.into());
        self
    }

    /// Allow the runtime to re-run the task after a failure.
    pub fn retry_when_fail(mut self, retry: bool) -> Self {
        self.retry_when_fail = retry;
        self
    }

    /// Hand distributed inputs to the function as merged values instead of
    /// fetch handles.
    pub fn resolve_tileable_input(mut self, resolve: bool) -> Self {
        self.resolve_tileable_input = resolve;
        self
    }

    /// Declare `n` outputs; the function must return a sequence of `n` items.
    pub fn n_output(mut self, n: usize) -> Self {
        self.n_output = Some(n);
        self
    }

    /// Declared kind of every output.
    pub fn output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }

    /// Extra operand setting such as `priority` or `gpu`.
    pub fn extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Build the operand and its logical outputs.
    pub fn build(self) -> TesselResult<SpawnOutput> {
        let mut args = match self.args {
            None => Vec::new(),
            Some(Arg::List(items) | Arg::Set(items)) => items,
            Some(Arg::Value(Value::List(items) | Value::Set(items))) => {
                items.into_iter().map(Arg::Value).collect()
            }
            Some(other) => vec![other],
        };
        args.extend(self.extra_args);

        let mut kwargs = match self.kwargs {
            None => BTreeMap::new(),
            Some(Arg::Map(entries)) => entries,
            Some(Arg::Value(Value::Map(entries))) => entries
                .into_iter()
                .map(|(k, v)| (k, Arg::Value(v)))
                .collect(),
            Some(_) => {
                return Err(TesselError::type_error("kwargs has to be a mapping"));
            }
        };
        kwargs.extend(self.extra_kwargs);

        let mut extra = self.extra;
        let hints = OperandHints::take_from(&mut extra)?;
        if let Some(name) = extra.keys().next() {
            config_err!("Unexpected kw: {name}");
        }

        let n_outputs = self.n_output.unwrap_or(1);
        let output_types = vec![self.output_type; n_outputs];
        let inputs = find_tileables(&args, &kwargs);

        let op = Arc::new(RemoteFunction::new(
            self.function,
            args,
            kwargs,
            self.retry_when_fail,
            self.resolve_tileable_input,
            self.n_output,
            output_types,
            inputs,
            hints,
        ));
        let params = NodeParams::with_shape(Shape::unknown(self.output_type.chunk_ndim()));
        let outputs: Vec<TileableRef> = (0..n_outputs)
            .map(|i| TileableData::new(op.clone(), self.output_type, i, params.clone()))
            .collect();
        debug!(
            "Spawned {} with {} input(s) and {} output(s)",
            op.key(),
            op.inputs().len(),
            outputs.len()
        );

        Ok(match self.n_output {
            None => SpawnOutput::Single(outputs.into_iter().next().ok_or_else(|| {
                TesselError::internal("single-output spawn produced no output")
            })?),
            Some(_) => SpawnOutput::Multiple(outputs),
        })
    }
}

/// Logical outputs of a spawned function.
#[derive(Debug, Clone)]
pub enum SpawnOutput {
    /// No output count was declared.
    Single(TileableRef),
    /// One node per declared output, in output order.
    Multiple(Vec<TileableRef>),
}

impl SpawnOutput {
    /// The single output node.
    pub fn into_single(self) -> TesselResult<TileableRef> {
        match self {
            Self::Single(node) => Ok(node),
            Self::Multiple(nodes) => Err(TesselError::type_error(format!(
                "spawn declared {} outputs, not a single one",
                nodes.len()
            ))),
        }
    }

    /// All output nodes.
    pub fn into_vec(self) -> Vec<TileableRef> {
        match self {
            Self::Single(node) => vec![node],
            Self::Multiple(nodes) => nodes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use tessel_graph::ops::DataSource;

    use super::*;
    use crate::function::REMOTE_FUNCTION;

    fn constant(_: &[Value], _: &BTreeMap<String, Value>) -> TesselResult<Value> {
        Ok(Value::from(5))
    }

    #[test]
    fn test_defaults() {
        let out = spawn(constant).build().unwrap().into_single().unwrap();
        assert_eq!(out.output_type(), OutputType::Object);
        assert_eq!(out.output_index(), 0);
        assert_eq!(out.op().op_type(), &REMOTE_FUNCTION);
        assert!(out.op().inputs().is_empty());
        assert!(!out.op().retryable());

        let op = out.op().downcast_ref::<RemoteFunction>().unwrap();
        assert!(op.args().is_empty());
        assert!(op.kwargs().is_empty());
        assert_eq!(op.n_output(), None);
    }

    #[test]
    fn test_outputs_share_declared_kind() {
        let outs = spawn(constant)
            .n_output(3)
            .output_type(OutputType::DataFrame)
            .build()
            .unwrap()
            .into_vec();
        assert_eq!(outs.len(), 3);
        for (i, out) in outs.iter().enumerate() {
            assert_eq!(out.output_index(), i);
            assert_eq!(out.output_type(), OutputType::DataFrame);
            assert_eq!(out.params().shape, Shape::unknown(2));
        }
        assert_eq!(outs[0].op().output_types(), &[OutputType::DataFrame; 3]);
        assert!(Arc::ptr_eq(outs[0].op(), outs[2].op()));
    }

    #[test]
    fn test_inputs_found_in_arguments() {
        let a = DataSource::object(Value::from(1));
        let b = DataSource::object(Value::from(2));
        let out = spawn(constant)
            .args(Arg::list([Arg::from(&a), Arg::list([Arg::from(&b)])]))
            .kwarg("again", &a)
            .build()
            .unwrap()
            .into_single()
            .unwrap();
        let keys: Vec<_> = out.op().inputs().iter().map(|t| t.key()).collect();
        assert_eq!(keys, vec![a.key(), b.key()]);
    }

    #[test]
    fn test_plain_value_sequences_are_args() {
        let out = spawn(constant)
            .args(Value::List(vec![Value::from(1), Value::from(2)]))
            .arg(3i64)
            .build()
            .unwrap()
            .into_single()
            .unwrap();
        let op = out.op().downcast_ref::<RemoteFunction>().unwrap();
        assert_eq!(op.args().len(), 3);
    }

    #[test]
    fn test_non_mapping_kwargs_rejected() {
        let err = spawn(constant).kwargs(Arg::from(1i64)).build().unwrap_err();
        assert!(matches!(err, TesselError::TypeError(msg) if msg == "kwargs has to be a mapping"));
    }

    #[test]
    fn test_lone_args_value_is_single_argument() {
        let out = spawn(constant).args("abc").build().unwrap().into_single().unwrap();
        let op = out.op().downcast_ref::<RemoteFunction>().unwrap();
        assert_eq!(op.args().len(), 1);
        assert!(matches!(&op.args()[0], Arg::Value(Value::String(s)) if s == "abc"));

        let source = DataSource::object(Value::from(1));
        let out = spawn(constant).args(&source).build().unwrap().into_single().unwrap();
        assert_eq!(out.op().inputs().len(), 1);
        assert_eq!(out.op().inputs()[0].key(), source.key());
    }

    #[test]
    fn test_unexpected_extra_rejected() {
        let err = spawn(constant).extra("priorty", 1i64).build().unwrap_err();
        assert!(matches!(err, TesselError::ConfigError(msg) if msg.contains("priorty")));
    }

    #[test]
    fn test_known_extras_become_hints() {
        let out = spawn(constant)
            .extra("priority", 2i64)
            .extra("gpu", true)
            .retry_when_fail(true)
            .build()
            .unwrap()
            .into_single()
            .unwrap();
        assert_eq!(out.op().hints().priority, Some(2));
        assert!(out.op().hints().gpu);
        assert!(out.op().retryable());
    }

    #[test]
    fn test_single_vs_multiple() {
        let single = spawn(constant).build().unwrap();
        assert_eq!(single.len(), 1);
        let multiple = spawn(constant).n_output(1).build().unwrap();
        assert!(matches!(multiple, SpawnOutput::Multiple(ref nodes) if nodes.len() == 1));
        assert!(multiple.into_single().is_err());
    }
}
