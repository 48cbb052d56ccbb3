//! Spawning, tiling and executing remote functions end to end.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use common_error::{TesselError, TesselResult};
use tessel_core::{ChunkIndex, OutputType, SeriesValue, Shape, Value};
use tessel_graph::ops::DataSource;
use tessel_graph::{Arg, ExecutionContext, Operand, TileableRef};
use tessel_remote::{spawn, RemoteFunction};
use tessel_runtime::{ChunkExecutor, LocalRuntime};

fn int_column(values: Vec<i64>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

fn block(name: &str, values: Vec<i64>) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Int64, false)]));
    RecordBatch::try_new(schema, vec![int_column(values)]).unwrap()
}

fn five(_: &[Value], _: &BTreeMap<String, Value>) -> TesselResult<Value> {
    Ok(Value::from(5i64))
}

#[tokio::test]
async fn test_single_output_round_trip() {
    let runtime = LocalRuntime::default();
    let node = spawn(five).build().unwrap().into_single().unwrap();

    let tiled = runtime.tile(std::slice::from_ref(&node)).await.unwrap();
    assert_eq!(tiled[0].chunks().len(), 1);
    assert_eq!(tiled[0].chunks()[0].index(), &ChunkIndex::zeros(0));
    assert_eq!(tiled[0].chunks()[0].params().shape, Shape::scalar());

    let values = runtime.execute(&[node]).await.unwrap();
    assert_eq!(values, vec![Value::from(5i64)]);
}

#[tokio::test]
async fn test_result_stored_under_sole_output_key() {
    let runtime = LocalRuntime::default();
    let node = spawn(five).build().unwrap().into_single().unwrap();
    let tiled = runtime.tile(std::slice::from_ref(&node)).await.unwrap();

    runtime.executor().execute_chunks(tiled[0].chunks()).await.unwrap();
    let key = tiled[0].chunks()[0].key();
    assert_eq!(runtime.context().get(key).unwrap(), Value::from(5i64));
}

fn returning(value: Value) -> impl Fn(&[Value], &BTreeMap<String, Value>) -> TesselResult<Value> {
    move |_: &[Value], _: &BTreeMap<String, Value>| -> TesselResult<Value> { Ok(value.clone()) }
}

#[tokio::test]
async fn test_multi_output_length_mismatch() {
    let three = Value::List(vec![Value::from(1i64), Value::from(2i64), Value::from(3i64)]);
    let outs = spawn(returning(three)).n_output(2).build().unwrap().into_vec();

    let err = LocalRuntime::default().execute(&outs).await.unwrap_err();
    assert!(matches!(err, TesselError::ValueError(_)), "got {err}");
}

#[tokio::test]
async fn test_multi_output_not_iterable() {
    let outs = spawn(returning(Value::from(1i64))).n_output(2).build().unwrap().into_vec();

    let err = LocalRuntime::default().execute(&outs).await.unwrap_err();
    match err {
        TesselError::TypeError(msg) => assert!(msg.contains("n_output=2")),
        other => panic!("expected TypeError, got {other}"),
    }
}

#[tokio::test]
async fn test_multi_output_stores_each_element() {
    let pair = Value::List(vec![Value::from("first"), Value::from("second")]);
    let outs = spawn(returning(pair)).n_output(2).build().unwrap().into_vec();

    let values = LocalRuntime::default().execute(&outs).await.unwrap();
    assert_eq!(values, vec![Value::from("first"), Value::from("second")]);
}

#[tokio::test]
async fn test_executing_one_output_of_many() {
    let pair = Value::List(vec![Value::from(1i64), Value::from(2i64)]);
    let outs = spawn(returning(pair)).n_output(2).build().unwrap().into_vec();

    let value = LocalRuntime::default().execute_one(&outs[1]).await.unwrap();
    assert_eq!(value, Value::from(2i64));
}

#[tokio::test]
async fn test_multi_output_unpacks_series() {
    let series = Value::from(SeriesValue::new("s", int_column(vec![1, 2])));
    let outs = spawn(returning(series)).n_output(2).build().unwrap().into_vec();

    let values = LocalRuntime::default().execute(&outs).await.unwrap();
    assert_eq!(values, vec![Value::from(1i64), Value::from(2i64)]);
}

#[tokio::test]
async fn test_multi_output_unpacks_string() {
    let outs = spawn(returning(Value::from("ab"))).n_output(2).build().unwrap().into_vec();

    let values = LocalRuntime::default().execute(&outs).await.unwrap();
    assert_eq!(values, vec![Value::from("a"), Value::from("b")]);
}

#[tokio::test]
async fn test_lone_args_value_reaches_function() {
    let seen = Arc::new(Mutex::new(None));
    let node = spawn(capture(seen.clone())).args(5i64).build().unwrap().into_single().unwrap();

    LocalRuntime::default().execute_one(&node).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(Value::from(5i64)));
}

fn frame_grid() -> (TileableRef, RecordBatch) {
    let source = DataSource::frame_grid(vec![
        vec![block("a", vec![1, 2]), block("b", vec![10, 20])],
        vec![block("a", vec![3]), block("b", vec![30])],
    ])
    .unwrap();
    let schema = Arc::new(Schema::new(vec![
        Field::new("a", DataType::Int64, false),
        Field::new("b", DataType::Int64, false),
    ]));
    let expected = RecordBatch::try_new(
        schema,
        vec![int_column(vec![1, 2, 3]), int_column(vec![10, 20, 30])],
    )
    .unwrap();
    (source, expected)
}

/// Record the first positional argument the function receives.
fn capture(
    seen: Arc<Mutex<Option<Value>>>,
) -> impl Fn(&[Value], &BTreeMap<String, Value>) -> TesselResult<Value> {
    move |args: &[Value], _: &BTreeMap<String, Value>| -> TesselResult<Value> {
        *seen.lock().unwrap() = args.first().cloned();
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn test_distributed_input_is_pure_dependency() {
    let (source, _) = frame_grid();
    let seen = Arc::new(Mutex::new(None));
    let node = spawn(capture(Arc::clone(&seen)))
        .arg(&source)
        .build()
        .unwrap()
        .into_single()
        .unwrap();

    let runtime = LocalRuntime::default();
    let tiled = runtime.tile(std::slice::from_ref(&node)).await.unwrap();
    let chunk_op = tiled[0].chunks()[0].op().downcast_ref::<RemoteFunction>().unwrap();
    assert_eq!(chunk_op.pure_depends(), &[true; 4]);
    assert_eq!(chunk_op.chunk_inputs().len(), 4);

    runtime.execute(&[node]).await.unwrap();
    let received = seen.lock().unwrap().clone().unwrap();
    let handle = received.as_fetch().expect("fetch handle");
    assert_eq!(handle.tileable, source.key());
    assert_eq!(handle.output_type, OutputType::DataFrame);
    let positions: Vec<_> = handle.chunks.iter().map(|(i, _)| i.coords().to_vec()).collect();
    assert_eq!(positions, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
}

#[tokio::test]
async fn test_resolved_input_is_merged_by_position() {
    let (source, expected) = frame_grid();
    let seen = Arc::new(Mutex::new(None));
    let node = spawn(capture(Arc::clone(&seen)))
        .arg(&source)
        .resolve_tileable_input(true)
        .build()
        .unwrap()
        .into_single()
        .unwrap();

    let runtime = LocalRuntime::default();
    let tiled = runtime.tile(std::slice::from_ref(&node)).await.unwrap();
    let chunk_op = tiled[0].chunks()[0].op().downcast_ref::<RemoteFunction>().unwrap();
    assert_eq!(chunk_op.pure_depends(), &[false; 4]);

    runtime.execute(&[node]).await.unwrap();
    let received = seen.lock().unwrap().clone().unwrap();
    assert_eq!(received, Value::DataFrame(expected));
}

#[tokio::test]
async fn test_resolved_series_input() {
    let source =
        DataSource::series_blocks("s", vec![int_column(vec![1]), int_column(vec![2, 3])]).unwrap();
    let seen = Arc::new(Mutex::new(None));
    let node = spawn(capture(Arc::clone(&seen)))
        .kwargs(Arg::map([("unused", Arg::from(1i64))]))
        .arg(&source)
        .resolve_tileable_input(true)
        .build()
        .unwrap()
        .into_single()
        .unwrap();

    LocalRuntime::default().execute_one(&node).await.unwrap();
    match seen.lock().unwrap().clone().unwrap() {
        Value::Series(series) => {
            assert_eq!(series.name.as_deref(), Some("s"));
            assert_eq!(series.values.as_ref(), int_column(vec![1, 2, 3]).as_ref());
        }
        other => panic!("expected a series, got {}", other.type_name()),
    };
}

#[tokio::test]
async fn test_nested_arguments_are_resolved() {
    let inner = spawn(five).build().unwrap().into_single().unwrap();
    let node = spawn(|args: &[Value], kwargs: &BTreeMap<String, Value>| {
        let from_list = match &args[0] {
            Value::List(items) => items[1].as_int64().unwrap_or_default(),
            _ => 0,
        };
        let from_map = match kwargs.get("nested") {
            Some(Value::Map(map)) => map.get("x").and_then(Value::as_int64).unwrap_or_default(),
            _ => 0,
        };
        Ok(Value::from(from_list * 100 + from_map))
    })
    .arg(Arg::list([Arg::from("label"), Arg::from(&inner)]))
    .kwarg("nested", Arg::map([("x", Arg::from(&inner))]))
    .build()
    .unwrap()
    .into_single()
    .unwrap();

    assert_eq!(node.op().inputs().len(), 1);
    let value = LocalRuntime::default().execute_one(&node).await.unwrap();
    assert_eq!(value, Value::from(505i64));
}
