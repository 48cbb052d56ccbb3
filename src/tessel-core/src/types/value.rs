//! Runtime value representation.
//!
//! Values are what an execution context stores under chunk keys and what user
//! functions receive and return. Tabular values are Arrow-backed; tensors are
//! dense row-major `f64` blocks.

use std::collections::BTreeMap;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use common_error::{TesselError, TesselResult};
use serde::{Deserialize, Serialize};

use crate::identifiers::{ChunkKey, TileableKey};
use crate::types::{ChunkIndex, OutputType};

/// Runtime value in tessel.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Insertion-ordered set.
    Set(Vec<Value>),
    /// String-keyed mapping.
    Map(BTreeMap<String, Value>),
    /// Dense tensor.
    Tensor(TensorValue),
    /// Table.
    DataFrame(RecordBatch),
    /// Single named column.
    Series(SeriesValue),
    /// Row labels.
    Index(ArrayRef),
    /// Unfetched reference to a distributed node's chunks.
    Fetch(FetchHandle),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get as i64.
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Self::Float64(f) => Some(*f),
            Self::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a fetch handle.
    pub fn as_fetch(&self) -> Option<&FetchHandle> {
        match self {
            Self::Fetch(handle) => Some(handle),
            _ => None,
        }
    }

    /// Whether the value can be unpacked into a sequence of items.
    pub fn is_iterable(&self) -> bool {
        matches!(
            self,
            Self::List(_)
                | Self::Set(_)
                | Self::Map(_)
                | Self::String(_)
                | Self::Series(_)
                | Self::Index(_)
                | Self::DataFrame(_)
        ) || matches!(self, Self::Tensor(t) if t.ndim() > 0)
    }

    /// Unpack an iterable value into its items.
    ///
    /// Series and indexes yield their elements, tensors their slices along
    /// the first axis, maps their keys, frames their column labels and
    /// strings their characters.
    pub fn into_items(self) -> TesselResult<Vec<Value>> {
        match self {
            Self::List(items) | Self::Set(items) => Ok(items),
            Self::Map(entries) => Ok(entries.into_keys().map(Self::String).collect()),
            Self::String(s) => Ok(s.chars().map(|c| Self::String(c.to_string())).collect()),
            Self::Series(series) => array_items(&series.values),
            Self::Index(index) => array_items(&index),
            Self::DataFrame(batch) => Ok(batch
                .schema()
                .fields()
                .iter()
                .map(|f| Self::String(f.name().clone()))
                .collect()),
            Self::Tensor(tensor) if tensor.ndim() > 0 => tensor.into_slices(),
            other => Err(TesselError::type_error(format!(
                "{} is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Get the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Int64(_) => "Int64",
            Self::Float64(_) => "Float64",
            Self::String(_) => "String",
            Self::List(_) => "List",
            Self::Set(_) => "Set",
            Self::Map(_) => "Map",
            Self::Tensor(_) => "Tensor",
            Self::DataFrame(_) => "DataFrame",
            Self::Series(_) => "Series",
            Self::Index(_) => "Index",
            Self::Fetch(_) => "Fetch",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int64(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<RecordBatch> for Value {
    fn from(batch: RecordBatch) -> Self {
        Self::DataFrame(batch)
    }
}

impl From<SeriesValue> for Value {
    fn from(series: SeriesValue) -> Self {
        Self::Series(series)
    }
}

impl From<TensorValue> for Value {
    fn from(tensor: TensorValue) -> Self {
        Self::Tensor(tensor)
    }
}

/// Elements of a one-dimensional array as scalar values; nulls become `Null`.
fn array_items(array: &ArrayRef) -> TesselResult<Vec<Value>> {
    fn collect<A: Array>(array: &A, item: impl Fn(&A, usize) -> Value) -> Vec<Value> {
        (0..array.len())
            .map(|i| {
                if array.is_null(i) {
                    Value::Null
                } else {
                    item(array, i)
                }
            })
            .collect()
    }

    let any = array.as_any();
    let items = match array.data_type() {
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| collect(a, |a, i| Value::Int64(a.value(i)))),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| collect(a, |a, i| Value::Int64(i64::from(a.value(i))))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| collect(a, |a, i| Value::Float64(a.value(i)))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| collect(a, |a, i| Value::Bool(a.value(i)))),
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| collect(a, |a, i| Value::String(a.value(i).to_string()))),
        _ => None,
    };
    items.ok_or_else(|| {
        TesselError::type_error(format!(
            "cannot unpack elements of type {}",
            array.data_type()
        ))
    })
}

/// A single named column.
#[derive(Debug, Clone)]
pub struct SeriesValue {
    /// Column label, if any.
    pub name: Option<String>,
    /// Column values.
    pub values: ArrayRef,
}

impl PartialEq for SeriesValue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.values.as_ref() == other.values.as_ref()
    }
}

impl SeriesValue {
    /// Create a named series.
    pub fn new(name: impl Into<String>, values: ArrayRef) -> Self {
        Self {
            name: Some(name.into()),
            values,
        }
    }

    /// Create an unnamed series.
    pub fn unnamed(values: ArrayRef) -> Self {
        Self { name: None, values }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Dense row-major tensor of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorValue {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TensorValue {
    /// Create a tensor, checking that `data` fills `shape` exactly.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> TesselResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TesselError::value_error(format!(
                "tensor of shape {shape:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Extent along each axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major element buffer.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Slices along the first axis: scalars for a vector, sub-tensors
    /// otherwise.
    fn into_slices(self) -> TesselResult<Vec<Value>> {
        let Some((&rows, rest)) = self.shape.split_first() else {
            return Err(TesselError::type_error("0-d tensor is not iterable"));
        };
        if rest.is_empty() {
            return Ok(self.data.into_iter().map(Value::Float64).collect());
        }
        let stride: usize = rest.iter().product();
        (0..rows)
            .map(|r| {
                let data = self.data[r * stride..(r + 1) * stride].to_vec();
                Self::new(rest.to_vec(), data).map(Value::Tensor)
            })
            .collect()
    }
}

/// Reference to a distributed node handed to a function instead of its data.
///
/// Lists the node's chunks in position order so the function can fetch the
/// slices it needs itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchHandle {
    /// Key of the referenced logical node.
    pub tileable: TileableKey,
    /// Declared output kind of the referenced node.
    pub output_type: OutputType,
    /// `(position-index, chunk-key)` pairs in position order.
    pub chunks: Vec<(ChunkIndex, ChunkKey)>,
}

impl FetchHandle {
    /// Number of chunks behind the handle.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::Int64Array;

    use super::*;

    #[test]
    fn test_iterable_values() {
        let list = Value::List(vec![Value::from(1), Value::from(2)]);
        assert!(list.is_iterable());
        assert_eq!(list.into_items().unwrap().len(), 2);

        let err = Value::from(5).into_items().unwrap_err();
        assert!(matches!(err, TesselError::TypeError(_)));
        assert!(!Value::Null.is_iterable());
    }

    #[test]
    fn test_unpack_columnar_values() {
        let series = SeriesValue::new("s", Arc::new(Int64Array::from(vec![Some(1), None])));
        assert_eq!(
            Value::from(series).into_items().unwrap(),
            vec![Value::Int64(1), Value::Null]
        );

        let index: ArrayRef = Arc::new(StringArray::from(vec!["a", "b"]));
        assert_eq!(
            Value::Index(index).into_items().unwrap(),
            vec![Value::from("a"), Value::from("b")]
        );

        let tensor = TensorValue::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let rows = Value::from(tensor).into_items().unwrap();
        assert_eq!(
            rows[1],
            Value::from(TensorValue::new(vec![2], vec![3.0, 4.0]).unwrap())
        );
        let vector = TensorValue::new(vec![2], vec![5.0, 6.0]).unwrap();
        assert_eq!(
            Value::from(vector).into_items().unwrap(),
            vec![Value::Float64(5.0), Value::Float64(6.0)]
        );
        let scalar = TensorValue::new(vec![], vec![1.0]).unwrap();
        assert!(!Value::from(scalar).is_iterable());
    }

    #[test]
    fn test_unpack_strings_and_maps() {
        assert_eq!(
            Value::from("ab").into_items().unwrap(),
            vec![Value::from("a"), Value::from("b")]
        );
        let map = Value::Map(BTreeMap::from([
            ("y".to_string(), Value::from(1)),
            ("x".to_string(), Value::from(2)),
        ]));
        assert_eq!(
            map.into_items().unwrap(),
            vec![Value::from("x"), Value::from("y")]
        );
    }

    #[test]
    fn test_tensor_shape_check() {
        assert!(TensorValue::new(vec![2, 3], vec![0.0; 6]).is_ok());
        assert!(TensorValue::new(vec![2, 3], vec![0.0; 5]).is_err());
    }

    #[test]
    fn test_series_len() {
        let series = SeriesValue::new("s", Arc::new(Int64Array::from(vec![1, 2, 3])));
        assert_eq!(series.len(), 3);
        assert_eq!(series.name.as_deref(), Some("s"));
        assert_eq!(Value::from(series).type_name(), "Series");
    }
}
