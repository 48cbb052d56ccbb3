//! Reassembly of a node's chunk values into one value.
//!
//! Merging orders chunks by position index, never by the order in which
//! they finished executing. Tables are stitched along both axes, columns and
//! indexes along their single axis, tensors along their first axis.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::compute::{concat, concat_batches};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use common_error::{TesselError, TesselResult};
use log::trace;

use crate::types::{ChunkIndex, OutputType, SeriesValue, TensorValue, Value};

/// Merge `(position-index, value)` pairs into a single value.
///
/// All chunks must already be materialized; there is no partial merge.
pub fn merge_chunks(mut chunks: Vec<(ChunkIndex, Value)>) -> TesselResult<Value> {
    if chunks.is_empty() {
        return Err(TesselError::value_error("cannot merge an empty chunk list"));
    }
    trace!("merging {} chunks", chunks.len());
    chunks.sort_by(|a, b| a.0.cmp(&b.0));

    match chunks[0].1.type_name() {
        "DataFrame" => merge_frames(chunks),
        "Series" => merge_series(chunks),
        "Index" => merge_indexes(chunks),
        "Tensor" => merge_tensors(chunks),
        _ if chunks.len() == 1 => Ok(chunks.remove(0).1),
        _ => Ok(Value::List(chunks.into_iter().map(|(_, v)| v).collect())),
    }
}

/// Coerce a merged value to the declared output kind of the node it came from.
pub fn coerce_to_output_type(value: Value, output_type: OutputType) -> TesselResult<Value> {
    match (output_type, value) {
        (OutputType::Series, Value::DataFrame(batch)) if batch.num_columns() == 1 => {
            let name = batch.schema().field(0).name().clone();
            Ok(Value::Series(SeriesValue::new(name, Arc::clone(batch.column(0)))))
        }
        (OutputType::Series, Value::Index(values)) => {
            Ok(Value::Series(SeriesValue::unnamed(values)))
        }
        (OutputType::Index, Value::Series(series)) => Ok(Value::Index(series.values)),
        (OutputType::Index, Value::DataFrame(batch)) if batch.num_columns() == 1 => {
            Ok(Value::Index(Arc::clone(batch.column(0))))
        }
        (OutputType::DataFrame, Value::Series(series)) => {
            let name = series.name.unwrap_or_else(|| "0".to_string());
            let field = Field::new(name, series.values.data_type().clone(), true);
            let batch = RecordBatch::try_new(Arc::new(Schema::new(vec![field])), vec![series.values])?;
            Ok(Value::DataFrame(batch))
        }
        (_, value) => Ok(value),
    }
}

fn mismatch(expected: &str, got: &Value) -> TesselError {
    TesselError::value_error(format!(
        "cannot merge {} chunk with {expected} chunks",
        got.type_name()
    ))
}

fn merge_frames(chunks: Vec<(ChunkIndex, Value)>) -> TesselResult<Value> {
    let mut rows: BTreeMap<usize, Vec<(usize, RecordBatch)>> = BTreeMap::new();
    for (index, value) in chunks {
        let batch = match value {
            Value::DataFrame(batch) => batch,
            other => return Err(mismatch("DataFrame", &other)),
        };
        let (row, col) = match index.coords() {
            [row, col] => (*row, *col),
            [row] => (*row, 0),
            other => {
                return Err(TesselError::value_error(format!(
                    "dataframe chunk index must have one or two axes, got {other:?}"
                )))
            }
        };
        rows.entry(row).or_default().push((col, batch));
    }

    let mut row_batches = Vec::with_capacity(rows.len());
    for (_, mut blocks) in rows {
        blocks.sort_by_key(|(col, _)| *col);
        row_batches.push(hconcat(blocks.into_iter().map(|(_, b)| b).collect())?);
    }

    let schema = row_batches[0].schema();
    Ok(Value::DataFrame(concat_batches(&schema, &row_batches)?))
}

fn hconcat(mut batches: Vec<RecordBatch>) -> TesselResult<RecordBatch> {
    if batches.len() == 1 {
        return Ok(batches.remove(0));
    }
    let mut fields = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();
    for batch in &batches {
        fields.extend(batch.schema().fields().iter().cloned());
        columns.extend(batch.columns().iter().cloned());
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn concat_arrays(arrays: &[ArrayRef]) -> TesselResult<ArrayRef> {
    let refs: Vec<&dyn Array> = arrays.iter().map(AsRef::as_ref).collect();
    Ok(concat(&refs)?)
}

fn merge_series(chunks: Vec<(ChunkIndex, Value)>) -> TesselResult<Value> {
    let mut name = None;
    let mut arrays = Vec::with_capacity(chunks.len());
    for (i, (_, value)) in chunks.into_iter().enumerate() {
        let series = match value {
            Value::Series(series) => series,
            other => return Err(mismatch("Series", &other)),
        };
        if i == 0 {
            name = series.name;
        }
        arrays.push(series.values);
    }
    Ok(Value::Series(SeriesValue {
        name,
        values: concat_arrays(&arrays)?,
    }))
}

fn merge_indexes(chunks: Vec<(ChunkIndex, Value)>) -> TesselResult<Value> {
    let mut arrays = Vec::with_capacity(chunks.len());
    for (_, value) in chunks {
        let values = match value {
            Value::Index(values) => values,
            other => return Err(mismatch("Index", &other)),
        };
        arrays.push(values);
    }
    Ok(Value::Index(concat_arrays(&arrays)?))
}

/// Stack tensor row blocks along the first axis. Blocks sit at positions
/// `(i, 0, ..)` and agree on every other axis.
fn merge_tensors(mut chunks: Vec<(ChunkIndex, Value)>) -> TesselResult<Value> {
    if chunks.len() == 1 {
        return match chunks.remove(0).1 {
            tensor @ Value::Tensor(_) => Ok(tensor),
            other => Err(mismatch("Tensor", &other)),
        };
    }

    let mut rows = 0;
    let mut tail: Option<Vec<usize>> = None;
    let mut data = Vec::new();
    for (index, value) in chunks {
        let tensor = match value {
            Value::Tensor(tensor) => tensor,
            other => return Err(mismatch("Tensor", &other)),
        };
        let stacks = tensor.ndim() > 0
            && index.coords().iter().skip(1).all(|&c| c == 0)
            && tail.as_deref().map_or(true, |t| t == &tensor.shape()[1..]);
        if !stacks {
            return Err(TesselError::value_error(format!(
                "tensor chunk {index} of shape {:?} is not a stackable row block",
                tensor.shape()
            )));
        }
        if tail.is_none() {
            tail = Some(tensor.shape()[1..].to_vec());
        }
        rows += tensor.shape()[0];
        data.extend_from_slice(tensor.data());
    }

    let mut shape = vec![rows];
    shape.extend(tail.unwrap_or_default());
    Ok(Value::Tensor(TensorValue::new(shape, data)?))
}


#[cfg(test)]
mod proptests {
    use arrow::array::Int64Array;
    use proptest::prelude::*;

    use super::*;

    fn shuffled_parts() -> impl Strategy<Value = (Vec<Vec<i64>>, Vec<usize>)> {
        prop::collection::vec(prop::collection::vec(any::<i64>(), 1..5), 1..8).prop_flat_map(
            |parts| {
                let order: Vec<usize> = (0..parts.len()).collect();
                (Just(parts), Just(order).prop_shuffle())
            },
        )
    }

    proptest! {
        /// Merged series are ordered by position, whatever order chunks arrive in.
        #[test]
        fn merge_ignores_completion_order((parts, order) in shuffled_parts()) {
            let chunks: Vec<(ChunkIndex, Value)> = order
                .iter()
                .map(|&pos| {
                    let values: ArrayRef = Arc::new(Int64Array::from(parts[pos].clone()));
                    (ChunkIndex::new(vec![pos]), Value::Series(SeriesValue::new("s", values)))
                })
                .collect();

            let Value::Series(merged) = merge_chunks(chunks).unwrap() else {
                panic!("expected series");
            };
            let expected: Vec<i64> = parts.concat();
            let got = merged.values.as_any().downcast_ref::<Int64Array>().unwrap();
            prop_assert_eq!(got.values().to_vec(), expected);
        }
    }
}
