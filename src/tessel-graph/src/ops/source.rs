//! Operands whose values are known when the graph is built.

use std::any::Any;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::record_batch::RecordBatch;
use common_error::{TesselError, TesselResult};
use log::debug;
use tessel_core::{
    ChunkIndex, ChunkKey, Dim, NSplits, NodeParams, OpKey, OutputType, SeriesValue, Shape,
    TensorValue, Value,
};

use crate::context::ExecutionContext;
use crate::node::{ChunkData, ChunkRef, TileableData, TileableRef};
use crate::operand::{Operand, OperandRef};
use crate::optype::{OpType, DATA_SOURCE};
use crate::tile::{Ready, TileTask};

/// Chunk-level operand storing one partition of a [`DataSource`].
pub static DATA_SOURCE_CHUNK: OpType = OpType::derived("DataSourceChunk", &DATA_SOURCE);

/// One partition: its position, value and metadata.
#[derive(Debug, Clone)]
struct Partition {
    index: ChunkIndex,
    value: Value,
    params: NodeParams,
}

/// A logical node backed by values supplied up front.
///
/// Partition extents are known, so tiling is immediate and yields one chunk
/// per partition.
#[derive(Debug)]
pub struct DataSource {
    key: OpKey,
    output_types: [OutputType; 1],
    partitions: Vec<Partition>,
    nsplits: NSplits,
}

impl DataSource {
    /// Build a node from `(position, value)` partitions laid out by `nsplits`.
    ///
    /// Every partition must sit inside `nsplits`, and every position of
    /// `nsplits` must be covered exactly once.
    pub fn from_partitions(
        output_type: OutputType,
        params: NodeParams,
        partitions: Vec<(ChunkIndex, Value)>,
        nsplits: NSplits,
    ) -> TesselResult<TileableRef> {
        let expected: usize = nsplits.chunk_shape().iter().product();
        if partitions.len() != expected {
            return Err(TesselError::value_error(format!(
                "layout {:?} needs {expected} partitions, got {}",
                nsplits.chunk_shape(),
                partitions.len()
            )));
        }

        let mut seen = std::collections::HashSet::new();
        let partitions = partitions
            .into_iter()
            .map(|(index, value)| {
                if !nsplits.contains(&index) || !seen.insert(index.clone()) {
                    return Err(TesselError::value_error(format!(
                        "partition {index} does not fit layout {:?}",
                        nsplits.chunk_shape()
                    )));
                }
                let shape = Shape::new(
                    index
                        .coords()
                        .iter()
                        .enumerate()
                        .map(|(axis, &pos)| nsplits.axis(axis)[pos])
                        .collect(),
                );
                let params = partition_params(&params, &value, shape);
                Ok(Partition {
                    index,
                    value,
                    params,
                })
            })
            .collect::<TesselResult<Vec<_>>>()?;

        let params = NodeParams {
            shape: nsplits.to_shape(),
            ..params
        };
        let op = Arc::new(Self {
            key: OpKey::generate(),
            output_types: [output_type],
            partitions,
            nsplits,
        });
        Ok(TileableData::new(op, output_type, 0, params))
    }

    /// A table split into row blocks sharing one schema.
    pub fn frame_row_blocks(blocks: Vec<RecordBatch>) -> TesselResult<TileableRef> {
        Self::frame_grid(blocks.into_iter().map(|b| vec![b]).collect())
    }

    /// A table split into a grid of blocks: `grid[row][col]`.
    ///
    /// Blocks in one grid row share a row count; blocks in one grid column
    /// share their fields.
    pub fn frame_grid(grid: Vec<Vec<RecordBatch>>) -> TesselResult<TileableRef> {
        let first_row = grid
            .first()
            .ok_or_else(|| TesselError::value_error("a table needs at least one block"))?;
        let col_splits: Vec<Dim> = first_row.iter().map(|b| Dim::Known(b.num_columns())).collect();
        let columns: Vec<String> = first_row
            .iter()
            .flat_map(|b| {
                b.schema()
                    .fields()
                    .iter()
                    .map(|f| f.name().clone())
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut row_splits = Vec::with_capacity(grid.len());
        let mut partitions = Vec::new();
        for (r, row) in grid.into_iter().enumerate() {
            if row.len() != col_splits.len() {
                return Err(TesselError::value_error(format!(
                    "block row {r} has {} blocks, expected {}",
                    row.len(),
                    col_splits.len()
                )));
            }
            let rows = row.first().map_or(0, RecordBatch::num_rows);
            for (c, block) in row.into_iter().enumerate() {
                if block.num_rows() != rows || Dim::Known(block.num_columns()) != col_splits[c] {
                    return Err(TesselError::value_error(format!(
                        "block ({r}, {c}) does not match its grid row and column"
                    )));
                }
                partitions.push((ChunkIndex::new(vec![r, c]), Value::DataFrame(block)));
            }
            row_splits.push(Dim::Known(rows));
        }

        Self::from_partitions(
            OutputType::DataFrame,
            NodeParams::default().columns(columns),
            partitions,
            NSplits::new(vec![row_splits, col_splits]),
        )
    }

    /// A named column split into blocks.
    pub fn series_blocks(name: impl Into<String>, blocks: Vec<ArrayRef>) -> TesselResult<TileableRef> {
        let name = name.into();
        let splits = blocks.iter().map(|b| Dim::Known(b.len())).collect();
        let partitions = blocks
            .into_iter()
            .enumerate()
            .map(|(i, b)| {
                (
                    ChunkIndex::new(vec![i]),
                    Value::Series(SeriesValue::new(name.clone(), b)),
                )
            })
            .collect();
        Self::from_partitions(
            OutputType::Series,
            NodeParams::default().name(name),
            partitions,
            NSplits::new(vec![splits]),
        )
    }

    /// Row labels split into blocks.
    pub fn index_blocks(blocks: Vec<ArrayRef>) -> TesselResult<TileableRef> {
        let splits = blocks.iter().map(|b| Dim::Known(b.len())).collect();
        let partitions = blocks
            .into_iter()
            .enumerate()
            .map(|(i, b)| (ChunkIndex::new(vec![i]), Value::Index(b)))
            .collect();
        Self::from_partitions(
            OutputType::Index,
            NodeParams::default(),
            partitions,
            NSplits::new(vec![splits]),
        )
    }

    /// A tensor held in a single block.
    pub fn tensor(tensor: TensorValue) -> TesselResult<TileableRef> {
        let ndim = tensor.ndim();
        let splits = tensor.shape().iter().map(|&n| vec![Dim::Known(n)]).collect();
        Self::from_partitions(
            OutputType::Tensor,
            NodeParams::default(),
            vec![(ChunkIndex::zeros(ndim), Value::Tensor(tensor))],
            NSplits::new(splits),
        )
    }

    /// A plain object in a single chunk.
    pub fn object(value: Value) -> TileableRef {
        let op = Arc::new(Self {
            key: OpKey::generate(),
            output_types: [OutputType::Object],
            partitions: vec![Partition {
                index: ChunkIndex::zeros(0),
                value,
                params: NodeParams::default(),
            }],
            nsplits: NSplits::default(),
        });
        TileableData::new(op, OutputType::Object, 0, NodeParams::default())
    }
}

/// Chunk metadata: the node's labels narrowed to what the partition holds.
fn partition_params(node: &NodeParams, value: &Value, shape: Shape) -> NodeParams {
    let columns = match value {
        Value::DataFrame(batch) => Some(
            batch
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect(),
        ),
        _ => node.columns.clone(),
    };
    NodeParams {
        shape,
        columns,
        name: node.name.clone(),
    }
}

impl Operand for DataSource {
    fn op_type(&self) -> &'static OpType {
        &DATA_SOURCE
    }

    fn key(&self) -> OpKey {
        self.key
    }

    fn inputs(&self) -> &[TileableRef] {
        &[]
    }

    fn output_types(&self) -> &[OutputType] {
        &self.output_types
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn tile(&self, outputs: &[TileableRef]) -> TesselResult<Box<dyn TileTask>> {
        let out = outputs
            .first()
            .ok_or_else(|| TesselError::internal(format!("{} tiled without outputs", self.key)))?;
        let output_type = self.output_types[0];
        let chunks: Vec<ChunkRef> = self
            .partitions
            .iter()
            .map(|p| {
                let key = ChunkKey::generate();
                let op: OperandRef = Arc::new(DataSourceChunk {
                    key: OpKey::generate(),
                    source_key: self.key,
                    output_types: [output_type],
                    output_keys: [key],
                    value: p.value.clone(),
                });
                ChunkData::new(key, op, output_type, 0, p.index.clone(), p.params.clone())
            })
            .collect();
        debug!("Tiled data source {} into {} chunks", self.key, chunks.len());
        Ok(Ready::boxed(vec![out.with_layout(chunks, self.nsplits.clone())]))
    }
}

/// Stores one [`DataSource`] partition when executed.
#[derive(Debug)]
pub struct DataSourceChunk {
    key: OpKey,
    source_key: OpKey,
    output_types: [OutputType; 1],
    output_keys: [ChunkKey; 1],
    value: Value,
}

impl Operand for DataSourceChunk {
    fn op_type(&self) -> &'static OpType {
        &DATA_SOURCE_CHUNK
    }

    fn key(&self) -> OpKey {
        self.key
    }

    fn inputs(&self) -> &[TileableRef] {
        &[]
    }

    fn output_keys(&self) -> &[ChunkKey] {
        &self.output_keys
    }

    fn output_types(&self) -> &[OutputType] {
        &self.output_types
    }

    fn tileable_op_key(&self) -> Option<OpKey> {
        Some(self.source_key)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn execute(&self, ctx: &dyn ExecutionContext) -> TesselResult<()> {
        ctx.set(self.output_keys[0], self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::tile::{TileContext, TileStep};

    fn block(fields: &[&str], rows: usize) -> RecordBatch {
        let schema = Arc::new(Schema::new(
            fields
                .iter()
                .map(|f| Field::new(*f, DataType::Int64, false))
                .collect::<Vec<_>>(),
        ));
        let columns = fields
            .iter()
            .map(|_| Arc::new(Int64Array::from(vec![0i64; rows])) as ArrayRef)
            .collect();
        RecordBatch::try_new(schema, columns).unwrap()
    }

    fn tile(source: &TileableRef) -> TileableRef {
        let mut task = source.op().tile(&[source.clone()]).unwrap();
        match task.resume(&TileContext::new()).unwrap() {
            TileStep::Done(mut tiled) => tiled.remove(0),
            step => panic!("unexpected step {step:?}"),
        }
    }

    #[test]
    fn test_frame_grid_layout() {
        let source = DataSource::frame_grid(vec![
            vec![block(&["a"], 2), block(&["b", "c"], 2)],
            vec![block(&["a"], 3), block(&["b", "c"], 3)],
        ])
        .unwrap();
        assert_eq!(source.params().shape, Shape::known(&[5, 3]));
        assert_eq!(source.columns(), &["a", "b", "c"]);

        let tiled = tile(&source);
        assert_eq!(tiled.key(), source.key());
        assert_eq!(tiled.chunks().len(), 4);
        assert_eq!(tiled.nsplits().unwrap().chunk_shape(), vec![2, 2]);
        let last = &tiled.chunks()[3];
        assert_eq!(last.index(), &ChunkIndex::new(vec![1, 1]));
        assert_eq!(last.params().shape, Shape::known(&[3, 2]));
        assert_eq!(last.params().column_labels(), &["b", "c"]);
    }

    #[test]
    fn test_mismatched_grid_rejected() {
        let err = DataSource::frame_grid(vec![vec![block(&["a"], 2), block(&["b"], 3)]]).unwrap_err();
        assert!(matches!(err, TesselError::ValueError(_)));
        assert!(DataSource::frame_grid(vec![]).is_err());
    }

    #[test]
    fn test_partitions_must_cover_layout() {
        let err = DataSource::from_partitions(
            OutputType::Series,
            NodeParams::default(),
            vec![(ChunkIndex::new(vec![3]), Value::Null)],
            NSplits::new(vec![vec![Dim::Known(1)]]),
        )
        .unwrap_err();
        assert!(matches!(err, TesselError::ValueError(_)));
    }

    #[test]
    fn test_series_blocks_keep_name() {
        let blocks: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec!["x", "y"])),
            Arc::new(StringArray::from(vec!["z"])),
        ];
        let source = DataSource::series_blocks("s", blocks).unwrap();
        assert_eq!(source.name(), Some("s"));
        assert_eq!(source.params().shape, Shape::known(&[3]));
        let tiled = tile(&source);
        assert_eq!(tiled.chunks()[1].params().name.as_deref(), Some("s"));
        assert_eq!(tiled.chunks()[1].params().shape, Shape::known(&[1]));
    }

    #[test]
    fn test_object_is_single_chunk() {
        let source = DataSource::object(Value::from("v"));
        let tiled = tile(&source);
        assert_eq!(tiled.chunks().len(), 1);
        assert_eq!(tiled.chunks()[0].index(), &ChunkIndex::zeros(0));
        assert_eq!(tiled.chunks()[0].op().output_keys(), &[tiled.chunks()[0].key()]);
    }

    #[test]
    fn test_tensor_is_single_block() {
        let tensor = TensorValue::new(vec![2, 3], vec![0.0; 6]).unwrap();
        let source = DataSource::tensor(tensor).unwrap();
        assert_eq!(source.output_type(), OutputType::Tensor);
        assert_eq!(source.params().shape, Shape::known(&[2, 3]));

        let tiled = tile(&source);
        assert_eq!(tiled.chunks().len(), 1);
        assert_eq!(tiled.chunks()[0].index(), &ChunkIndex::zeros(2));
        assert_eq!(
            tiled.nsplits().unwrap(),
            &NSplits::new(vec![vec![Dim::Known(2)], vec![Dim::Known(3)]])
        );
    }

    #[test]
    fn test_index_blocks_layout() {
        let blocks: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![0, 1, 2])),
            Arc::new(Int64Array::from(vec![3])),
        ];
        let source = DataSource::index_blocks(blocks).unwrap();
        assert_eq!(source.output_type(), OutputType::Index);
        assert_eq!(source.params().shape, Shape::known(&[4]));

        let tiled = tile(&source);
        assert_eq!(tiled.chunks().len(), 2);
        assert_eq!(tiled.chunks()[1].index(), &ChunkIndex::new(vec![1]));
        assert_eq!(tiled.chunks()[1].params().shape, Shape::known(&[1]));
    }
}
