//! Logical nodes (tileables) and their physical chunks.

use std::fmt;
use std::sync::Arc;

use tessel_core::{ChunkIndex, ChunkKey, FetchHandle, NSplits, NodeParams, OutputType, TileableKey};

use crate::operand::OperandRef;

/// Shared handle to a logical node.
pub type TileableRef = Arc<TileableData>;

/// Shared handle to a chunk node.
pub type ChunkRef = Arc<ChunkData>;

/// A logical node: a typed handle to a distributed value.
///
/// Untiled nodes carry no chunks. Tiling produces a copy under the same key
/// whose layout lists exactly the chunks that make up the value.
#[derive(Clone)]
pub struct TileableData {
    key: TileableKey,
    op: OperandRef,
    output_type: OutputType,
    output_index: usize,
    params: NodeParams,
    layout: Option<TiledLayout>,
}

/// Chunks and partition boundaries of a tiled node.
#[derive(Debug, Clone)]
pub struct TiledLayout {
    /// Chunks in position order.
    pub chunks: Vec<ChunkRef>,
    /// Per-axis partition extents.
    pub nsplits: NSplits,
}

impl TileableData {
    /// Create an untiled node for output `output_index` of `op`.
    pub fn new(
        op: OperandRef,
        output_type: OutputType,
        output_index: usize,
        params: NodeParams,
    ) -> TileableRef {
        Arc::new(Self {
            key: TileableKey::generate(),
            op,
            output_type,
            output_index,
            params,
            layout: None,
        })
    }

    /// Copy this node with a tiled layout, keeping its key.
    ///
    /// Chunks are sorted into position order.
    pub fn with_layout(&self, mut chunks: Vec<ChunkRef>, nsplits: NSplits) -> TileableRef {
        chunks.sort_by(|a, b| a.index().cmp(b.index()));
        Arc::new(Self {
            layout: Some(TiledLayout { chunks, nsplits }),
            ..self.clone()
        })
    }

    /// Node key.
    pub fn key(&self) -> TileableKey {
        self.key
    }

    /// Producing operand.
    pub fn op(&self) -> &OperandRef {
        &self.op
    }

    /// Declared output kind.
    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    /// Position among the producing operand's outputs.
    pub fn output_index(&self) -> usize {
        self.output_index
    }

    /// Metadata.
    pub fn params(&self) -> &NodeParams {
        &self.params
    }

    /// Known column labels of a tabular node.
    pub fn columns(&self) -> &[String] {
        self.params.column_labels()
    }

    /// Name of a single-column node.
    pub fn name(&self) -> Option<&str> {
        self.params.name.as_deref()
    }

    /// Whether the node has been tiled.
    pub fn is_tiled(&self) -> bool {
        self.layout.is_some()
    }

    /// Tiled layout, if tiled.
    pub fn layout(&self) -> Option<&TiledLayout> {
        self.layout.as_ref()
    }

    /// Chunks in position order; empty when untiled.
    pub fn chunks(&self) -> &[ChunkRef] {
        self.layout.as_ref().map_or(&[], |l| l.chunks.as_slice())
    }

    /// Partition boundaries, if tiled.
    pub fn nsplits(&self) -> Option<&NSplits> {
        self.layout.as_ref().map(|l| &l.nsplits)
    }

    /// `(position-index, chunk-key)` pairs in position order.
    pub fn chunk_pairs(&self) -> Vec<(ChunkIndex, ChunkKey)> {
        self.chunks()
            .iter()
            .map(|c| (c.index().clone(), c.key()))
            .collect()
    }

    /// Fetch handle describing this node's chunks.
    pub fn fetch_handle(&self) -> FetchHandle {
        FetchHandle {
            tileable: self.key,
            output_type: self.output_type,
            chunks: self.chunk_pairs(),
        }
    }
}

impl fmt::Debug for TileableData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileableData")
            .field("key", &self.key)
            .field("op", &self.op.op_type().name())
            .field("output_type", &self.output_type)
            .field("output_index", &self.output_index)
            .field("shape", &self.params.shape)
            .field("chunks", &self.chunks().len())
            .finish()
    }
}

/// A physical chunk: one independently schedulable fragment of a node.
pub struct ChunkData {
    key: ChunkKey,
    op: OperandRef,
    output_type: OutputType,
    output_index: usize,
    index: ChunkIndex,
    params: NodeParams,
    collapse_axis: Option<usize>,
}

impl ChunkData {
    /// Create chunk `output_index` of chunk-level operand `op` under a
    /// pre-assigned key.
    ///
    /// Keys are minted before the operand so the operand can record where its
    /// results go.
    pub fn new(
        key: ChunkKey,
        op: OperandRef,
        output_type: OutputType,
        output_index: usize,
        index: ChunkIndex,
        params: NodeParams,
    ) -> ChunkRef {
        Arc::new(Self {
            key,
            op,
            output_type,
            output_index,
            index,
            params,
            collapse_axis: None,
        })
    }

    /// Same as [`ChunkData::new`], recording an axis to collapse once the
    /// real output kind is known.
    pub fn with_collapse_axis(
        key: ChunkKey,
        op: OperandRef,
        output_type: OutputType,
        output_index: usize,
        index: ChunkIndex,
        params: NodeParams,
        collapse_axis: usize,
    ) -> ChunkRef {
        Arc::new(Self {
            key,
            op,
            output_type,
            output_index,
            index,
            params,
            collapse_axis: Some(collapse_axis),
        })
    }

    /// Chunk key; also the execution-context key of its value.
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// Producing chunk-level operand.
    pub fn op(&self) -> &OperandRef {
        &self.op
    }

    /// Declared output kind.
    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    /// Position among the producing operand's outputs.
    pub fn output_index(&self) -> usize {
        self.output_index
    }

    /// Coordinate within the partitioned whole.
    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    /// Metadata.
    pub fn params(&self) -> &NodeParams {
        &self.params
    }

    /// Axis to collapse for `df_or_series` outputs.
    pub fn collapse_axis(&self) -> Option<usize> {
        self.collapse_axis
    }
}

impl fmt::Debug for ChunkData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkData")
            .field("key", &self.key)
            .field("op", &self.op.key())
            .field("output_type", &self.output_type)
            .field("index", &self.index)
            .field("shape", &self.params.shape)
            .finish()
    }
}
