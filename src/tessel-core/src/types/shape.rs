//! Shape and partition metadata with explicit unknown placeholders.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Extent along one axis: either known or not knowable before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    /// Known extent.
    Known(usize),
    /// Extent only known after the producing chunk executes.
    Unknown,
}

impl Dim {
    /// The extent, if known.
    pub fn known(self) -> Option<usize> {
        match self {
            Self::Known(n) => Some(n),
            Self::Unknown => None,
        }
    }
}

impl From<usize> for Dim {
    fn from(n: usize) -> Self {
        Self::Known(n)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(n) => write!(f, "{n}"),
            Self::Unknown => f.write_str("?"),
        }
    }
}

/// Shape of a node or chunk. A zero-length shape describes a scalar or object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape(Vec<Dim>);

impl Shape {
    /// Create a shape from per-axis extents.
    pub fn new(dims: Vec<Dim>) -> Self {
        Self(dims)
    }

    /// Fully known shape.
    pub fn known(dims: &[usize]) -> Self {
        Self(dims.iter().copied().map(Dim::Known).collect())
    }

    /// Shape with `ndim` unknown axes.
    pub fn unknown(ndim: usize) -> Self {
        Self(vec![Dim::Unknown; ndim])
    }

    /// Empty shape for scalars and objects.
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Per-axis extents.
    pub fn dims(&self) -> &[Dim] {
        &self.0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str(")")
    }
}

/// Per-axis partition boundaries of a tiled node.
///
/// `nsplits.axis(k)[p]` is the extent of partition `p` along axis `k`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NSplits(Vec<Vec<Dim>>);

impl NSplits {
    /// Create from per-axis partition extents.
    pub fn new(splits: Vec<Vec<Dim>>) -> Self {
        Self(splits)
    }

    /// One unknown-sized partition on each of `ndim` axes.
    pub fn single_unknown(ndim: usize) -> Self {
        Self(vec![vec![Dim::Unknown]; ndim])
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Partition extents along one axis.
    pub fn axis(&self, axis: usize) -> &[Dim] {
        self.0.get(axis).map_or(&[], Vec::as_slice)
    }

    /// Number of partitions along each axis.
    pub fn chunk_shape(&self) -> Vec<usize> {
        self.0.iter().map(Vec::len).collect()
    }

    /// Total extent along each axis, unknown if any partition is unknown.
    pub fn to_shape(&self) -> Shape {
        Shape::new(
            self.0
                .iter()
                .map(|axis| {
                    axis.iter()
                        .try_fold(0usize, |acc, d| d.known().map(|n| acc + n))
                        .map_or(Dim::Unknown, Dim::Known)
                })
                .collect(),
        )
    }

    /// Whether `index` addresses a partition inside these boundaries.
    pub fn contains(&self, index: &ChunkIndex) -> bool {
        index.ndim() == self.ndim()
            && index
                .coords()
                .iter()
                .zip(&self.0)
                .all(|(pos, axis)| *pos < axis.len())
    }
}

/// Coordinate of a chunk inside its partitioned whole.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ChunkIndex(Vec<usize>);

impl ChunkIndex {
    /// Create a position index.
    pub fn new(coords: Vec<usize>) -> Self {
        Self(coords)
    }

    /// The single-chunk coordinate with `ndim` zeros.
    pub fn zeros(ndim: usize) -> Self {
        Self(vec![0; ndim])
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Raw coordinates.
    pub fn coords(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for ChunkIndex {
    fn from(coords: Vec<usize>) -> Self {
        Self(coords)
    }
}

impl fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
