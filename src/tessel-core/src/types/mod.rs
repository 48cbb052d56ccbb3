//! Type system: output kinds, shape metadata and runtime values.

mod output;
mod shape;
mod value;

pub use output::OutputType;
pub use shape::{ChunkIndex, Dim, NSplits, Shape};
pub use value::{FetchHandle, SeriesValue, TensorValue, Value};
