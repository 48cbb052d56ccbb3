//! Core data model for tessel.
//!
//! This crate provides the types every other layer builds on:
//! - [`Value`] and its Arrow-backed tabular variants
//! - [`OutputType`], the declared kind of a node
//! - [`Dim`], [`Shape`], [`NSplits`] and [`ChunkIndex`] with explicit
//!   unknown placeholders
//! - process-unique keys for operands, logical nodes and chunks
//! - [`merge_chunks`], which reassembles chunk values by position

pub mod identifiers;
pub mod merge;
pub mod params;
pub mod types;

pub use identifiers::{ChunkKey, OpKey, TileableKey};
pub use merge::{coerce_to_output_type, merge_chunks};
pub use params::NodeParams;
pub use types::{
    ChunkIndex, Dim, FetchHandle, NSplits, OutputType, SeriesValue, Shape, TensorValue, Value,
};
