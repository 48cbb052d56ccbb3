//! Graph layer for tessel.
//!
//! Logical nodes (tileables) are produced by operands and lowered into
//! chunk graphs by the tiling protocol in [`tile`]. Operand types carry an
//! explicit ancestor chain ([`OpType`]) so optimizer lookups can fall back
//! from a specific type to a more general one.

pub mod args;
pub mod context;
pub mod graph;
pub mod node;
pub mod operand;
pub mod ops;
pub mod optype;
pub mod tile;

pub use args::{find_tileables, Arg};
pub use context::ExecutionContext;
pub use graph::{ChunkGraph, TileableGraph};
pub use node::{ChunkData, ChunkRef, TileableData, TileableRef, TiledLayout};
pub use operand::{Operand, OperandHints, OperandRef};
pub use optype::{OpType, DATAFRAME_OPERAND, DATA_SOURCE, OPERAND};
pub use tile::{
    BlackBoxOperand, BlackBoxTiler, LoweredInputs, Ready, TileContext, TileStep, TileTask,
};
