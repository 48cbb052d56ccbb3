//! Reference in-process runtime for tessel.
//!
//! Drives the tiling protocol over a logical graph, executes the resulting
//! chunk graph on tokio's blocking pool and stores chunk values in an
//! in-memory execution context.

mod context;
mod driver;
mod executor;
mod local;

pub use context::InMemoryContext;
pub use driver::TileDriver;
pub use executor::{ChunkExecutor, LocalExecutor};
pub use local::LocalRuntime;
