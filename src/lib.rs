//! tessel - tiling and task-dispatch core for distributed dataframe and
//! tensor computation.
//!
//! Logical graphs are built from operands, pruned with per-operand column
//! selectors, lowered into chunk graphs by the tiling protocol and executed
//! chunk by chunk against an execution context.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export core crates
pub use common_config as config;
pub use common_error as error;
pub use tessel_core as core;
pub use tessel_graph as graph;
pub use tessel_optimizer as optimizer;
pub use tessel_remote as remote;
pub use tessel_runtime as runtime;

pub use common_error::{TesselError, TesselResult};
pub use tessel_remote::{spawn, SpawnOutput};
pub use tessel_runtime::LocalRuntime;

/// tessel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
