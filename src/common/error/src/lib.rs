//! Error types and result aliases for tessel.
//!
//! One enum covers every layer: construction-time configuration mistakes,
//! execution-time arity and task failures, and transparent wrappers around
//! the third-party errors the workspace touches.

mod error;

pub use error::{GenericError, TesselError, TesselResult};
