//! Arbitrary user functions as graph nodes.
//!
//! [`spawn`] wraps a function and its arguments into a [`RemoteFunction`]
//! operand. Logical nodes found anywhere in the arguments become inputs;
//! at execution they are replaced by their values, or by fetch handles for
//! distributed inputs the function did not ask to materialize.

mod function;
mod spawn;

pub use function::{RemoteFunction, UserFn, UserFunction, REMOTE_FUNCTION};
pub use spawn::{spawn, spawn_named, Spawn, SpawnOutput};
