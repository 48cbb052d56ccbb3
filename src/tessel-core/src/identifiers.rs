//! Keys identifying operands, logical nodes and chunks.
//!
//! Keys are process-unique and never reused. Copying an operand for a chunk
//! or re-emitting a tiled logical node always mints a fresh key.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

fn next_key() -> u64 {
    NEXT_KEY.fetch_add(1, Ordering::Relaxed)
}

macro_rules! define_key {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Mint a fresh, never-before-seen key.
            pub fn generate() -> Self {
                Self(next_key())
            }

            /// Raw numeric value of the key.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

define_key!(
    /// Identity of an operand instance (logical or chunk level).
    OpKey,
    "op"
);

define_key!(
    /// Identity of a logical node.
    TileableKey,
    "tileable"
);

define_key!(
    /// Identity of a chunk node; also the key of its value in an execution context.
    ChunkKey,
    "chunk"
);
