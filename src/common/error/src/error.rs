//! Core error types for tessel.

use thiserror::Error;

/// Result type alias using `TesselError`.
pub type TesselResult<T> = std::result::Result<T, TesselError>;

/// Generic boxed error for external error sources.
pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for tessel operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TesselError {
    /// Type mismatch or invalid type operation.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Invalid value provided.
    #[error("ValueError: {0}")]
    ValueError(String),

    /// Construction-time configuration error (duplicate registration,
    /// unexpected parameters, malformed config files).
    #[error("ConfigError: {0}")]
    ConfigError(String),

    /// A user-supplied task function failed.
    #[error("TaskFailed: operand {op}: {message}")]
    TaskFailed {
        /// Key of the chunk operand that failed.
        op: String,
        /// Failure reported by the function.
        message: String,
    },

    /// No value stored in the execution context under the given key.
    #[error("KeyNotFound: {0}")]
    KeyNotFound(String),

    /// Graph structure error.
    #[error("GraphError: {0}")]
    GraphError(String),

    /// Execution error raised by the runtime itself.
    #[error("ExecutionError: {0}")]
    ExecutionError(String),

    /// Feature not implemented for this operand.
    #[error("NotImplemented: {0}")]
    NotImplemented(String),

    /// Internal error (bug in tessel).
    #[error("InternalError: {0}")]
    InternalError(String),

    /// IO error.
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error.
    #[error("ArrowError: {0}")]
    ArrowError(#[from] arrow_schema::ArrowError),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// External error from third-party libraries.
    #[error("ExternalError: {0}")]
    ExternalError(GenericError),
}

impl TesselError {
    /// Create a new `TypeError`.
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a new `ValueError`.
    pub fn value_error<S: Into<String>>(msg: S) -> Self {
        Self::ValueError(msg.into())
    }

    /// Create a new `ConfigError`.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new `TaskFailed` error for the given operand key.
    pub fn task_failed<K: ToString, S: Into<String>>(op: K, msg: S) -> Self {
        Self::TaskFailed {
            op: op.to_string(),
            message: msg.into(),
        }
    }

    /// Create a new `KeyNotFound` error.
    pub fn key_not_found<K: ToString>(key: K) -> Self {
        Self::KeyNotFound(key.to_string())
    }

    /// Create a new `GraphError`.
    pub fn graph<S: Into<String>>(msg: S) -> Self {
        Self::GraphError(msg.into())
    }

    /// Create a new `ExecutionError`.
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// Create a new `NotImplemented` error.
    pub fn not_implemented<S: Into<String>>(msg: S) -> Self {
        Self::NotImplemented(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Whether this error came out of a user task function.
    pub fn is_task_failure(&self) -> bool {
        matches!(self, Self::TaskFailed { .. })
    }
}

/// Ensure a condition holds, returning an `ExecutionError` if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::TesselError::ExecutionError($msg.to_string()));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::TesselError::$variant(format!($($msg)*)));
        }
    };
}

/// Return early with a `ValueError`.
#[macro_export]
macro_rules! value_err {
    ($($arg:tt)*) => {
        return Err($crate::TesselError::ValueError(format!($($arg)*)))
    };
}

/// Return early with a `TypeError`.
#[macro_export]
macro_rules! type_err {
    ($($arg:tt)*) => {
        return Err($crate::TesselError::TypeError(format!($($arg)*)))
    };
}

/// Return early with a `ConfigError`.
#[macro_export]
macro_rules! config_err {
    ($($arg:tt)*) => {
        return Err($crate::TesselError::ConfigError(format!($($arg)*)))
    };
}
