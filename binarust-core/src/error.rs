use crate::device::StorageDevice;
use crate::types::DType;
use thiserror::Error;

/// Custom error type for the BinaRust framework.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum BinaRustError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Incompatible shapes for operation {operation}: {shape1:?} and {shape2:?}")]
    IncompatibleShapes {
        shape1: Vec<usize>,
        shape2: Vec<usize>,
        operation: String,
    },

    #[error("Base axis {base_axis} is out of range for input of rank {rank} in {operation}")]
    InvalidBaseAxis {
        base_axis: isize,
        rank: usize,
        operation: String,
    },

    #[error("Invalid argument for {operation}: {message}")]
    InvalidArgument { operation: String, message: String },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Data type mismatch for operation '{operation}': expected {expected:?}, got {actual:?}")]
    DataTypeMismatch {
        expected: DType,
        actual: DType,
        operation: String,
    },

    #[error("Device mismatch for operation '{operation}': expected {expected:?}, got {actual:?}")]
    DeviceMismatch {
        expected: StorageDevice,
        actual: StorageDevice,
        operation: String,
    },

    #[error("Backward called on non-scalar tensor without explicit gradient.")]
    BackwardNonScalar,

    #[error("Backward pass error: {0}")]
    BackwardError(String),

    #[error("Cycle detected in the computation graph during backward pass.")]
    CycleDetected,

    #[error("Failed to acquire {lock_type} lock: {reason}")]
    LockError { lock_type: String, reason: String },

    #[error("Function '{0}' is not registered")]
    UnknownFunction(String),

    #[error("Cannot parse execution context from '{0}'")]
    InvalidContext(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}
