//! # Tensor Operations Module (`ops`)
//!
//! Operations are grouped into submodules by functionality:
//!
//! - [`quantize`]: weight quantization (binarize).
//! - [`linalg`]: affine and binary-connect affine.
//! - [`view`]: data-movement operations (shift).
//!
//! Each operation has an `xxx_op` function that validates its inputs, dispatches on
//! the runtime `DType` to a generic kernel, and attaches a `Backward` struct
//! implementing [`BackwardOp`](crate::autograd::BackwardOp) when gradients are required.

pub mod linalg;
pub mod quantize;
pub mod traits;
pub mod view;

use crate::device::StorageDevice;
use crate::error::BinaRustError;
use crate::tensor::Tensor;
use crate::types::DType;

/// Checks that all tensors live on the CPU and share one dtype; returns that dtype.
pub(crate) fn check_cpu_same_dtype(tensors: &[&Tensor], op_name: &str) -> Result<DType, BinaRustError> {
    let first = tensors.first().ok_or_else(|| {
        BinaRustError::InternalError(format!("{}: no input tensors", op_name))
    })?;
    let dtype = first.dtype();
    for tensor in tensors {
        if tensor.device() != StorageDevice::CPU {
            return Err(BinaRustError::DeviceMismatch {
                expected: StorageDevice::CPU,
                actual: tensor.device(),
                operation: op_name.to_string(),
            });
        }
        if tensor.dtype() != dtype {
            return Err(BinaRustError::DataTypeMismatch {
                expected: dtype,
                actual: tensor.dtype(),
                operation: op_name.to_string(),
            });
        }
    }
    Ok(dtype)
}
