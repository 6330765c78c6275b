//! Reverse-mode automatic differentiation.
//!
//! Every differentiable operation attaches a [`BackwardOp`] to its output.
//! [`Tensor::backward`](crate::tensor::Tensor::backward) walks the resulting
//! graph in reverse topological order and accumulates gradients into leaves.

pub mod backward_op;
pub mod grad_check;
pub mod graph;

pub use backward_op::BackwardOp;
pub use graph::{topological_sort, NodeId};

use crate::error::BinaRustError;
use crate::tensor::Tensor;
use crate::types::DType;

/// Element-wise sum of two gradients of identical shape and dtype.
pub(crate) fn add_gradients(existing: &Tensor, incoming: &Tensor) -> Result<Tensor, BinaRustError> {
    let shape = existing.shape();
    if incoming.shape() != shape {
        return Err(BinaRustError::ShapeMismatch {
            expected: shape,
            actual: incoming.shape(),
            operation: "add_gradients".to_string(),
        });
    }
    let dtype = existing.dtype();
    if incoming.dtype() != dtype {
        return Err(BinaRustError::DataTypeMismatch {
            expected: dtype,
            actual: incoming.dtype(),
            operation: "add_gradients".to_string(),
        });
    }
    match dtype {
        DType::F32 => {
            let a = existing.get_f32_data()?;
            let b = incoming.get_f32_data()?;
            Tensor::new(a.iter().zip(&b).map(|(x, y)| x + y).collect(), shape)
        }
        DType::F64 => {
            let a = existing.get_f64_data()?;
            let b = incoming.get_f64_data()?;
            Tensor::new_f64(a.iter().zip(&b).map(|(x, y)| x + y).collect(), shape)
        }
    }
}
