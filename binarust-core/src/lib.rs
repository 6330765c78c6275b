//! # BinaRust core
//!
//! A small CPU tensor library with reverse-mode autograd, built around the
//! binary-connect affine operator: an affine layer whose weights are binarized
//! (sign, zero mapped to -1) before the matrix multiply, while gradients flow
//! back to the underlying float weights.

// Crate modules
pub mod autograd;
pub mod buffer;
pub mod context;
pub mod device;
pub mod error;
pub mod nn;
pub mod ops;
pub mod tensor;
pub mod tensor_data;
pub mod types;
pub mod utils;

// Re-exports for `binarust_core::Tensor`, etc.
pub use buffer::{Buffer, CpuBuffer};
pub use context::{list_context, Backend, Context};
pub use device::StorageDevice;
pub use error::BinaRustError;
pub use tensor::Tensor;
pub use types::DType;

pub use ops::linalg::affine::affine_op;
pub use ops::linalg::binary_connect_affine::{binary_connect_affine_op, BinaryConnectAffineConfig};
pub use ops::quantize::binarize::binarize_op;
pub use ops::view::shift::{shift_op, BorderMode, ShiftConfig};

// Re-export traits required by public functions/structs
pub use num_traits;
