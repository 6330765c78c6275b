use crate::buffer::CpuBuffer;
use crate::error::BinaRustError;
use crate::tensor::Tensor;
use crate::types::DType;
use num_traits::{Float, NumAssignOps};
use std::fmt::Debug;
use std::sync::Arc;

/// A trait representing the element types usable in BinaRust kernels (`f32`, `f64`).
///
/// Kernels are written once, generically over `T: Numeric`, and operations
/// dispatch on the runtime `DType` of their inputs.
pub trait Numeric: Float + NumAssignOps + Debug + Send + Sync + 'static {
    /// The runtime tag matching `Self`.
    const DTYPE: DType;

    /// Reads the (contiguous) elements of `tensor`, which must have dtype `Self::DTYPE`.
    fn read_tensor(tensor: &Tensor) -> Result<Vec<Self>, BinaRustError>;

    /// Wraps `data` into a CPU buffer variant.
    fn into_cpu_buffer(data: Vec<Self>) -> CpuBuffer;

    /// Builds a new leaf tensor from `data`.
    fn into_tensor(data: Vec<Self>, shape: Vec<usize>) -> Result<Tensor, BinaRustError>;

    /// Lossy conversion from an `f64` configuration value.
    fn from_f64_lossy(value: f64) -> Self;
}

impl Numeric for f32 {
    const DTYPE: DType = DType::F32;

    fn read_tensor(tensor: &Tensor) -> Result<Vec<Self>, BinaRustError> {
        tensor.get_f32_data()
    }

    fn into_cpu_buffer(data: Vec<Self>) -> CpuBuffer {
        CpuBuffer::F32(Arc::new(data))
    }

    fn into_tensor(data: Vec<Self>, shape: Vec<usize>) -> Result<Tensor, BinaRustError> {
        Tensor::new(data, shape)
    }

    fn from_f64_lossy(value: f64) -> Self {
        value as f32
    }
}

impl Numeric for f64 {
    const DTYPE: DType = DType::F64;

    fn read_tensor(tensor: &Tensor) -> Result<Vec<Self>, BinaRustError> {
        tensor.get_f64_data()
    }

    fn into_cpu_buffer(data: Vec<Self>) -> CpuBuffer {
        CpuBuffer::F64(Arc::new(data))
    }

    fn into_tensor(data: Vec<Self>, shape: Vec<usize>) -> Result<Tensor, BinaRustError> {
        Tensor::new_f64(data, shape)
    }

    fn from_f64_lossy(value: f64) -> Self {
        value
    }
}
