// src/tensor_data.rs
use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::buffer::{Buffer, CpuBuffer};
use crate::device::StorageDevice;
use crate::error::BinaRustError;
use crate::tensor::utils::calculate_strides;
use crate::tensor::Tensor;
use crate::types::DType;

/// Internal storage and metadata for a Tensor.
///
/// This struct holds the actual data buffer, shape, strides, device,
/// data type, and autograd-related information.
/// It is wrapped in `Arc<RwLock<TensorData>>` by the `Tensor` struct
/// to allow shared ownership and interior mutability.
#[derive(Debug)]
pub struct TensorData {
    /// The underlying data buffer holding typed data.
    /// Wrapped in Arc for cheap sharing (e.g. by `detach`).
    pub(crate) buffer: Arc<Buffer>,
    /// The device where the buffer resides.
    pub(crate) device: StorageDevice,
    /// The data type of the elements in the buffer.
    pub(crate) dtype: DType,

    // --- Metadata ---
    /// The shape (dimensions) of the tensor.
    pub(crate) shape: Vec<usize>,
    /// The strides for each dimension.
    pub(crate) strides: Vec<usize>,
    /// The offset into the buffer for the first element.
    pub(crate) offset: usize,

    // --- Autograd Metadata ---
    /// Flag indicating if the tensor requires gradient computation.
    pub(crate) requires_grad: bool,
    /// Gradient accumulated by backward passes, same shape and dtype as this tensor.
    pub(crate) grad: Option<Tensor>,
    /// The operation that produced this tensor. Leaf tensors have `grad_fn = None`.
    pub(crate) grad_fn: Option<Arc<dyn BackwardOp + Send + Sync>>,
}

impl TensorData {
    /// Creates a new `TensorData` instance with the given f32 data and shape on the CPU.
    ///
    /// # Errors
    /// Returns `BinaRustError::TensorCreationError` if the length of `data_vec` does not match
    /// the total number of elements specified by `shape`.
    pub fn new(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, BinaRustError> {
        Self::from_cpu_buffer(CpuBuffer::F32(Arc::new(data_vec)), shape)
    }

    /// Creates a new `TensorData` instance with the given f64 data and shape on the CPU.
    pub fn new_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Self, BinaRustError> {
        Self::from_cpu_buffer(CpuBuffer::F64(Arc::new(data_vec)), shape)
    }

    fn from_cpu_buffer(cpu_buffer: CpuBuffer, shape: Vec<usize>) -> Result<Self, BinaRustError> {
        let numel: usize = shape.iter().product();
        let data_len = cpu_buffer.len();
        if data_len != numel {
            return Err(BinaRustError::TensorCreationError { data_len, shape });
        }
        let dtype = cpu_buffer.dtype();
        let strides = calculate_strides(&shape);

        Ok(TensorData {
            buffer: Arc::new(Buffer::Cpu(cpu_buffer)),
            device: StorageDevice::CPU,
            dtype,
            offset: 0,
            shape,
            strides,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    /// Creates a new `TensorData` sharing an existing buffer, with fresh autograd state.
    pub(crate) fn new_shared(
        buffer_arc: Arc<Buffer>,
        offset: usize,
        shape: Vec<usize>,
        strides: Vec<usize>,
    ) -> Self {
        let dtype = buffer_arc.dtype();
        TensorData {
            buffer: buffer_arc,
            device: StorageDevice::CPU,
            dtype,
            offset,
            shape,
            strides,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        }
    }

    /// Provides immutable access to the underlying shared data buffer (`Arc<Buffer>`).
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Checks if the tensor is contiguous in memory (row-major, no gaps).
    pub fn is_contiguous(&self) -> bool {
        if self.shape.is_empty() {
            return true;
        }
        let mut current_stride = 1;
        for i in (0..self.shape.len()).rev() {
            let shape_i = self.shape[i];
            if shape_i == 0 {
                return true;
            }
            if shape_i != 1 {
                if self.strides[i] != current_stride {
                    return false;
                }
                current_stride *= shape_i;
            }
        }
        true
    }

    /// Returns the logical elements as an owned `Vec<f32>`.
    ///
    /// Requires an F32, contiguous tensor.
    pub(crate) fn contiguous_f32(&self) -> Result<Vec<f32>, BinaRustError> {
        self.ensure_contiguous("contiguous_f32")?;
        let data = self.buffer.try_get_cpu_f32()?;
        Ok(data[self.offset..self.offset + self.numel()].to_vec())
    }

    /// Returns the logical elements as an owned `Vec<f64>`.
    ///
    /// Requires an F64, contiguous tensor.
    pub(crate) fn contiguous_f64(&self) -> Result<Vec<f64>, BinaRustError> {
        self.ensure_contiguous("contiguous_f64")?;
        let data = self.buffer.try_get_cpu_f64()?;
        Ok(data[self.offset..self.offset + self.numel()].to_vec())
    }

    fn ensure_contiguous(&self, operation: &str) -> Result<(), BinaRustError> {
        if !self.is_contiguous() {
            return Err(BinaRustError::UnsupportedOperation(format!(
                "{} on non-contiguous tensor (shape {:?}, strides {:?})",
                operation, self.shape, self.strides
            )));
        }
        Ok(())
    }

    /// Replaces the storage of this tensor with `cpu_buffer`, keeping shape and autograd state.
    ///
    /// The new buffer must hold exactly `numel` elements.
    pub(crate) fn replace_buffer(&mut self, cpu_buffer: CpuBuffer) -> Result<(), BinaRustError> {
        let numel = self.numel();
        if cpu_buffer.len() != numel {
            return Err(BinaRustError::TensorCreationError {
                data_len: cpu_buffer.len(),
                shape: self.shape.clone(),
            });
        }
        self.dtype = cpu_buffer.dtype();
        self.buffer = Arc::new(Buffer::Cpu(cpu_buffer));
        self.offset = 0;
        self.strides = calculate_strides(&self.shape);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = TensorData::new(vec![1.0, 2.0, 3.0], vec![2, 2]).unwrap_err();
        assert_eq!(
            err,
            BinaRustError::TensorCreationError { data_len: 3, shape: vec![2, 2] }
        );
    }

    #[test]
    fn test_replace_buffer_switches_dtype() {
        let mut td = TensorData::new(vec![0.0; 4], vec![2, 2]).unwrap();
        td.replace_buffer(CpuBuffer::F64(Arc::new(vec![1.0; 4]))).unwrap();
        assert_eq!(td.dtype, DType::F64);
        assert_eq!(td.contiguous_f64().unwrap(), vec![1.0; 4]);
        assert!(td.replace_buffer(CpuBuffer::F32(Arc::new(vec![1.0; 3]))).is_err());
    }

    #[test]
    fn test_contiguous_for_fresh_tensor() {
        let td = TensorData::new(vec![0.0; 6], vec![2, 1, 3]).unwrap();
        assert_eq!(td.strides, vec![3, 3, 1]);
        assert!(td.is_contiguous());
    }
}
