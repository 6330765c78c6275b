// src/tensor/mod.rs

use crate::device::StorageDevice;
use crate::error::BinaRustError;
use crate::tensor_data::TensorData;
use crate::types::DType;
use std::sync::{Arc, RwLock};

mod autograd_methods;
pub mod create;
mod traits;

pub mod utils;

// Re-export creation functions to make them public
pub use create::{
    from_vec_f32, from_vec_f64, full, ones, rand_uniform, randn, zeros, zeros_f64, zeros_like,
};

/// Represents a multi-dimensional array (tensor).
///
/// `Tensor` uses `Arc<RwLock<TensorData>>` internally to allow for:
/// 1.  **Shared Ownership:** Multiple `Tensor` instances can point to the same
///     underlying data without cloning the data itself (cheap clones).
/// 2.  **Interior Mutability:** Metadata (like `requires_grad` or `grad`) within
///     `TensorData` can be modified even through an immutable `Tensor` reference.
///
/// The element type is tracked at runtime through `DType`.
pub struct Tensor {
    /// Arc for shared ownership, RwLock for interior mutability of TensorData.
    pub(crate) data: Arc<RwLock<TensorData>>,
}

impl Tensor {
    /// Creates a new Tensor with the given f32 data and shape on the CPU.
    pub fn new(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, BinaRustError> {
        let tensor_data = TensorData::new(data_vec, shape)?;
        Ok(Tensor::from_tensor_data(tensor_data))
    }

    /// Creates a new Tensor with the given f64 data and shape on the CPU.
    pub fn new_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Self, BinaRustError> {
        let tensor_data = TensorData::new_f64(data_vec, shape)?;
        Ok(Tensor::from_tensor_data(tensor_data))
    }

    /// Creates a tensor of the given dtype from f64 values, casting if needed.
    pub fn from_f64_values(
        values: Vec<f64>,
        shape: Vec<usize>,
        dtype: DType,
    ) -> Result<Self, BinaRustError> {
        match dtype {
            DType::F32 => Tensor::new(values.into_iter().map(|v| v as f32).collect(), shape),
            DType::F64 => Tensor::new_f64(values, shape),
        }
    }

    pub(crate) fn from_tensor_data(tensor_data: TensorData) -> Self {
        Tensor {
            data: Arc::new(RwLock::new(tensor_data)),
        }
    }

    /// Returns the data type (`DType`) of the tensor elements.
    pub fn dtype(&self) -> DType {
        self.read_data().dtype
    }

    /// Returns the device (`StorageDevice`) where the tensor's data resides.
    pub fn device(&self) -> StorageDevice {
        self.read_data().device
    }

    /// Returns a clone of the tensor's shape (`Vec<usize>`).
    pub fn shape(&self) -> Vec<usize> {
        self.read_data().shape.clone()
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.read_data().shape.len()
    }

    /// Returns a clone of the tensor's strides (`Vec<usize>`).
    pub fn strides(&self) -> Vec<usize> {
        self.read_data().strides.clone()
    }

    /// Checks if the tensor is contiguous in memory.
    pub fn is_contiguous(&self) -> bool {
        self.read_data().is_contiguous()
    }

    /// Returns the number of elements in the tensor.
    pub fn numel(&self) -> usize {
        self.read_data().numel()
    }

    /// Acquires a read lock on the tensor's data.
    ///
    /// Panics if the RwLock is poisoned.
    pub fn read_data(&self) -> std::sync::RwLockReadGuard<'_, TensorData> {
        self.data.read().expect("RwLock poisoned")
    }

    /// Acquires a write lock on the tensor's data.
    ///
    /// Panics if the RwLock is poisoned.
    pub fn write_data(&self) -> std::sync::RwLockWriteGuard<'_, TensorData> {
        self.data.write().expect("RwLock poisoned")
    }

    /// Attempts to get the tensor data as a `Vec<f32>`.
    /// Returns an error if the tensor is not F32.
    pub fn get_f32_data(&self) -> Result<Vec<f32>, BinaRustError> {
        self.read_data().contiguous_f32()
    }

    /// Attempts to get the tensor data as a `Vec<f64>`.
    /// Returns an error if the tensor is not F64.
    pub fn get_f64_data(&self) -> Result<Vec<f64>, BinaRustError> {
        self.read_data().contiguous_f64()
    }

    /// Reads the elements as `f64` regardless of the tensor dtype.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>, BinaRustError> {
        let guard = self.read_data();
        match guard.dtype {
            DType::F32 => Ok(guard.contiguous_f32()?.into_iter().map(f64::from).collect()),
            DType::F64 => guard.contiguous_f64(),
        }
    }

    /// Returns a new tensor sharing the same storage but cut off from the graph.
    ///
    /// The result is a leaf with `requires_grad = false`.
    pub fn detach(&self) -> Tensor {
        let guard = self.read_data();
        let detached = TensorData::new_shared(
            Arc::clone(&guard.buffer),
            guard.offset,
            guard.shape.clone(),
            guard.strides.clone(),
        );
        Tensor::from_tensor_data(detached)
    }

    /// Returns a deep copy of the data as a new leaf tensor (no autograd state).
    pub fn deep_clone(&self) -> Result<Tensor, BinaRustError> {
        let guard = self.read_data();
        match guard.dtype {
            DType::F32 => Tensor::new(guard.contiguous_f32()?, guard.shape.clone()),
            DType::F64 => Tensor::new_f64(guard.contiguous_f64()?, guard.shape.clone()),
        }
    }
}

#[cfg(test)]
#[path = "tensor_test.rs"]
mod tests;
