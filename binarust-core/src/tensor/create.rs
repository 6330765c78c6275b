// src/tensor/create.rs

use crate::error::BinaRustError;
use crate::tensor::Tensor;
use crate::types::DType;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal, Uniform};

/// Creates a new tensor filled with zeros with the specified shape.
/// Creates an f32 tensor on the CPU.
pub fn zeros(shape: &[usize]) -> Result<Tensor, BinaRustError> {
    let numel = shape.iter().product();
    Tensor::new(vec![0.0; numel], shape.to_vec())
}

/// Creates a new F64 tensor filled with zeros with the specified shape on the CPU.
pub fn zeros_f64(shape: &[usize]) -> Result<Tensor, BinaRustError> {
    let numel = shape.iter().product();
    Tensor::new_f64(vec![0.0; numel], shape.to_vec())
}

/// Creates a new f32 tensor filled with ones.
pub fn ones(shape: &[usize]) -> Result<Tensor, BinaRustError> {
    full(shape, 1.0)
}

/// Creates a new f32 tensor filled with a specific value.
pub fn full(shape: &[usize], value: f32) -> Result<Tensor, BinaRustError> {
    let numel = shape.iter().product();
    Tensor::new(vec![value; numel], shape.to_vec())
}

/// Creates a new CPU F32 Tensor from a Vec<f32> and shape.
pub fn from_vec_f32(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Tensor, BinaRustError> {
    Tensor::new(data_vec, shape)
}

/// Creates a new CPU F64 Tensor from a Vec<f64> and shape.
pub fn from_vec_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Tensor, BinaRustError> {
    Tensor::new_f64(data_vec, shape)
}

/// Creates a new tensor filled with zeros, with the same shape and DType as the input tensor.
pub fn zeros_like(tensor: &Tensor) -> Result<Tensor, BinaRustError> {
    let shape = tensor.shape();
    match tensor.dtype() {
        DType::F32 => zeros(&shape),
        DType::F64 => zeros_f64(&shape),
    }
}

/// Creates a tensor whose elements are drawn from the standard normal distribution.
///
/// Values are generated as `f64` and cast to `dtype`, so an F32 and an F64
/// tensor drawn from identically seeded generators hold the same values up to rounding.
pub fn randn<R: Rng + ?Sized>(
    shape: &[usize],
    dtype: DType,
    rng: &mut R,
) -> Result<Tensor, BinaRustError> {
    let numel: usize = shape.iter().product();
    let values: Vec<f64> = (0..numel).map(|_| StandardNormal.sample(rng)).collect();
    Tensor::from_f64_values(values, shape.to_vec(), dtype)
}

/// Creates a tensor whose elements are drawn uniformly from `[low, high)`.
pub fn rand_uniform<R: Rng + ?Sized>(
    shape: &[usize],
    low: f64,
    high: f64,
    dtype: DType,
    rng: &mut R,
) -> Result<Tensor, BinaRustError> {
    if !(low < high) {
        return Err(BinaRustError::InvalidArgument {
            operation: "rand_uniform".to_string(),
            message: format!("low ({}) must be smaller than high ({})", low, high),
        });
    }
    let numel: usize = shape.iter().product();
    let dist = Uniform::new(low, high);
    let values: Vec<f64> = (0..numel).map(|_| dist.sample(rng)).collect();
    Tensor::from_f64_values(values, shape.to_vec(), dtype)
}

#[cfg(test)]
#[path = "create_test.rs"]
mod tests;
