use crate::error::BinaRustError;
use crate::ops::check_cpu_same_dtype;
use crate::ops::traits::Numeric;
use crate::tensor::Tensor;
use crate::types::DType;

/// Binarizes `data`: `+1` for positive values, `-1` for negative values and
/// `zero_to` for zeros (and NaN).
pub fn binarize_kernel<T: Numeric>(data: &[T], zero_to: T) -> Vec<T> {
    data.iter()
        .map(|&v| {
            if v > T::zero() {
                T::one()
            } else if v < T::zero() {
                -T::one()
            } else {
                zero_to
            }
        })
        .collect()
}

/// Returns a new tensor holding `sign(tensor)` with zeros mapped to `quantize_zero_to`.
///
/// The sign function has a zero derivative almost everywhere, so the result is a
/// plain leaf: it never requires grad. Straight-through gradients are handled by the
/// operations that binarize internally (see `binary_connect_affine_op`).
pub fn binarize_op(tensor: &Tensor, quantize_zero_to: f64) -> Result<Tensor, BinaRustError> {
    let dtype = check_cpu_same_dtype(&[tensor], "binarize")?;
    let shape = tensor.shape();
    match dtype {
        DType::F32 => binarize_typed::<f32>(tensor, quantize_zero_to, shape),
        DType::F64 => binarize_typed::<f64>(tensor, quantize_zero_to, shape),
    }
}

fn binarize_typed<T: Numeric>(
    tensor: &Tensor,
    quantize_zero_to: f64,
    shape: Vec<usize>,
) -> Result<Tensor, BinaRustError> {
    let data = T::read_tensor(tensor)?;
    T::into_tensor(binarize_kernel(&data, T::from_f64_lossy(quantize_zero_to)), shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{from_vec_f32, from_vec_f64};

    #[test]
    fn test_binarize_maps_zero_to_minus_one_by_default() {
        let t = from_vec_f32(vec![0.3, -2.0, 0.0, 5.0, -0.0, 1e-30], vec![2, 3]).unwrap();
        let b = binarize_op(&t, -1.0).unwrap();
        assert_eq!(b.shape(), vec![2, 3]);
        assert_eq!(b.get_f32_data().unwrap(), vec![1.0, -1.0, -1.0, 1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_binarize_custom_zero_value_f64() {
        let t = from_vec_f64(vec![0.0, -0.5, 0.5], vec![3]).unwrap();
        let b = binarize_op(&t, 1.0).unwrap();
        assert_eq!(b.dtype(), DType::F64);
        assert_eq!(b.get_f64_data().unwrap(), vec![1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_binarize_result_is_detached() {
        let t = from_vec_f32(vec![1.0, -1.0], vec![2]).unwrap();
        t.set_requires_grad(true).unwrap();
        let b = binarize_op(&t, -1.0).unwrap();
        assert!(!b.requires_grad());
        assert!(b.grad_fn().is_none());
    }

    #[test]
    fn test_binarize_kernel_nan_goes_to_zero_value() {
        assert_eq!(binarize_kernel(&[f32::NAN], -1.0), vec![-1.0]);
    }
}
