use super::*;
use crate::ops::linalg::affine_op;
use crate::ops::view::{shift_op, ShiftConfig};
use crate::utils::testing::check_tensor_near;

#[test]
fn test_new_and_accessors() -> Result<(), BinaRustError> {
    let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3])?;
    assert_eq!(t.shape(), vec![2, 3]);
    assert_eq!(t.strides(), vec![3, 1]);
    assert_eq!(t.rank(), 2);
    assert_eq!(t.numel(), 6);
    assert_eq!(t.dtype(), DType::F32);
    assert_eq!(t.device(), StorageDevice::CPU);
    assert!(t.is_contiguous());
    assert!(t.get_f64_data().is_err());
    Ok(())
}

#[test]
fn test_creation_rejects_bad_length() {
    let err = Tensor::new_f64(vec![1.0; 5], vec![2, 3]).unwrap_err();
    assert_eq!(err, BinaRustError::TensorCreationError { data_len: 5, shape: vec![2, 3] });
}

#[test]
fn test_zero_sized_tensor() -> Result<(), BinaRustError> {
    let t = Tensor::new(vec![], vec![0, 4])?;
    assert_eq!(t.numel(), 0);
    assert!(t.get_f32_data()?.is_empty());
    Ok(())
}

#[test]
fn test_from_f64_values_casts() -> Result<(), BinaRustError> {
    let t = Tensor::from_f64_values(vec![0.5, -1.25], vec![2], DType::F32)?;
    assert_eq!(t.get_f32_data()?, vec![0.5f32, -1.25]);
    assert_eq!(t.to_f64_vec()?, vec![0.5, -1.25]);
    Ok(())
}

#[test]
fn test_clone_shares_and_deep_clone_copies() -> Result<(), BinaRustError> {
    let t = Tensor::new(vec![1.0, 2.0], vec![2])?;
    let shallow = t.clone();
    let deep = t.deep_clone()?;
    t.set_requires_grad(true)?;
    assert!(shallow.requires_grad());
    assert!(!deep.requires_grad());
    assert_eq!(deep, t);
    Ok(())
}

#[test]
fn test_detach_shares_storage_without_graph() -> Result<(), BinaRustError> {
    let x = Tensor::new(vec![1.0, 2.0], vec![1, 2])?;
    let w = Tensor::new(vec![3.0, 4.0], vec![2, 1])?;
    w.set_requires_grad(true)?;
    let y = affine_op(&x, &w, None, 1)?;
    let d = y.detach();
    assert!(!d.requires_grad());
    assert!(d.is_leaf());
    assert!(!y.is_leaf());
    assert_eq!(d.get_f32_data()?, vec![11.0]);
    Ok(())
}

#[test]
fn test_backward_scalar_default_seed() -> Result<(), BinaRustError> {
    let x = Tensor::new(vec![1.0, 2.0], vec![2])?;
    let w = Tensor::new(vec![3.0, 4.0], vec![2])?;
    x.set_requires_grad(true)?;
    let y = affine_op(&x, &w, None, 0)?;
    assert_eq!(y.shape(), Vec::<usize>::new());
    y.backward(None)?;
    check_tensor_near(&x.grad().unwrap(), &[2], &[3.0, 4.0], 1e-6);
    Ok(())
}

#[test]
fn test_backward_non_scalar_requires_gradient() -> Result<(), BinaRustError> {
    let x = Tensor::new(vec![1.0, 2.0, 3.0], vec![3])?;
    x.set_requires_grad(true)?;
    let y = shift_op(&x, &ShiftConfig::new(vec![1]))?;
    assert_eq!(y.backward(None).unwrap_err(), BinaRustError::BackwardNonScalar);
    Ok(())
}

#[test]
fn test_backward_checks_seed_shape_and_dtype() -> Result<(), BinaRustError> {
    let x = Tensor::new(vec![1.0, 2.0, 3.0], vec![3])?;
    x.set_requires_grad(true)?;
    let y = shift_op(&x, &ShiftConfig::new(vec![1]))?;
    assert!(matches!(
        y.backward(Some(Tensor::new(vec![1.0; 2], vec![2])?)),
        Err(BinaRustError::BackwardError(_))
    ));
    assert!(matches!(
        y.backward(Some(Tensor::new_f64(vec![1.0; 3], vec![3])?)),
        Err(BinaRustError::DataTypeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_backward_accumulates_across_calls() -> Result<(), BinaRustError> {
    let x = Tensor::new(vec![1.0, 2.0, 3.0], vec![3])?;
    x.set_requires_grad(true)?;
    let seed = Tensor::new(vec![1.0, 2.0, 3.0], vec![3])?;
    for _ in 0..2 {
        let y = shift_op(&x, &ShiftConfig::new(vec![-1]))?;
        y.backward(Some(seed.clone()))?;
    }
    // y = [x1, x2, x2]
    check_tensor_near(&x.grad().unwrap(), &[3], &[0.0, 2.0, 10.0], 1e-6);
    x.clear_grad();
    assert!(x.grad().is_none());
    Ok(())
}

#[test]
fn test_backward_through_chain_sums_paths() -> Result<(), BinaRustError> {
    // z = shift(shift(x)) reaches x[0] from several output positions.
    let x = Tensor::new_f64(vec![1.0, 2.0, 3.0, 4.0], vec![4])?;
    x.set_requires_grad(true)?;
    let y = shift_op(&x, &ShiftConfig::new(vec![1]))?;
    let z = shift_op(&y, &ShiftConfig::new(vec![1]))?;
    assert_eq!(z.get_f64_data()?, vec![1.0, 1.0, 1.0, 2.0]);
    z.backward(Some(Tensor::new_f64(vec![1.0; 4], vec![4])?))?;
    assert_eq!(x.grad().unwrap().get_f64_data()?, vec![3.0, 1.0, 0.0, 0.0]);
    assert!(y.grad().is_none());
    Ok(())
}

#[test]
fn test_backward_without_grad_is_noop() -> Result<(), BinaRustError> {
    let x = Tensor::new(vec![1.0, 2.0], vec![2])?;
    let y = shift_op(&x, &ShiftConfig::new(vec![1]))?;
    assert!(!y.requires_grad());
    y.backward(None)?;
    assert!(x.grad().is_none());
    Ok(())
}

#[test]
fn test_acc_grad_shape_checked() -> Result<(), BinaRustError> {
    let x = Tensor::new(vec![1.0, 2.0], vec![2])?;
    x.acc_grad(Tensor::new(vec![1.0, 1.0], vec![2])?)?;
    x.acc_grad(Tensor::new(vec![0.5, 0.5], vec![2])?)?;
    check_tensor_near(&x.grad().unwrap(), &[2], &[1.5, 1.5], 1e-6);
    assert!(x.acc_grad(Tensor::new(vec![1.0; 3], vec![3])?).is_err());
    Ok(())
}
