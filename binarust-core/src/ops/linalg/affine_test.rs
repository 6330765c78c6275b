use super::*;
use crate::autograd::grad_check::check_grad_f64;
use crate::tensor::{from_vec_f32, randn};
use crate::utils::testing::check_tensor_near;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sample_operands() -> (Tensor, Tensor, Tensor) {
    let x = from_vec_f32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();
    let w = from_vec_f32(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]).unwrap();
    let b = from_vec_f32(vec![0.5, -0.5], vec![2]).unwrap();
    (x, w, b)
}

#[test]
fn test_affine_forward_no_bias() -> Result<(), BinaRustError> {
    let (x, w, _) = sample_operands();
    let y = affine_op(&x, &w, None, 1)?;
    check_tensor_near(&y, &[2, 2], &[4.0, 5.0, 10.0, 11.0], 1e-6);
    assert!(!y.requires_grad());
    Ok(())
}

#[test]
fn test_affine_forward_with_bias() -> Result<(), BinaRustError> {
    let (x, w, b) = sample_operands();
    let y = affine_op(&x, &w, Some(&b), 1)?;
    check_tensor_near(&y, &[2, 2], &[4.5, 4.5, 10.5, 10.5], 1e-6);
    Ok(())
}

#[test]
fn test_affine_output_shape_follows_base_axis() -> Result<(), BinaRustError> {
    let mut rng = StdRng::seed_from_u64(0);
    let x = randn(&[2, 3, 4], DType::F32, &mut rng)?;

    let w1 = randn(&[12, 2, 3], DType::F32, &mut rng)?;
    assert_eq!(affine_op(&x, &w1, None, 1)?.shape(), vec![2, 2, 3]);

    let w2 = randn(&[4, 4], DType::F32, &mut rng)?;
    assert_eq!(affine_op(&x, &w2, None, 2)?.shape(), vec![2, 3, 4]);
    assert_eq!(affine_op(&x, &w2, None, -1)?.shape(), vec![2, 3, 4]);

    let w3 = randn(&[24], DType::F32, &mut rng)?;
    assert_eq!(affine_op(&x, &w3, None, 0)?.shape(), Vec::<usize>::new());
    Ok(())
}

#[test]
fn test_affine_backward_values() -> Result<(), BinaRustError> {
    let (x, w, b) = sample_operands();
    x.set_requires_grad(true)?;
    w.set_requires_grad(true)?;
    b.set_requires_grad(true)?;

    let y = affine_op(&x, &w, Some(&b), 1)?;
    assert!(y.requires_grad());
    assert!(y.grad_fn().is_some());
    y.backward(Some(Tensor::new(vec![1.0; 4], vec![2, 2])?))?;

    check_tensor_near(&x.grad().unwrap(), &[2, 3], &[1.0, 1.0, 2.0, 1.0, 1.0, 2.0], 1e-6);
    check_tensor_near(&w.grad().unwrap(), &[3, 2], &[5.0, 5.0, 7.0, 7.0, 9.0, 9.0], 1e-6);
    check_tensor_near(&b.grad().unwrap(), &[2], &[2.0, 2.0], 1e-6);
    Ok(())
}

#[test]
fn test_affine_only_requested_grads_are_computed() -> Result<(), BinaRustError> {
    let (x, w, b) = sample_operands();
    w.set_requires_grad(true)?;
    let y = affine_op(&x, &w, Some(&b), 1)?;
    y.backward(Some(Tensor::new(vec![1.0; 4], vec![2, 2])?))?;
    assert!(x.grad().is_none());
    assert!(b.grad().is_none());
    assert!(w.grad().is_some());
    Ok(())
}

#[test]
fn test_affine_gradcheck_f64() {
    let mut rng = StdRng::seed_from_u64(11);
    for (base_axis, w_shape) in [(1isize, vec![12usize, 2, 3]), (2, vec![4, 4]), (-2, vec![12, 5])] {
        let x = randn(&[2, 3, 4], DType::F64, &mut rng).unwrap();
        let w = randn(&w_shape, DType::F64, &mut rng).unwrap();
        let b = randn(&w_shape[1..], DType::F64, &mut rng).unwrap();
        for t in [&x, &w, &b] {
            t.set_requires_grad(true).unwrap();
        }
        let out_shape = affine_op(&x, &w, Some(&b), base_axis).unwrap().shape();
        let dy = randn(&out_shape, DType::F64, &mut rng).unwrap();

        let func = |inputs: &[Tensor]| affine_op(&inputs[0], &inputs[1], Some(&inputs[2]), base_axis);
        check_grad_f64(func, &[x, w, b], &dy).expect("affine gradients should match finite differences");
    }
}

#[test]
fn test_affine_shape_errors() {
    let (x, w, _) = sample_operands();

    let bad_w = from_vec_f32(vec![0.0; 8], vec![4, 2]).unwrap();
    assert!(matches!(
        affine_op(&x, &bad_w, None, 1),
        Err(BinaRustError::IncompatibleShapes { .. })
    ));

    let bad_b = from_vec_f32(vec![0.0; 3], vec![3]).unwrap();
    assert!(matches!(
        affine_op(&x, &w, Some(&bad_b), 1),
        Err(BinaRustError::ShapeMismatch { .. })
    ));

    assert!(matches!(
        affine_op(&x, &w, None, 2),
        Err(BinaRustError::InvalidBaseAxis { base_axis: 2, rank: 2, .. })
    ));
    assert!(matches!(
        affine_op(&x, &w, None, -3),
        Err(BinaRustError::InvalidBaseAxis { .. })
    ));
}

#[test]
fn test_affine_dtype_mismatch() {
    let (x, _, _) = sample_operands();
    let w64 = Tensor::new_f64(vec![0.0; 6], vec![3, 2]).unwrap();
    assert!(matches!(
        affine_op(&x, &w64, None, 1),
        Err(BinaRustError::DataTypeMismatch { .. })
    ));
}

#[test]
fn test_normalize_base_axis() {
    assert_eq!(normalize_base_axis(1, 3, "t").unwrap(), 1);
    assert_eq!(normalize_base_axis(-1, 3, "t").unwrap(), 2);
    assert_eq!(normalize_base_axis(0, 1, "t").unwrap(), 0);
    assert!(normalize_base_axis(3, 3, "t").is_err());
    assert!(normalize_base_axis(0, 0, "t").is_err());
}
