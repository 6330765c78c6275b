use super::*;
use crate::autograd::{BackwardOp, NodeId};
use crate::ops::linalg::affine_op;
use crate::tensor::{from_vec_f64, randn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

#[test]
fn test_check_grad_affine_f64() {
    let mut rng = StdRng::seed_from_u64(42);
    let x = randn(&[3, 4], DType::F64, &mut rng).unwrap();
    let w = randn(&[4, 2], DType::F64, &mut rng).unwrap();
    let b = randn(&[2], DType::F64, &mut rng).unwrap();
    for t in [&x, &w, &b] {
        t.set_requires_grad(true).unwrap();
    }
    let dy = randn(&[3, 2], DType::F64, &mut rng).unwrap();
    let func = |inputs: &[Tensor]| affine_op(&inputs[0], &inputs[1], Some(&inputs[2]), 1);
    check_grad_f64(func, &[x, w, b], &dy).unwrap();
}

#[test]
fn test_check_grad_f32_with_loose_tolerance() {
    let mut rng = StdRng::seed_from_u64(43);
    let x = randn(&[2, 3], DType::F32, &mut rng).unwrap();
    let w = randn(&[3, 3], DType::F32, &mut rng).unwrap();
    x.set_requires_grad(true).unwrap();
    let dy = randn(&[2, 3], DType::F32, &mut rng).unwrap();
    let func = |inputs: &[Tensor]| affine_op(&inputs[0], &inputs[1], None, 1);
    check_grad(func, &[x, w], &dy, 1e-2, 1e-2, 1e-2).unwrap();
}

#[test]
fn test_check_grad_f64_rejects_f32_inputs() {
    let x = Tensor::new(vec![1.0], vec![1]).unwrap();
    let dy = Tensor::new(vec![1.0], vec![1]).unwrap();
    let err = check_grad_f64(|inputs: &[Tensor]| Ok(inputs[0].clone()), &[x], &dy).unwrap_err();
    assert!(matches!(err, GradCheckError::TensorError(BinaRustError::DataTypeMismatch { .. })));
}

/// Doubles its input in the forward pass but reports a gradient of one.
#[derive(Debug)]
struct WrongGradBackward {
    input: Tensor,
}

impl BackwardOp for WrongGradBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Option<Tensor>>, BinaRustError> {
        Ok(vec![Some(grad_output.deep_clone()?)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input.get_node_id()]
    }
}

fn double_with_wrong_grad(inputs: &[Tensor]) -> Result<Tensor, BinaRustError> {
    let x = &inputs[0];
    let doubled: Vec<f64> = x.get_f64_data()?.iter().map(|v| v * 2.0).collect();
    let out = from_vec_f64(doubled, x.shape())?;
    if x.requires_grad() {
        out.set_requires_grad(true)?;
        out.set_grad_fn(Some(Arc::new(WrongGradBackward { input: x.clone() })))?;
    }
    Ok(out)
}

#[test]
fn test_check_grad_detects_wrong_gradient() {
    let x = from_vec_f64(vec![1.0, -2.0], vec![2]).unwrap();
    x.set_requires_grad(true).unwrap();
    let dy = from_vec_f64(vec![1.0, 1.0], vec![2]).unwrap();
    match check_grad_f64(double_with_wrong_grad, &[x], &dy).unwrap_err() {
        GradCheckError::GradientMismatch {
            input_index,
            element_index,
            analytical_grad,
            numerical_grad,
            ..
        } => {
            assert_eq!(input_index, 0);
            assert_eq!(element_index, 0);
            assert!((analytical_grad - 1.0).abs() < 1e-12);
            assert!((numerical_grad - 2.0).abs() < 1e-6);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_check_grad_rejects_non_leaf_inputs() {
    let x = from_vec_f64(vec![1.0], vec![1]).unwrap();
    x.set_requires_grad(true).unwrap();
    let y = double_with_wrong_grad(&[x]).unwrap();
    let dy = from_vec_f64(vec![1.0], vec![1]).unwrap();
    let err = check_grad_f64(double_with_wrong_grad, &[y], &dy).unwrap_err();
    assert_eq!(err, GradCheckError::InputNotLeaf { input_index: 0 });
}

#[test]
fn test_check_grad_detects_missing_requires_grad_propagation() {
    let x = from_vec_f64(vec![1.0], vec![1]).unwrap();
    x.set_requires_grad(true).unwrap();
    let dy = from_vec_f64(vec![1.0], vec![1]).unwrap();
    let err = check_grad_f64(|inputs: &[Tensor]| Ok(inputs[0].detach()), &[x], &dy).unwrap_err();
    assert_eq!(err, GradCheckError::RequiresGradPropagationError);
}
