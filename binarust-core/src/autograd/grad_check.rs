use crate::device::StorageDevice;
use crate::error::BinaRustError;
use crate::tensor::Tensor;
use crate::types::DType;
use log::debug;
use thiserror::Error;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed for input tensor at index {input_index}, element index {element_index}: Analytical grad {analytical_grad:?} != Numerical grad {numerical_grad:?}. Difference: {difference:?}")]
    GradientMismatch {
        input_index: usize,
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },
    #[error("Forward function execution failed during gradient check: {0}")]
    ForwardPassError(BinaRustError),
    #[error("Backward pass execution failed during gradient check: {0}")]
    BackwardPassError(BinaRustError),
    #[error("Tensor error during intermediate calculation: {0}")]
    TensorError(BinaRustError),
    #[error("Input tensor {input_index} requires grad but has no gradient after backward pass.")]
    MissingAnalyticalGrad { input_index: usize },
    #[error("Numerical gradient is NaN or infinite for input {input_index}, element {element_index}. Details: Loss+: {loss_plus:?}, Loss-: {loss_minus:?}")]
    NumericalGradNaNOrInfinite {
        input_index: usize,
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },
    #[error("Analytical gradient is NaN or infinite for input {input_index}, element {element_index}. Value: {value:?}")]
    AnalyticalGradNaNOrInfinite {
        input_index: usize,
        element_index: usize,
        value: f64,
    },
    #[error("Gradient checking only supported on CPU tensors (Input {input_index}). Got: {device:?}")]
    NonCpuInput {
        input_index: usize,
        device: StorageDevice,
    },
    #[error("Gradient check input tensor must be a leaf node (no grad_fn). Input index: {input_index}")]
    InputNotLeaf { input_index: usize },
    #[error("Function did not propagate requires_grad correctly.")]
    RequiresGradPropagationError,
}

impl From<BinaRustError> for GradCheckError {
    fn from(err: BinaRustError) -> Self {
        GradCheckError::TensorError(err)
    }
}

/// Checks analytical gradients against numerical gradients using central finite differences.
///
/// The scalar being differentiated is `sum(func(inputs) * output_grad)`, so the
/// analytical gradient is obtained by calling `backward(Some(output_grad))`.
/// Inputs that do not require grad are left untouched. F32 inputs are perturbed
/// in f64 and rounded back, so `epsilon` should not be too small for them.
///
/// An element passes when the absolute difference is within `abs_tol` **or** the
/// relative difference is within `rel_tol`.
pub fn check_grad<F>(
    func: F,
    inputs: &[Tensor],
    output_grad: &Tensor,
    epsilon: f64,
    abs_tol: f64,
    rel_tol: f64,
) -> Result<(), GradCheckError>
where
    F: Fn(&[Tensor]) -> Result<Tensor, BinaRustError>,
{
    // --- Initial Checks ---
    for (i, input) in inputs.iter().enumerate() {
        let device = input.device();
        if device != StorageDevice::CPU {
            return Err(GradCheckError::NonCpuInput { input_index: i, device });
        }
        if input.requires_grad() && !input.is_leaf() {
            return Err(GradCheckError::InputNotLeaf { input_index: i });
        }
    }

    // --- 1. Analytical gradients ---
    for input in inputs.iter().filter(|t| t.requires_grad()) {
        input.clear_grad();
    }
    let output = func(inputs).map_err(GradCheckError::ForwardPassError)?;

    let any_input_requires_grad = inputs.iter().any(|t| t.requires_grad());
    if any_input_requires_grad && !output.requires_grad() {
        return Err(GradCheckError::RequiresGradPropagationError);
    }
    if output.requires_grad() {
        output
            .backward(Some(output_grad.clone()))
            .map_err(GradCheckError::BackwardPassError)?;
    }

    let output_grad_data = output_grad.to_f64_vec()?;

    // --- 2. Numerical gradients, input by input ---
    for (i, original_input) in inputs.iter().enumerate() {
        if !original_input.requires_grad() {
            continue;
        }
        let analytical = original_input
            .grad()
            .ok_or(GradCheckError::MissingAnalyticalGrad { input_index: i })?
            .to_f64_vec()?;
        let original_values = original_input.to_f64_vec()?;
        let shape = original_input.shape();
        let dtype = original_input.dtype();

        for elem_idx in 0..original_values.len() {
            let loss_at = |delta: f64| -> Result<f64, GradCheckError> {
                let mut values = original_values.clone();
                values[elem_idx] += delta;
                let perturbed = Tensor::from_f64_values(values, shape.clone(), dtype)?;
                let mut perturbed_inputs: Vec<Tensor> =
                    inputs.iter().map(|t| t.detach()).collect();
                perturbed_inputs[i] = perturbed;
                let out = func(&perturbed_inputs).map_err(GradCheckError::ForwardPassError)?;
                weighted_sum(&out, &output_grad_data)
            };
            let loss_plus = loss_at(epsilon)?;
            let loss_minus = loss_at(-epsilon)?;
            let numerical_grad = (loss_plus - loss_minus) / (2.0 * epsilon);
            let analytical_grad = analytical[elem_idx];

            if !numerical_grad.is_finite() {
                return Err(GradCheckError::NumericalGradNaNOrInfinite {
                    input_index: i,
                    element_index: elem_idx,
                    loss_plus,
                    loss_minus,
                });
            }
            if !analytical_grad.is_finite() {
                return Err(GradCheckError::AnalyticalGradNaNOrInfinite {
                    input_index: i,
                    element_index: elem_idx,
                    value: analytical_grad,
                });
            }

            let difference = (analytical_grad - numerical_grad).abs();
            let scale = analytical_grad.abs().max(numerical_grad.abs());
            if difference > abs_tol && difference > rel_tol * scale {
                return Err(GradCheckError::GradientMismatch {
                    input_index: i,
                    element_index: elem_idx,
                    analytical_grad,
                    numerical_grad,
                    difference,
                });
            }
        }
        debug!(
            "check_grad: input {} ({:?}, {} elements) matches finite differences",
            i,
            dtype,
            original_values.len()
        );
    }

    Ok(())
}

/// `sum(output * weights)` in f64.
fn weighted_sum(output: &Tensor, weights: &[f64]) -> Result<f64, GradCheckError> {
    let values = output.to_f64_vec()?;
    if values.len() != weights.len() {
        return Err(GradCheckError::TensorError(BinaRustError::ShapeMismatch {
            expected: vec![weights.len()],
            actual: output.shape(),
            operation: "check_grad weighted_sum".to_string(),
        }));
    }
    Ok(values.iter().zip(weights).map(|(v, w)| v * w).sum())
}

/// Convenience wrapper: F64 inputs with tolerances suited to double precision.
pub fn check_grad_f64<F>(func: F, inputs: &[Tensor], output_grad: &Tensor) -> Result<(), GradCheckError>
where
    F: Fn(&[Tensor]) -> Result<Tensor, BinaRustError>,
{
    for (i, input) in inputs.iter().enumerate() {
        if input.dtype() != DType::F64 {
            return Err(GradCheckError::TensorError(BinaRustError::DataTypeMismatch {
                expected: DType::F64,
                actual: input.dtype(),
                operation: format!("check_grad_f64 input {}", i),
            }));
        }
    }
    check_grad(func, inputs, output_grad, 1e-6, 1e-7, 1e-5)
}

#[cfg(test)]
#[path = "grad_check_test.rs"]
mod tests;
