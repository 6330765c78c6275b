use crate::autograd::{BackwardOp, NodeId};
use crate::buffer::Buffer;
use crate::error::BinaRustError;
use crate::ops::check_cpu_same_dtype;
use crate::ops::linalg::affine::{
    affine_forward_kernel, affine_grad_bias_kernel, affine_grad_input_kernel,
    affine_grad_weight_kernel, AffineGeometry,
};
use crate::ops::quantize::binarize_kernel;
use crate::ops::traits::Numeric;
use crate::tensor::utils::calculate_strides;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use log::debug;
use std::sync::Arc;

/// Parameters of the binary-connect affine operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryConnectAffineConfig {
    /// Dimensions of the input before this axis are batch dimensions; the rest
    /// are flattened into features. Negative values count from the end.
    pub base_axis: isize,
    /// Value that zero weights are binarized to.
    pub quantize_zero_to: f64,
}

impl Default for BinaryConnectAffineConfig {
    fn default() -> Self {
        BinaryConnectAffineConfig {
            base_axis: 1,
            quantize_zero_to: -1.0,
        }
    }
}

impl BinaryConnectAffineConfig {
    pub fn new(base_axis: isize) -> Self {
        BinaryConnectAffineConfig {
            base_axis,
            ..Default::default()
        }
    }

    pub fn with_base_axis(mut self, base_axis: isize) -> Self {
        self.base_axis = base_axis;
        self
    }

    pub fn with_quantize_zero_to(mut self, quantize_zero_to: f64) -> Self {
        self.quantize_zero_to = quantize_zero_to;
        self
    }
}

// --- Backward Operation ---

/// Backward context for binary-connect affine.
///
/// `binarized` is a snapshot of the binary weights used in the forward pass, so a
/// later forward that rewrites the placeholder does not alter this gradient.
#[derive(Debug)]
struct BinaryConnectAffineBackward {
    input: Tensor,
    weight: Tensor,
    binary_weight: Tensor,
    binarized: Tensor,
    bias: Option<Tensor>,
    geometry: AffineGeometry,
}

impl BinaryConnectAffineBackward {
    fn backward_typed<T: Numeric>(&self, grad_output: &Tensor) -> Result<Vec<Option<Tensor>>, BinaRustError> {
        let dy = T::read_tensor(grad_output)?;
        let mut grads = Vec::with_capacity(4);

        // dx = dy @ wb^T
        grads.push(if self.input.requires_grad() {
            let wb = T::read_tensor(&self.binarized)?;
            let dx = affine_grad_input_kernel(&dy, &wb, &self.geometry);
            Some(T::into_tensor(dx, self.input.shape())?)
        } else {
            None
        });

        // Straight-through estimator: dL/dwb is handed to the float weights unchanged.
        grads.push(if self.weight.requires_grad() {
            let x = T::read_tensor(&self.input)?;
            let dw = affine_grad_weight_kernel(&x, &dy, &self.geometry);
            Some(T::into_tensor(dw, self.weight.shape())?)
        } else {
            None
        });

        // The binary weights are an output of the binarization, never a gradient target.
        grads.push(None);

        if let Some(bias) = &self.bias {
            grads.push(if bias.requires_grad() {
                let db = affine_grad_bias_kernel(&dy, &self.geometry);
                Some(T::into_tensor(db, bias.shape())?)
            } else {
                None
            });
        }
        Ok(grads)
    }
}

impl BackwardOp for BinaryConnectAffineBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Option<Tensor>>, BinaRustError> {
        if grad_output.shape() != self.geometry.output_shape {
            return Err(BinaRustError::ShapeMismatch {
                expected: self.geometry.output_shape.clone(),
                actual: grad_output.shape(),
                operation: "binary_connect_affine backward".to_string(),
            });
        }
        match grad_output.dtype() {
            DType::F32 => self.backward_typed::<f32>(grad_output),
            DType::F64 => self.backward_typed::<f64>(grad_output),
        }
    }

    fn inputs(&self) -> Vec<NodeId> {
        let mut ids = vec![
            self.input.get_node_id(),
            self.weight.get_node_id(),
            self.binary_weight.get_node_id(),
        ];
        if let Some(bias) = &self.bias {
            ids.push(bias.get_node_id());
        }
        ids
    }
}

// --- Forward Operation ---

/// Binary-connect affine: `y = x @ binarize(w) + b`.
///
/// The float weights `weight` are binarized (`+1` if positive, `-1` if negative,
/// `config.quantize_zero_to` if zero) and the result is written into
/// `binary_weight`, which must have the same shape as `weight`. The affine product
/// then follows [`affine_op`](crate::ops::linalg::affine_op) semantics with
/// `config.base_axis`.
///
/// In the backward pass the input receives `dy @ wb^T`, the float weights receive
/// the gradient of the binary weights unchanged (`x^T @ dy`), the bias receives the
/// row sum of `dy`, and `binary_weight` receives nothing.
///
/// # Errors
/// `ShapeMismatch` if `binary_weight` and `weight` differ in shape, plus every error
/// of `affine_op`.
pub fn binary_connect_affine_op(
    x: &Tensor,
    weight: &Tensor,
    binary_weight: &Tensor,
    bias: Option<&Tensor>,
    config: &BinaryConnectAffineConfig,
) -> Result<Tensor, BinaRustError> {
    let mut operands = vec![x, weight, binary_weight];
    operands.extend(bias);
    let dtype = check_cpu_same_dtype(&operands, "binary_connect_affine")?;

    let w_shape = weight.shape();
    if binary_weight.shape() != w_shape {
        return Err(BinaRustError::ShapeMismatch {
            expected: w_shape,
            actual: binary_weight.shape(),
            operation: "binary_connect_affine binary_weight".to_string(),
        });
    }
    let bias_shape = bias.map(|b| b.shape());
    let geometry = AffineGeometry::new(
        &x.shape(),
        &w_shape,
        bias_shape.as_deref(),
        config.base_axis,
        "binary_connect_affine",
    )?;
    debug!(
        "binary_connect_affine: rows={}, in={}, out={}, bias={}",
        geometry.rows,
        geometry.in_features,
        geometry.out_features,
        bias.is_some()
    );

    let (output, binarized) = match dtype {
        DType::F32 => forward_typed::<f32>(x, weight, binary_weight, bias, &geometry, config)?,
        DType::F64 => forward_typed::<f64>(x, weight, binary_weight, bias, &geometry, config)?,
    };

    // The binary weights are a derived quantity: only x, the float weights and
    // the bias decide whether the output joins the graph.
    let requires_grad =
        x.requires_grad() || weight.requires_grad() || bias.map_or(false, |b| b.requires_grad());
    if requires_grad {
        let grad_fn = BinaryConnectAffineBackward {
            input: x.clone(),
            weight: weight.clone(),
            binary_weight: binary_weight.clone(),
            binarized,
            bias: bias.cloned(),
            geometry,
        };
        output.set_requires_grad(true)?;
        output.set_grad_fn(Some(Arc::new(grad_fn)))?;
    }
    Ok(output)
}

/// Runs the forward kernels and fills the placeholder.
/// Returns the output and a leaf tensor sharing the binarized storage.
fn forward_typed<T: Numeric>(
    x: &Tensor,
    weight: &Tensor,
    binary_weight: &Tensor,
    bias: Option<&Tensor>,
    geometry: &AffineGeometry,
    config: &BinaryConnectAffineConfig,
) -> Result<(Tensor, Tensor), BinaRustError> {
    let w_data = T::read_tensor(weight)?;
    let wb_data = binarize_kernel(&w_data, T::from_f64_lossy(config.quantize_zero_to));

    let x_data = T::read_tensor(x)?;
    let b_data = bias.map(T::read_tensor).transpose()?;
    let y = affine_forward_kernel(&x_data, &wb_data, b_data.as_deref(), geometry);
    let output = T::into_tensor(y, geometry.output_shape.clone())?;

    // Placeholder and snapshot share one storage.
    let shape = weight.shape();
    let strides = calculate_strides(&shape);
    let cpu_buffer = T::into_cpu_buffer(wb_data);
    binary_weight.write_data().replace_buffer(cpu_buffer.clone())?;
    let binarized = Tensor::from_tensor_data(TensorData::new_shared(
        Arc::new(Buffer::Cpu(cpu_buffer)),
        0,
        shape,
        strides,
    ));

    Ok((output, binarized))
}

#[cfg(test)]
#[path = "binary_connect_affine_test.rs"]
mod tests;
