use crate::error::BinaRustError;
use crate::nn::module::Module;
use crate::nn::parameter::Parameter;
use crate::ops::linalg::binary_connect_affine::{binary_connect_affine_op, BinaryConnectAffineConfig};
use crate::tensor::{rand_uniform, Tensor};
use crate::types::DType;
use log::debug;
use rand::Rng;

/// Affine layer with binary-connect weights: `y = x @ sign(W) + b`.
///
/// The layer owns the float weights `W` (shape `[in_features, out_shape...]`) as
/// a parameter, and a buffer holding their binarized values as of the last
/// forward pass. Gradients reach `W` through the straight-through estimator.
#[derive(Debug)]
pub struct BinaryConnectLinear {
    weight: Parameter,
    binary_weight: Tensor,
    bias: Option<Parameter>,
    config: BinaryConnectAffineConfig,
}

impl BinaryConnectLinear {
    /// Creates a layer with weights drawn uniformly from `[-1, 1)` and a zero bias.
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_shape: &[usize],
        has_bias: bool,
        config: BinaryConnectAffineConfig,
        dtype: DType,
        rng: &mut R,
    ) -> Result<Self, BinaRustError> {
        let mut weight_shape = vec![in_features];
        weight_shape.extend_from_slice(out_shape);
        let weight = rand_uniform(&weight_shape, -1.0, 1.0, dtype, rng)?;

        let bias = if has_bias {
            let out_features: usize = out_shape.iter().product();
            Some(Tensor::from_f64_values(vec![0.0; out_features], out_shape.to_vec(), dtype)?)
        } else {
            None
        };
        Self::from_parameters(weight, bias, config)
    }

    /// Builds a layer around explicit weights and bias.
    ///
    /// # Errors
    /// `ShapeMismatch` if the bias does not match `weight.shape()[1..]`,
    /// `DataTypeMismatch` if the dtypes differ.
    pub fn from_parameters(
        weight: Tensor,
        bias: Option<Tensor>,
        config: BinaryConnectAffineConfig,
    ) -> Result<Self, BinaRustError> {
        let w_shape = weight.shape();
        if w_shape.is_empty() {
            return Err(BinaRustError::InvalidArgument {
                operation: "BinaryConnectLinear".to_string(),
                message: "weight must have at least one dimension".to_string(),
            });
        }
        if let Some(b) = &bias {
            if b.shape() != w_shape[1..] {
                return Err(BinaRustError::ShapeMismatch {
                    expected: w_shape[1..].to_vec(),
                    actual: b.shape(),
                    operation: "BinaryConnectLinear bias".to_string(),
                });
            }
            if b.dtype() != weight.dtype() {
                return Err(BinaRustError::DataTypeMismatch {
                    expected: weight.dtype(),
                    actual: b.dtype(),
                    operation: "BinaryConnectLinear bias".to_string(),
                });
            }
        }

        let numel = weight.numel();
        let binary_weight = Tensor::from_f64_values(vec![0.0; numel], w_shape.clone(), weight.dtype())?;
        debug!(
            "BinaryConnectLinear: weight {:?}, bias {}, base_axis {}",
            w_shape,
            bias.is_some(),
            config.base_axis
        );

        Ok(BinaryConnectLinear {
            weight: Parameter::new(weight, Some("weight".to_string()))?,
            binary_weight,
            bias: bias
                .map(|b| Parameter::new(b, Some("bias".to_string())))
                .transpose()?,
            config,
        })
    }

    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Parameter> {
        self.bias.as_ref()
    }

    /// Binarized weights computed by the last forward pass (zeros before the first one).
    pub fn binary_weight(&self) -> &Tensor {
        &self.binary_weight
    }

    pub fn config(&self) -> &BinaryConnectAffineConfig {
        &self.config
    }
}

impl Module for BinaryConnectLinear {
    fn forward(&self, input: &Tensor) -> Result<Tensor, BinaRustError> {
        binary_connect_affine_op(
            input,
            &self.weight,
            &self.binary_weight,
            self.bias.as_deref(),
            &self.config,
        )
    }

    fn parameters(&self) -> Vec<&Parameter> {
        let mut params = vec![&self.weight];
        params.extend(self.bias.as_ref());
        params
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        self.parameters()
            .into_iter()
            .map(|p| (p.name().unwrap_or_default().to_string(), p))
            .collect()
    }
}

#[cfg(test)]
#[path = "binary_connect_linear_test.rs"]
mod tests;
