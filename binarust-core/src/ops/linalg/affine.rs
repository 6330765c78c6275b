use crate::autograd::{BackwardOp, NodeId};
use crate::error::BinaRustError;
use crate::ops::check_cpu_same_dtype;
use crate::ops::traits::Numeric;
use crate::tensor::Tensor;
use crate::types::DType;
use log::trace;
use std::sync::Arc;

/// How an affine operation sees its operands as matrices.
///
/// The input `x` is flattened to `[rows, in_features]` at `base_axis`, the
/// weight `w` to `[in_features, out_features]` after its first dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffineGeometry {
    /// Normalised (non-negative) base axis.
    pub base_axis: usize,
    /// `prod(x.shape[..base_axis])`
    pub rows: usize,
    /// `prod(x.shape[base_axis..])` == `w.shape[0]`
    pub in_features: usize,
    /// `prod(w.shape[1..])`
    pub out_features: usize,
    /// `x.shape[..base_axis] ++ w.shape[1..]`
    pub output_shape: Vec<usize>,
}

/// Resolves a possibly negative `base_axis` against `rank`.
pub fn normalize_base_axis(base_axis: isize, rank: usize, op_name: &str) -> Result<usize, BinaRustError> {
    let resolved = if base_axis < 0 {
        base_axis + rank as isize
    } else {
        base_axis
    };
    if resolved < 0 || resolved as usize >= rank {
        return Err(BinaRustError::InvalidBaseAxis {
            base_axis,
            rank,
            operation: op_name.to_string(),
        });
    }
    Ok(resolved as usize)
}

impl AffineGeometry {
    /// Validates operand shapes and computes the matrix view of an affine operation.
    pub fn new(
        x_shape: &[usize],
        w_shape: &[usize],
        bias_shape: Option<&[usize]>,
        base_axis: isize,
        op_name: &str,
    ) -> Result<Self, BinaRustError> {
        let base_axis = normalize_base_axis(base_axis, x_shape.len(), op_name)?;
        if w_shape.is_empty() {
            return Err(BinaRustError::InvalidArgument {
                operation: op_name.to_string(),
                message: "weight must have at least one dimension".to_string(),
            });
        }
        let rows: usize = x_shape[..base_axis].iter().product();
        let in_features: usize = x_shape[base_axis..].iter().product();
        let out_features: usize = w_shape[1..].iter().product();

        if in_features != w_shape[0] {
            return Err(BinaRustError::IncompatibleShapes {
                shape1: x_shape.to_vec(),
                shape2: w_shape.to_vec(),
                operation: format!(
                    "{} (input flattened at base_axis {} has {} features, weight expects {})",
                    op_name, base_axis, in_features, w_shape[0]
                ),
            });
        }
        if let Some(b_shape) = bias_shape {
            let bias_numel: usize = b_shape.iter().product();
            if bias_numel != out_features {
                return Err(BinaRustError::ShapeMismatch {
                    expected: w_shape[1..].to_vec(),
                    actual: b_shape.to_vec(),
                    operation: format!("{} bias", op_name),
                });
            }
        }

        let mut output_shape = x_shape[..base_axis].to_vec();
        output_shape.extend_from_slice(&w_shape[1..]);

        Ok(AffineGeometry {
            base_axis,
            rows,
            in_features,
            out_features,
            output_shape,
        })
    }
}

// --- Kernels ---

/// `y[r, j] = sum_k x[r, k] * w[k, j] (+ b[j])`
pub(crate) fn affine_forward_kernel<T: Numeric>(
    x: &[T],
    w: &[T],
    b: Option<&[T]>,
    geo: &AffineGeometry,
) -> Vec<T> {
    let (m, k, n) = (geo.rows, geo.in_features, geo.out_features);
    let mut y = vec![T::zero(); m * n];
    for r in 0..m {
        let y_row = &mut y[r * n..(r + 1) * n];
        if let Some(bias) = b {
            y_row.copy_from_slice(bias);
        }
        for l in 0..k {
            let x_rl = x[r * k + l];
            let w_row = &w[l * n..(l + 1) * n];
            for (y_rj, &w_lj) in y_row.iter_mut().zip(w_row) {
                *y_rj += x_rl * w_lj;
            }
        }
    }
    y
}

/// `dx[r, k] = sum_j dy[r, j] * w[k, j]`
pub(crate) fn affine_grad_input_kernel<T: Numeric>(dy: &[T], w: &[T], geo: &AffineGeometry) -> Vec<T> {
    let (m, k, n) = (geo.rows, geo.in_features, geo.out_features);
    let mut dx = vec![T::zero(); m * k];
    for r in 0..m {
        let dy_row = &dy[r * n..(r + 1) * n];
        for l in 0..k {
            let w_row = &w[l * n..(l + 1) * n];
            let mut acc = T::zero();
            for (&g, &wv) in dy_row.iter().zip(w_row) {
                acc += g * wv;
            }
            dx[r * k + l] = acc;
        }
    }
    dx
}

/// `dw[k, j] = sum_r x[r, k] * dy[r, j]`
pub(crate) fn affine_grad_weight_kernel<T: Numeric>(x: &[T], dy: &[T], geo: &AffineGeometry) -> Vec<T> {
    let (m, k, n) = (geo.rows, geo.in_features, geo.out_features);
    let mut dw = vec![T::zero(); k * n];
    for r in 0..m {
        let dy_row = &dy[r * n..(r + 1) * n];
        for l in 0..k {
            let x_rl = x[r * k + l];
            let dw_row = &mut dw[l * n..(l + 1) * n];
            for (d, &g) in dw_row.iter_mut().zip(dy_row) {
                *d += x_rl * g;
            }
        }
    }
    dw
}

/// `db[j] = sum_r dy[r, j]`
pub(crate) fn affine_grad_bias_kernel<T: Numeric>(dy: &[T], geo: &AffineGeometry) -> Vec<T> {
    let n = geo.out_features;
    let mut db = vec![T::zero(); n];
    for dy_row in dy.chunks(n.max(1)).take(geo.rows) {
        for (d, &g) in db.iter_mut().zip(dy_row) {
            *d += g;
        }
    }
    db
}

// --- Backward Operation ---

/// Backward context for the affine operation.
#[derive(Debug)]
struct AffineBackward {
    input: Tensor,
    weight: Tensor,
    bias: Option<Tensor>,
    geometry: AffineGeometry,
}

impl AffineBackward {
    fn backward_typed<T: Numeric>(&self, grad_output: &Tensor) -> Result<Vec<Option<Tensor>>, BinaRustError> {
        let dy = T::read_tensor(grad_output)?;
        let mut grads = Vec::with_capacity(3);

        grads.push(if self.input.requires_grad() {
            let w = T::read_tensor(&self.weight)?;
            let dx = affine_grad_input_kernel(&dy, &w, &self.geometry);
            Some(T::into_tensor(dx, self.input.shape())?)
        } else {
            None
        });

        grads.push(if self.weight.requires_grad() {
            let x = T::read_tensor(&self.input)?;
            let dw = affine_grad_weight_kernel(&x, &dy, &self.geometry);
            Some(T::into_tensor(dw, self.weight.shape())?)
        } else {
            None
        });

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

impl BackwardOp for AffineBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Option<Tensor>>, BinaRustError> {
        if grad_output.shape() != self.geometry.output_shape {
            return Err(BinaRustError::ShapeMismatch {
                expected: self.geometry.output_shape.clone(),
                actual: grad_output.shape(),
                operation: "affine backward".to_string(),
            });
        }
        match grad_output.dtype() {
            DType::F32 => self.backward_typed::<f32>(grad_output),
            DType::F64 => self.backward_typed::<f64>(grad_output),
        }
    }

    fn inputs(&self) -> Vec<NodeId> {
        let mut ids = vec![self.input.get_node_id(), self.weight.get_node_id()];
        if let Some(bias) = &self.bias {
            ids.push(bias.get_node_id());
        }
        ids
    }
}

// --- Forward Operation ---

/// Affine transformation `y = x @ w + b`.
///
/// `x` is viewed as a matrix `[prod(x.shape[..base_axis]), prod(x.shape[base_axis..])]`
/// and `w` as `[w.shape[0], prod(w.shape[1..])]`. The output has shape
/// `x.shape[..base_axis] ++ w.shape[1..]`. The bias, when present, must hold
/// `prod(w.shape[1..])` elements.
///
/// # Errors
/// `InvalidBaseAxis`, `IncompatibleShapes` (flattened `x` columns differ from `w.shape[0]`),
/// `ShapeMismatch` (bias size), `DataTypeMismatch` (mixed dtypes).
pub fn affine_op(
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    base_axis: isize,
) -> Result<Tensor, BinaRustError> {
    let mut operands = vec![x, weight];
    operands.extend(bias);
    let dtype = check_cpu_same_dtype(&operands, "affine")?;

    let bias_shape = bias.map(|b| b.shape());
    let geometry = AffineGeometry::new(
        &x.shape(),
        &weight.shape(),
        bias_shape.as_deref(),
        base_axis,
        "affine",
    )?;
    trace!("affine: {:?}", geometry);

    let output = match dtype {
        DType::F32 => affine_forward_typed::<f32>(x, weight, bias, &geometry)?,
        DType::F64 => affine_forward_typed::<f64>(x, weight, bias, &geometry)?,
    };

    let requires_grad = operands.iter().any(|t| t.requires_grad());
    if requires_grad {
        let grad_fn = AffineBackward {
            input: x.clone(),
            weight: weight.clone(),
            bias: bias.cloned(),
            geometry,
        };
        output.set_requires_grad(true)?;
        output.set_grad_fn(Some(Arc::new(grad_fn)))?;
    }
    Ok(output)
}

fn affine_forward_typed<T: Numeric>(
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    geometry: &AffineGeometry,
) -> Result<Tensor, BinaRustError> {
    let x_data = T::read_tensor(x)?;
    let w_data = T::read_tensor(weight)?;
    let b_data = bias.map(T::read_tensor).transpose()?;
    let y = affine_forward_kernel(&x_data, &w_data, b_data.as_deref(), geometry);
    T::into_tensor(y, geometry.output_shape.clone())
}

#[cfg(test)]
#[path = "affine_test.rs"]
mod tests;
