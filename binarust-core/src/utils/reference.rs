//! Plain `f64` reference implementations that operators are validated against.
//!
//! These deliberately avoid the tensor machinery: arrays are flat row-major
//! vectors with an explicit shape.

/// A flat row-major array with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RefArray {
    pub data: Vec<f64>,
    pub shape: Vec<usize>,
}

impl RefArray {
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Self {
        RefArray { data, shape }
    }
}

fn split_at_axis(shape: &[usize], axis: usize) -> (usize, usize) {
    (shape[..axis].iter().product(), shape[axis..].iter().product())
}

/// `sign(w)` with zeros mapped to `quantize_zero_to`.
pub fn ref_binarize(w: &[f64], quantize_zero_to: f64) -> Vec<f64> {
    w.iter()
        .map(|&v| {
            if v > 0.0 {
                1.0
            } else if v < 0.0 {
                -1.0
            } else {
                quantize_zero_to
            }
        })
        .collect()
}

/// `x.reshape(rows, in) @ w.reshape(in, out) + b`, reshaped to
/// `x.shape[..base_axis] ++ w.shape[1..]`.
pub fn ref_affine(x: &RefArray, w: &RefArray, b: Option<&RefArray>, base_axis: usize) -> RefArray {
    let (rows, inner) = split_at_axis(&x.shape, base_axis);
    let (_, cols) = split_at_axis(&w.shape, 1);
    let mut y = vec![0.0; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = b.map_or(0.0, |b| b.data[c]);
            for k in 0..inner {
                acc += x.data[r * inner + k] * w.data[k * cols + c];
            }
            y[r * cols + c] = acc;
        }
    }
    let mut shape = x.shape[..base_axis].to_vec();
    shape.extend_from_slice(&w.shape[1..]);
    RefArray::new(y, shape)
}

/// Affine product with binarized weights.
pub fn ref_binary_connect_affine(
    x: &RefArray,
    w: &RefArray,
    b: Option<&RefArray>,
    base_axis: usize,
    quantize_zero_to: f64,
) -> RefArray {
    let wb = RefArray::new(ref_binarize(&w.data, quantize_zero_to), w.shape.clone());
    ref_affine(x, &wb, b, base_axis)
}

/// Gradients of binary-connect affine for `[x, w, wb, b]`.
///
/// The float weights receive the gradient of the binary weights unchanged;
/// the binary weights receive none. The bias slot is `None` when there is no bias.
pub fn ref_grad_binary_connect_affine(
    x: &RefArray,
    w: &RefArray,
    b: Option<&RefArray>,
    dy: &RefArray,
    base_axis: usize,
    quantize_zero_to: f64,
) -> Vec<Option<Vec<f64>>> {
    let (rows, inner) = split_at_axis(&x.shape, base_axis);
    let (_, cols) = split_at_axis(&w.shape, 1);
    let wb = ref_binarize(&w.data, quantize_zero_to);

    let mut dx = vec![0.0; rows * inner];
    let mut dw = vec![0.0; inner * cols];
    let mut db = vec![0.0; cols];
    for r in 0..rows {
        for c in 0..cols {
            let g = dy.data[r * cols + c];
            db[c] += g;
            for k in 0..inner {
                dx[r * inner + k] += g * wb[k * cols + c];
                dw[k * cols + c] += g * x.data[r * inner + k];
            }
        }
    }
    vec![Some(dx), Some(dw), None, b.map(|_| db)]
}
