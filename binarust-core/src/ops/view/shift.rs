use crate::autograd::{BackwardOp, NodeId};
use crate::error::BinaRustError;
use crate::ops::check_cpu_same_dtype;
use crate::ops::traits::Numeric;
use crate::tensor::utils::{calculate_strides, coord_to_index, index_to_coord};
use crate::tensor::Tensor;
use crate::types::DType;
use log::trace;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How source indices falling outside the input are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderMode {
    /// Repeat the edge element.
    #[default]
    Nearest,
    /// Mirror the input at its edges, edge element included.
    Reflect,
}

impl BorderMode {
    /// Maps a (possibly out of range) index onto `0..size`.
    fn resolve(self, index: isize, size: usize) -> usize {
        let n = size as isize;
        match self {
            BorderMode::Nearest => index.clamp(0, n - 1) as usize,
            BorderMode::Reflect => {
                let period = 2 * n;
                let folded = index.rem_euclid(period);
                if folded < n {
                    folded as usize
                } else {
                    (period - folded - 1) as usize
                }
            }
        }
    }
}

impl fmt::Display for BorderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BorderMode::Nearest => write!(f, "nearest"),
            BorderMode::Reflect => write!(f, "reflect"),
        }
    }
}

impl FromStr for BorderMode {
    type Err = BinaRustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(BorderMode::Nearest),
            "reflect" => Ok(BorderMode::Reflect),
            other => Err(BinaRustError::InvalidArgument {
                operation: "shift".to_string(),
                message: format!("unknown border mode '{}'", other),
            }),
        }
    }
}

/// Parameters of [`shift_op`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftConfig {
    /// Shift amounts for the trailing `shifts.len()` dimensions.
    pub shifts: Vec<isize>,
    pub border_mode: BorderMode,
}

impl ShiftConfig {
    pub fn new(shifts: Vec<isize>) -> Self {
        ShiftConfig {
            shifts,
            border_mode: BorderMode::default(),
        }
    }

    pub fn with_border_mode(mut self, border_mode: BorderMode) -> Self {
        self.border_mode = border_mode;
        self
    }
}

/// For every output element, the flat index of the input element it reads.
fn build_address_table(shape: &[usize], config: &ShiftConfig) -> Result<Vec<usize>, BinaRustError> {
    let rank = shape.len();
    if config.shifts.len() > rank {
        return Err(BinaRustError::InvalidArgument {
            operation: "shift".to_string(),
            message: format!(
                "{} shifts given for a tensor of rank {}",
                config.shifts.len(),
                rank
            ),
        });
    }
    let first_shifted = rank - config.shifts.len();
    let strides = calculate_strides(shape);
    let numel: usize = shape.iter().product();

    // Per-dimension source lookup; identity for leading dims.
    let dim_tables: Vec<Vec<usize>> = shape
        .iter()
        .enumerate()
        .map(|(dim, &size)| {
            if dim < first_shifted {
                (0..size).collect()
            } else {
                let shift = config.shifts[dim - first_shifted];
                (0..size)
                    .map(|i| config.border_mode.resolve(i as isize - shift, size))
                    .collect()
            }
        })
        .collect();

    Ok((0..numel)
        .map(|flat| {
            let source: Vec<usize> = index_to_coord(flat, &strides, shape)
                .iter()
                .enumerate()
                .map(|(dim, &c)| dim_tables[dim][c])
                .collect();
            coord_to_index(&source, &strides)
        })
        .collect())
}

#[derive(Debug)]
struct ShiftBackward {
    input: Tensor,
    address_table: Vec<usize>,
}

impl ShiftBackward {
    fn backward_typed<T: Numeric>(&self, grad_output: &Tensor) -> Result<Tensor, BinaRustError> {
        let dy = T::read_tensor(grad_output)?;
        let mut dx = vec![T::zero(); dy.len()];
        for (out_idx, &src) in self.address_table.iter().enumerate() {
            dx[src] += dy[out_idx];
        }
        T::into_tensor(dx, self.input.shape())
    }
}

impl BackwardOp for ShiftBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Option<Tensor>>, BinaRustError> {
        let grad_input = match grad_output.dtype() {
            DType::F32 => self.backward_typed::<f32>(grad_output)?,
            DType::F64 => self.backward_typed::<f64>(grad_output)?,
        };
        Ok(vec![Some(grad_input)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input.get_node_id()]
    }
}

/// Shifts the elements of `x` along its trailing dimensions: `y[i] = x[i - shift]`.
///
/// Positions whose source falls outside `x` are filled according to
/// `config.border_mode`. The output has the shape of `x`.
pub fn shift_op(x: &Tensor, config: &ShiftConfig) -> Result<Tensor, BinaRustError> {
    let dtype = check_cpu_same_dtype(&[x], "shift")?;
    let shape = x.shape();
    let address_table = build_address_table(&shape, config)?;
    trace!("shift: shape {:?}, shifts {:?}, mode {}", shape, config.shifts, config.border_mode);

    let output = match dtype {
        DType::F32 => gather::<f32>(x, &address_table, shape)?,
        DType::F64 => gather::<f64>(x, &address_table, shape)?,
    };

    if x.requires_grad() {
        let grad_fn = ShiftBackward {
            input: x.clone(),
            address_table,
        };
        output.set_requires_grad(true)?;
        output.set_grad_fn(Some(Arc::new(grad_fn)))?;
    }
    Ok(output)
}

fn gather<T: Numeric>(x: &Tensor, address_table: &[usize], shape: Vec<usize>) -> Result<Tensor, BinaRustError> {
    let data = T::read_tensor(x)?;
    let out = address_table.iter().map(|&src| data[src]).collect();
    T::into_tensor(out, shape)
}

#[cfg(test)]
#[path = "shift_test.rs"]
mod tests;
