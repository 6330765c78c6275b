use crate::autograd::grad_check::{check_grad, GradCheckError};
use crate::context::Context;
use crate::error::BinaRustError;
use crate::tensor::{randn, Tensor};
use crate::utils::reference::RefArray;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

/// Checks that `actual` has `expected_shape` and elements within `tolerance` of `expected_data`.
/// Works for F32 and F64 tensors. Panics on mismatch.
pub fn check_tensor_near(
    actual: &Tensor,
    expected_shape: &[usize],
    expected_data: &[f32],
    tolerance: f32,
) {
    assert_eq!(actual.shape(), expected_shape, "Shape mismatch");

    let actual_data_vec = actual
        .to_f64_vec()
        .expect("Failed to read CPU data in check_tensor_near");

    assert_eq!(
        actual_data_vec.len(),
        expected_data.len(),
        "Data length mismatch"
    );

    for (i, (a, e)) in actual_data_vec.iter().zip(expected_data.iter()).enumerate() {
        let diff = (a - *e as f64).abs();
        if diff > tolerance as f64 {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}

/// Failures reported by [`FunctionTester`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TesterError {
    #[error("[{stage}] shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        stage: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("[{stage}] worst element {index}: got {actual}, expected {expected} (allowed difference {tolerance})")]
    ValueMismatch {
        stage: String,
        index: usize,
        actual: f64,
        expected: f64,
        tolerance: f64,
    },
    #[error("Input {input} should have received a gradient")]
    MissingGradient { input: usize },
    #[error("Input {input} is excluded from backward but received a gradient")]
    UnexpectedGradient { input: usize },
    #[error("Invalid tester setup: {0}")]
    InvalidSetup(String),
    #[error("Function under test failed: {0}")]
    Function(#[from] BinaRustError),
    #[error("Numerical gradient check failed: {0}")]
    GradCheck(#[from] GradCheckError),
}

/// Tolerances and options of a [`FunctionTester`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct TesterConfig {
    /// Seed of the generator drawing the output gradient.
    pub seed: u64,
    /// Absolute tolerance of the forward comparison.
    pub atol_f: f64,
    /// Absolute tolerance of the gradient comparison.
    pub atol_b: f64,
    /// Absolute tolerance of the accumulation check.
    pub atol_accum: f64,
    /// Relative tolerance added to every absolute one.
    pub rtol: f64,
    /// Finite-difference step when no reference gradient is given.
    pub dstep: f64,
    /// Which inputs gradients are requested for. Empty means all of them.
    pub backward: Vec<bool>,
}

impl Default for TesterConfig {
    fn default() -> Self {
        TesterConfig {
            seed: 313,
            atol_f: 1e-6,
            atol_b: 1e-3,
            atol_accum: 1e-6,
            rtol: 1e-5,
            dstep: 1e-3,
            backward: Vec::new(),
        }
    }
}

impl TesterConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_atol_f(mut self, atol_f: f64) -> Self {
        self.atol_f = atol_f;
        self
    }

    pub fn with_atol_b(mut self, atol_b: f64) -> Self {
        self.atol_b = atol_b;
        self
    }

    pub fn with_atol_accum(mut self, atol_accum: f64) -> Self {
        self.atol_accum = atol_accum;
        self
    }

    pub fn with_dstep(mut self, dstep: f64) -> Self {
        self.dstep = dstep;
        self
    }

    pub fn with_backward(mut self, backward: Vec<bool>) -> Self {
        self.backward = backward;
        self
    }
}

type RefGradFn<'a> = dyn Fn(&[Option<RefArray>], &RefArray) -> Vec<Option<Vec<f64>>> + 'a;

/// Validates the forward and backward passes of a function against a reference.
///
/// Inputs are given once (any dtype) and cast to the dtype of the execution
/// context before every stage, so one set of inputs serves all contexts.
/// A `None` input stands for an absent optional operand (e.g. no bias).
///
/// Stages:
/// 1. forward output against the reference output (`atol_f`);
/// 2. gradients of the inputs selected by `backward`, for an output gradient drawn
///    from `N(0, 1)`, against the reference gradient (`atol_b`) or, without one,
///    against central finite differences (`dstep`);
/// 3. inputs not selected must not receive a gradient;
/// 4. a second backward with the same output gradient must double the gradients.
pub struct FunctionTester<'a> {
    ctx: Context,
    inputs: Vec<Option<Tensor>>,
    config: TesterConfig,
    ref_grad: Option<Box<RefGradFn<'a>>>,
}

impl<'a> FunctionTester<'a> {
    pub fn new(ctx: Context, inputs: Vec<Option<Tensor>>) -> Self {
        FunctionTester {
            ctx,
            inputs,
            config: TesterConfig::default(),
            ref_grad: None,
        }
    }

    pub fn with_config(mut self, config: TesterConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the reference gradient: given the inputs and the output gradient, one
    /// slot per input.
    pub fn with_ref_grad<G>(mut self, ref_grad: G) -> Self
    where
        G: Fn(&[Option<RefArray>], &RefArray) -> Vec<Option<Vec<f64>>> + 'a,
    {
        self.ref_grad = Some(Box::new(ref_grad));
        self
    }

    /// Runs every stage; the first failure is returned.
    pub fn run<F, R>(&self, func: F, ref_func: R) -> Result<(), TesterError>
    where
        F: Fn(&[Option<Tensor>]) -> Result<Tensor, BinaRustError>,
        R: Fn(&[Option<RefArray>]) -> RefArray,
    {
        let mask = self.backward_mask()?;
        debug!("FunctionTester: context {}, backward {:?}", self.ctx, mask);

        // --- Forward ---
        let leaves = self.make_leaves(&vec![false; mask.len()])?;
        let ref_inputs = leaves
            .iter()
            .map(|leaf| leaf.as_ref().map(to_ref_array).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        let output = func(&leaves)?;
        let expected = ref_func(&ref_inputs);
        check_shape("forward", &expected.shape, &output.shape())?;
        compare_values("forward", &output.to_f64_vec()?, &expected.data, self.config.atol_f, self.config.rtol)?;
        trace!("FunctionTester: forward matches ({} elements)", expected.data.len());

        let selected: Vec<usize> = (0..mask.len())
            .filter(|&i| mask[i] && self.inputs[i].is_some())
            .collect();
        if selected.is_empty() {
            return Ok(());
        }

        // --- Backward ---
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let dy = randn(&output.shape(), self.ctx.dtype, &mut rng)?;
        let leaves = self.make_leaves(&mask)?;
        let output = func(&leaves)?;
        if output.requires_grad() {
            output.backward(Some(dy.clone()))?;
        }
        let first_grads = self.collect_grads(&leaves, &mask)?;

        match &self.ref_grad {
            Some(ref_grad) => {
                let expected = ref_grad(&ref_inputs, &to_ref_array(&dy)?);
                for &i in &selected {
                    let expected_grad = expected.get(i).cloned().flatten().ok_or_else(|| {
                        TesterError::InvalidSetup(format!("reference gradient has no slot for input {}", i))
                    })?;
                    let actual = first_grads[i].as_deref().unwrap_or_default();
                    compare_values(
                        &format!("backward input {}", i),
                        actual,
                        &expected_grad,
                        self.config.atol_b,
                        self.config.rtol,
                    )?;
                }
            }
            None => self.check_numerical(&func, &mask, &dy)?,
        }

        // --- Accumulation ---
        let output = func(&leaves)?;
        output.backward(Some(dy))?;
        let accumulated = self.collect_grads(&leaves, &mask)?;
        for &i in &selected {
            let doubled: Vec<f64> = first_grads[i]
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|g| 2.0 * g)
                .collect();
            compare_values(
                &format!("accumulation input {}", i),
                accumulated[i].as_deref().unwrap_or_default(),
                &doubled,
                self.config.atol_accum,
                self.config.rtol,
            )?;
        }
        debug!("FunctionTester: {} passed for inputs {:?}", self.ctx, selected);
        Ok(())
    }

    fn backward_mask(&self) -> Result<Vec<bool>, TesterError> {
        if self.config.backward.is_empty() {
            return Ok(vec![true; self.inputs.len()]);
        }
        if self.config.backward.len() != self.inputs.len() {
            return Err(TesterError::InvalidSetup(format!(
                "backward mask has {} entries for {} inputs",
                self.config.backward.len(),
                self.inputs.len()
            )));
        }
        Ok(self.config.backward.clone())
    }

    /// Fresh leaves cast to the context dtype, tracking gradients as `mask` says.
    fn make_leaves(&self, mask: &[bool]) -> Result<Vec<Option<Tensor>>, BinaRustError> {
        self.inputs
            .iter()
            .zip(mask)
            .map(|(input, &requires_grad)| {
                input
                    .as_ref()
                    .map(|t| {
                        let leaf = Tensor::from_f64_values(t.to_f64_vec()?, t.shape(), self.ctx.dtype)?;
                        leaf.set_requires_grad(requires_grad)?;
                        Ok::<Tensor, BinaRustError>(leaf)
                    })
                    .transpose()
            })
            .collect()
    }

    fn collect_grads(&self, leaves: &[Option<Tensor>], mask: &[bool]) -> Result<Vec<Option<Vec<f64>>>, TesterError> {
        let mut grads = Vec::with_capacity(leaves.len());
        for (i, leaf) in leaves.iter().enumerate() {
            let grad = match leaf {
                Some(leaf) => leaf.grad().map(|g| g.to_f64_vec()).transpose()?,
                None => None,
            };
            match (leaf.is_some(), mask[i], grad.is_some()) {
                (true, true, false) => return Err(TesterError::MissingGradient { input: i }),
                (true, false, true) => return Err(TesterError::UnexpectedGradient { input: i }),
                _ => {}
            }
            grads.push(grad);
        }
        Ok(grads)
    }

    fn check_numerical<F>(&self, func: &F, mask: &[bool], dy: &Tensor) -> Result<(), TesterError>
    where
        F: Fn(&[Option<Tensor>]) -> Result<Tensor, BinaRustError>,
    {
        let leaves = self.make_leaves(mask)?;
        let present: Vec<usize> = (0..leaves.len()).filter(|&i| leaves[i].is_some()).collect();
        let dense: Vec<Tensor> = leaves.iter().flatten().cloned().collect();
        let n_inputs = leaves.len();
        let rebuild = |inputs: &[Tensor]| -> Result<Tensor, BinaRustError> {
            let mut full: Vec<Option<Tensor>> = vec![None; n_inputs];
            for (slot, tensor) in present.iter().zip(inputs) {
                full[*slot] = Some(tensor.clone());
            }
            func(&full)
        };
        check_grad(rebuild, &dense, dy, self.config.dstep, self.config.atol_b, 0.0)?;
        Ok(())
    }
}

fn to_ref_array(tensor: &Tensor) -> Result<RefArray, BinaRustError> {
    Ok(RefArray::new(tensor.to_f64_vec()?, tensor.shape()))
}

fn check_shape(stage: &str, expected: &[usize], actual: &[usize]) -> Result<(), TesterError> {
    if expected != actual {
        return Err(TesterError::ShapeMismatch {
            stage: stage.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

/// Elementwise `|a - e| <= atol + rtol * |e|`; reports the worst offender.
fn compare_values(stage: &str, actual: &[f64], expected: &[f64], atol: f64, rtol: f64) -> Result<(), TesterError> {
    if actual.len() != expected.len() {
        return Err(TesterError::ShapeMismatch {
            stage: stage.to_string(),
            expected: vec![expected.len()],
            actual: vec![actual.len()],
        });
    }
    let worst = actual
        .iter()
        .zip(expected)
        .enumerate()
        .map(|(i, (a, e))| (i, (a - e).abs() - (atol + rtol * e.abs())))
        .filter(|(_, excess)| *excess > 0.0 || excess.is_nan())
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Greater));
    match worst {
        Some((index, _)) => Err(TesterError::ValueMismatch {
            stage: stage.to_string(),
            index,
            actual: actual[index],
            expected: expected[index],
            tolerance: atol + rtol * expected[index].abs(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "testing_test.rs"]
mod tests;
