use binarust_core::context::init_logging;
use binarust_core::tensor::randn;
use binarust_core::{BinaRustError, DType, Tensor};
use rand::rngs::StdRng;
use std::sync::Once;

static INIT: Once = Once::new();

/// Sets up logging for integration tests (level from `RUST_LOG`).
#[allow(dead_code)]
pub fn setup() {
    INIT.call_once(init_logging);
}

/// Standard normal F64 tensor; the tester casts it to each context's dtype.
#[allow(dead_code)]
pub fn randn_f64(shape: &[usize], rng: &mut StdRng) -> Tensor {
    randn(shape, DType::F64, rng).expect("Test tensor creation failed")
}

/// Unwraps a present tester input.
#[allow(dead_code)]
pub fn input(inputs: &[Option<Tensor>], index: usize) -> Result<&Tensor, BinaRustError> {
    inputs[index]
        .as_ref()
        .ok_or_else(|| BinaRustError::InternalError(format!("input {} is absent", index)))
}
