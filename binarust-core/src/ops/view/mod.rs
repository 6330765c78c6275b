// src/ops/view/mod.rs

pub mod shift;

pub use shift::{shift_op, BorderMode, ShiftConfig};
