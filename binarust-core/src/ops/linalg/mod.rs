// src/ops/linalg/mod.rs

pub mod affine;
pub mod binary_connect_affine;

pub use affine::{affine_op, AffineGeometry};
pub use binary_connect_affine::{binary_connect_affine_op, BinaryConnectAffineConfig};
