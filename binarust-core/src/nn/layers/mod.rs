// src/nn/layers/mod.rs

pub mod binary_connect_linear;

pub use binary_connect_linear::BinaryConnectLinear;
