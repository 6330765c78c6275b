// src/nn/mod.rs

pub mod layers;
pub mod module;
pub mod parameter;

pub use layers::BinaryConnectLinear;
pub use module::Module;
pub use parameter::Parameter;
