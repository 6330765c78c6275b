pub mod binarize;

pub use binarize::{binarize_kernel, binarize_op};
