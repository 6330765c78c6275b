use crate::error::BinaRustError;
use crate::tensor::Tensor;
use std::fmt;
use std::ops::Deref;

/// A tensor marked as a learnable parameter of a [`Module`](crate::nn::Module).
///
/// Parameters always require gradients.
#[derive(Clone)]
pub struct Parameter {
    tensor: Tensor,
    name: Option<String>,
}

impl Parameter {
    /// Wraps `tensor` and turns on gradient tracking.
    ///
    /// # Errors
    /// Fails if `tensor` is not a leaf of the computation graph.
    pub fn new(tensor: Tensor, name: Option<String>) -> Result<Self, BinaRustError> {
        if !tensor.is_leaf() {
            return Err(BinaRustError::InvalidArgument {
                operation: "Parameter::new".to_string(),
                message: "parameters must be leaf tensors".to_string(),
            });
        }
        tensor.set_requires_grad(true)?;
        Ok(Parameter { tensor, name })
    }

    pub fn new_unnamed(tensor: Tensor) -> Result<Self, BinaRustError> {
        Parameter::new(tensor, None)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn into_inner(self) -> Tensor {
        self.tensor
    }
}

impl Deref for Parameter {
    type Target = Tensor;

    fn deref(&self) -> &Self::Target {
        &self.tensor
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Parameter({}: {:?})", name, self.tensor),
            None => write!(f, "Parameter({:?})", self.tensor),
        }
    }
}

#[cfg(test)]
#[path = "parameter_test.rs"]
mod tests;
