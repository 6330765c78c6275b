use crate::error::BinaRustError;
use crate::nn::Parameter;
use crate::tensor::Tensor;

/// The base trait for neural network modules.
pub trait Module: std::fmt::Debug + Send + Sync {
    /// Performs a forward pass of the module.
    fn forward(&self, input: &Tensor) -> Result<Tensor, BinaRustError>;

    /// Returns all learnable parameters of the module.
    fn parameters(&self) -> Vec<&Parameter>;

    /// Returns all learnable parameters with their names (e.g. `"weight"`, `"bias"`).
    fn named_parameters(&self) -> Vec<(String, &Parameter)>;

    /// Clears the accumulated gradient of every parameter.
    fn zero_grad(&self) {
        for param in self.parameters() {
            param.clear_grad();
        }
    }
}
