use crate::autograd::graph::NodeId;
use crate::error::BinaRustError;
use crate::tensor::Tensor;
use std::fmt::Debug;

/// Defines the interface for the backward pass of a differentiable tensor operation.
///
/// Any operation that creates a non-leaf `Tensor` must have an associated `BackwardOp`
/// implementation. It is stored in the output tensor's `grad_fn` field and is used
/// during the `backward()` call to propagate gradients according to the chain rule.
///
/// Implementations keep clones of the input tensors they need. This also keeps the
/// `TensorData` behind every id returned by [`inputs`](BackwardOp::inputs) alive for
/// as long as the output tensor exists.
pub trait BackwardOp: Debug + Send + Sync {
    /// Computes the gradients of the operation's inputs given `grad_output`,
    /// the gradient flowing into the output (dL/dOutput).
    ///
    /// # Returns
    /// One entry per input, in the order of [`inputs`](BackwardOp::inputs).
    /// `None` means no gradient flows to that input (it does not require grad,
    /// or the operation is not differentiable with respect to it).
    /// Each gradient has the same shape and dtype as its input.
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Option<Tensor>>, BinaRustError>;

    /// Returns identifiers for the input `TensorData` nodes of the forward operation.
    ///
    /// The order **must** match the order of gradients returned by `backward()`.
    fn inputs(&self) -> Vec<NodeId>;
}
