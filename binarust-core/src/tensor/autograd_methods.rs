use crate::autograd::graph::{topological_sort, NodeId};
use crate::autograd::{add_gradients, BackwardOp};
use crate::error::BinaRustError;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use crate::types::DType;
use log::{debug, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

impl Tensor {
    /// Checks if this tensor requires gradient computation.
    pub fn requires_grad(&self) -> bool {
        self.read_data().requires_grad
    }

    /// Sets the `requires_grad` flag for this tensor.
    pub fn set_requires_grad(&self, requires_grad: bool) -> Result<(), BinaRustError> {
        let mut guard = self.write_data();
        if requires_grad && guard.grad_fn.is_some() {
            warn!("Setting requires_grad=true on a non-leaf tensor. Gradients will not accumulate here during backward(). Did you mean to use .detach()?");
        }
        guard.requires_grad = requires_grad;
        Ok(())
    }

    /// Returns `true` if the tensor was not produced by a differentiable operation.
    pub fn is_leaf(&self) -> bool {
        self.read_data().grad_fn.is_none()
    }

    /// Returns a clone of the gradient tensor, if it exists.
    pub fn grad(&self) -> Option<Tensor> {
        self.read_data().grad.clone()
    }

    /// Clears the gradient tensor associated with this tensor.
    pub fn clear_grad(&self) {
        self.write_data().grad = None;
    }

    /// Returns a clone of the `Arc` pointing to the backward operation node (`grad_fn`).
    pub fn grad_fn(&self) -> Option<Arc<dyn BackwardOp + Send + Sync>> {
        self.read_data().grad_fn.clone()
    }

    /// Sets the backward operation node (`grad_fn`) for this tensor.
    pub(crate) fn set_grad_fn(
        &self,
        grad_fn: Option<Arc<dyn BackwardOp + Send + Sync>>,
    ) -> Result<(), BinaRustError> {
        let mut guard = self.write_data();
        guard.grad_fn = grad_fn;
        Ok(())
    }

    /// Identity of this tensor's node in the computation graph.
    pub(crate) fn get_node_id(&self) -> NodeId {
        Arc::as_ptr(&self.data)
    }

    /// Accumulates the given gradient into the tensor's `grad` field.
    pub fn acc_grad(&self, grad_to_add: Tensor) -> Result<(), BinaRustError> {
        accumulate_into(&self.data, grad_to_add)
    }

    /// Performs the backward pass starting from this tensor.
    ///
    /// Computes the gradient of this tensor with respect to graph leaves and
    /// **adds** it to their `grad` field.
    ///
    /// # Arguments
    /// * `gradient`: Gradient to seed the pass with (dL/dself). If `None`, the tensor must
    ///   hold exactly one element and the seed is `1`.
    ///
    /// # Errors
    /// Returns `BinaRustError` if:
    /// * `gradient` is provided but has the wrong shape or dtype.
    /// * `gradient` is `None` and the tensor is not scalar-like.
    /// * An operation's backward fails or returns the wrong number of gradients.
    pub fn backward(&self, gradient: Option<Tensor>) -> Result<(), BinaRustError> {
        if !self.requires_grad() {
            // Calling backward on a tensor outside the graph is a no-op.
            debug!("backward() called on a tensor that does not require grad; nothing to do");
            return Ok(());
        }

        let grad_init = match gradient {
            Some(g) => {
                if g.shape() != self.shape() {
                    return Err(BinaRustError::BackwardError(format!(
                        "Gradient shape mismatch: expected {:?}, got {:?}",
                        self.shape(),
                        g.shape()
                    )));
                }
                if g.dtype() != self.dtype() {
                    return Err(BinaRustError::DataTypeMismatch {
                        expected: self.dtype(),
                        actual: g.dtype(),
                        operation: "backward".to_string(),
                    });
                }
                g
            }
            None => {
                if self.numel() != 1 {
                    return Err(BinaRustError::BackwardNonScalar);
                }
                match self.dtype() {
                    DType::F32 => Tensor::new(vec![1.0], self.shape())?,
                    DType::F64 => Tensor::new_f64(vec![1.0], self.shape())?,
                }
            }
        };

        let root_id = self.get_node_id();
        let sorted_nodes = topological_sort(root_id)?;
        debug!("backward: traversing {} graph nodes", sorted_nodes.len());

        // Gradients flowing into nodes that have not been processed yet.
        let mut grad_map: HashMap<NodeId, Tensor> = HashMap::new();
        grad_map.insert(root_id, grad_init);

        for node_id in sorted_nodes.into_iter().rev() {
            let Some(accumulated_grad) = grad_map.remove(&node_id) else {
                continue;
            };
            // SAFETY: every id produced by topological_sort refers to a node kept
            // alive by `self` or by a grad_fn reachable from it.
            let node_lock: &RwLock<TensorData> = unsafe { &*node_id };
            let grad_fn = read_lock(node_lock)?.grad_fn.clone();

            let Some(op) = grad_fn else {
                // Leaf node.
                if read_lock(node_lock)?.requires_grad {
                    accumulate_into(node_lock, accumulated_grad)?;
                }
                continue;
            };

            let input_grads = op.backward(&accumulated_grad)?;
            let input_ids = op.inputs();
            if input_grads.len() != input_ids.len() {
                return Err(BinaRustError::BackwardError(format!(
                    "BackwardOp returned {} gradients, but expected {} (for op: {:?})",
                    input_grads.len(),
                    input_ids.len(),
                    op
                )));
            }

            for (input_id, maybe_grad) in input_ids.into_iter().zip(input_grads) {
                let Some(grad_to_add) = maybe_grad else {
                    continue;
                };
                // SAFETY: `op` holds a clone of this input.
                let input_lock: &RwLock<TensorData> = unsafe { &*input_id };
                if !read_lock(input_lock)?.requires_grad {
                    continue;
                }
                match grad_map.entry(input_id) {
                    Entry::Occupied(mut slot) => {
                        let summed = add_gradients(slot.get(), &grad_to_add)?;
                        slot.insert(summed);
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(grad_to_add);
                    }
                }
            }
        }

        Ok(())
    }
}

fn read_lock(lock: &RwLock<TensorData>) -> Result<std::sync::RwLockReadGuard<'_, TensorData>, BinaRustError> {
    lock.read().map_err(|e| BinaRustError::LockError {
        lock_type: "read".to_string(),
        reason: e.to_string(),
    })
}

/// Adds `grad_to_add` to the `grad` field of the node behind `lock`.
fn accumulate_into(lock: &RwLock<TensorData>, grad_to_add: Tensor) -> Result<(), BinaRustError> {
    let existing = {
        let guard = read_lock(lock)?;
        if grad_to_add.shape() != guard.shape {
            return Err(BinaRustError::ShapeMismatch {
                expected: guard.shape.clone(),
                actual: grad_to_add.shape(),
                operation: "acc_grad".to_string(),
            });
        }
        if grad_to_add.dtype() != guard.dtype {
            return Err(BinaRustError::DataTypeMismatch {
                expected: guard.dtype,
                actual: grad_to_add.dtype(),
                operation: "acc_grad".to_string(),
            });
        }
        guard.grad.clone()
    };

    let new_grad = match existing {
        Some(existing_grad) => add_gradients(&existing_grad, &grad_to_add)?,
        None => grad_to_add,
    };

    let mut guard = lock.write().map_err(|e| BinaRustError::LockError {
        lock_type: "write".to_string(),
        reason: e.to_string(),
    })?;
    guard.grad = Some(new_grad);
    Ok(())
}
