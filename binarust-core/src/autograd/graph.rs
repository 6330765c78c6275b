use crate::error::BinaRustError;
use crate::tensor_data::TensorData;
use log::trace;
use std::collections::HashMap;
use std::sync::RwLock;

/// Stable identity of a node in the computation graph: the address of the
/// shared `RwLock<TensorData>` behind a `Tensor`.
pub type NodeId = *const RwLock<TensorData>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Returns every node reachable from `root` in post-order: each node appears
/// after all of its inputs, and `root` comes last.
///
/// # Safety contract
/// `root` must point to a live `RwLock<TensorData>`. Nodes further down are kept
/// alive by the `BackwardOp`s that reference them.
///
/// # Errors
/// `CycleDetected` if a node is reached again while it is still being explored.
pub fn topological_sort(root: NodeId) -> Result<Vec<NodeId>, BinaRustError> {
    let mut state: HashMap<NodeId, VisitState> = HashMap::new();
    let mut sorted = Vec::new();
    // (node, inputs already pushed)
    let mut stack: Vec<(NodeId, bool)> = vec![(root, false)];

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            state.insert(node, VisitState::Visited);
            sorted.push(node);
            continue;
        }
        match state.get(&node) {
            Some(VisitState::Visited) => continue,
            Some(VisitState::Visiting) => return Err(BinaRustError::CycleDetected),
            None => {}
        }
        state.insert(node, VisitState::Visiting);
        stack.push((node, true));

        // SAFETY: see the contract above; every id comes either from the caller
        // or from a grad_fn that holds a clone of the corresponding tensor.
        let node_lock = unsafe { &*node };
        let grad_fn = node_lock
            .read()
            .map_err(|e| BinaRustError::LockError {
                lock_type: "read".to_string(),
                reason: format!("topological_sort: {}", e),
            })?
            .grad_fn
            .clone();

        if let Some(op) = grad_fn {
            for input in op.inputs() {
                match state.get(&input) {
                    Some(VisitState::Visited) => {}
                    Some(VisitState::Visiting) => return Err(BinaRustError::CycleDetected),
                    None => stack.push((input, false)),
                }
            }
        }
    }

    trace!("topological_sort: {} nodes reachable from {:?}", sorted.len(), root);
    Ok(sorted)
}
