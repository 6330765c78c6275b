// src/tensor/traits.rs

use crate::tensor::Tensor;
use crate::types::DType;
use std::fmt::{self, Debug};
use std::sync::Arc;

impl Clone for Tensor {
    /// Clones the Tensor. This is a shallow clone that increases the reference count
    /// of the underlying shared data. Modifications through one clone will be visible
    /// through others.
    fn clone(&self) -> Self {
        Tensor {
            data: Arc::clone(&self.data),
        }
    }
}

impl Debug for Tensor {
    /// Formats the Tensor for debugging. Shows shape, dtype, device, autograd flags
    /// and the data for small tensors.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let td = self.read_data();
        write!(
            f,
            "Tensor(shape={:?}, dtype={:?}, device={:?}, requires_grad={}, grad_fn={}, data=",
            td.shape,
            td.dtype,
            td.device,
            td.requires_grad,
            td.grad_fn.is_some()
        )?;
        let numel = td.numel();
        if numel > 16 {
            write!(f, "[... {} elements ...]", numel)?;
        } else {
            match td.dtype {
                DType::F32 => match td.contiguous_f32() {
                    Ok(values) => write!(f, "{:?}", values)?,
                    Err(_) => write!(f, "<unreadable>")?,
                },
                DType::F64 => match td.contiguous_f64() {
                    Ok(values) => write!(f, "{:?}", values)?,
                    Err(_) => write!(f, "<unreadable>")?,
                },
            }
        }
        write!(f, ")")
    }
}

impl PartialEq for Tensor {
    /// Two tensors are equal when they share storage, or when shape, dtype,
    /// device and values all match. Autograd state is ignored.
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.data, &other.data) {
            return true;
        }
        let self_guard = self.read_data();
        let other_guard = other.read_data();

        if self_guard.shape != other_guard.shape
            || self_guard.dtype != other_guard.dtype
            || self_guard.device != other_guard.device
        {
            return false;
        }

        match self_guard.dtype {
            DType::F32 => match (self_guard.contiguous_f32(), other_guard.contiguous_f32()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
            DType::F64 => match (self_guard.contiguous_f64(), other_guard.contiguous_f64()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
        }
    }
}
