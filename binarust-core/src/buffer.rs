use std::sync::Arc;

use crate::error::BinaRustError;
use crate::types::DType;

/// Enum representing different buffer types based on device.
/// This allows TensorData to hold different kinds of data buffers.
#[derive(Debug, Clone)]
pub enum Buffer {
    /// Data resides on the CPU.
    Cpu(CpuBuffer),
}

/// Enum for CPU-specific buffer types.
#[derive(Debug, Clone)]
pub enum CpuBuffer {
    /// Buffer holding f32 data on the CPU.
    F32(Arc<Vec<f32>>),
    /// Buffer holding f64 data on the CPU.
    F64(Arc<Vec<f64>>),
}

impl CpuBuffer {
    pub fn dtype(&self) -> DType {
        match self {
            CpuBuffer::F32(_) => DType::F32,
            CpuBuffer::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CpuBuffer::F32(data) => data.len(),
            CpuBuffer::F64(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Buffer {
    /// Data type of the elements held by the buffer.
    pub fn dtype(&self) -> DType {
        match self {
            Buffer::Cpu(cpu) => cpu.dtype(),
        }
    }

    /// Attempts to get a reference to the underlying `Arc<Vec<f32>>` if this is a CPU F32 buffer.
    ///
    /// Returns an error if the buffer is not of type F32.
    pub fn try_get_cpu_f32(&self) -> Result<&Arc<Vec<f32>>, BinaRustError> {
        match self {
            Buffer::Cpu(CpuBuffer::F32(data_arc)) => Ok(data_arc),
            Buffer::Cpu(other) => Err(BinaRustError::DataTypeMismatch {
                expected: DType::F32,
                actual: other.dtype(),
                operation: "try_get_cpu_f32".to_string(),
            }),
        }
    }

    /// Attempts to get a reference to the underlying `Arc<Vec<f64>>` if this is a CPU F64 buffer.
    pub fn try_get_cpu_f64(&self) -> Result<&Arc<Vec<f64>>, BinaRustError> {
        match self {
            Buffer::Cpu(CpuBuffer::F64(data_arc)) => Ok(data_arc),
            Buffer::Cpu(other) => Err(BinaRustError::DataTypeMismatch {
                expected: DType::F64,
                actual: other.dtype(),
                operation: "try_get_cpu_f64".to_string(),
            }),
        }
    }
}
