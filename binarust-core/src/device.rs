/// Represents the physical location where tensor data is stored.
///
/// Only host memory is implemented; the enum keeps device checks explicit
/// in every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageDevice {
    /// Data is stored in main system memory (RAM).
    #[default]
    CPU,
}
