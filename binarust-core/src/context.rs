//! Execution contexts and the function registry.
//!
//! A [`Context`] names where and in which precision a function runs
//! (`"cpu:float"`, `"cpu:double"`). The registry records, per function name,
//! every context an implementation exists for, so that function tests can be
//! parameterised over all of them with [`list_context`].

use crate::error::BinaRustError;
use crate::types::DType;
use log::{debug, info, trace};
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

/// Compute backend of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    #[default]
    Cpu,
}

impl Backend {
    /// Suffix appended to a function name to form its implementation name.
    pub fn impl_suffix(&self) -> &'static str {
        match self {
            Backend::Cpu => "Cpu",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => write!(f, "cpu"),
        }
    }
}

/// Backend plus element type a function is executed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Context {
    pub backend: Backend,
    pub dtype: DType,
}

impl Context {
    pub fn new(backend: Backend, dtype: DType) -> Self {
        Context { backend, dtype }
    }

    pub fn cpu(dtype: DType) -> Self {
        Context::new(Backend::Cpu, dtype)
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::cpu(DType::F32)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.dtype.type_config())
    }
}

impl FromStr for Context {
    type Err = BinaRustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (backend, type_config) = s
            .split_once(':')
            .ok_or_else(|| BinaRustError::InvalidContext(s.to_string()))?;
        let backend = match backend {
            "cpu" => Backend::Cpu,
            _ => return Err(BinaRustError::InvalidContext(s.to_string())),
        };
        let dtype = match type_config {
            "float" => DType::F32,
            "double" => DType::F64,
            _ => return Err(BinaRustError::InvalidContext(s.to_string())),
        };
        Ok(Context { backend, dtype })
    }
}

type Registry = HashMap<String, Vec<(Context, String)>>;

const BUILTIN_FUNCTIONS: [&str; 3] = ["Affine", "BinaryConnectAffine", "Shift"];

static FUNCTION_REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| {
    let mut registry = Registry::new();
    for name in BUILTIN_FUNCTIONS {
        let entries = [DType::F32, DType::F64]
            .into_iter()
            .map(|dtype| {
                let ctx = Context::cpu(dtype);
                (ctx, format!("{}{}", name, ctx.backend.impl_suffix()))
            })
            .collect();
        registry.insert(name.to_string(), entries);
    }
    debug!("Function registry initialized with {} built-in functions.", registry.len());
    RwLock::new(registry)
});

/// Registers an implementation of `func_name` for `ctx`.
///
/// Registering the same context twice replaces the implementation name.
pub fn register_function(func_name: &str, ctx: Context, impl_name: &str) -> Result<(), BinaRustError> {
    let mut registry = FUNCTION_REGISTRY.write().map_err(|e| BinaRustError::LockError {
        lock_type: "write".to_string(),
        reason: format!("function registry: {}", e),
    })?;
    let entries = registry.entry(func_name.to_string()).or_default();
    match entries.iter_mut().find(|(c, _)| *c == ctx) {
        Some(entry) => entry.1 = impl_name.to_string(),
        None => entries.push((ctx, impl_name.to_string())),
    }
    trace!("Registered {} for {} as {}", func_name, ctx, impl_name);
    Ok(())
}

/// Returns every `(context, implementation name)` pair `func_name` is available for.
///
/// # Errors
/// `UnknownFunction` if nothing is registered under `func_name`.
pub fn list_context(func_name: &str) -> Result<Vec<(Context, String)>, BinaRustError> {
    let registry = FUNCTION_REGISTRY.read().map_err(|e| BinaRustError::LockError {
        lock_type: "read".to_string(),
        reason: format!("function registry: {}", e),
    })?;
    registry
        .get(func_name)
        .cloned()
        .ok_or_else(|| BinaRustError::UnknownFunction(func_name.to_string()))
}

/// Initializes `env_logger` once; later calls are no-ops.
///
/// The level is controlled by `RUST_LOG` (e.g. `RUST_LOG=binarust_core=debug`).
pub fn init_logging() {
    static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();
    LOGGER_INITIALIZED.get_or_init(|| {
        match env_logger::builder().is_test(false).try_init() {
            Ok(_) => info!("BinaRust logger initialized."),
            Err(e) => eprintln!("Failed to initialize logger: {}. Logging might not work as expected.", e),
        };
    });
}
