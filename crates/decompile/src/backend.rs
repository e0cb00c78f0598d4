use crate::error::{DecompileError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Per-class input handed to a backend; replaces any notion of a "current class" global
#[derive(Debug, Clone)]
pub struct ClassContext {
    /// Archive entry, e.g. `net/example/Widget.class`
    pub entry_name: String,
    /// Entry name without the `.class` suffix
    pub binary_name: String,
    /// Position in the sorted class list
    pub index: usize,
    pub options: Arc<BTreeMap<String, String>>,
    /// Archives the decompiled code links against
    pub libraries: Arc<[PathBuf]>,
}

/// Instruction-indexed line tables reported by a backend for one class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineNumberReport {
    /// Instruction index -> line in the compiled class file
    pub class_file_lines: BTreeMap<u32, u32>,
    /// Instruction index -> line in the decompiled source
    pub output_lines: BTreeMap<u32, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompiledClass {
    /// Dotted package, empty for the default package
    pub package_name: String,
    pub class_name: String,
    pub source: String,
    pub line_numbers: Option<LineNumberReport>,
}

impl DecompiledClass {
    /// `net.example` + `Widget` -> `net/example/Widget.java`
    pub fn output_path(&self) -> String {
        let mut path = self.package_name.replace('.', "/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(&self.class_name);
        path.push_str(".java");
        path
    }
}

/// Turns one compiled class into source.
///
/// Called concurrently from blocking worker threads. `Ok(None)` means the class produced no
/// standalone source (for example a nested class emitted inside its outer class).
pub trait DecompilerBackend: Send + Sync {
    fn name(&self) -> &str;

    fn decompile(&self, context: &ClassContext, bytecode: &[u8])
        -> anyhow::Result<Option<DecompiledClass>>;
}

#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn DecompilerBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn DecompilerBackend>) {
        let name = backend.name().to_string();
        if self.backends.insert(name.clone(), backend).is_some() {
            log::warn!("Decompiler backend `{name}` registered twice; keeping the latest");
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn DecompilerBackend>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| DecompileError::UnknownBackend {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }
}
