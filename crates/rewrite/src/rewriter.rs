use crate::error::{Result, RewriteError};
use mapweave_mappings::MappingSet;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One rename table handed to the rewriter, tagged with the identity used for cache checks
#[derive(Debug, Clone)]
pub struct MappingLayer {
    pub label: String,
    pub mappings: Arc<MappingSet>,
    fingerprint: String,
}

impl MappingLayer {
    /// `source_fingerprint` identifies the document the table was resolved from
    pub fn new(label: impl Into<String>, mappings: Arc<MappingSet>, source_fingerprint: &str) -> Self {
        let label = label.into();
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        hasher.update([0]);
        hasher.update(mappings.pair().to_string().as_bytes());
        hasher.update([0]);
        hasher.update(source_fingerprint.as_bytes());
        Self {
            label,
            mappings,
            fingerprint: format!("{:x}", hasher.finalize()),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Everything one rewriter invocation needs
#[derive(Debug, Clone, Copy)]
pub struct RewriteRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    /// Primary table first, then secondary layers in registration order
    pub layers: &'a [MappingLayer],
    /// Deduplicated; never contains `input`
    pub classpath: &'a [PathBuf],
    pub pass_through_resources: bool,
    pub rename_invalid_locals: bool,
    pub rebuild_source_filenames: bool,
}

/// Bytecode patching backend.
///
/// Implementations must either write `request.output` and return `Ok`, or return an error.
/// Cleanup of partial output is handled by the caller.
pub trait BinaryRewriter: Send + Sync {
    fn name(&self) -> &str;

    fn rewrite(&self, request: &RewriteRequest<'_>) -> anyhow::Result<()>;
}

/// Rewriters by name, resolved once at startup
#[derive(Default, Clone)]
pub struct RewriterRegistry {
    rewriters: BTreeMap<String, Arc<dyn BinaryRewriter>>,
}

impl RewriterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `rewriter`, replacing any previous one with the same name
    pub fn register(&mut self, rewriter: Arc<dyn BinaryRewriter>) {
        let name = rewriter.name().to_string();
        if self.rewriters.insert(name.clone(), rewriter).is_some() {
            log::warn!("Rewriter `{name}` registered twice; keeping the latest");
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn BinaryRewriter>> {
        self.rewriters
            .get(name)
            .cloned()
            .ok_or_else(|| RewriteError::UnknownRewriter {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rewriters.keys().map(String::as_str)
    }
}
