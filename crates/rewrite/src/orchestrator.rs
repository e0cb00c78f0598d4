use crate::config::RewriteConfig;
use crate::error::{Result, RewriteError};
use crate::fingerprint::{self, RewriteMetadata};
use crate::rewriter::{BinaryRewriter, MappingLayer, RewriteRequest};
use mapweave_mappings::{MappingCache, MappingSet, NamespacePair, Store};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One namespace an input archive is rewritten into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTarget {
    pub namespace: String,
    pub output: PathBuf,
}

impl RewriteTarget {
    pub fn new(namespace: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            output: output.into(),
        }
    }
}

/// Input archive, its source namespace, the outputs to produce and the classpath to resolve
/// inheritance against
#[derive(Debug, Clone)]
pub struct RewriteJob {
    pub input: PathBuf,
    pub from: String,
    pub targets: Vec<RewriteTarget>,
    pub classpath: Vec<PathBuf>,
}

impl RewriteJob {
    pub fn new(input: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            from: from.into(),
            targets: Vec::new(),
            classpath: Vec::new(),
        }
    }

    pub fn target(mut self, namespace: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        self.targets.push(RewriteTarget::new(namespace, output));
        self
    }

    pub fn classpath<I, P>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.classpath.extend(entries.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub namespace: String,
    pub output: PathBuf,
    /// Output was reused without invoking the rewriter
    pub cached: bool,
}

/// Drives a [`BinaryRewriter`] over whole archives.
///
/// Either every output of a job is produced, or none is left behind: on failure partial
/// outputs and their metadata are deleted and the mapping cache is invalidated before the
/// error is returned.
pub struct RewriteOrchestrator<'c> {
    rewriter: Arc<dyn BinaryRewriter>,
    cache: &'c MappingCache,
    config: RewriteConfig,
    secondary: Vec<MappingLayer>,
}

impl<'c> RewriteOrchestrator<'c> {
    pub fn new(
        rewriter: Arc<dyn BinaryRewriter>,
        cache: &'c MappingCache,
        config: RewriteConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rewriter,
            cache,
            config,
            secondary: Vec::new(),
        })
    }

    /// Adds a table applied on every rewrite after the primary one
    pub fn with_secondary_layer(
        mut self,
        label: &str,
        store: &Store,
        from: &str,
        to: &str,
    ) -> Result<Self> {
        let mappings = MappingSet::from_store(store, from, to)?;
        log::debug!(
            "Secondary layer `{label}` ({from} -> {to}) with {} entries",
            mappings.entry_count()
        );
        self.secondary
            .push(MappingLayer::new(label, Arc::new(mappings), store.fingerprint()));
        Ok(self)
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Rewrite `input` from `from` into `to`, writing `output`.
    ///
    /// When `output` is `input` itself the archive is rewritten in place.
    pub fn rewrite(
        &self,
        input: &Path,
        store: &Store,
        pair: &NamespacePair,
        output: &Path,
        classpath: &[PathBuf],
    ) -> Result<RewriteOutcome> {
        if same_path(input, output) {
            return self.rewrite_in_place(input, store, pair, classpath);
        }
        let job = RewriteJob::new(input, pair.from.as_str())
            .target(pair.to.as_str(), output)
            .classpath(classpath.iter().cloned());
        let mut outcomes = self.run(&job, store)?;
        outcomes
            .pop()
            .ok_or_else(|| RewriteError::Config("rewrite job produced no outcome".to_string()))
    }

    /// Produce every target of `job`, reusing outputs whose metadata still matches
    pub fn run(&self, job: &RewriteJob, store: &Store) -> Result<Vec<RewriteOutcome>> {
        self.run_inner(job, store, false)
    }

    /// Move `archive` aside to `<stem><dev_suffix>.<ext>` and rewrite it back into place.
    ///
    /// The moved-aside archive is kept. On failure it is moved back.
    pub fn rewrite_in_place(
        &self,
        archive: &Path,
        store: &Store,
        pair: &NamespacePair,
        classpath: &[PathBuf],
    ) -> Result<RewriteOutcome> {
        if !archive.is_file() {
            return Err(RewriteError::MissingInput(archive.display().to_string()));
        }
        let dev = dev_path(archive, &self.config.dev_suffix);
        if dev.exists() {
            std::fs::remove_file(&dev).map_err(|e| RewriteError::io(&dev, e))?;
        }
        std::fs::rename(archive, &dev).map_err(|e| RewriteError::io(archive, e))?;
        log::info!(":moved {} to {}", archive.display(), dev.display());

        let job = RewriteJob::new(&dev, pair.from.as_str())
            .target(pair.to.as_str(), archive)
            .classpath(classpath.iter().cloned());
        match self.run_inner(&job, store, true) {
            Ok(mut outcomes) => outcomes
                .pop()
                .ok_or_else(|| RewriteError::Config("rewrite job produced no outcome".to_string())),
            Err(err) => {
                if let Err(restore) = std::fs::rename(&dev, archive) {
                    log::warn!(
                        "Failed to restore {} from {}: {restore}",
                        archive.display(),
                        dev.display()
                    );
                }
                Err(err)
            }
        }
    }

    /// Forget cached mapping tables and force `outputs` to be rebuilt on the next run
    pub fn invalidate(&self, outputs: &[&Path]) -> u64 {
        for output in outputs {
            fingerprint::remove_metadata(output);
        }
        self.cache.invalidate()
    }

    fn run_inner(&self, job: &RewriteJob, store: &Store, force: bool) -> Result<Vec<RewriteOutcome>> {
        // Checked before anything is deleted: failure cleanup removes every target path.
        if let Some(target) = job.targets.iter().find(|t| same_path(&job.input, &t.output)) {
            return Err(RewriteError::OutputIsInput(target.output.display().to_string()));
        }
        match self.produce(job, store, force) {
            Ok(outcomes) => {
                log::debug!(
                    "Rewrote {} into {} target(s), {} reused",
                    job.input.display(),
                    outcomes.len(),
                    outcomes.iter().filter(|o| o.cached).count()
                );
                Ok(outcomes)
            }
            Err(err) => {
                log::warn!("Rewrite of {} failed: {err}", job.input.display());
                for target in &job.targets {
                    discard_output(&target.output);
                }
                self.cache.invalidate();
                Err(err)
            }
        }
    }

    fn produce(&self, job: &RewriteJob, store: &Store, force: bool) -> Result<Vec<RewriteOutcome>> {
        if !job.input.is_file() {
            return Err(RewriteError::MissingInput(job.input.display().to_string()));
        }
        let classpath = resolve_classpath(&job.input, &job.classpath)?;
        let input_sha256 = fingerprint::file_sha256(&job.input)?;

        job.targets
            .iter()
            .map(|target| self.rewrite_target(job, target, store, &classpath, &input_sha256, force))
            .collect()
    }

    fn rewrite_target(
        &self,
        job: &RewriteJob,
        target: &RewriteTarget,
        store: &Store,
        classpath: &[PathBuf],
        input_sha256: &str,
        force: bool,
    ) -> Result<RewriteOutcome> {
        let pair = NamespacePair::new(job.from.as_str(), target.namespace.as_str());
        let primary = self.cache.resolve(store, &job.from, &target.namespace)?;

        let mut layers = Vec::with_capacity(1 + self.secondary.len());
        layers.push(MappingLayer::new("primary", primary, store.fingerprint()));
        layers.extend(self.secondary.iter().cloned());

        let metadata = RewriteMetadata {
            rewriter: self.rewriter.name().to_string(),
            input_sha256: input_sha256.to_string(),
            layers: layers.iter().map(|l| l.fingerprint().to_string()).collect(),
            flags: self.flags(),
            written_at_unix_ms: 0,
        };

        if !force && target.output.is_file() {
            if let Some(existing) = fingerprint::read_metadata(&target.output) {
                if existing.is_same_build(&metadata) {
                    log::debug!("Reusing {} ({pair})", target.output.display());
                    return Ok(RewriteOutcome {
                        namespace: target.namespace.clone(),
                        output: target.output.clone(),
                        cached: true,
                    });
                }
            }
        }

        log::info!(
            ":remapping {} ({pair}) -> {}",
            job.input.display(),
            target.output.display()
        );
        discard_output(&target.output);
        if let Some(parent) = target.output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RewriteError::io(parent, e))?;
        }

        let request = RewriteRequest {
            input: &job.input,
            output: &target.output,
            layers: &layers,
            classpath,
            pass_through_resources: self.config.pass_through_resources,
            rename_invalid_locals: self.config.rename_invalid_locals,
            rebuild_source_filenames: self.config.rebuild_source_filenames,
        };
        let failure = |message: String| RewriteError::RewriteFailure {
            rewriter: self.rewriter.name().to_string(),
            input: job.input.display().to_string(),
            output: target.output.display().to_string(),
            pair: pair.to_string(),
            message,
        };

        self.rewriter
            .rewrite(&request)
            .map_err(|err| failure(format!("{err:#}")))?;
        if !target.output.is_file() {
            return Err(failure("rewriter reported success but wrote no output".to_string()));
        }

        fingerprint::write_metadata(&target.output, &metadata)?;
        Ok(RewriteOutcome {
            namespace: target.namespace.clone(),
            output: target.output.clone(),
            cached: false,
        })
    }

    fn flags(&self) -> Vec<String> {
        [
            ("pass_through_resources", self.config.pass_through_resources),
            ("rename_invalid_locals", self.config.rename_invalid_locals),
            ("rebuild_source_filenames", self.config.rebuild_source_filenames),
        ]
        .into_iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| name.to_string())
        .collect()
    }
}

/// `<stem><suffix>.<ext>` next to `archive`
pub(crate) fn dev_path(archive: &Path, suffix: &str) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match archive.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    archive.with_file_name(name)
}

/// Existing entries only, first occurrence wins, `input` excluded
pub(crate) fn resolve_classpath(input: &Path, entries: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry == input {
            continue;
        }
        if !entry.exists() {
            return Err(RewriteError::MissingClasspath(entry.display().to_string()));
        }
        if seen.insert(entry.clone()) {
            out.push(entry.clone());
        }
    }
    Ok(out)
}

pub(crate) fn same_path(a: &Path, b: &Path) -> bool {
    match (absolute(a), absolute(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Canonical form of `path`, resolving only the parent when the file does not exist yet
fn absolute(path: &Path) -> Option<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Some(canonical);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|p| p.join(name))
}

pub(crate) fn discard_output(output: &Path) {
    if output.exists() {
        if let Err(err) = std::fs::remove_file(output) {
            log::warn!("Failed to delete {}: {err}", output.display());
        }
    }
    fingerprint::remove_metadata(output);
}
