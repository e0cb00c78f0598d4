use crate::config::RewriteConfig;
use crate::error::{Result, RewriteError};
use crate::orchestrator::{dev_path, discard_output, resolve_classpath, same_path};
use mapweave_mappings::{MappingCache, MappingSet, NamespacePair, Store};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// One compilation unit, keyed by its `/`-separated path inside the source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Everything a source rewriter sees for one tree
#[derive(Debug, Clone, Copy)]
pub struct SourceRewriteRequest<'a> {
    pub mappings: &'a MappingSet,
    /// Archives the rewriter resolves referenced types against
    pub classpath: &'a [PathBuf],
    pub files: &'a [SourceFile],
}

/// External tool that renames symbols inside Java sources.
///
/// Must return one rewritten file for every path in the request.
pub trait SourceRewriter: Send + Sync {
    fn name(&self) -> &str;

    fn rewrite(&self, request: &SourceRewriteRequest<'_>) -> anyhow::Result<Vec<SourceFile>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRemapOutcome {
    pub output: PathBuf,
    /// `.java` units passed through the rewriter
    pub sources: usize,
    /// Other files copied unchanged
    pub resources: usize,
}

/// Remaps a source archive or directory through a [`SourceRewriter`].
///
/// The output has the same shape as the input: an archive for an archive, a directory for a
/// directory. When the output path is the input archive, the input is moved aside to
/// `<stem><dev_suffix>.<ext>` first and restored if remapping fails. On any failure the output
/// is deleted.
pub struct SourceRemapOrchestrator<'c> {
    rewriter: Arc<dyn SourceRewriter>,
    cache: &'c MappingCache,
    config: RewriteConfig,
}

impl<'c> SourceRemapOrchestrator<'c> {
    pub fn new(
        rewriter: Arc<dyn SourceRewriter>,
        cache: &'c MappingCache,
        config: RewriteConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rewriter,
            cache,
            config,
        })
    }

    /// Remap `input` from `pair.from` to `pair.to` using the direct projection of `store`
    pub fn remap_sources(
        &self,
        input: &Path,
        store: &Store,
        pair: &NamespacePair,
        output: &Path,
        classpath: &[PathBuf],
    ) -> Result<SourceRemapOutcome> {
        let mappings = self.cache.resolve(store, pair.from.as_str(), pair.to.as_str())?;
        self.remap_with(input, &mappings, output, classpath)
    }

    /// Remap `input` with a prebuilt table, such as the output of a mappings join
    pub fn remap_with(
        &self,
        input: &Path,
        mappings: &MappingSet,
        output: &Path,
        classpath: &[PathBuf],
    ) -> Result<SourceRemapOutcome> {
        if !input.exists() {
            return Err(RewriteError::MissingInput(input.display().to_string()));
        }
        if output.exists() && output.is_dir() != input.is_dir() {
            return Err(RewriteError::Config(format!(
                "{} and {} must both be archives or both be directories",
                input.display(),
                output.display()
            )));
        }
        if !same_path(input, output) {
            return self.run(input, mappings, output, classpath);
        }
        if input.is_dir() {
            return Err(RewriteError::OutputIsInput(output.display().to_string()));
        }

        let dev = dev_path(input, &self.config.dev_suffix);
        if dev.exists() {
            std::fs::remove_file(&dev).map_err(|e| RewriteError::io(&dev, e))?;
        }
        std::fs::rename(input, &dev).map_err(|e| RewriteError::io(input, e))?;
        log::info!(":moved {} to {}", input.display(), dev.display());

        match self.run(&dev, mappings, output, classpath) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if let Err(restore) = std::fs::rename(&dev, input) {
                    log::warn!(
                        "Failed to restore {} from {}: {restore}",
                        input.display(),
                        dev.display()
                    );
                }
                Err(err)
            }
        }
    }

    fn run(
        &self,
        input: &Path,
        mappings: &MappingSet,
        output: &Path,
        classpath: &[PathBuf],
    ) -> Result<SourceRemapOutcome> {
        log::info!(
            ":remapping sources {} ({}) -> {}",
            input.display(),
            mappings.pair(),
            output.display()
        );
        let result = self.produce(input, mappings, output, classpath);
        if let Err(err) = &result {
            log::warn!("Source remap of {} failed: {err}", input.display());
            discard_tree(output);
            self.cache.invalidate();
        }
        result
    }

    fn produce(
        &self,
        input: &Path,
        mappings: &MappingSet,
        output: &Path,
        classpath: &[PathBuf],
    ) -> Result<SourceRemapOutcome> {
        let classpath = resolve_classpath(input, classpath)?;
        let entries = if input.is_dir() {
            read_directory(input)?
        } else {
            read_archive(input)?
        };

        let mut files = Vec::new();
        let mut resources = Vec::new();
        for (path, bytes) in entries {
            if !is_java_file(&path) {
                if self.config.pass_through_resources {
                    resources.push((path, bytes));
                }
                continue;
            }
            let text = String::from_utf8(bytes).map_err(|e| RewriteError::InvalidSource {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            files.push(SourceFile { path, text });
        }

        let failure = |message: String| RewriteError::RewriteFailure {
            rewriter: self.rewriter.name().to_string(),
            input: input.display().to_string(),
            output: output.display().to_string(),
            pair: mappings.pair().to_string(),
            message,
        };
        let request = SourceRewriteRequest {
            mappings,
            classpath: &classpath,
            files: &files,
        };
        let rewritten = self
            .rewriter
            .rewrite(&request)
            .map_err(|err| failure(format!("{err:#}")))?;

        let mut by_path: BTreeMap<String, String> = rewritten
            .into_iter()
            .map(|file| (file.path, file.text))
            .collect();
        let mut out: Vec<(String, Vec<u8>)> = Vec::with_capacity(files.len() + resources.len());
        for file in &files {
            let text = by_path
                .remove(&file.path)
                .ok_or_else(|| failure(format!("no output for {}", file.path)))?;
            out.push((file.path.clone(), text.into_bytes()));
        }
        if let Some(extra) = by_path.keys().next() {
            return Err(failure(format!("output for unknown file {extra}")));
        }
        let sources = out.len();
        let resource_count = resources.len();
        out.extend(resources);
        out.sort_by(|a, b| a.0.cmp(&b.0));

        discard_tree(output);
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RewriteError::io(parent, e))?;
        }
        if input.is_dir() {
            write_directory(output, &out)?;
        } else {
            write_archive(output, &out)?;
        }

        log::debug!(
            "Remapped {sources} source file(s), copied {resource_count} resource(s) into {}",
            output.display()
        );
        Ok(SourceRemapOutcome {
            output: output.to_path_buf(),
            sources,
            resources: resource_count,
        })
    }
}

fn is_java_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.len() > ".java".len() && name.ends_with(".java")
}

fn read_archive(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let file = std::fs::File::open(path).map_err(|e| RewriteError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| RewriteError::archive(path, e))?;
    let mut out = Vec::with_capacity(archive.len());
    for idx in 0..archive.len() {
        let mut entry = archive
            .by_index(idx)
            .map_err(|e| RewriteError::archive(path, e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| RewriteError::io(path, e))?;
        out.push((name, bytes));
    }
    Ok(out)
}

fn read_directory(root: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| RewriteError::io(root, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = std::fs::read(entry.path()).map_err(|e| RewriteError::io(entry.path(), e))?;
        out.push((name, bytes));
    }
    Ok(out)
}

fn write_archive(path: &Path, entries: &[(String, Vec<u8>)]) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| RewriteError::io(path, e))?;
    let mut zip = ZipWriter::new(std::io::BufWriter::new(file));
    let mut directories = BTreeSet::new();
    for (name, bytes) in entries {
        for (idx, _) in name.match_indices('/') {
            let dir = &name[..=idx];
            if directories.insert(dir.to_string()) {
                zip.add_directory(dir, entry_options())
                    .map_err(|e| RewriteError::archive(path, e))?;
            }
        }
        zip.start_file(name.as_str(), entry_options())
            .map_err(|e| RewriteError::archive(path, e))?;
        zip.write_all(bytes).map_err(|e| RewriteError::io(path, e))?;
    }
    let mut inner = zip.finish().map_err(|e| RewriteError::archive(path, e))?;
    inner.flush().map_err(|e| RewriteError::io(path, e))
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .last_modified_time(DateTime::default())
        .compression_method(CompressionMethod::Deflated)
}

fn write_directory(root: &Path, entries: &[(String, Vec<u8>)]) -> Result<()> {
    for (name, bytes) in entries {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RewriteError::io(parent, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| RewriteError::io(&path, e))?;
    }
    Ok(())
}

fn discard_tree(output: &Path) {
    if !output.is_dir() {
        discard_output(output);
        return;
    }
    if let Err(err) = std::fs::remove_dir_all(output) {
        log::warn!("Failed to delete {}: {err}", output.display());
    }
}
