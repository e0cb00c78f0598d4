use crate::backend::{ClassContext, DecompilerBackend};
use crate::config::DecompileConfig;
use crate::error::{DecompileError, Result};
use crate::line_map::LineMap;
use crate::writer::{AddedDirectories, ArchiveWriter};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Lifecycle of one class through a decompile job
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClassState {
    Queued,
    Decompiling,
    Decompiled,
    QueuedForWrite,
    Written,
}

#[derive(Debug)]
struct ClassStates {
    states: Mutex<Vec<ClassState>>,
}

impl ClassStates {
    fn new(count: usize) -> Self {
        Self {
            states: Mutex::new(vec![ClassState::Queued; count]),
        }
    }

    fn advance(&self, index: usize, next: ClassState) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = states.get_mut(index) {
            debug_assert!(*state < next, "class {index}: {state:?} -> {next:?}");
            *state = next;
        }
    }

    fn count(&self, state: ClassState) -> usize {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| **s == state)
            .count()
    }
}

/// Input archive plus where the sources and line map go
#[derive(Debug, Clone)]
pub struct DecompileJob {
    pub input: PathBuf,
    pub sources_output: PathBuf,
    pub line_map_output: Option<PathBuf>,
    pub libraries: Vec<PathBuf>,
}

impl DecompileJob {
    pub fn new(input: impl Into<PathBuf>, sources_output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            sources_output: sources_output.into(),
            line_map_output: None,
            libraries: Vec::new(),
        }
    }

    pub fn with_line_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.line_map_output = Some(path.into());
        self
    }

    pub fn with_libraries<I, P>(mut self, libraries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.libraries.extend(libraries.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecompileStats {
    /// `.class` entries found in the input
    pub classes: usize,
    /// Classes that produced a standalone source file
    pub sources_written: usize,
    pub source_bytes: u64,
    /// Directory entries in the output archive
    pub directories: usize,
    pub line_map_classes: usize,
}

struct WriteRequest {
    index: usize,
    path: String,
    data: Vec<u8>,
}

struct WriterReport {
    sources: usize,
    bytes: u64,
}

/// Removes the in-progress archive unless the job commits it
struct PartialOutput {
    path: Option<PathBuf>,
}

impl PartialOutput {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn commit(mut self, destination: &Path) -> Result<()> {
        let Some(path) = self.path.take() else {
            return Ok(());
        };
        std::fs::rename(&path, destination).map_err(|e| DecompileError::io(destination, e))
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        if let Err(err) = std::fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to delete partial output {}: {err}", path.display());
            }
        }
    }
}

/// Decompiles every class of an archive on a bounded worker pool into one source archive.
///
/// Workers run the backend on blocking threads and hand finished sources to a single writer
/// over a bounded channel. The first worker failure aborts the job; the partially written
/// archive is deleted and no line map is written.
pub struct DecompileOrchestrator {
    backend: Arc<dyn DecompilerBackend>,
    config: DecompileConfig,
}

impl DecompileOrchestrator {
    pub fn new(backend: Arc<dyn DecompilerBackend>, config: DecompileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn config(&self) -> &DecompileConfig {
        &self.config
    }

    pub async fn decompile(&self, job: &DecompileJob) -> Result<DecompileStats> {
        if !job.input.is_file() {
            return Err(DecompileError::io(
                &job.input,
                std::io::Error::new(std::io::ErrorKind::NotFound, "input archive not found"),
            ));
        }
        remove_stale(&job.sources_output)?;
        if let Some(line_map) = &job.line_map_output {
            remove_stale(line_map)?;
        }
        if let Some(parent) = job.sources_output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DecompileError::io(parent, e))?;
        }

        let input = job.input.clone();
        let classes = tokio::task::spawn_blocking(move || read_classes(&input)).await??;
        log::info!(
            ":decompiling {} classes from {} with `{}` on {} thread(s)",
            classes.len(),
            job.input.display(),
            self.backend.name(),
            self.config.threads
        );

        let partial_path = partial_path(&job.sources_output);
        let partial = PartialOutput::new(partial_path.clone());
        let class_count = classes.len();
        let states = Arc::new(ClassStates::new(class_count));
        let directories = AddedDirectories::default();
        let line_map = Arc::new(Mutex::new(LineMap::new()));

        let (tx, rx) = mpsc::channel::<WriteRequest>(self.config.writer_queue_capacity);
        let writer = {
            let states = states.clone();
            let directories = directories.clone();
            tokio::task::spawn_blocking(move || run_writer(&partial_path, directories, rx, &states))
        };

        let semaphore = Arc::new(Semaphore::new(self.config.threads));
        let options = Arc::new(self.config.backend_options.clone());
        let libraries: Arc<[PathBuf]> = job.libraries.clone().into();
        let mut workers = JoinSet::new();
        for (index, (entry_name, bytecode)) in classes.into_iter().enumerate() {
            let binary_name = entry_name
                .strip_suffix(".class")
                .unwrap_or(&entry_name)
                .to_string();
            let context = ClassContext {
                entry_name,
                binary_name,
                index,
                options: options.clone(),
                libraries: libraries.clone(),
            };
            workers.spawn(decompile_class(
                self.backend.clone(),
                semaphore.clone(),
                context,
                bytecode,
                states.clone(),
                line_map.clone(),
                tx.clone(),
            ));
        }
        drop(tx);

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(err) if err.is_cancelled() => continue,
                Err(err) => Err(err.into()),
            };
            if let Err(err) = result {
                if failure.is_none() {
                    log::warn!("Aborting decompilation of {}: {err}", job.input.display());
                    workers.abort_all();
                    failure = Some(err);
                }
            }
        }

        let report = match (failure, writer.await?) {
            (Some(DecompileError::WriterClosed), Err(err)) | (None, Err(err)) => return Err(err),
            (Some(err), _) => return Err(err),
            (None, Ok(report)) => report,
        };

        let pending = class_count
            - states.count(ClassState::Written)
            - states.count(ClassState::Decompiled);
        if pending != 0 {
            return Err(DecompileError::WriterClosed);
        }

        partial.commit(&job.sources_output)?;

        let line_map = std::mem::take(&mut *line_map.lock().unwrap_or_else(PoisonError::into_inner));
        if let Some(path) = &job.line_map_output {
            line_map.write_path(path)?;
        }

        let stats = DecompileStats {
            classes: class_count,
            sources_written: report.sources,
            source_bytes: report.bytes,
            directories: directories
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            line_map_classes: line_map.len(),
        };
        log::info!(
            ":decompiled {} -> {} ({} sources, {} bytes)",
            job.input.display(),
            job.sources_output.display(),
            stats.sources_written,
            stats.source_bytes
        );
        Ok(stats)
    }
}

async fn decompile_class(
    backend: Arc<dyn DecompilerBackend>,
    semaphore: Arc<Semaphore>,
    context: ClassContext,
    bytecode: Vec<u8>,
    states: Arc<ClassStates>,
    line_map: Arc<Mutex<LineMap>>,
    tx: mpsc::Sender<WriteRequest>,
) -> Result<()> {
    let index = context.index;
    let class = context.binary_name.clone();
    let backend_name = backend.name().to_string();

    let permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| DecompileError::Task("worker pool closed".to_string()))?;
    states.advance(index, ClassState::Decompiling);
    log::debug!("Decompiling {}", context.entry_name);

    let decompiled = tokio::task::spawn_blocking(move || backend.decompile(&context, &bytecode))
        .await?
        .map_err(|err| DecompileError::WorkerFailure {
            backend: backend_name,
            class: class.clone(),
            message: format!("{err:#}"),
        })?;
    drop(permit);
    states.advance(index, ClassState::Decompiled);

    let Some(decompiled) = decompiled else {
        return Ok(());
    };

    let path = decompiled.output_path();
    if let Some(report) = &decompiled.line_numbers {
        let lines = LineMap::compose(report);
        line_map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class, lines);
    }

    states.advance(index, ClassState::QueuedForWrite);
    tx.send(WriteRequest {
        index,
        path,
        data: decompiled.source.into_bytes(),
    })
    .await
    .map_err(|_| DecompileError::WriterClosed)
}

fn run_writer(
    path: &Path,
    directories: AddedDirectories,
    mut rx: mpsc::Receiver<WriteRequest>,
    states: &ClassStates,
) -> Result<WriterReport> {
    let mut writer = ArchiveWriter::create(path, directories)?;
    let mut report = WriterReport { sources: 0, bytes: 0 };
    while let Some(request) = rx.blocking_recv() {
        writer.write_entry(&request.path, &request.data)?;
        states.advance(request.index, ClassState::Written);
        report.sources += 1;
        report.bytes += request.data.len() as u64;
    }
    writer.finish()?;
    Ok(report)
}

/// `.class` entries sorted by name, with their bytes
fn read_classes(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let file = std::fs::File::open(path).map_err(|e| DecompileError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| DecompileError::archive(path, e))?;

    let mut classes = BTreeMap::new();
    for idx in 0..archive.len() {
        let mut entry = archive
            .by_index(idx)
            .map_err(|e| DecompileError::archive(path, e))?;
        if entry.is_dir() || !entry.name().ends_with(".class") {
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| DecompileError::io(path, e))?;
        classes.insert(name, bytes);
    }
    Ok(classes.into_iter().collect())
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(DecompileError::io(path, err)),
    }
}
