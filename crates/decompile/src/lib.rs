//! # Mapweave Decompile
//!
//! Whole-archive decompilation on a bounded worker pool, producing one source archive and a
//! line map from original class-file lines to decompiled source lines.
//!
//! ## Architecture
//!
//! ```text
//! compiled archive
//!     │  (sorted .class entries)
//!     ▼
//! JoinSet of workers ── Semaphore(threads) ──> DecompilerBackend (blocking thread)
//!     │                                            │
//!     │   LineNumberReport ── compose ──> LineMap (Mutex, keyed by class)
//!     │
//!     └── mpsc (bounded) ──> single ArchiveWriter ──> <sources>.partial
//!                                │
//!              all ok: rename to <sources>, write line map
//!              any failure: abort workers, delete <sources>.partial
//! ```
//!
//! Per class: `Queued -> Decompiling -> Decompiled -> QueuedForWrite -> Written`.

mod backend;
mod config;
mod error;
mod line_map;
mod orchestrator;
mod writer;

pub use backend::{
    BackendRegistry, ClassContext, DecompiledClass, DecompilerBackend, LineNumberReport,
};
pub use config::{parse_thread_count, DecompileConfig, MAX_DECOMPILE_THREADS, THREADS_ENV};
pub use error::{DecompileError, Result};
pub use line_map::LineMap;
pub use orchestrator::{ClassState, DecompileJob, DecompileOrchestrator, DecompileStats};
pub use writer::{AddedDirectories, ArchiveWriter};
