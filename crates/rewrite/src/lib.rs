//! # Mapweave Rewrite
//!
//! Applies resolved mapping tables to compiled archives through an external bytecode rewriter,
//! and to source archives or directories through an external source rewriter.
//!
//! ## Architecture
//!
//! ```text
//! RewriteJob (input, from, targets, classpath)
//!     │
//!     ├──> MappingCache::resolve(store, from, to)   primary layer
//!     ├──> secondary layers                         always appended
//!     │
//!     ├──> <output>.remap.json matches?  ──yes──> reuse output
//!     │
//!     └──> BinaryRewriter::rewrite(RewriteRequest)
//!            ├─ ok + output present  -> write metadata
//!            └─ error / no output    -> delete every output of the job,
//!                                       invalidate the cache, return error
//!
//! source tree (archive or directory)
//!     ├──> .java units ──> SourceRewriter::rewrite(SourceRewriteRequest)
//!     └──> other files ──> copied unchanged
//!            └─ any failure -> delete the output, restore a moved-aside input
//! ```

mod config;
mod error;
mod fingerprint;
mod orchestrator;
mod rewriter;
mod source;

pub use config::RewriteConfig;
pub use error::{Result, RewriteError};
pub use fingerprint::{file_sha256, metadata_path, read_metadata, RewriteMetadata};
pub use orchestrator::{RewriteJob, RewriteOrchestrator, RewriteOutcome, RewriteTarget};
pub use rewriter::{BinaryRewriter, MappingLayer, RewriteRequest, RewriterRegistry};
pub use source::{
    SourceFile, SourceRemapOrchestrator, SourceRemapOutcome, SourceRewriteRequest, SourceRewriter,
};
