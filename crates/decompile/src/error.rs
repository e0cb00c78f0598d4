use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecompileError>;

#[derive(Error, Debug)]
pub enum DecompileError {
    /// A backend failed on one class; the whole job is abandoned
    #[error("Failed to decompile {class} with `{backend}`: {message}")]
    WorkerFailure {
        backend: String,
        class: String,
        message: String,
    },

    #[error("Archive error on {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Line map parse error at line {line}: {message}")]
    LineMapParse { line: usize, message: String },

    #[error("Unknown decompiler backend `{name}` (available: {available})")]
    UnknownBackend { name: String, available: String },

    #[error("Invalid decompile config: {0}")]
    Config(String),

    #[error("Output writer stopped before all sources were written")]
    WriterClosed,

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DecompileError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn archive(path: &Path, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn line_map(line: usize, message: impl Into<String>) -> Self {
        Self::LineMapParse {
            line,
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for DecompileError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
