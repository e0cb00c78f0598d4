use std::path::Path;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RewriteError>;

#[derive(Error, Debug)]
pub enum RewriteError {
    /// The external rewriter reported an error or produced nothing
    #[error("Failed to rewrite {input} -> {output} ({pair}) with `{rewriter}`: {message}")]
    RewriteFailure {
        rewriter: String,
        input: String,
        output: String,
        pair: String,
        message: String,
    },

    #[error("Input archive not found: {0}")]
    MissingInput(String),

    /// A target would overwrite the archive it is read from
    #[error("Output {0} is the input archive; rewrite it in place instead")]
    OutputIsInput(String),

    /// A `.java` unit that is not valid UTF-8
    #[error("Invalid source file {path}: {reason}")]
    InvalidSource { path: String, reason: String },

    #[error("Classpath entry not found: {0}")]
    MissingClasspath(String),

    #[error("Unknown rewriter `{name}` (available: {available})")]
    UnknownRewriter { name: String, available: String },

    #[error("Invalid rewrite config: {0}")]
    Config(String),

    #[error("Mapping error: {0}")]
    Mapping(#[from] mapweave_mappings::MappingError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Archive error on {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RewriteError {
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
}
