use thiserror::Error;

/// Result type for mapping operations
pub type Result<T> = std::result::Result<T, MappingError>;

/// Errors raised while loading or querying mapping documents
#[derive(Error, Debug)]
pub enum MappingError {
    /// Malformed mapping document
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Namespace is not declared by the document header
    #[error("Unknown namespace `{namespace}` (declared: {declared})")]
    UnknownNamespace { namespace: String, declared: String },

    /// Descriptor could not be decoded
    #[error("Invalid descriptor `{descriptor}`: {reason}")]
    InvalidDescriptor { descriptor: String, reason: String },

    /// IO error while reading a mapping document
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl MappingError {
    /// Create a parse error for a 1-indexed document line
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid descriptor error
    pub fn descriptor(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }
}
