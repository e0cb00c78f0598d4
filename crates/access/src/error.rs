use crate::types::AccessLevel;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AccessError>;

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Two entries request different levels for one symbol
    #[error("Conflicting access for {symbol}: {existing} vs {requested}")]
    Conflict {
        symbol: String,
        existing: AccessLevel,
        requested: AccessLevel,
    },

    /// Symbol has no name in the target namespace
    #[error("Missing {from} -> {to} mapping for {symbol}")]
    UnresolvedSymbol {
        symbol: String,
        from: String,
        to: String,
    },

    #[error("Namespace mismatch: expected `{expected}`, found `{found}`")]
    NamespaceMismatch { expected: String, found: String },

    #[error("Mapping error: {0}")]
    Mapping(#[from] mapweave_mappings::MappingError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AccessError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    pub fn unresolved(symbol: impl Into<String>, from: &str, to: &str) -> Self {
        Self::UnresolvedSymbol {
            symbol: symbol.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
