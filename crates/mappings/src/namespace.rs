use crate::error::{MappingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label of one naming scheme (e.g. `official`, `intermediary`, `named`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Namespace {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Namespace {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Column position of a namespace inside one loaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(pub(crate) usize);

impl NamespaceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered (source, target) namespace pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacePair {
    pub from: Namespace,
    pub to: Namespace,
}

impl NamespacePair {
    pub fn new(from: impl Into<Namespace>, to: impl Into<Namespace>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl fmt::Display for NamespacePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Namespace header of a mapping document, in column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    names: Vec<Namespace>,
}

impl Namespaces {
    pub(crate) fn new(names: Vec<Namespace>) -> Result<Self> {
        if names.is_empty() {
            return Err(MappingError::parse(1, "header declares no namespaces"));
        }
        for (idx, name) in names.iter().enumerate() {
            if name.as_str().is_empty() {
                return Err(MappingError::parse(1, "header declares an empty namespace"));
            }
            if names[..idx].contains(name) {
                return Err(MappingError::parse(
                    1,
                    format!("namespace `{name}` declared twice"),
                ));
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.names.iter().any(|n| n.as_str() == namespace)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.names.iter()
    }

    /// Resolve a namespace label to its column
    pub fn resolve(&self, namespace: &str) -> Result<NamespaceId> {
        self.names
            .iter()
            .position(|n| n.as_str() == namespace)
            .map(NamespaceId)
            .ok_or_else(|| MappingError::UnknownNamespace {
                namespace: namespace.to_string(),
                declared: self
                    .names
                    .iter()
                    .map(Namespace::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub fn get(&self, id: NamespaceId) -> &Namespace {
        &self.names[id.0]
    }
}
