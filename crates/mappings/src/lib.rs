//! # Mapweave Mappings
//!
//! Namespace-aware symbol mappings for compiled JVM artifacts.
//!
//! A mapping document names every class, field and method once per namespace (for example
//! `official` obfuscated names, stable `intermediary` names and human readable `named` names).
//!
//! ## Architecture
//!
//! ```text
//! Tiny v1 / v2 document
//!     │
//!     ├──> Store (immutable, document order)
//!     │      ├─ one name per namespace per entity
//!     │      └─ member descriptors derived for every namespace
//!     │
//!     ├──> MappingSet::from_store (direct A -> B projection)
//!     │
//!     └──> MappingsJoiner (S1.to -> S2.to through a shared namespace)
//!            └─ unmatched entities keep their own name
//! ```
//!
//! ## Example
//!
//! ```rust
//! use mapweave_mappings::{join_mappings, Store};
//!
//! let current = Store::load("v1\tofficial\tintermediary\tnamed\nCLASS\ta\tint_a\tClassA\n").unwrap();
//! let target = Store::load("v1\tintermediary\tnamed\nCLASS\tint_a\tClassA2\n").unwrap();
//!
//! let set = join_mappings(&current, &target, "intermediary", "named").unwrap();
//! assert_eq!(set.class_name("ClassA"), Some("ClassA2"));
//! ```

mod cache;
mod descriptor;
mod error;
mod joiner;
mod mapping_set;
mod namespace;
mod store;
mod tiny;

pub use cache::MappingCache;
pub use descriptor::{is_method_descriptor, referenced_classes, remap_descriptor};
pub use error::{MappingError, Result};
pub use joiner::{join_mappings, JoinStats, MappingsJoiner};
pub use mapping_set::{ClassMapping, MappingSet, MemberKey};
pub use namespace::{Namespace, NamespaceId, NamespacePair, Namespaces};
pub use store::{ClassDef, MemberDef, MemberKind, Named, Store};
pub use tiny::{detect_format, MappingFormat};
