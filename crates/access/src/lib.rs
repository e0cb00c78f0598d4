//! # Mapweave Access
//!
//! Access overrides (`accessWidener` files) and their translation between mapping namespaces.
//!
//! ## Architecture
//!
//! ```text
//! accessWidener v1 <ns> file
//!     │
//!     ├──> AccessSpecification (sorted, merge-on-insert)
//!     │      └─ same level twice: no-op, different level: Conflict
//!     │
//!     └──> remap(spec, store, target)
//!            ├─ class keys: Store class table, missing -> UnresolvedSymbol
//!            └─ member keys: owner + name + descriptor translated together
//! ```

mod error;
mod reader;
mod remapper;
mod types;

pub use error::{AccessError, Result};
pub use remapper::{remap, AccessRemapper};
pub use types::{AccessLevel, AccessSpecification, MemberRef};
