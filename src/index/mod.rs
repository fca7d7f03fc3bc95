//! Index hierarchy: stable integer identities for one measurement session.
//!
//! Four ranks: `GlobalIndex` owns `ModuleIndex` entries, which own
//! `PathIndex` entries, which own `SourceNodeIndex` leaves. Resolution comes
//! in two flavors per rank: `ensure_*` (upsert, creates on first reference)
//! and `lookup_*` (get, never creates). Children reference their owners by
//! id, which keeps the hierarchy a plain-data arena and makes migrating an
//! entry into another index (`insert_*_into`) a copy of its identity triple.

pub mod global;
pub mod module;
pub mod path;
pub mod source_node;

/// Numeric id of a module entry
pub type ModuleId = u32;

/// Numeric id of a path entry
pub type PathId = u32;

/// Numeric id of a source-node entry
pub type SourceNodeId = u32;

pub use global::{GlobalIndex, SourceNodeLocation};
pub use module::ModuleIndex;
pub use path::PathIndex;
pub use source_node::SourceNodeIndex;
