//! Leaf rank of the index hierarchy: one entry per scope inside a file.

use serde::{Deserialize, Serialize};

use super::{ModuleId, PathId, SourceNodeId};

/// Index entry for one source node (function, method, class scope).
///
/// Back-references to the owning ranks are stored as ids, never as
/// pointers, so entries can be migrated between indices as plain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceNodeIndex {
    /// Numeric id assigned by the owning global index
    pub id: SourceNodeId,

    /// Canonical scope identifier within the file,
    /// e.g. `{root}.{class:X}.{method:y}`
    pub identifier: String,

    /// Owning path entry
    pub path_id: PathId,

    /// Module owning the path entry
    pub module_id: ModuleId,
}

impl SourceNodeIndex {
    pub fn new(id: SourceNodeId, identifier: impl Into<String>, path_id: PathId, module_id: ModuleId) -> Self {
        Self {
            id,
            identifier: identifier.into(),
            path_id,
            module_id,
        }
    }
}
