//! Path rank of the index hierarchy: one entry per source file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::source_node::SourceNodeIndex;
use super::{ModuleId, PathId, SourceNodeId};

/// Index entry for one source file within a module.
///
/// Owns the source-node entries of that file, keyed both by scope
/// identifier (for upsert/lookup) and by numeric id (for reverse lookup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathIndex {
    /// Numeric id assigned by the owning global index
    pub id: PathId,

    /// File path, relative to the module or execution root
    pub path: String,

    /// Owning module entry
    pub module_id: ModuleId,

    /// The scope still exists after re-parsing the file
    pub present_in_original_source_code: bool,

    /// The file's on-disk content is unsaved relative to its last
    /// known committed revision
    pub contains_uncommitted_changes: bool,

    node_ids: BTreeMap<String, SourceNodeId>,
    nodes: BTreeMap<SourceNodeId, SourceNodeIndex>,
}

impl PathIndex {
    pub fn new(id: PathId, path: impl Into<String>, module_id: ModuleId) -> Self {
        Self {
            id,
            path: path.into(),
            module_id,
            present_in_original_source_code: true,
            contains_uncommitted_changes: false,
            node_ids: BTreeMap::new(),
            nodes: BTreeMap::new(),
        }
    }

    /// Lookup-only resolution of a scope identifier
    pub fn lookup_source_node(&self, identifier: &str) -> Option<SourceNodeId> {
        self.node_ids.get(identifier).copied()
    }

    /// Reverse lookup by numeric id
    pub fn source_node_by_id(&self, id: SourceNodeId) -> Option<&SourceNodeIndex> {
        self.nodes.get(&id)
    }

    /// Number of source nodes registered for this file
    pub fn source_node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All source-node entries of this file, ordered by id
    pub fn source_nodes(&self) -> impl Iterator<Item = &SourceNodeIndex> {
        self.nodes.values()
    }

    /// Register an entry allocated by the global index
    pub(super) fn insert_source_node(&mut self, entry: SourceNodeIndex) {
        self.node_ids.insert(entry.identifier.clone(), entry.id);
        self.nodes.insert(entry.id, entry);
    }
}
