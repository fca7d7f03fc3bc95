//! Module rank of the index hierarchy: one entry per module identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::path::PathIndex;
use super::{ModuleId, PathId};
use crate::model::identifier::ModuleIdentity;

/// Index entry for one module: the project itself (`{self}`), the language
/// runtime (`{lang-internal}`) or a third-party dependency (`name@version`).
///
/// Owns the path entries of that module, keyed both by path string and by
/// numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleIndex {
    /// Numeric id assigned by the owning global index
    pub id: ModuleId,

    /// Portable module identity
    pub identity: ModuleIdentity,

    path_ids: BTreeMap<String, PathId>,
    paths: BTreeMap<PathId, PathIndex>,
}

impl ModuleIndex {
    pub fn new(id: ModuleId, identity: ModuleIdentity) -> Self {
        Self {
            id,
            identity,
            path_ids: BTreeMap::new(),
            paths: BTreeMap::new(),
        }
    }

    /// Lookup-only resolution of a file path
    pub fn lookup_path(&self, path: &str) -> Option<PathId> {
        self.path_ids.get(path).copied()
    }

    /// Reverse lookup by numeric id
    pub fn path_by_id(&self, id: PathId) -> Option<&PathIndex> {
        self.paths.get(&id)
    }

    pub(super) fn path_by_id_mut(&mut self, id: PathId) -> Option<&mut PathIndex> {
        self.paths.get_mut(&id)
    }

    /// Number of files registered for this module
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// All path entries of this module, ordered by id
    pub fn paths(&self) -> impl Iterator<Item = &PathIndex> {
        self.paths.values()
    }

    /// Register an entry allocated by the global index
    pub(super) fn insert_path(&mut self, entry: PathIndex) {
        self.path_ids.insert(entry.path.clone(), entry.id);
        self.paths.insert(entry.id, entry);
    }
}
