//! Root of the index hierarchy.
//!
//! The `GlobalIndex` is the arena: it owns every module, path and
//! source-node entry of one measurement session and hands out the numeric
//! ids. Ids are monotonic per rank, never reused, and meaningless outside
//! the index instance that allocated them - only the string identity triple
//! (module identity, path, scope identifier) is portable across sessions.
//!
//! All three allocators live here so that path and source-node ids are
//! unique across the whole session; reference maps and file rollups key on
//! them across module boundaries (see DESIGN.md).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::module::ModuleIndex;
use super::path::PathIndex;
use super::source_node::SourceNodeIndex;
use super::{ModuleId, PathId, SourceNodeId};
use crate::codec::{BufferReader, BufferWriter};
use crate::model::identifier::{ModuleIdentity, SourceNodeIdentity};
use crate::utils::config::FIRST_INDEX_ID;
use crate::utils::error::{CodecError, IndexError};

/// Reverse-lookup location of a source node: which module and file own it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceNodeLocation {
    pub module_id: ModuleId,
    pub path_id: PathId,
}

/// Identity arena for one measurement session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalIndex {
    module_ids: BTreeMap<String, ModuleId>,
    modules: BTreeMap<ModuleId, ModuleIndex>,
    path_locations: BTreeMap<PathId, ModuleId>,
    source_node_locations: BTreeMap<SourceNodeId, SourceNodeLocation>,
    next_module_id: ModuleId,
    next_path_id: PathId,
    next_source_node_id: SourceNodeId,
}

impl Default for GlobalIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            module_ids: BTreeMap::new(),
            modules: BTreeMap::new(),
            path_locations: BTreeMap::new(),
            source_node_locations: BTreeMap::new(),
            next_module_id: FIRST_INDEX_ID,
            next_path_id: FIRST_INDEX_ID,
            next_source_node_id: FIRST_INDEX_ID,
        }
    }

    // --- module rank ---

    /// Upsert: return the module's id, allocating an entry on first reference
    pub fn ensure_module(&mut self, identity: &ModuleIdentity) -> ModuleId {
        let identifier = identity.identifier();
        if let Some(id) = self.module_ids.get(&identifier) {
            return *id;
        }

        let id = self.next_module_id;
        self.next_module_id += 1;
        self.module_ids.insert(identifier, id);
        self.modules.insert(id, ModuleIndex::new(id, identity.clone()));
        id
    }

    /// Lookup-only: never creates
    pub fn lookup_module(&self, identity: &ModuleIdentity) -> Option<ModuleId> {
        self.module_ids.get(&identity.identifier()).copied()
    }

    /// Reverse lookup by numeric id
    pub fn module_by_id(&self, id: ModuleId) -> Option<&ModuleIndex> {
        self.modules.get(&id)
    }

    /// All module entries, ordered by id
    pub fn modules(&self) -> impl Iterator<Item = &ModuleIndex> {
        self.modules.values()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    // --- path rank ---

    /// Upsert a file path under a module.
    ///
    /// # Errors
    /// * `IndexError::UnknownModuleId` - the module id was never allocated
    ///   here (an internal-consistency bug in the caller)
    pub fn ensure_path(&mut self, module_id: ModuleId, path: &str) -> Result<PathId, IndexError> {
        let module = self
            .modules
            .get_mut(&module_id)
            .ok_or(IndexError::UnknownModuleId(module_id))?;

        if let Some(id) = module.lookup_path(path) {
            return Ok(id);
        }

        let id = self.next_path_id;
        self.next_path_id += 1;
        module.insert_path(PathIndex::new(id, path, module_id));
        self.path_locations.insert(id, module_id);
        Ok(id)
    }

    /// Lookup-only: never creates
    pub fn lookup_path(&self, module_id: ModuleId, path: &str) -> Option<PathId> {
        self.modules.get(&module_id)?.lookup_path(path)
    }

    /// Reverse lookup by numeric id
    pub fn path_by_id(&self, id: PathId) -> Option<&PathIndex> {
        let module_id = self.path_locations.get(&id)?;
        self.modules.get(module_id)?.path_by_id(id)
    }

    /// Set the source-state flags of a path entry
    ///
    /// # Errors
    /// * `IndexError::UnknownPathId` - the path id was never allocated here
    pub fn set_path_flags(
        &mut self,
        path_id: PathId,
        present_in_original_source_code: bool,
        contains_uncommitted_changes: bool,
    ) -> Result<(), IndexError> {
        let module_id = self
            .path_locations
            .get(&path_id)
            .copied()
            .ok_or(IndexError::UnknownPathId(path_id))?;
        let path = self
            .modules
            .get_mut(&module_id)
            .ok_or(IndexError::UnknownModuleId(module_id))?
            .path_by_id_mut(path_id)
            .ok_or(IndexError::UnknownPathId(path_id))?;

        path.present_in_original_source_code = present_in_original_source_code;
        path.contains_uncommitted_changes = contains_uncommitted_changes;
        Ok(())
    }

    // --- source-node rank ---

    /// Upsert a scope identifier under a file.
    ///
    /// # Errors
    /// * `IndexError::UnknownPathId` - the path id was never allocated here
    pub fn ensure_source_node(
        &mut self,
        path_id: PathId,
        identifier: &str,
    ) -> Result<SourceNodeId, IndexError> {
        let module_id = self
            .path_locations
            .get(&path_id)
            .copied()
            .ok_or(IndexError::UnknownPathId(path_id))?;
        let path = self
            .modules
            .get_mut(&module_id)
            .ok_or(IndexError::UnknownModuleId(module_id))?
            .path_by_id_mut(path_id)
            .ok_or(IndexError::UnknownPathId(path_id))?;

        if let Some(id) = path.lookup_source_node(identifier) {
            return Ok(id);
        }

        let id = self.next_source_node_id;
        self.next_source_node_id += 1;
        path.insert_source_node(SourceNodeIndex::new(id, identifier, path_id, module_id));
        self.source_node_locations
            .insert(id, SourceNodeLocation { module_id, path_id });
        Ok(id)
    }

    /// Lookup-only: never creates
    pub fn lookup_source_node(&self, path_id: PathId, identifier: &str) -> Option<SourceNodeId> {
        self.path_by_id(path_id)?.lookup_source_node(identifier)
    }

    /// Reverse lookup by numeric id
    pub fn source_node_by_id(&self, id: SourceNodeId) -> Option<&SourceNodeIndex> {
        let location = self.source_node_locations.get(&id)?;
        self.modules
            .get(&location.module_id)?
            .path_by_id(location.path_id)?
            .source_node_by_id(id)
    }

    /// Where a source node lives (module and path ids)
    pub fn source_node_location(&self, id: SourceNodeId) -> Option<SourceNodeLocation> {
        self.source_node_locations.get(&id).copied()
    }

    pub fn source_node_count(&self) -> usize {
        self.source_node_locations.len()
    }

    /// Rebuild the portable identity triple of a source node.
    ///
    /// # Errors
    /// * `IndexError::UnknownSourceNodeId` - the id was never allocated here;
    ///   callers use this where the id is required to exist, so a miss is an
    ///   internal-consistency error, not a soft lookup failure
    pub fn source_node_identity(&self, id: SourceNodeId) -> Result<SourceNodeIdentity, IndexError> {
        let location = self
            .source_node_locations
            .get(&id)
            .ok_or(IndexError::UnknownSourceNodeId(id))?;
        let module = self
            .modules
            .get(&location.module_id)
            .ok_or(IndexError::UnknownModuleId(location.module_id))?;
        let path = module
            .path_by_id(location.path_id)
            .ok_or(IndexError::UnknownPathId(location.path_id))?;
        let node = path
            .source_node_by_id(id)
            .ok_or(IndexError::UnknownSourceNodeId(id))?;

        Ok(SourceNodeIdentity::new(
            module.identity.clone(),
            path.path.clone(),
            node.identifier.clone(),
        ))
    }

    // --- migration ---

    /// Copy a path entry's identity into a different index, reusing an
    /// existing entry there or allocating a fresh id. Flags travel with the
    /// copy only when the target entry is created fresh.
    pub fn insert_path_into(
        &self,
        path_id: PathId,
        target: &mut GlobalIndex,
    ) -> Result<PathId, IndexError> {
        let path = self.path_by_id(path_id).ok_or(IndexError::UnknownPathId(path_id))?;
        let module = self
            .modules
            .get(&path.module_id)
            .ok_or(IndexError::UnknownModuleId(path.module_id))?;

        let target_module = target.ensure_module(&module.identity);
        if let Some(existing) = target.lookup_path(target_module, &path.path) {
            return Ok(existing);
        }

        let fresh = target.ensure_path(target_module, &path.path)?;
        target.set_path_flags(
            fresh,
            path.present_in_original_source_code,
            path.contains_uncommitted_changes,
        )?;
        Ok(fresh)
    }

    /// Copy a source-node entry's identity triple into a different index.
    ///
    /// This is the primitive normalization and merge are built on: the
    /// target index reuses its own entry when the triple is already known
    /// and allocates a fresh id otherwise.
    pub fn insert_source_node_into(
        &self,
        id: SourceNodeId,
        target: &mut GlobalIndex,
    ) -> Result<SourceNodeId, IndexError> {
        let location = self
            .source_node_locations
            .get(&id)
            .ok_or(IndexError::UnknownSourceNodeId(id))?;
        let node = self
            .source_node_by_id(id)
            .ok_or(IndexError::UnknownSourceNodeId(id))?;

        let target_path = self.insert_path_into(location.path_id, target)?;
        target.ensure_source_node(target_path, &node.identifier)
    }

    // --- binary codec ---

    /// Encode the full index: modules, their paths, their source nodes,
    /// with all assigned ids and path flags
    pub fn to_buffer(&self, writer: &mut BufferWriter) -> Result<(), CodecError> {
        writer.write_map(
            &self.modules,
            |w, id| {
                w.write_u32(*id);
                Ok(())
            },
            |w, module| {
                w.write_string(&module.identity.identifier())?;
                let paths: BTreeMap<PathId, &PathIndex> =
                    module.paths().map(|p| (p.id, p)).collect();
                w.write_map(
                    &paths,
                    |w, id| {
                        w.write_u32(*id);
                        Ok(())
                    },
                    |w, path| {
                        w.write_string(&path.path)?;
                        w.write_bool(path.present_in_original_source_code);
                        w.write_bool(path.contains_uncommitted_changes);
                        let nodes: BTreeMap<SourceNodeId, &SourceNodeIndex> =
                            path.source_nodes().map(|n| (n.id, n)).collect();
                        w.write_map(
                            &nodes,
                            |w, id| {
                                w.write_u32(*id);
                                Ok(())
                            },
                            |w, node| w.write_string(&node.identifier),
                        )
                    },
                )
            },
        )
    }

    /// Decode an index encoded by [`Self::to_buffer`], rebuilding the
    /// reverse tables and resuming the allocators past the highest
    /// decoded id of each rank
    pub fn from_buffer(reader: &mut BufferReader<'_>) -> Result<Self, CodecError> {
        type RawPath = (String, bool, bool, BTreeMap<SourceNodeId, String>);

        let raw_modules = reader.read_map(
            "global index modules",
            |r| r.read_u32("module id"),
            |r| {
                let identifier = r.read_string("module identifier")?;
                let paths: BTreeMap<PathId, RawPath> = r.read_map(
                    "module paths",
                    |r| r.read_u32("path id"),
                    |r| {
                        let path = r.read_string("path")?;
                        let present = r.read_bool("path flag: present in source")?;
                        let uncommitted = r.read_bool("path flag: uncommitted changes")?;
                        let nodes = r.read_map(
                            "path source nodes",
                            |r| r.read_u32("source node id"),
                            |r| r.read_string("source node identifier"),
                        )?;
                        Ok((path, present, uncommitted, nodes))
                    },
                )?;
                Ok((identifier, paths))
            },
        )?;

        let mut index = Self::new();
        for (module_id, (identifier, paths)) in raw_modules {
            let identity = ModuleIdentity::from_identifier(&identifier);
            let mut module = ModuleIndex::new(module_id, identity);
            index.next_module_id = index.next_module_id.max(module_id + 1);
            index.module_ids.insert(identifier, module_id);

            for (path_id, (path, present, uncommitted, nodes)) in paths {
                let mut path_entry = PathIndex::new(path_id, path, module_id);
                path_entry.present_in_original_source_code = present;
                path_entry.contains_uncommitted_changes = uncommitted;
                index.next_path_id = index.next_path_id.max(path_id + 1);
                index.path_locations.insert(path_id, module_id);

                for (node_id, identifier) in nodes {
                    path_entry.insert_source_node(SourceNodeIndex::new(
                        node_id, identifier, path_id, module_id,
                    ));
                    index.next_source_node_id = index.next_source_node_id.max(node_id + 1);
                    index
                        .source_node_locations
                        .insert(node_id, SourceNodeLocation { module_id, path_id });
                }

                module.insert_path(path_entry);
            }

            index.modules.insert(module_id, module);
        }

        Ok(index)
    }
}
