//! The root report of one measurement run.
//!
//! A `ProjectReport` owns the session's `GlobalIndex` next to the report
//! body, so every id appearing in the tree is resolvable through it - in
//! memory and in the persisted form, where the index is embedded after the
//! root frame.

use serde::{Deserialize, Serialize};

use super::identifier::SourceNodeIdentity;
use super::report::{Report, ReportKind};
use super::sensor_values::SensorValues;
use super::source_file::SourceFileRecord;
use super::source_node::{ReferenceKind, SourceNodeRecord};
use super::version::ReportVersion;
use crate::codec::{BufferReader, BufferWriter};
use crate::index::{GlobalIndex, PathId, SourceNodeId};
use crate::utils::config::CURRENT_REPORT_VERSION;
use crate::utils::error::{CodecError, ReportError, ValidationError};

/// Hands out the runtime tags that distinguish in-memory report instances.
///
/// Owned by whatever orchestrates a measurement run and threaded through
/// report construction, so tests can run with independent counters instead
/// of sharing process-wide state.
#[derive(Debug, Default)]
pub struct InternalIdCounter {
    next: u32,
}

impl InternalIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Result of resolving a bare numeric source-node id against a report.
///
/// Stale or foreign ids come back as the miss variants instead of an error,
/// so callers can degrade gracefully.
#[derive(Debug)]
pub enum SourceNodeLookup<'a> {
    Found {
        path_id: PathId,
        file: &'a SourceFileRecord,
        record: &'a SourceNodeRecord,
    },
    /// The id (or its owning file) is unknown to this report
    NoSuchPath { id: SourceNodeId },
    /// The file exists but holds no record for the id
    NoSuchNode { id: SourceNodeId, path_id: PathId },
}

/// Root report: the global index plus the measurement tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReport {
    /// Runtime-only tag distinguishing in-memory instances; never persisted
    #[serde(skip)]
    pub internal_id: u32,

    pub global_index: GlobalIndex,

    #[serde(flatten)]
    pub report: Report,
}

// the runtime tag does not take part in equality
impl PartialEq for ProjectReport {
    fn eq(&self, other: &Self) -> bool {
        self.global_index == other.global_index && self.report == other.report
    }
}

impl ProjectReport {
    /// Create an empty report at the current version
    pub fn new(kind: ReportKind, counter: &mut InternalIdCounter) -> Self {
        Self::with_version(CURRENT_REPORT_VERSION, kind, counter)
    }

    /// Create an empty report at a specific version (used by merge,
    /// normalization and the decoder)
    pub fn with_version(
        report_version: ReportVersion,
        kind: ReportKind,
        counter: &mut InternalIdCounter,
    ) -> Self {
        Self {
            internal_id: counter.next_id(),
            global_index: GlobalIndex::new(),
            report: Report::new(report_version, kind),
        }
    }

    pub fn report_version(&self) -> ReportVersion {
        self.report.report_version
    }

    pub fn kind(&self) -> ReportKind {
        self.report.kind
    }

    /// Record a sample for a stable identity. See [`Report::add_sample`].
    pub fn add_sample(
        &mut self,
        identity: &SourceNodeIdentity,
        delta: &SensorValues,
    ) -> Result<SourceNodeId, ReportError> {
        self.report.add_sample(&mut self.global_index, identity, delta)
    }

    /// Record an outgoing reference of a recorded scope.
    /// See [`Report::add_reference`].
    pub fn add_reference(
        &mut self,
        caller_id: SourceNodeId,
        kind: ReferenceKind,
        target: &SourceNodeIdentity,
        delta: &SensorValues,
    ) -> Result<SourceNodeId, ReportError> {
        self.report
            .add_reference(&mut self.global_index, caller_id, kind, target, delta)
    }

    /// Resolve a bare numeric source-node id by walking the index upward
    /// (path, then module) to the owning file record
    pub fn resolve_source_node_id(&self, id: SourceNodeId) -> SourceNodeLookup<'_> {
        let Some(location) = self.global_index.source_node_location(id) else {
            return SourceNodeLookup::NoSuchPath { id };
        };
        let Some(module) = self.global_index.module_by_id(location.module_id) else {
            return SourceNodeLookup::NoSuchPath { id };
        };

        let collection = if module.identity.is_own_code() {
            &self.report.intern
        } else if module.identity.is_lang_internal() {
            &self.report.lang_internal
        } else {
            match self.report.find_module_report(location.module_id) {
                Some(module_report) => &module_report.body.intern,
                None => return SourceNodeLookup::NoSuchPath { id },
            }
        };

        let Some(file) = collection.get(&location.path_id) else {
            return SourceNodeLookup::NoSuchPath { id };
        };
        match file.source_nodes.get(&id) {
            Some(record) => SourceNodeLookup::Found {
                path_id: location.path_id,
                file,
                record,
            },
            None => SourceNodeLookup::NoSuchNode {
                id,
                path_id: location.path_id,
            },
        }
    }

    /// Check the aggregate invariants of every record in the tree
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.report.validate()
    }

    // --- persistence ---

    /// Encode the whole report: root frame followed by the embedded index
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = BufferWriter::new();
        self.report.to_buffer(&mut writer, None)?;
        self.global_index.to_buffer(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Decode a report encoded by [`Self::to_bytes`], returning the
    /// unconsumed remainder of the input
    pub fn from_bytes<'a>(
        bytes: &'a [u8],
        counter: &mut InternalIdCounter,
    ) -> Result<(Self, &'a [u8]), CodecError> {
        let mut reader = BufferReader::new(bytes);
        let (report, module_identity) = Report::from_buffer(&mut reader)?;
        if module_identity.is_some() {
            // a module frame cannot stand alone at the top level
            return Err(CodecError::InvalidReportType(1));
        }
        let global_index = GlobalIndex::from_buffer(&mut reader)?;

        Ok((
            Self {
                internal_id: counter.next_id(),
                global_index,
                report,
            },
            reader.remaining(),
        ))
    }

    /// Compact JSON projection of the report
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Pretty JSON projection, the human-debuggable mirror of the binary form
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load the JSON projection. Zero-valued sensor fields were omitted on
    /// write and come back as zero.
    pub fn from_json(
        json: &str,
        counter: &mut InternalIdCounter,
    ) -> Result<Self, serde_json::Error> {
        let mut loaded: Self = serde_json::from_str(json)?;
        loaded.internal_id = counter.next_id();
        Ok(loaded)
    }
}
