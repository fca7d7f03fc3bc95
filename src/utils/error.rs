//! Error types for the entire crate.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Internal-consistency errors raised by the index hierarchy.
///
/// Every variant here indicates a bug in the producer (an id was
/// dereferenced that this index never allocated), never bad user input.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("module id {0} was never allocated by this index")]
    UnknownModuleId(u32),

    #[error("path id {0} was never allocated by this index")]
    UnknownPathId(u32),

    #[error("source node id {0} was never allocated by this index")]
    UnknownSourceNodeId(u32),

    #[error("module '{0}' is not present in this index")]
    UnknownModule(String),
}

/// Errors that can occur while recording samples into a report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("record {id} has kind {kind} which cannot carry references")]
    KindCannotCarryReferences { id: u32, kind: &'static str },

    #[error("no record exists for source node {id} in this report")]
    RecordNotFound { id: u32 },
}

/// Precondition violations raised by the merge engine.
///
/// All of these are checked before any mutation occurs.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("merge called with zero input reports: nothing to merge")]
    NothingToMerge,

    #[error("merge requires one report version, got '{expected}' and '{found}'")]
    ReportVersionMismatch { expected: String, found: String },

    #[error("module report merge requires one module identity, got '{expected}' and '{found}'")]
    ModuleIdentityMismatch { expected: String, found: String },

    #[error("source node '{identifier}' recorded with kind {existing} and kind {found}")]
    RecordKindMismatch {
        identifier: String,
        existing: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Aggregate-invariant violations found by report validation.
///
/// A violation means the producer mis-attributed a sample; callers must
/// treat it as fatal, there is nothing to recover.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("sensor field '{field}' is negative or not finite: {value}")]
    InvalidSensorValue { field: &'static str, value: f64 },

    #[error("node {id}: {bucket} references sum to {actual} but the node declares {declared}")]
    BucketSumMismatch {
        id: u32,
        bucket: &'static str,
        declared: String,
        actual: String,
    },

    #[error("node {id}: references sum to {reference_total}, exceeding aggregated - self = {budget}")]
    AggregatedBudgetExceeded {
        id: u32,
        reference_total: String,
        budget: String,
    },
}

/// Errors that can occur while encoding or decoding the binary format
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("buffer ended after {available} bytes, needed {needed} more for {context}")]
    UnexpectedEof {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("invalid report kind tag: {0}")]
    InvalidReportKind(u8),

    #[error("invalid report type tag: {0}")]
    InvalidReportType(u8),

    #[error("invalid source node kind tag: {0}")]
    InvalidNodeKind(u8),

    #[error("invalid report version string: '{0}'")]
    InvalidVersion(String),

    #[error("value {value} of '{field}' does not fit the 4-byte wire format")]
    ValueOutOfRange { field: &'static str, value: u64 },

    #[error("string of {0} bytes does not fit the 2-byte length prefix")]
    StringTooLong(usize),

    #[error("invalid UTF-8 in encoded string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("invalid output path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
