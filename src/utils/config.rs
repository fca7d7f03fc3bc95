//! Configuration and constants for report handling.

use crate::model::version::ReportVersion;

/// Report version written by this build
pub const CURRENT_REPORT_VERSION: ReportVersion = ReportVersion::new(0, 1, 6);

/// Headless sensor values exist in the binary format from this version on
pub const HEADLESS_SENSOR_VALUES_SINCE: ReportVersion = ReportVersion::new(0, 1, 4);

/// Reports up to and including this version carry the legacy intern-mapping
/// table, which is decoded and discarded
pub const LEGACY_INTERN_MAPPING_UNTIL: ReportVersion = ReportVersion::new(0, 1, 4);

/// First id handed out by each of the three per-rank allocators
pub const FIRST_INDEX_ID: u32 = 0;

/// Absolute tolerance for energy comparisons during validation.
/// Integer (time, hit count) comparisons are exact.
pub const ENERGY_EPSILON: f64 = 1e-10;

/// File extension of binary report files
pub const OAK_FILE_EXTENSION: &str = "oak";

/// Reserved module name for the profiled project's own source code
pub const SELF_MODULE_NAME: &str = "{self}";

/// Reserved module name for language/runtime-internal source files
pub const LANG_INTERNAL_MODULE_NAME: &str = "{lang-internal}";
