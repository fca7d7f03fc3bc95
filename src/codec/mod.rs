//! Binary codec for report persistence.
//!
//! The format is compact and self-describing: every encoded report begins
//! with its semantic version string, and readers replicate the
//! version-gated branches the writer took instead of tagging each field.
//! Decoding is streaming - each structure consumes exactly its own bytes
//! from a [`BufferReader`] and leaves the remainder for the caller.
//!
//! The framing of reports, records and sensor values lives next to the
//! types themselves (`to_buffer`/`from_buffer` methods in `model`); this
//! module owns the byte-level primitives.

pub mod buffer;

pub use buffer::{BufferReader, BufferWriter};
