//! Bibliography record handling
//!
//! Parses raw, heterogeneously-keyed bibliography records onto the canonical
//! field schema and normalizes ambiguous textual fields into typed values.

pub mod normalize;
pub mod parser;

pub use parser::{ParsedRecord, RawRecord, RecordParser};
