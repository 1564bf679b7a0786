//! Data models for glottocat

pub mod languoid;
pub mod lookup;
pub mod reference;

// Re-export commonly used types
pub use languoid::{ClassificationKind, ClosureRow, Justification, Languoid, LanguoidLevel, RefPointer};
pub use lookup::{Doctype, Lookups, MacroArea, Provider};
pub use reference::{FieldValue, RefField, Reference};
