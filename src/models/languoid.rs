//! Languoid model: nodes of the genealogical language tree
//!
//! The tree is built by an offline classification loader; this crate only
//! reads it. The transitive-closure table is the source of truth for
//! ancestor/descendant queries; `father` and `family` are cached pointers
//! derived from it.

use serde::{Deserialize, Serialize};

/// Level of a languoid in the genealogical tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguoidLevel {
    Family,
    Language,
    Dialect,
}

impl LanguoidLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguoidLevel::Family => "family",
            LanguoidLevel::Language => "language",
            LanguoidLevel::Dialect => "dialect",
        }
    }
}

/// Pointer from a classification justification to a catalog reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefPointer {
    pub key: i64,
    /// Numeric year of the referenced source, used for recency ordering.
    pub year: Option<i32>,
}

/// A reference-backed assertion supporting a languoid's placement in the
/// tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Justification {
    pub description: String,
    pub refs: Vec<RefPointer>,
}

/// Which classification justification to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationKind {
    /// Placement of the node's family.
    Family,
    /// Placement of the node within its family.
    Sub,
}

/// A node in the genealogical language tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Languoid {
    /// Stable alphanumeric code.
    pub id: String,
    pub name: String,
    pub level: LanguoidLevel,
    /// Legacy classification code; present only for H-languages.
    pub hid: Option<String>,
    pub active: bool,
    pub bookkeeping: bool,
    /// Free-text macro-area list, comma separated.
    pub macroareas: Option<String>,
    pub child_language_count: Option<i32>,
    /// Immediate parent; `None` only for top-level families.
    pub father: Option<String>,
    /// Top-level ancestor, i.e. the root of the father chain.
    pub family: Option<String>,
    /// Family-level classification justification.
    pub fc: Option<Justification>,
    /// Sub-classification justification.
    pub sc: Option<Justification>,
}

impl Languoid {
    pub fn new(id: &str, name: &str, level: LanguoidLevel) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            level,
            hid: None,
            active: true,
            bookkeeping: false,
            macroareas: None,
            child_language_count: None,
            father: None,
            family: None,
            fc: None,
            sc: None,
        }
    }

    fn justification(&self, kind: ClassificationKind) -> Option<&Justification> {
        match kind {
            ClassificationKind::Family => self.fc.as_ref(),
            ClassificationKind::Sub => self.sc.as_ref(),
        }
    }

    /// The justification of the given kind, if it carries a non-empty
    /// description.
    pub fn classification(&self, kind: ClassificationKind) -> Option<&Justification> {
        self.justification(kind)
            .filter(|j| !j.description.trim().is_empty())
    }

    /// References backing the given justification, readable whether or not
    /// the justification has a description.
    pub fn classification_refs(&self, kind: ClassificationKind) -> &[RefPointer] {
        self.justification(kind)
            .map(|j| j.refs.as_slice())
            .unwrap_or(&[])
    }
}

/// One (ancestor, descendant, depth) triple of the transitive closure.
/// Depth 0 rows are the self-pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureRow {
    pub parent: String,
    pub child: String,
    pub depth: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_requires_description() {
        let mut l = Languoid::new("stan1295", "German", LanguoidLevel::Language);
        l.sc = Some(Justification {
            description: String::new(),
            refs: vec![RefPointer { key: 7, year: Some(1996) }],
        });
        assert!(l.classification(ClassificationKind::Sub).is_none());
        assert_eq!(l.classification_refs(ClassificationKind::Sub).len(), 1);

        l.sc.as_mut().unwrap().description = "Harbert 2007".into();
        assert!(l.classification(ClassificationKind::Sub).is_some());
    }
}
