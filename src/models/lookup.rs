//! Classification vocabularies: macro-areas, providers, doctypes
//!
//! Small fixed vocabularies with stable string identity, loaded once per
//! import run into in-memory maps for O(1) resolution during reconciliation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::bib::normalize::slug;

/// Coarse geographic region tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroArea {
    pub id: String,
    pub name: String,
}

/// External institution or catalog that supplied bibliography records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
}

/// Bibliographic document-type tag (grammar, dictionary, survey, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctype {
    pub id: String,
    pub name: String,
    /// Position in the vocabulary's canonical display order.
    pub ord: i32,
}

/// Lookup maps over the three vocabularies.
///
/// Macro-areas and doctypes resolve by name; providers resolve by the slug
/// of either their id or their name, since source tags spell provider names
/// inconsistently.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    macroareas: IndexMap<String, MacroArea>,
    providers: IndexMap<String, Provider>,
    doctypes: IndexMap<String, Doctype>,
}

impl Lookups {
    pub fn from_parts(
        macroareas: Vec<MacroArea>,
        providers: Vec<Provider>,
        doctypes: Vec<Doctype>,
    ) -> Self {
        let mut lookups = Lookups::default();
        for ma in macroareas {
            lookups.macroareas.insert(ma.name.clone(), ma);
        }
        for p in providers {
            lookups.providers.insert(slug(&p.id), p.clone());
            lookups.providers.insert(slug(&p.name), p);
        }
        for dt in doctypes {
            lookups.doctypes.insert(dt.name.clone(), dt);
        }
        lookups
    }

    pub fn macroarea(&self, name: &str) -> Option<&MacroArea> {
        self.macroareas.get(name)
    }

    pub fn provider(&self, tag: &str) -> Option<&Provider> {
        self.providers.get(&slug(tag))
    }

    pub fn doctype(&self, name: &str) -> Option<&Doctype> {
        self.doctypes.get(name)
    }

    /// Comma-join doctype ids in the vocabulary's `ord` order.
    pub fn doctypes_str(&self, ids: &[String]) -> String {
        let mut held: Vec<&Doctype> = self
            .doctypes
            .values()
            .filter(|dt| ids.iter().any(|id| *id == dt.id))
            .collect();
        held.sort_by_key(|dt| dt.ord);
        held.iter().map(|dt| dt.id.as_str()).collect::<Vec<_>>().join(", ")
    }

    /// Comma-join provider ids in id order.
    pub fn providers_str(&self, ids: &[String]) -> String {
        let mut ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookups() -> Lookups {
        Lookups::from_parts(
            vec![MacroArea { id: "northamerica".into(), name: "North America".into() }],
            vec![Provider { id: "sil16".into(), name: "SIL 16".into() }],
            vec![
                Doctype { id: "grammar".into(), name: "grammar".into(), ord: 1 },
                Doctype { id: "dictionary".into(), name: "dictionary".into(), ord: 3 },
                Doctype { id: "grammar_sketch".into(), name: "grammar_sketch".into(), ord: 2 },
            ],
        )
    }

    #[test]
    fn test_provider_resolves_by_slugged_name() {
        let l = lookups();
        assert!(l.provider("SIL 16").is_some());
        assert!(l.provider("sil16").is_some());
        assert!(l.provider("unknown provider").is_none());
    }

    #[test]
    fn test_doctypes_str_follows_ord() {
        let l = lookups();
        let ids = vec!["dictionary".to_string(), "grammar".to_string()];
        assert_eq!(l.doctypes_str(&ids), "grammar, dictionary");
    }

    #[test]
    fn test_providers_str_sorted_by_id() {
        let l = lookups();
        let ids = vec!["wals".to_string(), "sil16".to_string()];
        assert_eq!(l.providers_str(&ids), "sil16, wals");
    }
}
