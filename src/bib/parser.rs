//! Record parser
//!
//! Maps an external record's heterogeneous key set onto the canonical field
//! schema, separating recognized fields from the side-bag of unrecognized
//! metadata.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{FieldValue, RefField};

use super::normalize::unescape;

/// Records with fewer populated keys than this are too sparse to be useful.
pub const MIN_POPULATED_FIELDS: usize = 6;

/// Source field carrying the stable external identifier.
const IDENTITY_FIELD: &str = "glottolog_ref_id";

/// Where a source key routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Field(RefField),
    SideBag,
}

/// Static mapping of known source keys. Keys mapped to `None` are known but
/// have no canonical target and are stored verbatim in the side-bag;
/// unknown keys are treated the same way.
#[rustfmt::skip]
const FIELD_MAP_TABLE: &[(&str, Option<RefField>)] = &[
    ("abstract", None),
    ("added", None),
    ("additional_items", None),
    ("address", Some(RefField::Address)),
    ("adress", Some(RefField::Address)),
    ("adviser", None),
    ("aiatsis_callnumber", None),
    ("aiatsis_code", None),
    ("aiatsis_reference_language", None),
    ("alnumcodes", None),
    ("anlanote", None),
    ("anlclanguage", None),
    ("anlctype", None),
    ("annote", None),
    ("asjp_name", None),
    ("audiofile", None),
    ("author", Some(RefField::Author)),
    ("author_note", None),
    ("author_statement", None),
    ("booktitle", Some(RefField::Booktitle)),
    ("booktitle_english", None),
    ("bwonote", None),
    ("call_number", None),
    ("citation", None),
    ("class_loc", None),
    ("collection", None),
    ("comments", None),
    ("contains_also", None),
    ("contributed", None),
    ("copies", None),
    ("copyright", None),
    ("country", None),
    ("coverage", None),
    ("crossref", None),
    ("de", None),
    ("degree", None),
    ("digital_formats", None),
    ("document_type", None),
    ("doi", None),
    ("domain", None),
    ("edition", Some(RefField::Edition)),
    ("edition_note", None),
    ("editor", Some(RefField::Editor)),
    ("english_title", None),
    ("extra_hash", None),
    ("extrahash", None),
    ("file", None),
    ("fn", None),
    ("fnnote", None),
    ("folder", None),
    ("format", None),
    ("german_subject_headings", None),
    ("glottolog_ref_id", None),
    ("guldemann_location", None),
    ("hhnote", None),
    ("hhtype", None),
    ("howpublished", None),
    ("id", None),
    ("inlg", Some(RefField::Inlg)),
    ("institution", None),
    ("isbn", None),
    ("issn", None),
    ("issue", None),
    ("jfmnote", None),
    ("journal", Some(RefField::Journal)),
    ("key", None),
    ("keywords", None),
    ("langcode", None),
    ("langnote", None),
    ("languoidbase_ids", None),
    ("lapollanote", None),
    ("last_changed", None),
    ("lccn", None),
    ("lcode", None),
    ("lgcde", None),
    ("lgcode", None),
    ("lgcoe", None),
    ("lgcosw", None),
    ("lgfamily", None),
    ("macro_area", None),
    ("modified", None),
    ("month", None),
    ("mpi_eva_library_shelf", None),
    ("mpifn", None),
    ("no_inventaris", None),
    ("note", Some(RefField::Note)),
    ("notes", Some(RefField::Note)),
    ("number", Some(RefField::Number)),
    ("numberofpages", None),
    ("numner", Some(RefField::Number)),
    ("oages", Some(RefField::Pages)),
    ("oldhhfn", None),
    ("oldhhfnnote", None),
    ("omnote", None),
    ("other_editions", None),
    ("otomanguean_heading", None),
    ("owner", None),
    ("ozbib_id", Some(RefField::OzbibId)),
    ("ozbibnote", None),
    ("ozbibreftype", None),
    ("paged", Some(RefField::Pages)),
    ("pages", Some(RefField::Pages)),
    ("pagex", Some(RefField::Pages)),
    ("permission", None),
    ("pgaes", Some(RefField::Pages)),
    ("phdthesis", None),
    ("prepages", None),
    ("publisher", Some(RefField::Publisher)),
    ("pubnote", None),
    ("rating", None),
    ("read", None),
    ("relatedresource", None),
    ("replication", None),
    ("reprint", None),
    ("restrictions", None),
    ("review", None),
    ("school", Some(RefField::School)),
    ("seanote", None),
    ("seifarttype", None),
    ("series", Some(RefField::Series)),
    ("series_english", None),
    ("shelf_location", None),
    ("shorttitle", None),
    ("sil_id", None),
    ("source", None),
    ("src", None),
    ("srctrickle", None),
    ("stampeann", None),
    ("stampedesc", None),
    ("status", None),
    ("subject", Some(RefField::Subject)),
    ("subject_headings", Some(RefField::SubjectHeadings)),
    ("subsistence_note", None),
    ("superseded", None),
    ("thanks", None),
    ("thesistype", None),
    ("timestamp", None),
    ("title", Some(RefField::Title)),
    ("title_english", None),
    ("titlealt", None),
    ("typ", None),
    ("umi_id", None),
    ("url", Some(RefField::Url)),
    ("vernacular_title", None),
    ("volume", Some(RefField::Volume)),
    ("volumr", Some(RefField::Volume)),
    ("weball_lgs", None),
    ("year", Some(RefField::Year)),
    ("yeartitle", None),
];

/// A raw record from the source corpus stream: a key → text mapping plus the
/// bibliographic key and entry type it was filed under.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    /// Key of the record in its source bibliography.
    pub bibkey: String,
    /// Bibliographic entry type (book, article, ...).
    #[serde(rename = "type")]
    pub entry_type: String,
    pub fields: IndexMap<String, String>,
}

/// A record mapped onto the canonical schema, ready for the merge engine.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    /// Stable external key.
    pub key: i64,
    pub bibkey: String,
    pub bibtex_type: String,
    pub fields: IndexMap<RefField, FieldValue>,
    /// Side-bag of fields with no canonical target.
    pub jsondata: IndexMap<String, String>,
}

impl ParsedRecord {
    /// Text value of a canonical field, if present.
    pub fn text_field(&self, field: RefField) -> Option<String> {
        self.fields.get(&field).and_then(|v| v.as_text().map(String::from))
    }
}

/// Parser from raw records to the canonical field schema.
pub struct RecordParser {
    map: IndexMap<&'static str, Target>,
}

impl RecordParser {
    /// Parser over the standard field-mapping table.
    pub fn standard() -> AppResult<Self> {
        let mut map = IndexMap::with_capacity(FIELD_MAP_TABLE.len());
        for (source, target) in FIELD_MAP_TABLE {
            let target = match target {
                Some(field) => Target::Field(*field),
                None => Target::SideBag,
            };
            if map.insert(*source, target).is_some() {
                return Err(AppError::Validation(format!(
                    "duplicate source key '{}' in field map",
                    source
                )));
            }
        }
        Ok(Self { map })
    }

    /// Map a raw record onto the canonical schema.
    ///
    /// Returns `Ok(None)` for records too sparse to be useful; the caller
    /// counts the skip. A missing or non-numeric identity field is a
    /// contract violation for the record.
    pub fn parse(&self, raw: &RawRecord) -> AppResult<Option<ParsedRecord>> {
        let populated: Vec<(&str, &str)> = raw
            .fields
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if populated.len() < MIN_POPULATED_FIELDS {
            return Ok(None);
        }

        let key: i64 = raw
            .fields
            .get(IDENTITY_FIELD)
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| AppError::MissingIdentity {
                bibkey: raw.bibkey.clone(),
            })?;

        let mut fields = IndexMap::new();
        let mut jsondata = IndexMap::new();
        jsondata.insert("bibtexkey".to_string(), raw.bibkey.clone());

        for (source, value) in populated {
            let value = unescape(value);
            match self.map.get(source).copied().unwrap_or(Target::SideBag) {
                Target::Field(field) => {
                    let value = if field.is_numeric() {
                        match value.trim().parse::<i64>() {
                            Ok(n) => FieldValue::Int(n),
                            // non-numeric text for a converter field is
                            // malformed, not fatal
                            Err(_) => continue,
                        }
                    } else {
                        FieldValue::Text(value)
                    };
                    fields.insert(field, value);
                }
                Target::SideBag => {
                    jsondata.insert(source.to_string(), value);
                }
            }
        }

        Ok(Some(ParsedRecord {
            key,
            bibkey: raw.bibkey.clone(),
            bibtex_type: raw.entry_type.clone(),
            fields,
            jsondata,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bibkey: &str, pairs: &[(&str, &str)]) -> RawRecord {
        RawRecord {
            bibkey: bibkey.to_string(),
            entry_type: "book".to_string(),
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_sparse_record_skipped() {
        let parser = RecordParser::standard().unwrap();
        let rec = raw(
            "abc1999",
            &[
                ("glottolog_ref_id", "17"),
                ("author", "Meier"),
                ("title", "Grammar"),
                ("year", "1999"),
                ("pages", ""),
            ],
        );
        assert!(parser.parse(&rec).unwrap().is_none());
    }

    #[test]
    fn test_missing_identity_is_fatal() {
        let parser = RecordParser::standard().unwrap();
        let rec = raw(
            "abc1999",
            &[
                ("author", "Meier"),
                ("title", "Grammar"),
                ("year", "1999"),
                ("pages", "200"),
                ("publisher", "Mouton"),
                ("address", "Berlin"),
            ],
        );
        assert!(matches!(
            parser.parse(&rec),
            Err(AppError::MissingIdentity { .. })
        ));
    }

    #[test]
    fn test_routing_and_side_bag() {
        let parser = RecordParser::standard().unwrap();
        let rec = raw(
            "abc1999",
            &[
                ("glottolog_ref_id", "17"),
                ("author", "Meier"),
                ("title", "A {G}rammar"),
                ("year", "1999"),
                ("hhtype", "grammar"),
                ("macro_area", "Africa"),
                ("ozbib_id", "441"),
                ("weird_custom_field", "kept"),
            ],
        );
        let parsed = parser.parse(&rec).unwrap().unwrap();
        assert_eq!(parsed.key, 17);
        assert_eq!(parsed.bibtex_type, "book");
        assert_eq!(parsed.text_field(RefField::Title).as_deref(), Some("A Grammar"));
        assert_eq!(parsed.fields.get(&RefField::OzbibId), Some(&FieldValue::Int(441)));
        // recognized values are promoted out of the bag; unknown keys kept
        assert!(parsed.jsondata.get("author").is_none());
        assert_eq!(parsed.jsondata.get("hhtype").map(String::as_str), Some("grammar"));
        assert_eq!(parsed.jsondata.get("weird_custom_field").map(String::as_str), Some("kept"));
        assert_eq!(parsed.jsondata.get("bibtexkey").map(String::as_str), Some("abc1999"));
    }

    #[test]
    fn test_misspelled_keys_map_to_canonical_fields() {
        let parser = RecordParser::standard().unwrap();
        let rec = raw(
            "x",
            &[
                ("glottolog_ref_id", "3"),
                ("pgaes", "12-34"),
                ("volumr", "4"),
                ("numner", "2"),
                ("adress", "Berlin"),
                ("author", "Meier"),
            ],
        );
        let parsed = parser.parse(&rec).unwrap().unwrap();
        assert_eq!(parsed.text_field(RefField::Pages).as_deref(), Some("12-34"));
        assert_eq!(parsed.text_field(RefField::Volume).as_deref(), Some("4"));
        assert_eq!(parsed.text_field(RefField::Number).as_deref(), Some("2"));
        assert_eq!(parsed.text_field(RefField::Address).as_deref(), Some("Berlin"));
    }
}
