//! Canonical bibliographic reference model

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Scalar fields of a [`Reference`] addressable by name.
///
/// Covers the canonical targets of the source field map, the numeric fields
/// derived by the normalizer, and the denormalized display fields maintained
/// by the merge engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefField {
    Author,
    Editor,
    Year,
    Title,
    Address,
    Publisher,
    Pages,
    Journal,
    Booktitle,
    Volume,
    Number,
    Edition,
    Note,
    School,
    Series,
    Subject,
    SubjectHeadings,
    Url,
    Inlg,
    OzbibId,
    YearInt,
    StartpageInt,
    EndpageInt,
    PagesInt,
    BibtexType,
    Name,
    Description,
    DoctypesStr,
    ProvidersStr,
}

impl RefField {
    /// Canonical (column) name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefField::Author => "author",
            RefField::Editor => "editor",
            RefField::Year => "year",
            RefField::Title => "title",
            RefField::Address => "address",
            RefField::Publisher => "publisher",
            RefField::Pages => "pages",
            RefField::Journal => "journal",
            RefField::Booktitle => "booktitle",
            RefField::Volume => "volume",
            RefField::Number => "number",
            RefField::Edition => "edition",
            RefField::Note => "note",
            RefField::School => "school",
            RefField::Series => "series",
            RefField::Subject => "subject",
            RefField::SubjectHeadings => "subject_headings",
            RefField::Url => "url",
            RefField::Inlg => "inlg",
            RefField::OzbibId => "ozbib_id",
            RefField::YearInt => "year_int",
            RefField::StartpageInt => "startpage_int",
            RefField::EndpageInt => "endpage_int",
            RefField::PagesInt => "pages_int",
            RefField::BibtexType => "bibtex_type",
            RefField::Name => "name",
            RefField::Description => "description",
            RefField::DoctypesStr => "doctypes_str",
            RefField::ProvidersStr => "providers_str",
        }
    }

    /// Whether the field holds an integer value.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            RefField::OzbibId
                | RefField::YearInt
                | RefField::StartpageInt
                | RefField::EndpageInt
                | RefField::PagesInt
        )
    }
}

impl fmt::Display for RefField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Canonical bibliographic entry.
///
/// Identity is the stable integer key assigned by the source corpus; the
/// catalog never generates keys of its own. References are created on first
/// encounter and only updated in place afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub key: i64,
    /// Synthesized display name, `"{author-or-'na'} {year-or-'nd'}"`.
    pub name: String,
    /// Kept in lockstep with `title` for display consumers.
    pub description: Option<String>,
    pub bibtex_type: Option<String>,

    pub author: Option<String>,
    pub editor: Option<String>,
    pub year: Option<String>,
    pub title: Option<String>,
    pub address: Option<String>,
    pub publisher: Option<String>,
    pub pages: Option<String>,
    pub journal: Option<String>,
    pub booktitle: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub edition: Option<String>,
    pub note: Option<String>,
    pub school: Option<String>,
    pub series: Option<String>,
    pub subject: Option<String>,
    pub subject_headings: Option<String>,
    pub url: Option<String>,
    pub inlg: Option<String>,

    pub ozbib_id: Option<i64>,
    pub year_int: Option<i64>,
    pub startpage_int: Option<i64>,
    pub endpage_int: Option<i64>,
    pub pages_int: Option<i64>,

    /// Side-bag of source fields with no canonical target, kept verbatim.
    pub jsondata: IndexMap<String, String>,

    /// Macro-area ids linked to this reference.
    pub macroareas: Vec<String>,
    /// Provider ids linked to this reference.
    pub providers: Vec<String>,
    /// Doctype ids linked to this reference.
    pub doctypes: Vec<String>,

    /// Comma-joined doctype ids in vocabulary order, for fast display.
    pub doctypes_str: Option<String>,
    /// Comma-joined provider ids, for fast display.
    pub providers_str: Option<String>,

    pub updated: DateTime<Utc>,
}

impl Reference {
    /// A fresh reference carrying only its external key.
    pub fn new(key: i64) -> Self {
        Self {
            key,
            name: String::new(),
            description: None,
            bibtex_type: None,
            author: None,
            editor: None,
            year: None,
            title: None,
            address: None,
            publisher: None,
            pages: None,
            journal: None,
            booktitle: None,
            volume: None,
            number: None,
            edition: None,
            note: None,
            school: None,
            series: None,
            subject: None,
            subject_headings: None,
            url: None,
            inlg: None,
            ozbib_id: None,
            year_int: None,
            startpage_int: None,
            endpage_int: None,
            pages_int: None,
            jsondata: IndexMap::new(),
            macroareas: Vec::new(),
            providers: Vec::new(),
            doctypes: Vec::new(),
            doctypes_str: None,
            providers_str: None,
            updated: Utc::now(),
        }
    }

    /// Display name synthesized from the raw author and year texts.
    pub fn display_name(author: Option<&str>, year: Option<&str>) -> String {
        format!("{} {}", author.unwrap_or("na"), year.unwrap_or("nd"))
    }

    /// Current value of a scalar field.
    pub fn get_field(&self, field: RefField) -> Option<FieldValue> {
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        let int = |v: Option<i64>| v.map(FieldValue::Int);
        match field {
            RefField::Author => text(&self.author),
            RefField::Editor => text(&self.editor),
            RefField::Year => text(&self.year),
            RefField::Title => text(&self.title),
            RefField::Address => text(&self.address),
            RefField::Publisher => text(&self.publisher),
            RefField::Pages => text(&self.pages),
            RefField::Journal => text(&self.journal),
            RefField::Booktitle => text(&self.booktitle),
            RefField::Volume => text(&self.volume),
            RefField::Number => text(&self.number),
            RefField::Edition => text(&self.edition),
            RefField::Note => text(&self.note),
            RefField::School => text(&self.school),
            RefField::Series => text(&self.series),
            RefField::Subject => text(&self.subject),
            RefField::SubjectHeadings => text(&self.subject_headings),
            RefField::Url => text(&self.url),
            RefField::Inlg => text(&self.inlg),
            RefField::OzbibId => int(self.ozbib_id),
            RefField::YearInt => int(self.year_int),
            RefField::StartpageInt => int(self.startpage_int),
            RefField::EndpageInt => int(self.endpage_int),
            RefField::PagesInt => int(self.pages_int),
            RefField::BibtexType => text(&self.bibtex_type),
            RefField::Name => Some(FieldValue::Text(self.name.clone())),
            RefField::Description => text(&self.description),
            RefField::DoctypesStr => text(&self.doctypes_str),
            RefField::ProvidersStr => text(&self.providers_str),
        }
    }

    /// Overwrite a scalar field with a new value.
    pub fn set_field(&mut self, field: RefField, value: FieldValue) {
        if field.is_numeric() {
            let v = value.as_int();
            match field {
                RefField::OzbibId => self.ozbib_id = v,
                RefField::YearInt => self.year_int = v,
                RefField::StartpageInt => self.startpage_int = v,
                RefField::EndpageInt => self.endpage_int = v,
                RefField::PagesInt => self.pages_int = v,
                _ => unreachable!(),
            }
            return;
        }
        let v = Some(value.to_string());
        match field {
            RefField::Author => self.author = v,
            RefField::Editor => self.editor = v,
            RefField::Year => self.year = v,
            RefField::Title => self.title = v,
            RefField::Address => self.address = v,
            RefField::Publisher => self.publisher = v,
            RefField::Pages => self.pages = v,
            RefField::Journal => self.journal = v,
            RefField::Booktitle => self.booktitle = v,
            RefField::Volume => self.volume = v,
            RefField::Number => self.number = v,
            RefField::Edition => self.edition = v,
            RefField::Note => self.note = v,
            RefField::School => self.school = v,
            RefField::Series => self.series = v,
            RefField::Subject => self.subject = v,
            RefField::SubjectHeadings => self.subject_headings = v,
            RefField::Url => self.url = v,
            RefField::Inlg => self.inlg = v,
            RefField::BibtexType => self.bibtex_type = v,
            RefField::Name => self.name = v.unwrap_or_default(),
            RefField::Description => self.description = v,
            RefField::DoctypesStr => self.doctypes_str = v,
            RefField::ProvidersStr => self.providers_str = v,
            _ => unreachable!(),
        }
    }

    /// Merge new side-bag entries into the existing bag, overwriting on
    /// key collision but never dropping keys only present in the old bag.
    pub fn merge_jsondata(&mut self, bag: &IndexMap<String, String>) {
        for (k, v) in bag {
            self.jsondata.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(Reference::display_name(Some("Haspelmath"), Some("1993")), "Haspelmath 1993");
        assert_eq!(Reference::display_name(None, None), "na nd");
        assert_eq!(Reference::display_name(Some("Dixon"), None), "Dixon nd");
    }

    #[test]
    fn test_field_roundtrip() {
        let mut r = Reference::new(1);
        r.set_field(RefField::Title, FieldValue::Text("A grammar of Tariana".into()));
        assert_eq!(
            r.get_field(RefField::Title),
            Some(FieldValue::Text("A grammar of Tariana".into()))
        );
        r.set_field(RefField::YearInt, FieldValue::Int(1999));
        assert_eq!(r.year_int, Some(1999));
        // numeric fields coerce numeric text
        r.set_field(RefField::OzbibId, FieldValue::Text("4711".into()));
        assert_eq!(r.ozbib_id, Some(4711));
    }

    #[test]
    fn test_merge_jsondata_keeps_old_keys() {
        let mut r = Reference::new(1);
        r.jsondata.insert("hhtype".into(), "grammar".into());
        let mut bag = IndexMap::new();
        bag.insert("src".into(), "wals".into());
        r.merge_jsondata(&bag);
        assert_eq!(r.jsondata.get("hhtype").map(String::as_str), Some("grammar"));
        assert_eq!(r.jsondata.get("src").map(String::as_str), Some("wals"));
    }
}
