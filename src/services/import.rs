//! Reference merge engine
//!
//! Orchestrates parser, normalizer and reconciler per incoming record
//! against the catalog store. Each record moves through
//! parse → lookup → create/update → relationship reconciliation → finalize;
//! the whole run executes inside one store transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bib::normalize::normalize_record;
use crate::bib::{ParsedRecord, RawRecord, RecordParser};
use crate::error::AppResult;
use crate::models::{FieldValue, Lookups, RefField, Reference};
use crate::store::{CatalogStore, RelationKind};

use super::reconcile::reconcile;

/// Doctype tag grammar: a name optionally followed by a parenthesized
/// comment, terminated by a semicolon or end of input.
static DOCTYPE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<name>[a-z_]+)\s*(\((?P<comment>[^)]+)\))?\s*(;|$)").unwrap());

/// Whether already-known keys are skipped or diffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    Insert,
    Update,
}

/// One observed field change, `(old, new)` as display strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange(pub Option<String>, pub String);

/// Aggregate result of an import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportOutcome {
    /// Per-reference change sets, keyed by external key.
    pub changes: BTreeMap<i64, BTreeMap<String, FieldChange>>,
    /// Records created or updated.
    pub changed: usize,
    /// Records skipped as too sparse.
    pub skipped: usize,
    /// Relationship tags that resolved to no vocabulary entry.
    pub unresolved: usize,
}

pub struct ImportService {
    store: Arc<dyn CatalogStore>,
    parser: RecordParser,
}

impl ImportService {
    pub fn new(store: Arc<dyn CatalogStore>) -> AppResult<Self> {
        Ok(Self {
            store,
            parser: RecordParser::standard()?,
        })
    }

    /// Run a batch import over the given record stream.
    ///
    /// All-or-nothing: any unhandled error rolls back every record
    /// processed so far in this run.
    pub async fn run<I>(&self, mode: ImportMode, records: I) -> AppResult<ImportOutcome>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        self.store.begin().await?;
        match self.run_records(mode, records).await {
            Ok(outcome) => {
                self.store.commit().await?;
                info!(
                    changed = outcome.changed,
                    skipped = outcome.skipped,
                    unresolved = outcome.unresolved,
                    "import run committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rb) = self.store.rollback().await {
                    warn!(error = %rb, "rollback failed after import error");
                }
                Err(e)
            }
        }
    }

    async fn run_records<I>(&self, mode: ImportMode, records: I) -> AppResult<ImportOutcome>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let lookups = Lookups::from_parts(
            self.store.macroareas().await?,
            self.store.providers().await?,
            self.store.doctypes().await?,
        );
        let known = self.store.reference_keys().await?;

        let mut outcome = ImportOutcome::default();
        for (index, raw) in records.into_iter().enumerate() {
            if index > 0 && index % 1000 == 0 {
                info!(records = index, changed = outcome.changed, "import progress");
            }

            let Some(mut parsed) = self.parser.parse(&raw)? else {
                debug!(bibkey = %raw.bibkey, "skipping sparse record");
                outcome.skipped += 1;
                continue;
            };
            normalize_record(&mut parsed);

            if mode == ImportMode::Insert && known.contains(&parsed.key) {
                continue;
            }

            match self.store.reference(parsed.key).await? {
                Some(existing) => {
                    self.update_reference(existing, &parsed, &lookups, &mut outcome)
                        .await?
                }
                None => {
                    self.create_reference(&parsed, &lookups, &mut outcome)
                        .await?
                }
            }
        }
        Ok(outcome)
    }

    async fn create_reference(
        &self,
        parsed: &ParsedRecord,
        lookups: &Lookups,
        outcome: &mut ImportOutcome,
    ) -> AppResult<()> {
        let mut reference = Reference::new(parsed.key);
        reference.name = Reference::display_name(
            parsed.text_field(RefField::Author).as_deref(),
            parsed.text_field(RefField::Year).as_deref(),
        );
        reference.bibtex_type = Some(parsed.bibtex_type.clone());
        for (field, value) in &parsed.fields {
            reference.set_field(*field, value.clone());
        }
        reference.jsondata = parsed.jsondata.clone();
        if let Some(title) = reference.title.clone() {
            reference.description = Some(title);
        }

        self.resolve_relationships(&mut reference, parsed, lookups, outcome);
        reference.doctypes_str = Some(lookups.doctypes_str(&reference.doctypes));
        reference.providers_str = Some(lookups.providers_str(&reference.providers));
        reference.updated = Utc::now();

        self.store.create_reference(&reference).await?;
        outcome.changed += 1;
        Ok(())
    }

    async fn update_reference(
        &self,
        existing: Reference,
        parsed: &ParsedRecord,
        lookups: &Lookups,
        outcome: &mut ImportOutcome,
    ) -> AppResult<()> {
        let mut reference = existing;
        let mut changed = false;
        let mut changes: BTreeMap<String, FieldChange> = BTreeMap::new();
        let mut delta: Vec<(RefField, FieldValue)> = Vec::new();

        // the entry type diffs like any field: a reclassified entry
        // (book -> article) updates in place
        if reference.bibtex_type.as_deref() != Some(parsed.bibtex_type.as_str()) {
            changes.insert(
                RefField::BibtexType.as_str().to_string(),
                FieldChange(reference.bibtex_type.clone(), parsed.bibtex_type.clone()),
            );
            reference.bibtex_type = Some(parsed.bibtex_type.clone());
            delta.push((
                RefField::BibtexType,
                FieldValue::Text(parsed.bibtex_type.clone()),
            ));
            changed = true;
        }

        for (field, value) in &parsed.fields {
            let old = reference.get_field(*field);
            if old.as_ref() != Some(value) {
                changes.insert(
                    field.as_str().to_string(),
                    FieldChange(old.map(|v| v.to_string()), value.to_string()),
                );
                reference.set_field(*field, value.clone());
                delta.push((*field, value.clone()));
                changed = true;
            }
        }

        // side-bag entries merge without flipping the changed flag
        reference.merge_jsondata(&parsed.jsondata);

        // description is re-derived on every pass, even when title did not
        // change this round: downstream consumers read it exclusively
        if let Some(title) = reference.title.clone() {
            reference.description = Some(title.clone());
            delta.push((RefField::Description, FieldValue::Text(title)));
        }

        let added_kinds = self.resolve_relationships(&mut reference, parsed, lookups, outcome);
        changed = changed || !added_kinds.is_empty();

        for (field, value) in delta {
            self.store.update_field(reference.key, field, value).await?;
        }
        self.store
            .merge_jsondata(reference.key, &parsed.jsondata)
            .await?;
        for kind in &added_kinds {
            let ids = match kind {
                RelationKind::Macroarea => &reference.macroareas,
                RelationKind::Provider => &reference.providers,
                RelationKind::Doctype => &reference.doctypes,
            };
            self.store
                .update_relationships(reference.key, *kind, ids)
                .await?;
        }

        if changed {
            reference.doctypes_str = Some(lookups.doctypes_str(&reference.doctypes));
            reference.providers_str = Some(lookups.providers_str(&reference.providers));
            reference.updated = Utc::now();
            self.store
                .update_field(
                    reference.key,
                    RefField::DoctypesStr,
                    FieldValue::Text(reference.doctypes_str.clone().unwrap_or_default()),
                )
                .await?;
            self.store
                .update_field(
                    reference.key,
                    RefField::ProvidersStr,
                    FieldValue::Text(reference.providers_str.clone().unwrap_or_default()),
                )
                .await?;
            self.store.touch(reference.key, reference.updated).await?;

            outcome.changed += 1;
            if !changes.is_empty() {
                outcome.changes.insert(reference.key, changes);
            }
        }
        Ok(())
    }

    /// Resolve the raw relationship tags of a record against the vocabulary
    /// maps and apply the additions to the local copy. Returns the families
    /// that gained members. Unresolvable tags are counted and dropped;
    /// never fatal.
    fn resolve_relationships(
        &self,
        reference: &mut Reference,
        parsed: &ParsedRecord,
        lookups: &Lookups,
        outcome: &mut ImportOutcome,
    ) -> Vec<RelationKind> {
        let mut added_kinds = Vec::new();

        let macroareas = comma_tags(parsed.jsondata.get("macro_area"))
            .into_iter()
            .filter_map(|name| match lookups.macroarea(&name) {
                Some(ma) => Some(ma.id.clone()),
                None => {
                    warn!(key = reference.key, tag = %name, "unknown macro-area");
                    outcome.unresolved += 1;
                    None
                }
            })
            .collect::<Vec<_>>();
        if apply_additions(&mut reference.macroareas, &macroareas) {
            added_kinds.push(RelationKind::Macroarea);
        }

        let providers = comma_tags(parsed.jsondata.get("src"))
            .into_iter()
            .filter_map(|name| match lookups.provider(&name) {
                Some(p) => Some(p.id.clone()),
                None => {
                    warn!(key = reference.key, tag = %name, "unknown provider");
                    outcome.unresolved += 1;
                    None
                }
            })
            .collect::<Vec<_>>();
        if apply_additions(&mut reference.providers, &providers) {
            added_kinds.push(RelationKind::Provider);
        }

        let doctypes = doctype_tags(parsed.jsondata.get("hhtype"))
            .into_iter()
            .filter_map(|name| match lookups.doctype(&name) {
                Some(dt) => Some(dt.id.clone()),
                None => {
                    warn!(key = reference.key, tag = %name, "unknown doctype");
                    outcome.unresolved += 1;
                    None
                }
            })
            .collect::<Vec<_>>();
        if apply_additions(&mut reference.doctypes, &doctypes) {
            added_kinds.push(RelationKind::Doctype);
        }

        added_kinds
    }
}

/// Append reconciled additions; true if anything was added.
fn apply_additions(existing: &mut Vec<String>, desired: &[String]) -> bool {
    let outcome = reconcile(existing, desired);
    if outcome.missing {
        debug!("desired relationship set omits existing members; keeping them");
    }
    if outcome.added.is_empty() {
        return false;
    }
    existing.extend(outcome.added);
    true
}

/// Split a comma-separated tag list, trimmed and de-duplicated.
fn comma_tags(raw: Option<&String>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.map(String::as_str).unwrap_or("").split(',') {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Scan a doctype tag list in the `name (comment); ...` grammar.
fn doctype_tags(raw: Option<&String>) -> Vec<String> {
    let mut tags = Vec::new();
    for caps in DOCTYPE_PATTERN.captures_iter(raw.map(String::as_str).unwrap_or("")) {
        let name = caps["name"].to_string();
        if !tags.contains(&name) {
            tags.push(name);
        }
    }
    tags
}
