//! Merge engine integration tests over the in-memory catalog store

use std::sync::Arc;

use glottocat::bib::RawRecord;
use glottocat::error::AppError;
use glottocat::models::{Doctype, MacroArea, Provider, Reference};
use glottocat::services::import::{ImportMode, ImportService};
use glottocat::store::{CatalogStore, MemoryStore};

fn record(pairs: &[(&str, &str)]) -> RawRecord {
    RawRecord {
        bibkey: "meier1999grammar".to_string(),
        entry_type: "book".to_string(),
        fields: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_vocabularies(
        vec![
            MacroArea { id: "africa".into(), name: "Africa".into() },
            MacroArea { id: "eurasia".into(), name: "Eurasia".into() },
        ],
        vec![
            Provider { id: "hh".into(), name: "Harald Hammarström".into() },
            Provider { id: "sil16".into(), name: "SIL 16".into() },
            Provider { id: "wals".into(), name: "WALS".into() },
        ],
        vec![
            Doctype { id: "grammar".into(), name: "grammar".into(), ord: 1 },
            Doctype { id: "dictionary".into(), name: "dictionary".into(), ord: 2 },
            Doctype { id: "wordlist".into(), name: "wordlist".into(), ord: 3 },
        ],
    ))
}

fn full_record() -> RawRecord {
    record(&[
        ("glottolog_ref_id", "42"),
        ("author", "Meier, Hans"),
        ("title", "A grammar of Xyz"),
        ("year", "1999 [1987]"),
        ("publisher", "Berlin: Mouton"),
        ("pages", "xii+301"),
        ("macro_area", "Africa"),
        ("src", "hh, SIL 16"),
        ("hhtype", "grammar (long); wordlist"),
    ])
}

#[tokio::test]
async fn test_create_parses_and_links_everything() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    let outcome = service
        .run(ImportMode::Update, vec![full_record()])
        .await
        .unwrap();
    assert_eq!(outcome.changed, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.unresolved, 0);

    let r = store.reference(42).await.unwrap().unwrap();
    assert_eq!(r.name, "Meier, Hans 1999 [1987]");
    assert_eq!(r.description.as_deref(), Some("A grammar of Xyz"));
    assert_eq!(r.year_int, Some(1987));
    assert_eq!(r.pages_int, Some(313));
    assert_eq!(r.startpage_int, None);
    assert_eq!(r.address.as_deref(), Some("Berlin"));
    assert_eq!(r.publisher.as_deref(), Some("Mouton"));
    assert_eq!(r.macroareas, vec!["africa".to_string()]);
    assert_eq!(r.providers, vec!["hh".to_string(), "sil16".to_string()]);
    assert_eq!(r.doctypes, vec!["grammar".to_string(), "wordlist".to_string()]);
    assert_eq!(r.doctypes_str.as_deref(), Some("grammar, wordlist"));
    assert_eq!(r.providers_str.as_deref(), Some("hh, sil16"));
    assert_eq!(r.jsondata.get("bibtexkey").map(String::as_str), Some("meier1999grammar"));
    // recognized fields are not duplicated into the side-bag
    assert!(r.jsondata.get("author").is_none());
}

#[tokio::test]
async fn test_second_identical_run_is_idempotent() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    service
        .run(ImportMode::Update, vec![full_record()])
        .await
        .unwrap();
    let outcome = service
        .run(ImportMode::Update, vec![full_record()])
        .await
        .unwrap();

    assert_eq!(outcome.changed, 0);
    assert!(outcome.changes.is_empty());
}

#[tokio::test]
async fn test_insert_mode_skips_known_keys() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    service
        .run(ImportMode::Update, vec![full_record()])
        .await
        .unwrap();

    let mut changed = full_record();
    changed
        .fields
        .insert("title".to_string(), "A different title".to_string());
    let outcome = service.run(ImportMode::Insert, vec![changed]).await.unwrap();

    assert_eq!(outcome.changed, 0);
    let r = store.reference(42).await.unwrap().unwrap();
    assert_eq!(r.title.as_deref(), Some("A grammar of Xyz"));
}

#[tokio::test]
async fn test_update_records_field_changes() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    service
        .run(ImportMode::Update, vec![full_record()])
        .await
        .unwrap();

    let mut changed = full_record();
    changed
        .fields
        .insert("title".to_string(), "A reference grammar of Xyz".to_string());
    let outcome = service.run(ImportMode::Update, vec![changed]).await.unwrap();

    assert_eq!(outcome.changed, 1);
    let changes = outcome.changes.get(&42).unwrap();
    let title_change = changes.get("title").unwrap();
    assert_eq!(title_change.0.as_deref(), Some("A grammar of Xyz"));
    assert_eq!(title_change.1, "A reference grammar of Xyz");

    // description follows the new title
    let r = store.reference(42).await.unwrap().unwrap();
    assert_eq!(r.description.as_deref(), Some("A reference grammar of Xyz"));
}

#[tokio::test]
async fn test_entry_type_reclassification_updates_in_place() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    service
        .run(ImportMode::Update, vec![full_record()])
        .await
        .unwrap();

    let mut reclassified = full_record();
    reclassified.entry_type = "article".to_string();
    let outcome = service
        .run(ImportMode::Update, vec![reclassified])
        .await
        .unwrap();

    assert_eq!(outcome.changed, 1);
    let change = outcome.changes.get(&42).unwrap().get("bibtex_type").unwrap();
    assert_eq!(change.0.as_deref(), Some("book"));
    assert_eq!(change.1, "article");
    let r = store.reference(42).await.unwrap().unwrap();
    assert_eq!(r.bibtex_type.as_deref(), Some("article"));
}

#[tokio::test]
async fn test_sparse_record_counts_once_and_writes_nothing() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    let sparse = record(&[
        ("glottolog_ref_id", "77"),
        ("author", "Meier"),
        ("title", "Notes"),
        ("year", "2001"),
        ("pages", ""),
    ]);
    let outcome = service.run(ImportMode::Update, vec![sparse]).await.unwrap();

    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.changed, 0);
    assert!(store.reference(77).await.unwrap().is_none());
}

#[tokio::test]
async fn test_providers_accumulate_monotonically() {
    let store = seeded_store();

    let mut existing = Reference::new(42);
    existing.providers = vec!["wals".to_string(), "hh".to_string()];
    store.insert_reference(existing);

    let service = ImportService::new(store.clone()).unwrap();
    // desired {hh, sil16}: sil16 is added, wals is never removed
    service
        .run(ImportMode::Update, vec![full_record()])
        .await
        .unwrap();

    let r = store.reference(42).await.unwrap().unwrap();
    assert_eq!(
        r.providers,
        vec!["wals".to_string(), "hh".to_string(), "sil16".to_string()]
    );
    assert_eq!(r.providers_str.as_deref(), Some("hh, sil16, wals"));
}

#[tokio::test]
async fn test_unresolved_tags_are_counted_not_fatal() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    let mut rec = full_record();
    rec.fields
        .insert("macro_area".to_string(), "Africa, Atlantis".to_string());
    rec.fields
        .insert("hhtype".to_string(), "grammar; unheard_of_type".to_string());
    let outcome = service.run(ImportMode::Update, vec![rec]).await.unwrap();

    assert_eq!(outcome.unresolved, 2);
    assert_eq!(outcome.changed, 1);
    let r = store.reference(42).await.unwrap().unwrap();
    assert_eq!(r.macroareas, vec!["africa".to_string()]);
    assert_eq!(r.doctypes, vec!["grammar".to_string()]);
    assert_eq!(r.title.as_deref(), Some("A grammar of Xyz"));
}

#[tokio::test]
async fn test_missing_identity_aborts_and_rolls_back() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    let orphan = record(&[
        ("author", "Anonymous"),
        ("title", "No id at all"),
        ("year", "1950"),
        ("pages", "30"),
        ("publisher", "n.p."),
        ("note", "found in an attic"),
    ]);
    let result = service
        .run(ImportMode::Update, vec![full_record(), orphan])
        .await;

    assert!(matches!(result, Err(AppError::MissingIdentity { .. })));
    // the record processed before the violation is rolled back too
    assert!(store.reference(42).await.unwrap().is_none());
}

#[tokio::test]
async fn test_differing_address_is_preserved() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    let mut rec = full_record();
    rec.fields
        .insert("address".to_string(), "Leipzig".to_string());
    service.run(ImportMode::Update, vec![rec]).await.unwrap();

    let r = store.reference(42).await.unwrap().unwrap();
    assert_eq!(r.address.as_deref(), Some("Leipzig"));
    assert_eq!(r.publisher.as_deref(), Some("Mouton"));
}

#[tokio::test]
async fn test_side_bag_merges_without_clobbering() {
    let store = seeded_store();
    let service = ImportService::new(store.clone()).unwrap();

    let mut first = full_record();
    first
        .fields
        .insert("hhnote".to_string(), "checked against scan".to_string());
    service.run(ImportMode::Update, vec![first]).await.unwrap();

    let mut second = full_record();
    second
        .fields
        .insert("seanote".to_string(), "see also vol. 2".to_string());
    service.run(ImportMode::Update, vec![second]).await.unwrap();

    let r = store.reference(42).await.unwrap().unwrap();
    assert_eq!(r.jsondata.get("hhnote").map(String::as_str), Some("checked against scan"));
    assert_eq!(r.jsondata.get("seanote").map(String::as_str), Some("see also vol. 2"));
}
