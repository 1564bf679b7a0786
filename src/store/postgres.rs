//! Postgres catalog store
//!
//! sqlx-backed implementation of the store contract. A single transaction
//! is held for the duration of an import run; all statements issued between
//! `begin` and `commit` run on it, giving the batch its all-or-nothing
//! semantics.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::models::{
    ClosureRow, Doctype, FieldValue, Justification, Languoid, LanguoidLevel, MacroArea, Provider,
    RefPointer, RefField, Reference,
};

use super::{CatalogStore, RelationKind};

pub struct PgCatalogStore {
    pool: PgPool,
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }
}

impl RelationKind {
    fn link_table(&self) -> &'static str {
        match self {
            RelationKind::Macroarea => "ref_macroarea",
            RelationKind::Provider => "ref_provider",
            RelationKind::Doctype => "ref_doctype",
        }
    }

    fn link_column(&self) -> &'static str {
        match self {
            RelationKind::Macroarea => "macroarea_id",
            RelationKind::Provider => "provider_id",
            RelationKind::Doctype => "doctype_id",
        }
    }
}

fn parse_level(raw: &str) -> AppResult<LanguoidLevel> {
    match raw {
        "family" => Ok(LanguoidLevel::Family),
        "language" => Ok(LanguoidLevel::Language),
        "dialect" => Ok(LanguoidLevel::Dialect),
        other => Err(AppError::Store(format!("unknown languoid level '{}'", other))),
    }
}

fn reference_from_row(row: &PgRow) -> AppResult<Reference> {
    let jsondata: IndexMap<String, String> = match row.try_get::<Option<serde_json::Value>, _>("jsondata")? {
        Some(value) => serde_json::from_value(value)?,
        None => IndexMap::new(),
    };
    Ok(Reference {
        key: row.try_get("key")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        bibtex_type: row.try_get("bibtex_type")?,
        author: row.try_get("author")?,
        editor: row.try_get("editor")?,
        year: row.try_get("year")?,
        title: row.try_get("title")?,
        address: row.try_get("address")?,
        publisher: row.try_get("publisher")?,
        pages: row.try_get("pages")?,
        journal: row.try_get("journal")?,
        booktitle: row.try_get("booktitle")?,
        volume: row.try_get("volume")?,
        number: row.try_get("number")?,
        edition: row.try_get("edition")?,
        note: row.try_get("note")?,
        school: row.try_get("school")?,
        series: row.try_get("series")?,
        subject: row.try_get("subject")?,
        subject_headings: row.try_get("subject_headings")?,
        url: row.try_get("url")?,
        inlg: row.try_get("inlg")?,
        ozbib_id: row.try_get("ozbib_id")?,
        year_int: row.try_get("year_int")?,
        startpage_int: row.try_get("startpage_int")?,
        endpage_int: row.try_get("endpage_int")?,
        pages_int: row.try_get("pages_int")?,
        jsondata,
        macroareas: Vec::new(),
        providers: Vec::new(),
        doctypes: Vec::new(),
        doctypes_str: row.try_get("doctypes_str")?,
        providers_str: row.try_get("providers_str")?,
        updated: row.try_get("updated")?,
    })
}

macro_rules! on_executor {
    ($self:expr, $query:expr, $method:ident) => {{
        let mut guard = $self.tx.lock().await;
        match guard.as_mut() {
            Some(tx) => $query.$method(&mut **tx).await,
            None => $query.$method(&$self.pool).await,
        }
    }};
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn begin(&self) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        if guard.is_some() {
            return Err(AppError::Store("transaction already open".into()));
        }
        *guard = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&self) -> AppResult<()> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::Store("commit without begin".into()))?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> AppResult<()> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or_else(|| AppError::Store("rollback without begin".into()))?;
        tx.rollback().await?;
        Ok(())
    }

    async fn reference(&self, key: i64) -> AppResult<Option<Reference>> {
        let query = sqlx::query("SELECT * FROM refs WHERE key = $1").bind(key);
        let Some(row) = on_executor!(self, query, fetch_optional)? else {
            return Ok(None);
        };
        let mut reference = reference_from_row(&row)?;
        for kind in [RelationKind::Macroarea, RelationKind::Provider, RelationKind::Doctype] {
            let sql = format!(
                "SELECT {} FROM {} WHERE ref_key = $1 ORDER BY pk",
                kind.link_column(),
                kind.link_table()
            );
            let query = sqlx::query_scalar::<_, String>(&sql).bind(key);
            let ids = on_executor!(self, query, fetch_all)?;
            match kind {
                RelationKind::Macroarea => reference.macroareas = ids,
                RelationKind::Provider => reference.providers = ids,
                RelationKind::Doctype => reference.doctypes = ids,
            }
        }
        Ok(Some(reference))
    }

    async fn reference_keys(&self) -> AppResult<HashSet<i64>> {
        let query = sqlx::query_scalar::<_, i64>("SELECT key FROM refs");
        Ok(on_executor!(self, query, fetch_all)?.into_iter().collect())
    }

    async fn create_reference(&self, r: &Reference) -> AppResult<()> {
        let jsondata = serde_json::to_value(&r.jsondata)?;
        let query = sqlx::query(
            r#"
            INSERT INTO refs (
                key, name, description, bibtex_type,
                author, editor, year, title, address, publisher, pages,
                journal, booktitle, volume, number, edition, note, school,
                series, subject, subject_headings, url, inlg,
                ozbib_id, year_int, startpage_int, endpage_int, pages_int,
                jsondata, doctypes_str, providers_str, updated
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                $27, $28, $29, $30, $31, $32
            )
            "#,
        )
        .bind(r.key)
        .bind(&r.name)
        .bind(&r.description)
        .bind(&r.bibtex_type)
        .bind(&r.author)
        .bind(&r.editor)
        .bind(&r.year)
        .bind(&r.title)
        .bind(&r.address)
        .bind(&r.publisher)
        .bind(&r.pages)
        .bind(&r.journal)
        .bind(&r.booktitle)
        .bind(&r.volume)
        .bind(&r.number)
        .bind(&r.edition)
        .bind(&r.note)
        .bind(&r.school)
        .bind(&r.series)
        .bind(&r.subject)
        .bind(&r.subject_headings)
        .bind(&r.url)
        .bind(&r.inlg)
        .bind(r.ozbib_id)
        .bind(r.year_int)
        .bind(r.startpage_int)
        .bind(r.endpage_int)
        .bind(r.pages_int)
        .bind(jsondata)
        .bind(&r.doctypes_str)
        .bind(&r.providers_str)
        .bind(r.updated);
        on_executor!(self, query, execute)?;

        for (kind, ids) in [
            (RelationKind::Macroarea, &r.macroareas),
            (RelationKind::Provider, &r.providers),
            (RelationKind::Doctype, &r.doctypes),
        ] {
            self.update_relationships(r.key, kind, ids).await?;
        }
        Ok(())
    }

    async fn update_field(&self, key: i64, field: RefField, value: FieldValue) -> AppResult<()> {
        // column names come from the field enum, never from input
        let sql = format!("UPDATE refs SET {} = $1 WHERE key = $2", field.as_str());
        let query = match value {
            FieldValue::Text(s) => sqlx::query(&sql).bind(s).bind(key),
            FieldValue::Int(i) => sqlx::query(&sql).bind(i).bind(key),
        };
        on_executor!(self, query, execute)?;
        Ok(())
    }

    async fn merge_jsondata(&self, key: i64, bag: &IndexMap<String, String>) -> AppResult<()> {
        let patch = serde_json::to_value(bag)?;
        let query = sqlx::query(
            "UPDATE refs SET jsondata = COALESCE(jsondata, '{}'::jsonb) || $1 WHERE key = $2",
        )
        .bind(patch)
        .bind(key);
        on_executor!(self, query, execute)?;
        Ok(())
    }

    async fn update_relationships(
        &self,
        key: i64,
        kind: RelationKind,
        ids: &[String],
    ) -> AppResult<()> {
        let sql = format!("DELETE FROM {} WHERE ref_key = $1", kind.link_table());
        let query = sqlx::query(&sql).bind(key);
        on_executor!(self, query, execute)?;

        let sql = format!(
            "INSERT INTO {} (ref_key, {}) VALUES ($1, $2)",
            kind.link_table(),
            kind.link_column()
        );
        for id in ids {
            let query = sqlx::query(&sql).bind(key).bind(id);
            on_executor!(self, query, execute)?;
        }
        Ok(())
    }

    async fn touch(&self, key: i64, when: DateTime<Utc>) -> AppResult<()> {
        let query = sqlx::query("UPDATE refs SET updated = $1 WHERE key = $2")
            .bind(when)
            .bind(key);
        on_executor!(self, query, execute)?;
        Ok(())
    }

    async fn macroareas(&self) -> AppResult<Vec<MacroArea>> {
        let query = sqlx::query("SELECT id, name FROM macroarea ORDER BY id");
        let rows = on_executor!(self, query, fetch_all)?;
        rows.iter()
            .map(|row| {
                Ok(MacroArea {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn providers(&self) -> AppResult<Vec<Provider>> {
        let query = sqlx::query("SELECT id, name FROM provider ORDER BY id");
        let rows = on_executor!(self, query, fetch_all)?;
        rows.iter()
            .map(|row| {
                Ok(Provider {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn doctypes(&self) -> AppResult<Vec<Doctype>> {
        let query = sqlx::query("SELECT id, name, ord FROM doctype ORDER BY ord");
        let rows = on_executor!(self, query, fetch_all)?;
        rows.iter()
            .map(|row| {
                Ok(Doctype {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    ord: row.try_get("ord")?,
                })
            })
            .collect()
    }

    async fn languoids(&self) -> AppResult<Vec<Languoid>> {
        let query = sqlx::query(
            "SELECT languoid_id, kind, description FROM classification",
        );
        let rows = on_executor!(self, query, fetch_all)?;
        let mut justifications: HashMap<(String, String), Justification> = HashMap::new();
        for row in &rows {
            let languoid_id: String = row.try_get("languoid_id")?;
            let kind: String = row.try_get("kind")?;
            let description: Option<String> = row.try_get("description")?;
            justifications.insert(
                (languoid_id, kind),
                Justification {
                    description: description.unwrap_or_default(),
                    refs: Vec::new(),
                },
            );
        }

        let query = sqlx::query(
            "SELECT languoid_id, kind, ref_key, year_int FROM classification_ref ORDER BY pk",
        );
        let rows = on_executor!(self, query, fetch_all)?;
        for row in &rows {
            let languoid_id: String = row.try_get("languoid_id")?;
            let kind: String = row.try_get("kind")?;
            let pointer = RefPointer {
                key: row.try_get("ref_key")?,
                year: row.try_get("year_int")?,
            };
            justifications
                .entry((languoid_id, kind))
                .or_default()
                .refs
                .push(pointer);
        }

        let query = sqlx::query(
            r#"
            SELECT id, name, level, hid, active, bookkeeping, macroareas,
                   child_language_count, father, family
            FROM languoid ORDER BY name, id
            "#,
        );
        let rows = on_executor!(self, query, fetch_all)?;
        let mut languoids = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id")?;
            let level: String = row.try_get("level")?;
            languoids.push(Languoid {
                id: id.clone(),
                name: row.try_get("name")?,
                level: parse_level(&level)?,
                hid: row.try_get("hid")?,
                active: row.try_get("active")?,
                bookkeeping: row.try_get("bookkeeping")?,
                macroareas: row.try_get("macroareas")?,
                child_language_count: row.try_get("child_language_count")?,
                father: row.try_get("father")?,
                family: row.try_get("family")?,
                fc: justifications.remove(&(id.clone(), "fc".to_string())),
                sc: justifications.remove(&(id, "sc".to_string())),
            });
        }
        Ok(languoids)
    }

    async fn closure_rows(&self) -> AppResult<Vec<ClosureRow>> {
        let query = sqlx::query(
            "SELECT parent, child, depth FROM languoid_closure ORDER BY child, depth",
        );
        let rows = on_executor!(self, query, fetch_all)?;
        rows.iter()
            .map(|row| {
                Ok(ClosureRow {
                    parent: row.try_get("parent")?,
                    child: row.try_get("child")?,
                    depth: row.try_get("depth")?,
                })
            })
            .collect()
    }
}
