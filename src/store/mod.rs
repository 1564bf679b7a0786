//! Catalog store contract and implementations
//!
//! Persistent keyed storage for reference and languoid entities. The core
//! is agnostic to storage technology: the merge engine and the languoid
//! forest only speak [`CatalogStore`].

pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use indexmap::IndexMap;
#[cfg(test)]
use mockall::automock;

use crate::error::AppResult;
use crate::models::{
    ClosureRow, Doctype, FieldValue, Languoid, MacroArea, Provider, RefField, Reference,
};

pub use memory::MemoryStore;
pub use postgres::PgCatalogStore;

/// Many-to-many relationship families of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Macroarea,
    Provider,
    Doctype,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Macroarea => "macroarea",
            RelationKind::Provider => "provider",
            RelationKind::Doctype => "doctype",
        }
    }
}

/// Storage contract required by the reconciliation core.
///
/// A full import run executes between `begin` and `commit`; any failure
/// aborts the run and `rollback` discards everything written since `begin`.
/// The store provides the surrounding transactional isolation; the engine
/// itself is single-threaded and batch-oriented.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn begin(&self) -> AppResult<()>;
    async fn commit(&self) -> AppResult<()>;
    async fn rollback(&self) -> AppResult<()>;

    /// Fetch a reference by its stable external key.
    async fn reference(&self, key: i64) -> AppResult<Option<Reference>>;

    /// All known external keys, for cheap insert-mode skipping.
    async fn reference_keys(&self) -> AppResult<HashSet<i64>>;

    async fn create_reference(&self, reference: &Reference) -> AppResult<()>;

    /// Overwrite a single scalar field of an existing reference.
    async fn update_field(&self, key: i64, field: RefField, value: FieldValue) -> AppResult<()>;

    /// Merge side-bag entries into an existing reference's bag.
    async fn merge_jsondata(&self, key: i64, bag: &IndexMap<String, String>) -> AppResult<()>;

    /// Replace the id list of one relationship family.
    async fn update_relationships(
        &self,
        key: i64,
        kind: RelationKind,
        ids: &[String],
    ) -> AppResult<()>;

    /// Bump the `updated` timestamp of a reference.
    async fn touch(&self, key: i64, when: chrono::DateTime<chrono::Utc>) -> AppResult<()>;

    async fn macroareas(&self) -> AppResult<Vec<MacroArea>>;
    async fn providers(&self) -> AppResult<Vec<Provider>>;
    async fn doctypes(&self) -> AppResult<Vec<Doctype>>;

    async fn languoids(&self) -> AppResult<Vec<Languoid>>;
    async fn closure_rows(&self) -> AppResult<Vec<ClosureRow>>;
}
