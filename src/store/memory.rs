//! In-memory catalog store
//!
//! Backs the test suite and small corpora. Transaction semantics are
//! snapshot based: `begin` clones the current state, `rollback` restores
//! the snapshot, `commit` drops it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::{AppError, AppResult};
use crate::models::{
    ClosureRow, Doctype, FieldValue, Languoid, MacroArea, Provider, RefField, Reference,
};

use super::{CatalogStore, RelationKind};

#[derive(Debug, Clone, Default)]
struct State {
    references: BTreeMap<i64, Reference>,
    macroareas: Vec<MacroArea>,
    providers: Vec<Provider>,
    doctypes: Vec<Doctype>,
    languoids: Vec<Languoid>,
    closure: Vec<ClosureRow>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    snapshot: Mutex<Option<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the vocabulary tables.
    pub fn with_vocabularies(
        self,
        macroareas: Vec<MacroArea>,
        providers: Vec<Provider>,
        doctypes: Vec<Doctype>,
    ) -> Self {
        {
            let mut state = self.state.lock().expect("store poisoned");
            state.macroareas = macroareas;
            state.providers = providers;
            state.doctypes = doctypes;
        }
        self
    }

    /// Seed the languoid tree.
    pub fn with_tree(self, languoids: Vec<Languoid>, closure: Vec<ClosureRow>) -> Self {
        {
            let mut state = self.state.lock().expect("store poisoned");
            state.languoids = languoids;
            state.closure = closure;
        }
        self
    }

    /// Seed a reference directly, bypassing the merge engine.
    pub fn insert_reference(&self, reference: Reference) {
        let mut state = self.state.lock().expect("store poisoned");
        state.references.insert(reference.key, reference);
    }

    fn with_reference<T>(
        &self,
        key: i64,
        f: impl FnOnce(&mut Reference) -> T,
    ) -> AppResult<T> {
        let mut state = self.state.lock().expect("store poisoned");
        let reference = state
            .references
            .get_mut(&key)
            .ok_or_else(|| AppError::Store(format!("no reference with key {}", key)))?;
        Ok(f(reference))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn begin(&self) -> AppResult<()> {
        let state = self.state.lock().expect("store poisoned");
        *self.snapshot.lock().expect("store poisoned") = Some(state.clone());
        Ok(())
    }

    async fn commit(&self) -> AppResult<()> {
        *self.snapshot.lock().expect("store poisoned") = None;
        Ok(())
    }

    async fn rollback(&self) -> AppResult<()> {
        let snapshot = self
            .snapshot
            .lock()
            .expect("store poisoned")
            .take()
            .ok_or_else(|| AppError::Store("rollback without begin".into()))?;
        *self.state.lock().expect("store poisoned") = snapshot;
        Ok(())
    }

    async fn reference(&self, key: i64) -> AppResult<Option<Reference>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state.references.get(&key).cloned())
    }

    async fn reference_keys(&self) -> AppResult<HashSet<i64>> {
        let state = self.state.lock().expect("store poisoned");
        Ok(state.references.keys().copied().collect())
    }

    async fn create_reference(&self, reference: &Reference) -> AppResult<()> {
        let mut state = self.state.lock().expect("store poisoned");
        if state.references.contains_key(&reference.key) {
            return Err(AppError::Store(format!(
                "reference {} already exists",
                reference.key
            )));
        }
        state.references.insert(reference.key, reference.clone());
        Ok(())
    }

    async fn update_field(&self, key: i64, field: RefField, value: FieldValue) -> AppResult<()> {
        self.with_reference(key, |r| r.set_field(field, value))
    }

    async fn merge_jsondata(&self, key: i64, bag: &IndexMap<String, String>) -> AppResult<()> {
        self.with_reference(key, |r| r.merge_jsondata(bag))
    }

    async fn update_relationships(
        &self,
        key: i64,
        kind: RelationKind,
        ids: &[String],
    ) -> AppResult<()> {
        self.with_reference(key, |r| {
            let target = match kind {
                RelationKind::Macroarea => &mut r.macroareas,
                RelationKind::Provider => &mut r.providers,
                RelationKind::Doctype => &mut r.doctypes,
            };
            *target = ids.to_vec();
        })
    }

    async fn touch(&self, key: i64, when: DateTime<Utc>) -> AppResult<()> {
        self.with_reference(key, |r| r.updated = when)
    }

    async fn macroareas(&self) -> AppResult<Vec<MacroArea>> {
        Ok(self.state.lock().expect("store poisoned").macroareas.clone())
    }

    async fn providers(&self) -> AppResult<Vec<Provider>> {
        Ok(self.state.lock().expect("store poisoned").providers.clone())
    }

    async fn doctypes(&self) -> AppResult<Vec<Doctype>> {
        Ok(self.state.lock().expect("store poisoned").doctypes.clone())
    }

    async fn languoids(&self) -> AppResult<Vec<Languoid>> {
        Ok(self.state.lock().expect("store poisoned").languoids.clone())
    }

    async fn closure_rows(&self) -> AppResult<Vec<ClosureRow>> {
        Ok(self.state.lock().expect("store poisoned").closure.clone())
    }
}
