//! Languoid hierarchy service
//!
//! Read-only queries over the genealogical tree. The transitive-closure
//! table is the single source of truth; father/family pointers are derived
//! from it when the forest is loaded.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::AppResult;
use crate::models::{ClassificationKind, ClosureRow, Languoid, RefPointer};
use crate::store::CatalogStore;

/// Display node of the nested tree serialization.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub id: String,
    /// Legacy 3-letter code, when the languoid has one.
    pub iso: Option<String>,
    pub level: &'static str,
    pub label: String,
    /// Direct child of the focus node.
    pub child: bool,
    pub children: Vec<TreeNode>,
}

/// In-memory view over all languoids and their closure table.
#[derive(Debug, Default)]
pub struct LanguoidForest {
    nodes: HashMap<String, Languoid>,
    /// child code → (ancestor code, depth), ascending by depth.
    ancestors: HashMap<String, Vec<(String, i32)>>,
    /// ancestor code → (descendant code, depth), including the depth-0
    /// self-pair.
    descendants: HashMap<String, Vec<(String, i32)>>,
}

impl LanguoidForest {
    /// Bulk-load the forest from the catalog store.
    pub async fn load(store: &dyn CatalogStore) -> AppResult<Self> {
        Ok(Self::from_parts(
            store.languoids().await?,
            store.closure_rows().await?,
        ))
    }

    pub fn from_parts(languoids: Vec<Languoid>, closure: Vec<ClosureRow>) -> Self {
        let mut forest = LanguoidForest {
            nodes: languoids.into_iter().map(|l| (l.id.clone(), l)).collect(),
            ..Default::default()
        };

        for row in &closure {
            if row.depth > 0 {
                forest
                    .ancestors
                    .entry(row.child.clone())
                    .or_default()
                    .push((row.parent.clone(), row.depth));
            }
            forest
                .descendants
                .entry(row.parent.clone())
                .or_default()
                .push((row.child.clone(), row.depth));
        }
        for chain in forest.ancestors.values_mut() {
            chain.sort_by_key(|(_, depth)| *depth);
        }
        for descendants in forest.descendants.values_mut() {
            descendants.sort_by_key(|(_, depth)| *depth);
        }

        // father and family are cached pointers over the closure table:
        // the depth-1 ancestor and the deepest one
        for (code, chain) in &forest.ancestors {
            let father = chain.first().map(|(parent, _)| parent.clone());
            let family = chain.last().map(|(parent, _)| parent.clone());
            if let Some(node) = forest.nodes.get_mut(code) {
                node.father = father;
                node.family = family;
            }
        }
        forest
    }

    pub fn get(&self, code: &str) -> Option<&Languoid> {
        self.nodes.get(code)
    }

    /// Ancestors of a node ordered from nearest parent to top-level family.
    pub fn ancestors(&self, code: &str) -> Vec<&Languoid> {
        self.ancestors
            .get(code)
            .map(|chain| {
                chain
                    .iter()
                    .filter_map(|(parent, _)| self.nodes.get(parent))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The node's classification justification of the given kind, when it
    /// carries a non-empty description.
    pub fn classification(&self, code: &str, kind: ClassificationKind) -> Option<&crate::models::Justification> {
        self.nodes.get(code).and_then(|l| l.classification(kind))
    }

    /// Sub-classification references with hereditary semantics: a node
    /// without its own references inherits the nearest ancestor's. A root
    /// with none yields an empty sequence.
    pub fn subclassification_refs(&self, code: &str) -> Vec<RefPointer> {
        let mut current = self.nodes.get(code);
        while let Some(node) = current {
            let refs = node.classification_refs(ClassificationKind::Sub);
            if !refs.is_empty() {
                return refs.to_vec();
            }
            current = node.father.as_deref().and_then(|f| self.nodes.get(f));
        }
        Vec::new()
    }

    /// Family-classification references unioned with the inherited
    /// sub-classification references, most recent source first; a missing
    /// year sorts last.
    pub fn combined_refs(&self, code: &str) -> Vec<RefPointer> {
        let mut refs: Vec<RefPointer> = self
            .nodes
            .get(code)
            .map(|l| l.classification_refs(ClassificationKind::Family).to_vec())
            .unwrap_or_default();
        refs.extend(self.subclassification_refs(code));
        refs.sort_by_key(|r| std::cmp::Reverse(r.year.unwrap_or(0)));
        refs
    }

    /// Nested display tree over all descendants of the node's family root.
    ///
    /// Rows arrive ordered by (depth, name), so a parent is known before
    /// its children; branches hanging off nodes absent from the closure
    /// scan (dialects attached to inactive nodes) are silently dropped.
    pub fn tree(&self, code: &str) -> Vec<TreeNode> {
        let Some(focus) = self.nodes.get(code) else {
            return Vec::new();
        };
        let root = focus.family.as_deref().unwrap_or(&focus.id);

        let mut rows: Vec<(&Languoid, i32)> = self
            .descendants
            .get(root)
            .map(|descendants| {
                descendants
                    .iter()
                    .filter_map(|(child, depth)| self.nodes.get(child).map(|l| (l, *depth)))
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.name.cmp(&b.name)));

        let codes: std::collections::HashSet<&str> =
            rows.iter().map(|(l, _)| l.id.as_str()).collect();
        let mut pending: HashMap<&str, Vec<TreeNode>> = HashMap::new();
        let mut roots = Vec::new();

        // assemble bottom-up: children of every node are complete before
        // the node itself is visited
        for (languoid, _) in rows.iter().rev() {
            let mut children = pending.remove(languoid.id.as_str()).unwrap_or_default();
            children.reverse();

            let iso = languoid.hid.as_deref().filter(|h| h.len() == 3).map(String::from);
            let mut label = languoid.name.clone();
            if let Some(count) = languoid.child_language_count {
                if count > 0 {
                    label.push_str(&format!(" ({})", count));
                }
            }
            let node = TreeNode {
                id: languoid.id.clone(),
                iso,
                level: languoid.level.as_str(),
                label,
                child: languoid.father.as_deref() == Some(code),
                children,
            };

            match languoid.father.as_deref() {
                None => roots.push(node),
                Some(father) if codes.contains(father) => {
                    pending.entry(father).or_default().push(node);
                }
                Some(father) => {
                    debug!(id = %languoid.id, father = %father, "dropping orphaned branch");
                }
            }
        }
        roots.reverse();
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Justification, LanguoidLevel};

    fn closure_for_chain(chain: &[&str]) -> Vec<ClosureRow> {
        // full transitive closure of a single father chain, self-pairs
        // included
        let mut rows = Vec::new();
        for (ci, child) in chain.iter().enumerate() {
            for (pi, parent) in chain.iter().enumerate().take(ci + 1) {
                rows.push(ClosureRow {
                    parent: parent.to_string(),
                    child: child.to_string(),
                    depth: (ci - pi) as i32,
                });
            }
        }
        rows
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let forest = LanguoidForest::from_parts(
            vec![
                Languoid::new("root", "Root", LanguoidLevel::Family),
                Languoid::new("mid", "Mid", LanguoidLevel::Family),
                Languoid::new("leaf", "Leaf", LanguoidLevel::Language),
            ],
            closure_for_chain(&["root", "mid", "leaf"]),
        );
        let ancestors = forest.ancestors("leaf");
        let ids: Vec<&str> = ancestors.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["mid", "root"]);
        assert!(forest.ancestors("root").is_empty());
    }

    #[test]
    fn test_father_family_derived_from_closure() {
        let forest = LanguoidForest::from_parts(
            vec![
                Languoid::new("root", "Root", LanguoidLevel::Family),
                Languoid::new("mid", "Mid", LanguoidLevel::Family),
                Languoid::new("leaf", "Leaf", LanguoidLevel::Language),
            ],
            closure_for_chain(&["root", "mid", "leaf"]),
        );
        let leaf = forest.get("leaf").unwrap();
        assert_eq!(leaf.father.as_deref(), Some("mid"));
        assert_eq!(leaf.family.as_deref(), Some("root"));
        assert_eq!(forest.get("root").unwrap().father, None);
    }
}
