//! Additive-only relationship reconciliation
//!
//! Relationship tags accumulate monotonically across import runs: one
//! incomplete source file must never erase curated links. Reconciliation
//! therefore only ever appends; members absent from the desired set are
//! reported, not removed.

/// Outcome of reconciling one relationship family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation<T> {
    /// Desired members not already present, in desired order.
    pub added: Vec<T>,
    /// Whether any existing member is absent from the desired set.
    /// Informational only under the additive-only policy.
    pub missing: bool,
}

/// Compute the additions needed to bring `existing` up to a superset of
/// `desired`.
pub fn reconcile<T: PartialEq + Clone>(existing: &[T], desired: &[T]) -> Reconciliation<T> {
    let mut added = Vec::new();
    for member in desired {
        if !existing.contains(member) && !added.contains(member) {
            added.push(member.clone());
        }
    }
    let missing = existing.iter().any(|member| !desired.contains(member));
    Reconciliation { added, missing }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_accumulation() {
        let existing = vec!["a".to_string(), "b".to_string()];
        let desired = vec!["b".to_string(), "c".to_string()];
        let outcome = reconcile(&existing, &desired);
        assert_eq!(outcome.added, vec!["c".to_string()]);
        assert!(outcome.missing);
    }

    #[test]
    fn test_no_change_when_subset() {
        let existing = vec!["a".to_string(), "b".to_string()];
        let desired = vec!["a".to_string()];
        let outcome = reconcile(&existing, &desired);
        assert!(outcome.added.is_empty());
        assert!(outcome.missing);
    }

    #[test]
    fn test_identical_sets() {
        let existing = vec!["a".to_string()];
        let outcome = reconcile(&existing, &existing.clone());
        assert!(outcome.added.is_empty());
        assert!(!outcome.missing);
    }

    #[test]
    fn test_duplicate_desired_members_added_once() {
        let existing: Vec<String> = vec![];
        let desired = vec!["a".to_string(), "a".to_string()];
        let outcome = reconcile(&existing, &desired);
        assert_eq!(outcome.added, vec!["a".to_string()]);
    }
}
