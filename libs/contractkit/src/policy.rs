//! Authorization policy sets and their contract/operation union

use serde::Serialize;

/// Ordered, case-insensitively unique set of policy names.
///
/// Empty means the route needs no authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PolicySet(Vec<String>);

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `name` unless a case-insensitive match is already present.
    /// Returns whether the set grew.
    pub fn insert(&mut self, name: &str) -> bool {
        if name.is_empty() || self.contains(name) {
            return false;
        }
        self.0.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for PolicySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for name in iter {
            set.insert(name.as_ref());
        }
        set
    }
}

impl<'a> IntoIterator for &'a PolicySet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Union of contract-level and operation-level policies.
///
/// Contract names come first, so on a case-only clash the contract's
/// spelling is the one kept.
pub fn resolve_policies(group: &[String], operation: &[String]) -> PolicySet {
    group.iter().chain(operation).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn union_of_distinct_policies() {
        let set = resolve_policies(&names(&["user"]), &names(&["admin"]));
        assert_eq!(set.as_slice(), &["user", "admin"]);
    }

    #[test]
    fn case_clash_keeps_group_spelling() {
        let set = resolve_policies(&names(&["User"]), &names(&["user"]));
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice(), &["User"]);
    }

    #[test]
    fn both_empty_requires_nothing() {
        assert!(resolve_policies(&[], &[]).is_empty());
    }

    #[test]
    fn result_contains_both_inputs() {
        let group = names(&["reader", "Auditor"]);
        let op = names(&["AUDITOR", "writer", "reader"]);
        let set = resolve_policies(&group, &op);

        for name in group.iter().chain(&op) {
            assert!(set.contains(name), "missing {name}");
        }
        assert_eq!(set.as_slice(), &["reader", "Auditor", "writer"]);
    }

    #[test]
    fn duplicates_within_one_side_collapse() {
        let set = resolve_policies(&names(&["admin", "ADMIN"]), &[]);
        assert_eq!(set.as_slice(), &["admin"]);
    }

    #[test]
    fn empty_names_are_skipped() {
        let set = resolve_policies(&names(&[""]), &names(&["user"]));
        assert_eq!(set.as_slice(), &["user"]);
    }
}
