//! Recursive structural comparison of two JSON values under a profile

use crate::diff::{type_name, DiffKind, FieldDiff};
use crate::profile::{child_path, ComparisonProfile, Tolerance};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Walks two values side by side, collecting differences
pub(crate) struct Comparator<'p> {
    profile: &'p ComparisonProfile,
    max_value_len: usize,
    diffs: Vec<FieldDiff>,
}

impl<'p> Comparator<'p> {
    pub(crate) fn new(profile: &'p ComparisonProfile, max_value_len: usize) -> Self {
        Self {
            profile,
            max_value_len,
            diffs: Vec::new(),
        }
    }

    /// Compare from the root and return every difference
    pub(crate) fn run(mut self, legacy: &Value, new: &Value) -> Vec<FieldDiff> {
        self.walk("", legacy, new);
        self.diffs
    }

    fn push(&mut self, path: &str, kind: DiffKind, legacy: Option<&Value>, new: Option<&Value>) {
        let kind = if kind.is_significant() && self.profile.is_soft(path) {
            DiffKind::Tolerated
        } else {
            kind
        };
        self.diffs
            .push(FieldDiff::new(path, kind, legacy, new, self.max_value_len));
    }

    fn walk(&mut self, path: &str, legacy: &Value, new: &Value) {
        if self.profile.is_ignored(path) {
            return;
        }

        if let Some(tolerance) = self.profile.tolerance_for(path) {
            if let Some(agree) = scalars_agree(tolerance, legacy, new) {
                if !agree {
                    self.push(path, DiffKind::ValueMismatch, Some(legacy), Some(new));
                }
                return;
            }
        }

        match (legacy, new) {
            (Value::Object(l), Value::Object(n)) => self.walk_object(path, l, n),
            (Value::Array(l), Value::Array(n)) => {
                if self.profile.is_unordered(path) {
                    self.walk_unordered(path, l, n);
                } else {
                    self.walk_ordered(path, l, n);
                }
            }
            (Value::Number(l), Value::Number(n)) => {
                let equal = match (l.as_i64(), n.as_i64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => l.as_f64() == n.as_f64(),
                };
                if !equal {
                    self.push(path, DiffKind::ValueMismatch, Some(legacy), Some(new));
                }
            }
            (Value::String(_), Value::String(_))
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Null, Value::Null) => {
                if legacy != new {
                    self.push(path, DiffKind::ValueMismatch, Some(legacy), Some(new));
                }
            }
            _ => {
                let mut diff = FieldDiff::new(
                    path,
                    DiffKind::TypeMismatch,
                    Some(legacy),
                    Some(new),
                    self.max_value_len,
                );
                if self.profile.is_soft(path) {
                    diff.kind = DiffKind::Tolerated;
                }
                diff.legacy = format!("{}: {}", type_name(legacy), diff.legacy);
                diff.new = format!("{}: {}", type_name(new), diff.new);
                self.diffs.push(diff);
            }
        }
    }

    fn walk_object(&mut self, path: &str, legacy: &Map<String, Value>, new: &Map<String, Value>) {
        let keys: BTreeSet<&String> = legacy.keys().chain(new.keys()).collect();
        for key in keys {
            let child = child_path(path, key);
            if self.profile.is_ignored(&child) {
                continue;
            }
            match (legacy.get(key), new.get(key)) {
                (Some(l), Some(n)) => self.walk(&child, l, n),
                (Some(Value::Null), None) | (None, Some(Value::Null)) => {
                    let (l, n) = (legacy.get(key), new.get(key));
                    self.diffs.push(FieldDiff::new(
                        child,
                        DiffKind::Tolerated,
                        l,
                        n,
                        self.max_value_len,
                    ));
                }
                (Some(l), None) => self.push(&child, DiffKind::MissingInNew, Some(l), None),
                (None, Some(n)) => self.push(&child, DiffKind::MissingInLegacy, None, Some(n)),
                (None, None) => {}
            }
        }
    }

    fn walk_ordered(&mut self, path: &str, legacy: &[Value], new: &[Value]) {
        if legacy.len() != new.len() {
            self.push(
                path,
                DiffKind::LengthMismatch,
                Some(&Value::from(legacy.len())),
                Some(&Value::from(new.len())),
            );
            return;
        }
        for (l, n) in legacy.iter().zip(new) {
            self.walk(path, l, n);
        }
    }

    /// Pair elements as a multiset
    ///
    /// Pairs come from a maximum matching over "compares without significant
    /// differences", seeded with exact pairs. Leftover object rows are then
    /// paired by fewest significant differences and reported field by field;
    /// whatever still has no counterpart is reported as unmatched elements.
    fn walk_unordered(&mut self, path: &str, legacy: &[Value], new: &[Value]) {
        let mut cells: Vec<Vec<Vec<FieldDiff>>> = legacy
            .iter()
            .map(|l| {
                new.iter()
                    .map(|n| Comparator::new(self.profile, self.max_value_len).element(path, l, n))
                    .collect()
            })
            .collect();

        let mut matching = Matching::new(legacy.len(), new.len());
        matching.augment_all(&|i, j| cells[i][j].is_empty());
        matching.augment_all(&|i, j| cells[i][j].iter().all(|d| !d.kind.is_significant()));

        for (i, j) in matching.pairs() {
            self.diffs.append(&mut cells[i][j]);
        }

        let mut free_new: Vec<usize> = matching.free_new().collect();
        let mut unmatched_legacy = Vec::new();
        for i in matching.free_legacy() {
            let closest = free_new
                .iter()
                .enumerate()
                .filter(|(_, &j)| legacy[i].is_object() && new[j].is_object())
                .min_by_key(|(_, &j)| significant_count(&cells[i][j]))
                .map(|(slot, _)| slot);
            match closest {
                Some(slot) => {
                    let j = free_new.remove(slot);
                    self.diffs.append(&mut cells[i][j]);
                }
                None => unmatched_legacy.push(legacy[i].clone()),
            }
        }
        let unmatched_new: Vec<Value> = free_new.into_iter().map(|j| new[j].clone()).collect();

        if !unmatched_legacy.is_empty() || !unmatched_new.is_empty() {
            self.push(
                path,
                DiffKind::UnmatchedElements,
                Some(&Value::Array(unmatched_legacy)),
                Some(&Value::Array(unmatched_new)),
            );
        }
    }

    /// Compare one element pair of an array at `path`
    fn element(mut self, path: &str, legacy: &Value, new: &Value) -> Vec<FieldDiff> {
        match (legacy, new) {
            // elements share the array's path; re-check arrays of arrays positionally
            (Value::Array(l), Value::Array(n)) => self.walk_ordered(path, l, n),
            _ => self.walk_element(path, legacy, new),
        }
        self.diffs
    }

    fn walk_element(&mut self, path: &str, legacy: &Value, new: &Value) {
        match (legacy, new) {
            (Value::Object(l), Value::Object(n)) => self.walk_object(path, l, n),
            _ => {
                // scalar element of an unordered array at `path`
                if let Some(tolerance) = self.profile.tolerance_for(path) {
                    if scalars_agree(tolerance, legacy, new) == Some(true) {
                        return;
                    }
                }
                if legacy != new {
                    self.walk_scalar_element(path, legacy, new);
                }
            }
        }
    }

    fn walk_scalar_element(&mut self, path: &str, legacy: &Value, new: &Value) {
        let kind = if type_name(legacy) == type_name(new) {
            DiffKind::ValueMismatch
        } else {
            DiffKind::TypeMismatch
        };
        let equal_numbers = matches!(
            (legacy, new),
            (Value::Number(l), Value::Number(n)) if l.as_f64() == n.as_f64()
        );
        if !equal_numbers {
            self.push(path, kind, Some(legacy), Some(new));
        }
    }
}

fn significant_count(diffs: &[FieldDiff]) -> usize {
    diffs.iter().filter(|d| d.kind.is_significant()).count()
}

/// Bipartite matching between legacy and new elements (augmenting paths)
struct Matching {
    of_legacy: Vec<Option<usize>>,
    of_new: Vec<Option<usize>>,
}

impl Matching {
    fn new(legacy: usize, new: usize) -> Self {
        Self {
            of_legacy: vec![None; legacy],
            of_new: vec![None; new],
        }
    }

    /// Grow the matching until no augmenting path over `edge` remains
    ///
    /// Existing pairs may be re-routed but never dropped.
    fn augment_all(&mut self, edge: &dyn Fn(usize, usize) -> bool) {
        for i in 0..self.of_legacy.len() {
            if self.of_legacy[i].is_none() {
                let mut seen = vec![false; self.of_new.len()];
                self.augment(i, edge, &mut seen);
            }
        }
    }

    fn augment(
        &mut self,
        i: usize,
        edge: &dyn Fn(usize, usize) -> bool,
        seen: &mut [bool],
    ) -> bool {
        for j in 0..self.of_new.len() {
            if seen[j] || !edge(i, j) {
                continue;
            }
            seen[j] = true;
            let free = match self.of_new[j] {
                None => true,
                Some(k) => self.augment(k, edge, seen),
            };
            if free {
                self.of_new[j] = Some(i);
                self.of_legacy[i] = Some(j);
                return true;
            }
        }
        false
    }

    fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.of_legacy
            .iter()
            .enumerate()
            .filter_map(|(i, j)| j.map(|j| (i, j)))
    }

    fn free_legacy(&self) -> impl Iterator<Item = usize> + '_ {
        self.of_legacy
            .iter()
            .enumerate()
            .filter(|(_, j)| j.is_none())
            .map(|(i, _)| i)
    }

    fn free_new(&self) -> impl Iterator<Item = usize> + '_ {
        self.of_new
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_none())
            .map(|(j, _)| j)
    }
}

/// Apply a tolerance to a scalar pair; `None` when the tolerance does not
/// apply to these value types
fn scalars_agree(tolerance: Tolerance, legacy: &Value, new: &Value) -> Option<bool> {
    match (legacy, new) {
        (Value::Number(l), Value::Number(n)) => {
            let (l, n) = (l.as_f64()?, n.as_f64()?);
            Some(tolerance.numbers_agree(l, n))
        }
        (Value::String(l), Value::String(n)) => Some(tolerance.strings_agree(l, n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ComparisonProfile;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn kinds(profile: &ComparisonProfile, l: &Value, n: &Value) -> Vec<(String, DiffKind)> {
        Comparator::new(profile, 80)
            .run(l, n)
            .into_iter()
            .map(|d| (d.path, d.kind))
            .collect()
    }

    #[test]
    fn identical_values_have_no_diffs() {
        let v = json!({"a": 1, "b": [1, 2], "c": {"d": "x"}});
        assert!(kinds(&ComparisonProfile::new("t"), &v, &v).is_empty());
    }

    #[test]
    fn ignored_fields_are_skipped_everywhere() {
        let p = ComparisonProfile::new("t").ignore("id").ignore("items.id");
        let l = json!({"id": "l-1", "items": [{"id": 1, "q": 2}]});
        let n = json!({"id": "n-7", "items": [{"id": 9, "q": 2}]});
        assert!(kinds(&p, &l, &n).is_empty());
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        let p = ComparisonProfile::new("t");
        assert!(kinds(&p, &json!({"n": 3}), &json!({"n": 3.0})).is_empty());
        assert_eq!(
            kinds(&p, &json!({"n": 3}), &json!({"n": 4})),
            vec![("n".to_string(), DiffKind::ValueMismatch)]
        );
    }

    #[test]
    fn missing_and_null_fields() {
        let p = ComparisonProfile::new("t");
        assert_eq!(
            kinds(&p, &json!({"a": 1}), &json!({})),
            vec![("a".to_string(), DiffKind::MissingInNew)]
        );
        assert_eq!(
            kinds(&p, &json!({}), &json!({"b": true})),
            vec![("b".to_string(), DiffKind::MissingInLegacy)]
        );
        assert_eq!(
            kinds(&p, &json!({"c": null}), &json!({})),
            vec![("c".to_string(), DiffKind::Tolerated)]
        );
    }

    #[test]
    fn type_mismatch_is_reported_not_raised() {
        let p = ComparisonProfile::new("t");
        let diffs = Comparator::new(&p, 80).run(&json!({"a": [1]}), &json!({"a": "1"}));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::TypeMismatch);
        assert!(diffs[0].legacy.starts_with("array: "));
        assert!(diffs[0].new.starts_with("string: "));
    }

    #[test]
    fn ordered_arrays_compare_positionally() {
        let p = ComparisonProfile::new("t");
        assert_eq!(
            kinds(&p, &json!({"tags": ["a", "b"]}), &json!({"tags": ["b", "a"]})),
            vec![
                ("tags".to_string(), DiffKind::ValueMismatch),
                ("tags".to_string(), DiffKind::ValueMismatch)
            ]
        );
        assert_eq!(
            kinds(&p, &json!([1, 2]), &json!([1])),
            vec![(String::new(), DiffKind::LengthMismatch)]
        );
    }

    #[test]
    fn unordered_arrays_compare_as_multisets() {
        let p = ComparisonProfile::new("t").unordered("tags");
        assert!(kinds(
            &p,
            &json!({"tags": ["a", "b", "a"]}),
            &json!({"tags": ["a", "a", "b"]})
        )
        .is_empty());
        assert_eq!(
            kinds(&p, &json!({"tags": ["a", "b"]}), &json!({"tags": ["a", "c"]})),
            vec![("tags".to_string(), DiffKind::UnmatchedElements)]
        );
    }

    #[test]
    fn unordered_rows_pair_under_nested_rules() {
        let p = ComparisonProfile::new("budget")
            .ignore("id")
            .tolerance("amount", Tolerance::Absolute(0.01))
            .unordered_results();
        let l = json!([{"id": "l-1", "amount": 10.001}, {"id": "l-2", "amount": 5.0}]);
        let n = json!([{"id": "n-2", "amount": 5.0}, {"id": "n-1", "amount": 10.0009}]);
        assert!(kinds(&p, &l, &n).is_empty());
    }

    fn budget_rows() -> ComparisonProfile {
        ComparisonProfile::new("budget")
            .ignore("id")
            .tolerance("amount", Tolerance::Absolute(0.01))
            .unordered_results()
    }

    #[test]
    fn unordered_rows_find_pairing_first_fit_misses() {
        // 1.005 fits 1.0 first, which would strand 0.995 and 1.015
        let l = json!([{"amount": 1.005}, {"amount": 0.995}]);
        let n = json!([{"amount": 1.0}, {"amount": 1.015}]);
        assert!(kinds(&budget_rows(), &l, &n).is_empty());
    }

    #[test]
    fn exact_pairs_win_over_tolerated_ones() {
        let p = ComparisonProfile::new("t").soft("note").unordered_results();
        let l = json!([{"k": 1, "note": "a"}, {"k": 1, "note": "b"}]);
        let n = json!([{"k": 1, "note": "b"}, {"k": 1, "note": "a"}]);
        assert!(kinds(&p, &l, &n).is_empty());
    }

    #[test]
    fn differing_row_reports_field_paths() {
        let l = json!([
            {"id": "l-1", "name": "rent", "category": "housing", "amount": 400.0},
            {"id": "l-2", "name": "food", "category": "food", "amount": 120.0}
        ]);
        let n = json!([
            {"id": "n-2", "name": "food", "category": "food", "amount": 120.0},
            {"id": "n-1", "name": "rent", "category": "housing", "amount": 999.0}
        ]);
        let diffs = Comparator::new(&budget_rows(), 20).run(&l, &n);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "amount");
        assert_eq!(diffs[0].kind, DiffKind::ValueMismatch);
        assert_eq!(diffs[0].legacy, "400.0");
        assert_eq!(diffs[0].new, "999.0");
    }

    #[test]
    fn extra_rows_stay_unmatched() {
        let l = json!([{"amount": 1.0}]);
        let n = json!([{"amount": 1.0}, {"amount": 7.0}]);
        assert_eq!(
            kinds(&budget_rows(), &l, &n),
            vec![(String::new(), DiffKind::UnmatchedElements)]
        );
    }

    #[test]
    fn soft_fields_only_tolerate() {
        let p = ComparisonProfile::new("t").soft("rev");
        assert_eq!(
            kinds(&p, &json!({"rev": 3, "x": 1}), &json!({"rev": 9, "x": 1})),
            vec![("rev".to_string(), DiffKind::Tolerated)]
        );
    }

    #[test]
    fn tolerance_on_timestamps() {
        let p = ComparisonProfile::new("t").tolerance("at", Tolerance::TimestampSeconds);
        assert!(kinds(
            &p,
            &json!({"at": "2026-10-17T10:00:00.123Z"}),
            &json!({"at": "2026-10-17T10:00:00.999999Z"})
        )
        .is_empty());
    }

    proptest::proptest! {
        #[test]
        fn value_equals_itself(
            map in proptest::collection::btree_map("[a-z]{1,6}", proptest::num::i64::ANY, 0..8)
        ) {
            let v = serde_json::to_value(&map).unwrap();
            proptest::prop_assert!(kinds(&ComparisonProfile::new("t"), &v, &v).is_empty());
        }

        #[test]
        fn unordered_ignores_permutation(
            mut items in proptest::collection::vec(0u8..5, 0..12),
            rot in 0usize..12
        ) {
            let legacy = json!({"tags": items.clone()});
            if !items.is_empty() {
                let by = rot % items.len();
                items.rotate_left(by);
            }
            let new = json!({"tags": items});
            let p = ComparisonProfile::new("t").unordered("tags");
            proptest::prop_assert!(kinds(&p, &legacy, &new).is_empty());
        }
    }
}
