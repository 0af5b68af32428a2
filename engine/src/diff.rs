//! Structural comparison of query snapshots.
//!
//! Equality policy: list values are compared element by element in order,
//! and a single string never equals a one-element list holding the same
//! string. A key that is missing is different from a key holding an empty
//! list.

use crate::{Query, QueryKey, QueryValue};

/// Compare two serialized values.
pub fn values_equal(a: &QueryValue, b: &QueryValue) -> bool {
    match (a, b) {
        (QueryValue::Single(a), QueryValue::Single(b)) => a == b,
        (QueryValue::Multi(a), QueryValue::Multi(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
        }
        _ => false,
    }
}

/// Same key set and equal values for every key.
pub fn snapshots_equal(a: &Query, b: &Query) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|(key, a_value)| match b.get(key) {
        Some(b_value) => values_equal(a_value, b_value),
        None => false,
    })
}

/// Keys present in only one snapshot, or present in both with unequal values.
///
/// Keys of `a` come first, in `a`'s order, followed by keys only in `b`.
pub fn changed_keys(a: &Query, b: &Query) -> Vec<QueryKey> {
    let mut changed: Vec<QueryKey> = a
        .iter()
        .filter(|(key, a_value)| match b.get(key) {
            Some(b_value) => !values_equal(a_value, b_value),
            None => true,
        })
        .map(|(key, _)| key.clone())
        .collect();

    changed.extend(
        b.keys()
            .filter(|key| !a.contains_key(key))
            .cloned(),
    );

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(s: &str) -> QueryValue {
        QueryValue::from(s)
    }

    fn multi(values: &[&str]) -> QueryValue {
        QueryValue::from(values.to_vec())
    }

    #[test]
    fn scalar_values() {
        assert!(values_equal(&single("a"), &single("a")));
        assert!(!values_equal(&single("a"), &single("b")));
        assert!(values_equal(&single(""), &single("")));
    }

    #[test]
    fn array_values_are_order_sensitive() {
        assert!(values_equal(&multi(&["a", "b"]), &multi(&["a", "b"])));
        assert!(!values_equal(&multi(&["a", "b"]), &multi(&["b", "a"])));
        assert!(!values_equal(&multi(&["a"]), &multi(&["a", "a"])));
        assert!(values_equal(&multi(&[]), &multi(&[])));
    }

    #[test]
    fn scalar_never_equals_array() {
        assert!(!values_equal(&single("a"), &multi(&["a"])));
        assert!(!values_equal(&multi(&["a"]), &single("a")));
    }

    #[test]
    fn snapshots_compare_key_sets() {
        let a = Query::new().with("x", "1").with("y", vec!["a", "b"]);
        let b = Query::new().with("y", vec!["a", "b"]).with("x", "1");
        assert!(snapshots_equal(&a, &b));

        let missing = Query::new().with("x", "1");
        assert!(!snapshots_equal(&a, &missing));
        assert!(!snapshots_equal(&missing, &a));

        let other_key = Query::new().with("x", "1").with("z", vec!["a", "b"]);
        assert!(!snapshots_equal(&a, &other_key));
    }

    #[test]
    fn missing_key_differs_from_empty_array() {
        let empty = Query::new();
        let empty_array = Query::new().with("x", Vec::<String>::new());
        assert!(!snapshots_equal(&empty, &empty_array));
        assert_eq!(changed_keys(&empty, &empty_array), vec!["x".to_string()]);
    }

    #[test]
    fn changed_keys_union() {
        let a = Query::new()
            .with("same", "1")
            .with("changed", "1")
            .with("only_a", "1");
        let b = Query::new()
            .with("same", "1")
            .with("changed", "2")
            .with("only_b", "1");

        let changed = changed_keys(&a, &b);
        assert_eq!(changed, vec!["changed", "only_a", "only_b"]);
    }

    #[test]
    fn changed_keys_empty_for_equal_snapshots() {
        let a = Query::new().with("x", vec!["1", "2"]);
        assert!(changed_keys(&a, &a.clone()).is_empty());
        assert!(changed_keys(&Query::new(), &Query::new()).is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_value() -> impl Strategy<Value = QueryValue> {
            prop_oneof![
                "[a-c]{0,2}".prop_map(QueryValue::Single),
                prop::collection::vec("[a-c]{0,2}", 0..3).prop_map(QueryValue::Multi),
            ]
        }

        fn arb_query() -> impl Strategy<Value = Query> {
            prop::collection::vec(("[a-d]", arb_value()), 0..5)
                .prop_map(|pairs| pairs.into_iter().collect())
        }

        proptest! {
            #[test]
            fn prop_equal_iff_no_changed_keys(a in arb_query(), b in arb_query()) {
                prop_assert_eq!(snapshots_equal(&a, &b), changed_keys(&a, &b).is_empty());
            }

            #[test]
            fn prop_equality_symmetric(a in arb_query(), b in arb_query()) {
                prop_assert_eq!(snapshots_equal(&a, &b), snapshots_equal(&b, &a));
            }

            #[test]
            fn prop_changed_keys_symmetric_as_sets(a in arb_query(), b in arb_query()) {
                let mut ab = changed_keys(&a, &b);
                let mut ba = changed_keys(&b, &a);
                ab.sort();
                ba.sort();
                prop_assert_eq!(ab, ba);
            }
        }
    }
}
