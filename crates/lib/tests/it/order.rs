use fieldbook::order::{Fragment, Hint, order_variables};

fn chain(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("q{i:02}")).collect()
}

#[test]
fn test_overlapping_windows_rebuild_the_chain() {
    let keys = chain(30);
    // Every save only saw three neighbouring questions, newest first.
    let fragments: Vec<Fragment> = keys
        .windows(3)
        .rev()
        .map(|w| Fragment::from_keys(w.iter().cloned()))
        .collect();
    assert_eq!(order_variables(&fragments), keys);
}

#[test]
fn test_form_versions_accumulate() {
    let v1 = Fragment::from_keys(["consent", "name", "age"]);
    let v2 = Fragment::from_keys(["consent", "name", "sex", "age"]);
    let v3 = Fragment::from_keys(["consent", "name", "sex", "age", "photo"]);
    assert_eq!(
        order_variables(&[v1, v2, v3]),
        vec!["consent", "name", "sex", "age", "photo"]
    );
}

#[test]
fn test_fragment_order_does_not_matter_for_consistent_hints() {
    let a = Fragment::from_keys(["a", "b", "c"]);
    let b = Fragment::from_keys(["b", "c", "d"]);
    let c = Fragment::from_keys(["c", "d", "e"]);
    let forward = order_variables(&[a.clone(), b.clone(), c.clone()]);
    let backward = order_variables(&[c, b, a]);
    assert_eq!(forward, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(backward, forward);
}

#[test]
fn test_hints_naming_unknown_keys_are_ignored() {
    let mut fragment = Fragment::new();
    fragment.push("b", Hint::new(Some("a"), Some("c")));
    fragment.push("c", Hint::new(Some("b"), Some("zz")));
    fragment.push("d", Hint::new(Some("c"), None));
    assert_eq!(fragment.len(), 3);
    assert_eq!(order_variables(&[fragment]), vec!["b", "c", "d"]);
}

#[test]
fn test_duplicate_keys_appear_once() {
    let fragment: Fragment = [
        ("x".to_string(), Hint::new(None, Some("y"))),
        ("y".to_string(), Hint::new(Some("x"), None)),
        ("x".to_string(), Hint::new(None, Some("y"))),
    ]
    .into_iter()
    .collect();
    assert_eq!(order_variables(&[fragment]), vec!["x", "y"]);
}

#[test]
fn test_result_is_a_permutation_under_conflicts() {
    let fragments = vec![
        Fragment::from_keys(["a", "b", "c", "d"]),
        Fragment::from_keys(["d", "c", "b", "a"]),
        Fragment::from_keys(["c", "a", "e"]),
    ];
    let order = order_variables(&fragments);
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(order, order_variables(&fragments));
}
