//! Cache behavior across whole operator trees.

mod support;

use hexic_core::ResultType;
use hexic_engine::{Filter, FilterType, IndexScan, Operation, ScanType};
use std::sync::Arc;
use support::{fixture, values_tree};

#[test]
fn test_identical_trees_share_one_result() {
    let fx = fixture(
        &[("<s1>", "<p1>", "<o1>"), ("<s2>", "<p1>", "<o2>")],
        &[],
    );
    let mut scan_a = IndexScan::new(Arc::clone(&fx.ctx), ScanType::PsoFreeS);
    scan_a.set_predicate("<p1>");
    let mut scan_b = IndexScan::new(Arc::clone(&fx.ctx), ScanType::PsoFreeS);
    scan_b.set_predicate("<p1>");
    assert_eq!(scan_a.as_string(0), scan_b.as_string(0));

    let first = scan_a.get_result(false).unwrap();
    let second = scan_b.get_result(false).unwrap();
    // Same canonical form, same underlying table.
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fx.ctx.cache().len(), 1);
}

#[test]
fn test_distinct_trees_do_not_collide() {
    let fx = fixture(
        &[("<s1>", "<p1>", "<o1>"), ("<s1>", "<p2>", "<o2>")],
        &[],
    );
    let mut scan_a = IndexScan::new(Arc::clone(&fx.ctx), ScanType::PsoFreeS);
    scan_a.set_predicate("<p1>");
    let mut scan_b = IndexScan::new(Arc::clone(&fx.ctx), ScanType::PsoFreeS);
    scan_b.set_predicate("<p2>");

    let first = scan_a.get_result(false).unwrap();
    let second = scan_b.get_result(false).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(fx.ctx.cache().len(), 2);
}

#[test]
fn test_pinned_root_result_survives() {
    let fx = fixture(&[("<s1>", "<p1>", "<o1>")], &[]);
    let mut scan = IndexScan::new(Arc::clone(&fx.ctx), ScanType::PsoFreeS);
    scan.set_predicate("<p1>");
    let key = scan.as_string(0);

    let pinned = scan.get_result(true).unwrap();
    // Flood the LRU with other entries; the pinned one must survive.
    for i in 0..200u64 {
        let tree = values_tree(
            &fx.ctx,
            &format!("flood-{i}"),
            &[&[i]],
            vec![ResultType::Verbatim],
            vec![],
            &[("?x", 0)],
        );
        tree.get_result().unwrap();
    }
    let hit = fx.ctx.cache().peek(&key).unwrap();
    assert!(Arc::ptr_eq(&hit, &pinned));
}

#[test]
fn test_failed_computation_evicts_and_allows_retry() {
    let ctx = support::empty_context();
    let input = values_tree(
        &ctx,
        "evict-input",
        &[&[1]],
        vec![ResultType::Verbatim],
        vec![],
        &[("?x", 0)],
    );
    let filter = Filter::new(
        Arc::clone(&ctx),
        Arc::clone(&input),
        FilterType::Eq,
        "?x",
        "not-a-number",
    );
    let key = filter.as_string(0);

    let err = filter.get_result(false).unwrap_err();
    assert!(matches!(err, hexic_engine::EngineError::BadQuery(_)));
    // The aborted placeholder is gone, so a retry computes afresh (and
    // fails the same way rather than surfacing a stale aborted entry).
    assert!(ctx.cache().peek(&key).is_none());
    let err = filter.get_result(false).unwrap_err();
    assert!(matches!(err, hexic_engine::EngineError::BadQuery(_)));
}

#[test]
fn test_subresults_are_cached_for_reuse() {
    let ctx = support::empty_context();
    let input = values_tree(
        &ctx,
        "shared-sub",
        &[&[1], &[2]],
        vec![ResultType::Verbatim],
        vec![0],
        &[("?x", 0)],
    );
    let filter_a = Filter::new(Arc::clone(&ctx), Arc::clone(&input), FilterType::Ge, "?x", "2");
    let filter_b = Filter::new(Arc::clone(&ctx), Arc::clone(&input), FilterType::Le, "?x", "1");

    filter_a.get_result(false).unwrap();
    filter_b.get_result(false).unwrap();
    // Both filters plus the shared subtree result.
    assert_eq!(ctx.cache().len(), 3);

    let sub = ctx.cache().peek(&input.as_string(0)).unwrap();
    let again = input.get_result().unwrap();
    assert!(Arc::ptr_eq(&sub, &again));
}
