//! End-to-end operator scenarios over hand-built inputs and a real index.

mod support;

use hexic_core::{ResultType, ID_NO_VALUE};
use hexic_engine::{
    Filter, FilterType, IndexScan, Operation, OperationType, OrderBy, QueryExecutionTree,
    ScanType, TwoColumnJoin, Union,
};
use std::sync::Arc;
use support::{fixture, values_tree};

/// Every operator result must agree with its declared width and sort
/// order.
fn assert_contract(op: &dyn Operation) {
    let result = op.get_result(false).unwrap();
    let data = result.data().unwrap();
    assert_eq!(data.cols(), op.get_result_width());
    assert_eq!(data.sorted_by, op.result_sorted_on());
}

#[test]
fn test_filter_fast_path_on_sorted_column() {
    let ctx = support::empty_context();
    let input = values_tree(
        &ctx,
        "filter-input",
        &[&[1, 10], &[2, 20], &[2, 21], &[3, 30], &[4, 40]],
        vec![ResultType::Verbatim, ResultType::Verbatim],
        vec![0],
        &[("?x", 0), ("?y", 1)],
    );
    let filter = Filter::new(Arc::clone(&ctx), input, FilterType::Eq, "?x", "2");

    let result = filter.get_result(false).unwrap();
    let data = result.data().unwrap();
    assert_eq!(data.table.data(), &[2, 20, 2, 21]);
    assert_eq!(data.sorted_by, vec![0]);
    assert_contract(&filter);
}

#[test]
fn test_filter_relational_operators_on_sorted_column() {
    let ctx = support::empty_context();
    let rows: &[&[u64]] = &[&[1, 10], &[2, 20], &[2, 21], &[3, 30], &[4, 40]];
    let cases = [
        (FilterType::Ne, vec![1u64, 10, 3, 30, 4, 40]),
        (FilterType::Lt, vec![1, 10]),
        (FilterType::Le, vec![1, 10, 2, 20, 2, 21]),
        (FilterType::Gt, vec![3, 30, 4, 40]),
        (FilterType::Ge, vec![2, 20, 2, 21, 3, 30, 4, 40]),
    ];
    for (ty, expected) in cases {
        let input = values_tree(
            &ctx,
            &format!("relational-{ty:?}"),
            rows,
            vec![ResultType::Verbatim, ResultType::Verbatim],
            vec![0],
            &[("?x", 0), ("?y", 1)],
        );
        let filter = Filter::new(Arc::clone(&ctx), input, ty, "?x", "2");
        let result = filter.get_result(false).unwrap();
        assert_eq!(result.data().unwrap().table.data(), &expected[..], "{ty:?}");
    }
}

#[test]
fn test_filter_sorted_equals_linear_reference() {
    // The fast path must agree with a linear scan; the unsorted variant of
    // the same input takes the slow path.
    let ctx = support::empty_context();
    let rows: &[&[u64]] = &[&[1, 0], &[5, 1], &[5, 2], &[9, 3]];
    for sorted_by in [vec![0], vec![]] {
        let input = values_tree(
            &ctx,
            &format!("ref-{}", sorted_by.len()),
            rows,
            vec![ResultType::Verbatim, ResultType::Verbatim],
            sorted_by,
            &[("?x", 0), ("?y", 1)],
        );
        let filter = Filter::new(Arc::clone(&ctx), input, FilterType::Ge, "?x", "5");
        let result = filter.get_result(false).unwrap();
        assert_eq!(result.data().unwrap().table.data(), &[5, 1, 5, 2, 9, 3]);
    }
}

#[test]
fn test_filter_ne_absent_value_keeps_everything() {
    let ctx = support::empty_context();
    let input = values_tree(
        &ctx,
        "ne-absent",
        &[&[1], &[2], &[4]],
        vec![ResultType::Verbatim],
        vec![0],
        &[("?x", 0)],
    );
    let filter = Filter::new(Arc::clone(&ctx), input, FilterType::Ne, "?x", "3");
    let result = filter.get_result(false).unwrap();
    assert_eq!(result.data().unwrap().table.data(), &[1, 2, 4]);
}

#[test]
fn test_filter_two_columns_dynamic_rhs() {
    let ctx = support::empty_context();
    let input = values_tree(
        &ctx,
        "dynamic",
        &[&[1, 2], &[3, 3], &[5, 4]],
        vec![ResultType::Verbatim, ResultType::Verbatim],
        vec![],
        &[("?x", 0), ("?y", 1)],
    );
    let filter = Filter::new(Arc::clone(&ctx), input, FilterType::Gt, "?x", "?y");
    let result = filter.get_result(false).unwrap();
    assert_eq!(result.data().unwrap().table.data(), &[5, 4]);
}

#[test]
fn test_filter_bad_literal_is_a_query_error() {
    let ctx = support::empty_context();
    let input = values_tree(
        &ctx,
        "bad-literal",
        &[&[1]],
        vec![ResultType::Verbatim],
        vec![],
        &[("?x", 0)],
    );
    let filter = Filter::new(Arc::clone(&ctx), input, FilterType::Eq, "?x", "abc");
    let err = filter.get_result(false).unwrap_err();
    assert!(matches!(err, hexic_engine::EngineError::BadQuery(_)));
}

#[test]
fn test_filter_regex_and_prefix_on_kb() {
    let fx = fixture(
        &[
            ("<alice>", "<knows>", "<bob>"),
            ("<alex>", "<knows>", "<bob>"),
            ("<bob>", "<knows>", "<alice>"),
        ],
        &[],
    );
    let subjects: Vec<&str> = ["<alex>", "<alice>", "<bob>"].to_vec();
    let rows: Vec<Vec<u64>> = subjects.iter().map(|s| vec![fx.id(s)]).collect();
    let row_refs: Vec<&[u64]> = rows.iter().map(Vec::as_slice).collect();

    // REGEX keeps the matching words.
    let input = values_tree(
        &fx.ctx,
        "regex-input",
        &row_refs,
        vec![ResultType::Kb],
        vec![0],
        &[("?s", 0)],
    );
    let filter = Filter::new(Arc::clone(&fx.ctx), input, FilterType::Regex, "?s", "al");
    let result = filter.get_result(false).unwrap();
    assert_eq!(
        result.data().unwrap().table.data(),
        &[fx.id("<alex>"), fx.id("<alice>")]
    );

    // PREFIX uses the vocabulary range ["<al", "<am").
    let input = values_tree(
        &fx.ctx,
        "prefix-input",
        &row_refs,
        vec![ResultType::Kb],
        vec![0],
        &[("?s", 0)],
    );
    let filter = Filter::new(Arc::clone(&fx.ctx), input, FilterType::Prefix, "?s", "^<al");
    let result = filter.get_result(false).unwrap();
    assert_eq!(
        result.data().unwrap().table.data(),
        &[fx.id("<alex>"), fx.id("<alice>")]
    );

    // Rows without a vocabulary entry pass language and regex filters.
    let unbound: &[&[u64]] = &[&[ID_NO_VALUE], &[fx.id("<bob>")]];
    let input = values_tree(
        &fx.ctx,
        "regex-unbound",
        unbound,
        vec![ResultType::Kb],
        vec![],
        &[("?s", 0)],
    );
    let filter = Filter::new(Arc::clone(&fx.ctx), input, FilterType::Regex, "?s", "^<a");
    let result = filter.get_result(false).unwrap();
    assert_eq!(result.data().unwrap().table.data(), &[ID_NO_VALUE]);
}

#[test]
fn test_filter_numeric_range_on_kb_uses_index_words() {
    use hexic_index::conversions::convert_numeric_to_index_word;

    // Numeric literals live in the vocabulary as sortable index words.
    let words: Vec<String> = ["1", "2", "3"]
        .iter()
        .map(|n| convert_numeric_to_index_word(n))
        .collect();
    let word_refs: Vec<&str> = words.iter().map(String::as_str).collect();
    let fx = fixture(&[("<s>", "<p>", "<o>")], &word_refs);

    let ids: Vec<u64> = words.iter().map(|w| fx.id(w)).collect();
    let rows: Vec<Vec<u64>> = ids.iter().map(|&id| vec![id]).collect();
    let row_refs: Vec<&[u64]> = rows.iter().map(Vec::as_slice).collect();

    let input = values_tree(
        &fx.ctx,
        "numeric-kb",
        &row_refs,
        vec![ResultType::Kb],
        vec![0],
        &[("?v", 0)],
    );
    // "2" converts to its index word before the boundary lookup.
    let filter = Filter::new(Arc::clone(&fx.ctx), input, FilterType::Lt, "?v", "2");
    let result = filter.get_result(false).unwrap();
    assert_eq!(result.data().unwrap().table.data(), &ids[..1]);
}

#[test]
fn test_filter_bad_regex_reports_bad_query() {
    let fx = fixture(&[("<s>", "<p>", "<o>")], &[]);
    let input = values_tree(
        &fx.ctx,
        "bad-regex",
        &[&[0]],
        vec![ResultType::Kb],
        vec![],
        &[("?s", 0)],
    );
    let filter = Filter::new(Arc::clone(&fx.ctx), input, FilterType::Regex, "?s", "(unclosed");
    let err = filter.get_result(false).unwrap_err();
    match err {
        hexic_engine::EngineError::BadQuery(msg) => assert!(msg.contains("(unclosed")),
        other => panic!("expected BadQuery, got {other:?}"),
    }
}

#[test]
fn test_order_by_multi_key_stable() {
    let ctx = support::empty_context();
    let input = values_tree(
        &ctx,
        "orderby-input",
        &[&[3, 1], &[1, 2], &[3, 0], &[1, 2]],
        vec![ResultType::Verbatim, ResultType::Verbatim],
        vec![],
        &[("?x", 0), ("?y", 1)],
    );
    let order_by = OrderBy::new(Arc::clone(&ctx), input, vec![(0, false), (1, true)]);

    let result = order_by.get_result(false).unwrap();
    let data = result.data().unwrap();
    assert_eq!(data.table.data(), &[1, 2, 1, 2, 3, 1, 3, 0]);
    // Only the ascending prefix of the keys is reported as sorted.
    assert_eq!(data.sorted_by, vec![0]);
    assert_contract(&order_by);
}

#[test]
fn test_union_pads_missing_columns() {
    let ctx = support::empty_context();
    let left = values_tree(
        &ctx,
        "union-left",
        &[&[5, 6]],
        vec![ResultType::Verbatim, ResultType::Verbatim],
        vec![],
        &[("?a", 0), ("?b", 1)],
    );
    let right = values_tree(
        &ctx,
        "union-right",
        &[&[7, 8]],
        vec![ResultType::Verbatim, ResultType::Verbatim],
        vec![],
        &[("?b", 0), ("?c", 1)],
    );
    let union = Union::new(Arc::clone(&ctx), left, right);

    let vars = union.get_variable_columns();
    assert_eq!(vars["?a"], 0);
    assert_eq!(vars["?b"], 1);
    assert_eq!(vars["?c"], 2);

    let result = union.get_result(false).unwrap();
    let data = result.data().unwrap();
    assert_eq!(data.table.rows(), 2);
    assert_eq!(data.table.row(0), &[5, 6, ID_NO_VALUE]);
    assert_eq!(data.table.row(1), &[ID_NO_VALUE, 7, 8]);
    // Column types come from the supplying side; ?c from the right.
    assert_eq!(data.result_type(2), ResultType::Verbatim);
    assert_contract(&union);
}

#[test]
fn test_union_left_unmapped_column_is_padded() {
    // The left input is two columns wide but names only one variable, so
    // its second column feeds no output column. With one right-only
    // variable the output width coincidentally equals the left width; the
    // left side must still take the row-wise path and pad, not block-copy
    // its unrelated raw column.
    let ctx = support::empty_context();
    let left = values_tree(
        &ctx,
        "union-unmapped-l",
        &[&[5, 99]],
        vec![ResultType::Verbatim, ResultType::Verbatim],
        vec![],
        &[("?a", 0)],
    );
    let right = values_tree(
        &ctx,
        "union-unmapped-r",
        &[&[7]],
        vec![ResultType::Verbatim],
        vec![],
        &[("?b", 0)],
    );
    let union = Union::new(Arc::clone(&ctx), left, right);
    assert_eq!(union.get_result_width(), 2);

    let result = union.get_result(false).unwrap();
    let data = result.data().unwrap();
    assert_eq!(data.table.row(0), &[5, ID_NO_VALUE]);
    assert_eq!(data.table.row(1), &[ID_NO_VALUE, 7]);
}

#[test]
fn test_union_identical_schemas_block_copy() {
    let ctx = support::empty_context();
    let left = values_tree(
        &ctx,
        "union-same-l",
        &[&[1, 2]],
        vec![ResultType::Verbatim, ResultType::Verbatim],
        vec![],
        &[("?a", 0), ("?b", 1)],
    );
    let right = values_tree(
        &ctx,
        "union-same-r",
        &[&[3, 4], &[5, 6]],
        vec![ResultType::Verbatim, ResultType::Verbatim],
        vec![],
        &[("?a", 0), ("?b", 1)],
    );
    let union = Union::new(Arc::clone(&ctx), left, right);
    let result = union.get_result(false).unwrap();
    assert_eq!(result.data().unwrap().table.data(), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(union.get_size_estimate(), 3);
}

#[test]
fn test_two_column_join_with_width_two_mask() {
    let ctx = support::empty_context();
    let other = values_tree(
        &ctx,
        "join-other",
        &[&[0, 1, 10], &[0, 2, 21], &[0, 3, 30]],
        vec![ResultType::Verbatim; 3],
        vec![],
        &[("?a", 0), ("?b", 1), ("?c", 2)],
    );
    let mask = values_tree(
        &ctx,
        "join-mask",
        &[&[1, 10], &[2, 20], &[3, 30]],
        vec![ResultType::Verbatim; 2],
        vec![0, 1],
        &[("?b", 0), ("?c", 1)],
    );
    let join = TwoColumnJoin::new(
        Arc::clone(&ctx),
        other,
        mask,
        [[1, 0], [2, 1]],
    );

    let result = join.get_result(false).unwrap();
    let data = result.data().unwrap();
    assert_eq!(data.table.data(), &[0, 1, 10, 0, 3, 30]);
    assert_eq!(data.sorted_by, vec![1]);
    assert_eq!(join.get_result_width(), 3);
    assert_contract(&join);
}

#[test]
fn test_two_column_join_without_mask_is_unimplemented() {
    let ctx = support::empty_context();
    let left = values_tree(
        &ctx,
        "nomask-l",
        &[&[1, 2, 3]],
        vec![ResultType::Verbatim; 3],
        vec![],
        &[("?a", 0), ("?b", 1), ("?c", 2)],
    );
    let right = values_tree(
        &ctx,
        "nomask-r",
        &[&[1, 2, 3]],
        vec![ResultType::Verbatim; 3],
        vec![],
        &[("?a", 0), ("?b", 1), ("?d", 2)],
    );
    let join = TwoColumnJoin::new(Arc::clone(&ctx), left, right, [[0, 0], [1, 1]]);
    let err = join.get_result(false).unwrap_err();
    assert!(matches!(
        err,
        hexic_engine::EngineError::NotYetImplemented(_)
    ));
}

#[test]
fn test_index_scan_bound_width_one() {
    let fx = fixture(
        &[
            ("<s1>", "<p1>", "<o1>"),
            ("<s1>", "<p1>", "<o2>"),
            ("<s2>", "<p1>", "<o1>"),
            ("<s2>", "<p2>", "<o2>"),
        ],
        &[],
    );
    let mut scan = IndexScan::new(Arc::clone(&fx.ctx), ScanType::PsoBoundS);
    scan.set_predicate("<p1>");
    scan.set_subject("<s1>");

    assert_eq!(scan.get_result_width(), 1);
    assert_eq!(scan.result_sorted_on(), vec![0]);

    let result = scan.get_result(false).unwrap();
    let data = result.data().unwrap();
    assert_eq!(data.table.data(), &[fx.id("<o1>"), fx.id("<o2>")]);
    assert_eq!(data.result_types, vec![ResultType::Kb]);
    // Width-one scans report the materialized count as their estimate.
    assert_eq!(scan.get_size_estimate(), 2);
    assert_eq!(scan.get_multiplicity(0), 1.0);
    assert_contract(&scan);
}

#[test]
fn test_index_scan_free_width_two() {
    let fx = fixture(
        &[
            ("<s1>", "<p1>", "<o1>"),
            ("<s1>", "<p1>", "<o2>"),
            ("<s2>", "<p1>", "<o1>"),
        ],
        &[],
    );
    let mut scan = IndexScan::new(Arc::clone(&fx.ctx), ScanType::PsoFreeS);
    scan.set_predicate("<p1>");
    scan.set_subject("?s");
    scan.set_object("?o");

    let vars = scan.get_variable_columns();
    assert_eq!(vars["?s"], 0);
    assert_eq!(vars["?o"], 1);
    assert_eq!(scan.result_sorted_on(), vec![0, 1]);
    assert_eq!(scan.get_size_estimate(), 3);

    let result = scan.get_result(false).unwrap();
    let data = result.data().unwrap();
    assert_eq!(data.table.rows(), 3);
    assert_eq!(data.table.row(0), &[fx.id("<s1>"), fx.id("<o1>")]);
    assert_contract(&scan);
}

#[test]
fn test_full_index_scan_refuses_to_execute() {
    let fx = fixture(&[("<s>", "<p>", "<o>")], &[]);
    let scan = IndexScan::new(Arc::clone(&fx.ctx), ScanType::FullIndexScanSpo);
    assert_eq!(scan.get_result_width(), 3);
    assert_eq!(scan.result_sorted_on(), vec![0, 1, 2]);
    let err = scan.get_result(false).unwrap_err();
    assert!(matches!(err, hexic_engine::EngineError::CheckFailed(_)));
}

#[test]
fn test_tree_descendants_and_text_limit() {
    let ctx = support::empty_context();
    let input = values_tree(
        &ctx,
        "desc-input",
        &[&[1]],
        vec![ResultType::Verbatim],
        vec![],
        &[("?x", 0)],
    );
    let filter = Filter::new(
        Arc::clone(&ctx),
        Arc::clone(&input),
        FilterType::Ge,
        "?x",
        "1",
    );
    let vars = filter.get_variable_columns();
    let mut tree = QueryExecutionTree::new(Arc::clone(&ctx));
    tree.set_variable_columns(vars);
    tree.set_operation(OperationType::Filter, Arc::new(filter));

    let mut seen = Vec::new();
    tree.for_all_descendants(&mut |t| seen.push(t.as_string(0)));
    assert_eq!(seen, vec![input.as_string(0)]);

    // Setting the text limit invalidates the cached canonical form; for
    // this tree the re-rendered form is identical.
    let before = tree.as_string(0);
    tree.set_text_limit(10);
    assert_eq!(tree.as_string(0), before);
}

#[test]
fn test_tree_json_serialization() {
    let fx = fixture(
        &[("<s1>", "<p1>", "<o1>"), ("<s1>", "<p1>", "<o2>")],
        &[],
    );
    let mut scan = IndexScan::new(Arc::clone(&fx.ctx), ScanType::PsoFreeS);
    scan.set_predicate("<p1>");
    scan.set_subject("?s");
    scan.set_object("?o");
    let vars = scan.get_variable_columns();

    let mut tree = QueryExecutionTree::new(Arc::clone(&fx.ctx));
    tree.set_variable_columns(vars);
    tree.set_operation(OperationType::Scan, Arc::new(scan));

    let json = tree
        .write_result_as_json(&["?s".to_string(), "?o".to_string()], 10, 0)
        .unwrap();
    assert_eq!(
        json,
        serde_json::json!([["<s1>", "<o1>"], ["<s1>", "<o2>"]])
    );

    // Offset and limit restrict the emitted window.
    let json = tree
        .write_result_as_json(&["?o".to_string()], 1, 1)
        .unwrap();
    assert_eq!(json, serde_json::json!([["<o2>"]]));

    let mut out = Vec::new();
    tree.write_result_to_stream(&mut out, &["?s".to_string(), "?o".to_string()], 10, 0, '\t')
        .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "<s1>\t<o1>\n<s1>\t<o2>\n"
    );
}
