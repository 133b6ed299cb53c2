use rrtree::{
    DiskTreeConfig, NoopModifier, Operation, RRTreeResult, RecursiveTwoWaySplitter, Rectangle,
};
use rrtree_int_test::test_util::{
    check_invariants, cleanup, create_test_context, deletions, file_update_tree, insertions,
    interval_object, memory_update_tree, random_objects, run_test,
};

#[test]
fn test_insert_then_delete_leaves_no_residue() {
    let mut tree = memory_update_tree(DiskTreeConfig::new(2, 8)).unwrap();
    let others: Vec<_> = (0..3)
        .map(|id| interval_object(id, id as f64 * 10.0, id as f64 * 10.0 + 1.0))
        .collect();
    tree.apply_operations(insertions(&others), &RecursiveTwoWaySplitter)
        .unwrap();
    let before = tree.data_items();

    let d = interval_object(7, 12.0, 13.0);
    tree.apply_operations(
        [Operation::insertion(d.clone()), Operation::deletion(d.clone())],
        &RecursiveTwoWaySplitter,
    )
    .unwrap();
    assert_eq!(tree.data_items(), before);

    let everything = Rectangle::interval(-100.0, 100.0);
    let stored = tree
        .initial_query(&everything, &mut NoopModifier)
        .collect::<RRTreeResult<Vec<_>>>()
        .unwrap();
    assert_eq!(stored.len(), before);
    assert!(stored.iter().all(|op| op.data.id != 7));
    assert_eq!(check_invariants(&mut tree).unwrap(), before);
}

#[test]
fn test_delete_then_insert_annihilates_too() {
    let mut tree = memory_update_tree(DiskTreeConfig::new(2, 8)).unwrap();
    let d = interval_object(7, 0.0, 1.0);
    tree.apply_operations([Operation::deletion(d.clone())], &RecursiveTwoWaySplitter)
        .unwrap();
    assert_eq!(tree.data_items(), 1);
    assert!(tree.query(&Rectangle::interval(0.0, 1.0)).unwrap().is_empty());

    tree.apply_operations([Operation::insertion(d)], &RecursiveTwoWaySplitter)
        .unwrap();
    assert_eq!(tree.data_items(), 0);
    assert!(tree.is_empty());
}

#[test]
fn test_annihilation_in_file_tree() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = file_update_tree(&ctx, "annihilation.rrtree", DiskTreeConfig::new(2, 6))?;
            // items far apart, so every subtree choice is unambiguous
            let objects: Vec<_> = (0..60)
                .map(|id| interval_object(id, id as f64 * 10.0, id as f64 * 10.0 + 1.0))
                .collect();
            tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)?;
            assert_eq!(tree.data_items(), 60);

            let ops = objects
                .iter()
                .filter(|o| o.id % 2 == 1)
                .cloned()
                .map(Operation::deletion);
            tree.apply_operations(ops, &RecursiveTwoWaySplitter)?;
            assert_eq!(tree.data_items(), 30);
            assert_eq!(check_invariants(&mut tree)?, 30);

            let mut ids: Vec<u64> = tree
                .query(&Rectangle::interval(-1.0, 1000.0))?
                .into_iter()
                .map(|o| o.id)
                .collect();
            ids.sort_unstable();
            assert_eq!(ids, (0..60).filter(|id| id % 2 == 0).collect::<Vec<u64>>());
            tree.container_mut().close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_random_overlapping_workload_annihilates() {
    let mut tree = memory_update_tree(DiskTreeConfig::new(2, 6)).unwrap();
    // a small extent, so leaves overlap heavily
    let stored = random_objects(300, 0, 30.0, 31);
    tree.apply_operations(insertions(&stored), &RecursiveTwoWaySplitter)
        .unwrap();
    assert_eq!(tree.data_items(), 300);

    for object in random_objects(100, 1000, 30.0, 32) {
        let before = tree.data_items();
        tree.apply_operations([Operation::insertion(object.clone())], &RecursiveTwoWaySplitter)
            .unwrap();
        assert_eq!(tree.data_items(), before + 1);
        tree.apply_operations([Operation::deletion(object)], &RecursiveTwoWaySplitter)
            .unwrap();
        assert_eq!(tree.data_items(), before);
    }

    let removed: Vec<_> = stored.iter().filter(|o| o.id % 3 == 0).cloned().collect();
    tree.apply_operations(deletions(&removed), &RecursiveTwoWaySplitter)
        .unwrap();
    let remaining = stored.len() - removed.len();
    assert_eq!(tree.data_items(), remaining);
    assert_eq!(check_invariants(&mut tree).unwrap(), remaining);

    let everything = Rectangle::rect2d(-1.0, -1.0, 100.0, 100.0);
    let ops = tree
        .initial_query(&everything, &mut NoopModifier)
        .collect::<RRTreeResult<Vec<_>>>()
        .unwrap();
    assert_eq!(ops.len(), remaining);
    assert!(ops
        .iter()
        .all(|op| op.is_insertion() && op.data.id < 1000 && op.data.id % 3 != 0));
}

#[test]
fn test_vacuum_drains_buffer_into_leaves() {
    let mut tree = memory_update_tree(DiskTreeConfig::new(2, 6)).unwrap();
    let stored = random_objects(200, 0, 30.0, 41);
    tree.apply_operations(insertions(&stored), &RecursiveTwoWaySplitter)
        .unwrap();

    let removed: Vec<_> = stored.iter().filter(|o| o.id % 4 == 0).cloned().collect();
    let added = random_objects(40, 5000, 30.0, 42);
    let mut buffer = deletions(&removed);
    buffer.extend(insertions(&added));

    let stats = tree.vacuum_garbage(&mut buffer, None).unwrap();
    assert_eq!(stats.annihilated_pairs, 0);
    assert_eq!(stats.piggybacked.deletions as usize, removed.len());
    assert_eq!(buffer.len(), added.len() - stats.piggybacked.insertions as usize);
    assert!(buffer.iter().all(|op| op.is_insertion()));

    let expected = stored.len() - removed.len() + stats.piggybacked.insertions as usize;
    assert_eq!(tree.data_items(), expected);
    assert_eq!(check_invariants(&mut tree).unwrap(), expected);

    let everything = Rectangle::rect2d(-1.0, -1.0, 100.0, 100.0);
    let ops = tree
        .initial_query(&everything, &mut NoopModifier)
        .collect::<RRTreeResult<Vec<_>>>()
        .unwrap();
    assert!(ops
        .iter()
        .all(|op| op.is_insertion() && (op.data.id % 4 != 0 || op.data.id >= 5000)));
    assert!(ops
        .iter()
        .filter(|op| op.data.id >= 5000)
        .all(|op| !buffer.contains(op)));
}
