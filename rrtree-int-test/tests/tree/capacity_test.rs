use rrtree::{DiskTreeConfig, RecursiveTwoWaySplitter, Rectangle, SpatialObject};
use rrtree_int_test::test_util::{
    check_invariants, cleanup, create_test_context, deletions, file_data_tree, insertions,
    memory_data_tree, memory_update_tree, random_objects, run_test, scan, sorted_ids,
};

fn whole_extent() -> Rectangle {
    Rectangle::rect2d(-10.0, -10.0, 1100.0, 1100.0)
}

#[test]
fn test_random_workload_keeps_capacity() {
    let mut tree = memory_data_tree(DiskTreeConfig::new(3, 8)).unwrap();
    let objects = random_objects(1000, 0, 1000.0, 1);

    let rejected = tree
        .apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)
        .unwrap();
    assert!(rejected.is_empty());
    assert_eq!(check_invariants(&mut tree).unwrap(), 1000);

    let (removed, kept): (Vec<SpatialObject>, Vec<SpatialObject>) =
        objects.into_iter().partition(|o| o.id % 2 == 0);
    let rejected = tree
        .apply_operations(deletions(&removed), &RecursiveTwoWaySplitter)
        .unwrap();
    assert!(rejected.is_empty());
    assert_eq!(tree.data_items(), kept.len());
    assert_eq!(check_invariants(&mut tree).unwrap(), kept.len());

    let query = whole_extent();
    assert_eq!(sorted_ids(tree.query(&query).unwrap()), scan(&kept, &query));
}

#[test]
fn test_interleaved_workload_keeps_capacity() {
    let mut tree = memory_data_tree(DiskTreeConfig::new(2, 5)).unwrap();
    let objects = random_objects(600, 0, 500.0, 2);
    let mut live = Vec::new();

    for chunk in objects.chunks(60) {
        tree.apply_operations(insertions(chunk), &RecursiveTwoWaySplitter)
            .unwrap();
        live.extend_from_slice(chunk);

        // drop every third live object
        let mut removed = Vec::new();
        let mut kept = Vec::new();
        for (i, object) in live.into_iter().enumerate() {
            if i % 3 == 0 {
                removed.push(object);
            } else {
                kept.push(object);
            }
        }
        live = kept;
        assert!(tree
            .apply_operations(deletions(&removed), &RecursiveTwoWaySplitter)
            .unwrap()
            .is_empty());

        assert_eq!(check_invariants(&mut tree).unwrap(), live.len());
        assert_eq!(tree.data_items(), live.len());
    }
}

#[test]
fn test_update_tree_workload_keeps_capacity() {
    let mut tree = memory_update_tree(DiskTreeConfig::new(2, 6)).unwrap();
    let objects = random_objects(400, 0, 300.0, 3);
    tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)
        .unwrap();

    let (removed, kept): (Vec<SpatialObject>, Vec<SpatialObject>) =
        objects.into_iter().partition(|o| o.id % 4 == 0);
    let rejected = tree
        .apply_operations(deletions(&removed), &RecursiveTwoWaySplitter)
        .unwrap();
    assert!(rejected.is_empty());

    let stored = check_invariants(&mut tree).unwrap();
    assert_eq!(stored, tree.data_items());
    assert!(stored >= kept.len());
    assert!(stored <= kept.len() + 2 * removed.len());

    let query = Rectangle::rect2d(-10.0, -10.0, 400.0, 400.0);
    assert_eq!(sorted_ids(tree.query(&query).unwrap()), scan(&kept, &query));
}

#[test]
fn test_file_tree_workload_keeps_capacity() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = file_data_tree(&ctx, "capacity.rrtree", DiskTreeConfig::new(4, 10))?;
            let objects = random_objects(1500, 0, 1000.0, 4);
            tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)?;

            let removed: Vec<SpatialObject> =
                objects.iter().filter(|o| o.id % 5 == 0).cloned().collect();
            let kept: Vec<SpatialObject> =
                objects.iter().filter(|o| o.id % 5 != 0).cloned().collect();
            tree.apply_operations(deletions(&removed), &RecursiveTwoWaySplitter)?;

            assert_eq!(check_invariants(&mut tree)?, kept.len());
            let query = Rectangle::rect2d(100.0, 100.0, 600.0, 400.0);
            assert_eq!(sorted_ids(tree.query(&query)?), scan(&kept, &query));
            tree.container_mut().close()
        },
        |ctx| cleanup(ctx),
    )
}
