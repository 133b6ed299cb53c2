use rand::rngs::StdRng;
use rand::SeedableRng;
use rrtree::{DiskTreeConfig, Operation, RecursiveTwoWaySplitter, Rectangle};
use rrtree_int_test::test_util::{
    cleanup, create_test_context, file_data_tree, insertions, interval_object, memory_data_tree,
    memory_update_tree, random_objects, random_region, run_test, scan, sorted_ids,
};

#[test]
fn test_query_returns_exactly_overlapping_item() {
    let items = vec![
        interval_object(1, 0.0, 1.0),
        interval_object(2, 5.0, 6.0),
        interval_object(3, 10.0, 11.0),
    ];
    // (1, 2) forces the three items apart into several leaves
    for config in [DiskTreeConfig::new(1, 2), DiskTreeConfig::new(2, 4)] {
        let mut tree = memory_data_tree(config).unwrap();
        tree.apply_operations(insertions(&items), &RecursiveTwoWaySplitter)
            .unwrap();
        let results = tree.query(&Rectangle::interval(4.0, 7.0)).unwrap();
        assert_eq!(results, vec![items[1].clone()]);

        let mut tree = memory_update_tree(config).unwrap();
        tree.apply_operations(insertions(&items), &RecursiveTwoWaySplitter)
            .unwrap();
        let results = tree.query(&Rectangle::interval(4.0, 7.0)).unwrap();
        assert_eq!(results, vec![items[1].clone()]);
    }
}

#[test]
fn test_query_empty_tree() {
    let mut tree = memory_data_tree(DiskTreeConfig::new(2, 4)).unwrap();
    assert!(tree.query(&Rectangle::interval(0.0, 100.0)).unwrap().is_empty());

    let mut tree = memory_update_tree(DiskTreeConfig::new(2, 4)).unwrap();
    assert!(tree.query(&Rectangle::interval(0.0, 100.0)).unwrap().is_empty());
}

#[test]
fn test_query_outside_root() {
    let mut tree = memory_data_tree(DiskTreeConfig::new(2, 4)).unwrap();
    tree.apply_operations(
        insertions(&random_objects(100, 0, 100.0, 5)),
        &RecursiveTwoWaySplitter,
    )
    .unwrap();
    let results = tree
        .query(&Rectangle::rect2d(500.0, 500.0, 600.0, 600.0))
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_random_queries_match_scan() {
    let objects = random_objects(2000, 0, 1000.0, 6);
    let mut tree = memory_data_tree(DiskTreeConfig::new(4, 12)).unwrap();
    tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)
        .unwrap();

    let mut rng = StdRng::seed_from_u64(60);
    for size in [1.0, 25.0, 150.0, 700.0] {
        for _ in 0..20 {
            let query = random_region(1000.0, size, &mut rng);
            assert_eq!(sorted_ids(tree.query(&query).unwrap()), scan(&objects, &query));
        }
    }
}

#[test]
fn test_update_tree_queries_hide_deleted_items() {
    let objects = random_objects(500, 0, 200.0, 7);
    let mut tree = memory_update_tree(DiskTreeConfig::new(3, 8)).unwrap();
    tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)
        .unwrap();
    let deleted: Vec<_> = objects.iter().filter(|o| o.id % 3 == 0).cloned().collect();
    tree.apply_operations(
        deleted.iter().cloned().map(Operation::deletion),
        &RecursiveTwoWaySplitter,
    )
    .unwrap();
    let live: Vec<_> = objects.iter().filter(|o| o.id % 3 != 0).cloned().collect();

    let mut rng = StdRng::seed_from_u64(70);
    for _ in 0..30 {
        let query = random_region(200.0, 40.0, &mut rng);
        assert_eq!(sorted_ids(tree.query(&query).unwrap()), scan(&live, &query));
    }
}

#[test]
fn test_file_tree_queries_match_scan() {
    run_test(
        || create_test_context(),
        |ctx| {
            let objects = random_objects(3000, 0, 1000.0, 8);
            let mut tree = file_data_tree(&ctx, "query.rrtree", DiskTreeConfig::default())?;
            tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)?;

            let mut rng = StdRng::seed_from_u64(80);
            for _ in 0..25 {
                let query = random_region(1000.0, 120.0, &mut rng);
                assert_eq!(sorted_ids(tree.query(&query)?), scan(&objects, &query));
            }
            tree.container_mut().close()
        },
        |ctx| cleanup(ctx),
    )
}
