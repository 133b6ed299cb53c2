use rand::rngs::StdRng;
use rand::SeedableRng;
use rrtree::{
    DiskTreeConfig, LeafNodePiggybacker, NoopModifier, Operation, OperationBuffer,
    OperationTypeStat, RecursiveTwoWaySplitter, Rectangle, SpatialObject,
};
use rrtree_int_test::test_util::{
    check_invariants, insertions, interval_object, memory_data_tree, memory_update_tree,
    random_objects, random_region, scan, sorted_ids,
};

fn ids(objects: &[SpatialObject]) -> Vec<u64> {
    sorted_ids(objects.to_vec())
}

#[test]
fn test_buffered_deletion_hides_disk_item() {
    let x = interval_object(3, 4.0, 5.0);
    let items = vec![interval_object(1, 0.0, 1.0), x.clone(), interval_object(5, 8.0, 9.0)];
    let mut tree = memory_data_tree(DiskTreeConfig::new(1, 4)).unwrap();
    tree.apply_operations(insertions(&items), &RecursiveTwoWaySplitter)
        .unwrap();

    let query = Rectangle::interval(0.0, 10.0);
    let buffer = vec![Operation::deletion(x.clone())];
    let mut stats = OperationTypeStat::default();
    let results = tree
        .rr_query(&query, &mut NoopModifier, &mut stats, |_| buffer.query_operations(&query))
        .unwrap();
    assert_eq!(ids(&results), vec![1, 5]);
    assert_eq!(tree.data_items(), 3);
}

#[test]
fn test_buffered_deletion_of_unknown_item_is_fatal() {
    let items = vec![interval_object(1, 0.0, 1.0), interval_object(3, 3.0, 4.0)];
    let mut tree = memory_data_tree(DiskTreeConfig::new(1, 4)).unwrap();
    tree.apply_operations(insertions(&items), &RecursiveTwoWaySplitter)
        .unwrap();

    // same id as a stored item, different extent
    let query = Rectangle::interval(0.0, 10.0);
    let buffer = vec![Operation::deletion(interval_object(3, 4.0, 5.0))];
    let mut stats = OperationTypeStat::default();
    let err = tree
        .rr_query(&query, &mut NoopModifier, &mut stats, |_| buffer.query_operations(&query))
        .unwrap_err();
    assert!(err.is_invariant_violation());
    assert_eq!(tree.data_items(), 2);
}

#[test]
fn test_buffered_insertion_shows_new_item() {
    let x = interval_object(3, 4.0, 5.0);
    let y = interval_object(9, 20.0, 21.0);
    let mut tree = memory_data_tree(DiskTreeConfig::new(1, 4)).unwrap();
    tree.apply_operations([Operation::insertion(x)], &RecursiveTwoWaySplitter)
        .unwrap();

    let query = Rectangle::interval(0.0, 30.0);
    let buffer = vec![Operation::insertion(y)];
    let mut stats = OperationTypeStat::default();
    let results = tree
        .rr_query(&query, &mut NoopModifier, &mut stats, |_| buffer.query_operations(&query))
        .unwrap();
    assert_eq!(ids(&results), vec![3, 9]);
}

#[test]
fn test_piggybacked_deletion_and_insertion() {
    let x = interval_object(3, 3.0, 4.0);
    let items: Vec<_> = (0..6)
        .map(|id| interval_object(id, id as f64, id as f64 + 1.0))
        .collect();
    let mut tree = memory_data_tree(DiskTreeConfig::new(1, 8)).unwrap();
    tree.apply_operations(insertions(&items), &RecursiveTwoWaySplitter)
        .unwrap();

    // y lies inside the leaf, so it fits without enlarging it
    let y = interval_object(9, 2.2, 2.4);
    let mut buffer = vec![Operation::deletion(x), Operation::insertion(y)];
    let query = Rectangle::interval(0.0, 10.0);
    let mut stats = OperationTypeStat::default();
    let results = {
        let mut piggybacker = LeafNodePiggybacker::new(&mut buffer);
        tree.rr_query(&query, &mut piggybacker, &mut stats, |p| {
            p.buffer().query_operations(&query)
        })
        .unwrap()
    };
    assert_eq!(ids(&results), vec![0, 1, 2, 4, 5, 9]);
    assert!(buffer.is_empty());
    assert_eq!(stats.insertions, 1);
    assert_eq!(stats.deletions, 1);
    assert_eq!(tree.data_items(), 6);

    // the operations now live on disk
    assert_eq!(ids(&tree.query(&query).unwrap()), vec![0, 1, 2, 4, 5, 9]);
}

#[test]
fn test_piggyback_respects_leaf_capacity() {
    let items: Vec<_> = (0..4)
        .map(|id| interval_object(id, id as f64, id as f64 + 1.0))
        .collect();
    let mut tree = memory_data_tree(DiskTreeConfig::new(2, 4)).unwrap();
    tree.apply_operations(insertions(&items), &RecursiveTwoWaySplitter)
        .unwrap();

    let extra: Vec<_> = (10..13)
        .map(|id| interval_object(id, 1.5, 1.6 + id as f64 * 0.01))
        .collect();
    let mut buffer = insertions(&extra);
    let query = Rectangle::interval(0.0, 5.0);
    let mut stats = OperationTypeStat::default();
    let results = {
        let mut piggybacker = LeafNodePiggybacker::new(&mut buffer);
        let results = tree
            .rr_query(&query, &mut piggybacker, &mut stats, |p| {
                p.buffer().query_operations(&query)
            })
            .unwrap();
        assert_eq!(piggybacker.unpiggybacked().size_increasing, 3);
        results
    };

    // the root leaf is full, nothing could be applied
    assert_eq!(stats.total(), 0);
    assert_eq!(buffer.len(), 3);
    assert_eq!(tree.data_items(), 4);
    assert_eq!(ids(&results), vec![0, 1, 2, 3, 10, 11, 12]);
}

#[test]
fn test_random_piggyback_workload_matches_scan() {
    let extent = 500.0;
    let disk = random_objects(800, 0, extent, 12);
    let mut tree = memory_data_tree(DiskTreeConfig::new(3, 10)).unwrap();
    tree.apply_operations(insertions(&disk), &RecursiveTwoWaySplitter)
        .unwrap();

    // buffered insertions of new items and deletions of a tenth of the disk
    let added = random_objects(200, 10_000, extent, 13);
    let removed: Vec<_> = disk.iter().filter(|o| o.id % 10 == 0).cloned().collect();
    let mut buffer = insertions(&added);
    buffer.extend(removed.iter().cloned().map(Operation::deletion));

    let mut logical: Vec<SpatialObject> = disk
        .iter()
        .filter(|o| o.id % 10 != 0)
        .cloned()
        .collect();
    logical.extend(added.iter().cloned());

    let total_ops = buffer.len() as u64;
    let mut applied = OperationTypeStat::default();
    let mut rng = StdRng::seed_from_u64(120);
    for _ in 0..60 {
        let query = random_region(extent, 80.0, &mut rng);
        let results = {
            let mut piggybacker = LeafNodePiggybacker::new(&mut buffer);
            tree.rr_query(&query, &mut piggybacker, &mut applied, |p| {
                p.buffer().query_operations(&query)
            })
            .unwrap()
        };
        assert_eq!(sorted_ids(results), scan(&logical, &query));
        assert_eq!(applied.total() + buffer.len() as u64, total_ops);
    }

    assert!(applied.total() > 0);
    let expected_items = 800 + applied.insertions as usize - applied.deletions as usize;
    assert_eq!(tree.data_items(), expected_items);
    assert_eq!(check_invariants(&mut tree).unwrap(), expected_items);
}

#[test]
fn test_update_tree_reconciles_external_stream() {
    let a = interval_object(1, 0.0, 1.0);
    let b = interval_object(2, 5.0, 6.0);
    let mut tree = memory_update_tree(DiskTreeConfig::new(1, 4)).unwrap();
    tree.apply_operations(
        [Operation::insertion(a.clone()), Operation::insertion(b.clone())],
        &RecursiveTwoWaySplitter,
    )
    .unwrap();

    let c = interval_object(3, 7.0, 8.0);
    let external = vec![Operation::deletion(a), Operation::insertion(c)];
    let query = Rectangle::interval(0.0, 10.0);
    let mut stats = OperationTypeStat::default();
    let results = tree
        .rr_query(&query, &mut NoopModifier, &mut stats, |_| external.clone())
        .unwrap();
    assert_eq!(ids(&results), vec![2, 3]);

    // the same insertion on disk and in the stream cannot be reconciled
    let external = vec![Operation::insertion(b)];
    let err = tree
        .rr_query(&query, &mut NoopModifier, &mut stats, |_| external.clone())
        .unwrap_err();
    assert!(err.is_invariant_violation());
}
