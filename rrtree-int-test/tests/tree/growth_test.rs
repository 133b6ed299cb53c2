use rrtree::geometry::union_all;
use rrtree::{Container, DiskTreeConfig, Operation, RecursiveTwoWaySplitter};
use rrtree_int_test::test_util::{
    check_invariants, insertions, interval_object, memory_data_tree, memory_update_tree,
    random_objects,
};

#[test]
fn test_growth_past_leaf_capacity() {
    let config = DiskTreeConfig::new(2, 4);
    let objects = random_objects(9, 0, 100.0, 9);
    let mut tree = memory_data_tree(config).unwrap();
    assert_eq!(tree.height(), 0);

    tree.apply_operations(insertions(&objects[..4]), &RecursiveTwoWaySplitter)
        .unwrap();
    assert_eq!(tree.height(), 1);
    assert!(tree.get_root_node().unwrap().is_leaf());

    tree.apply_operations(insertions(&objects[4..]), &RecursiveTwoWaySplitter)
        .unwrap();
    assert!(tree.height() >= 2);
    let root = tree.get_root_node().unwrap();
    assert!(!root.is_leaf());

    let children = union_all(root.children().iter().map(|c| &c.descriptor));
    let naive = union_all(objects.iter().map(|o| &o.rect));
    assert_eq!(children, naive);
    assert_eq!(tree.root_descriptor().cloned(), naive);
    check_invariants(&mut tree).unwrap();
}

#[test]
fn test_root_extent_follows_every_insertion() {
    let mut tree = memory_data_tree(DiskTreeConfig::new(2, 5)).unwrap();
    let objects = random_objects(300, 0, 1000.0, 10);
    let mut height = 0;
    for (i, object) in objects.iter().enumerate() {
        tree.apply_operations([Operation::insertion(object.clone())], &RecursiveTwoWaySplitter)
            .unwrap();
        assert!(tree.height() >= height);
        height = tree.height();
        let naive = union_all(objects[..=i].iter().map(|o| &o.rect));
        assert_eq!(tree.root_descriptor().cloned(), naive);
    }
    assert!(tree.height() >= 4);
    assert_eq!(check_invariants(&mut tree).unwrap(), 300);
}

#[test]
fn test_update_tree_grows_with_deletions() {
    let mut tree = memory_update_tree(DiskTreeConfig::new(2, 4)).unwrap();
    let ops: Vec<_> = (0..40)
        .map(|id| Operation::deletion(interval_object(id, id as f64, id as f64 + 0.5)))
        .collect();
    let rejected = tree.apply_operations(ops, &RecursiveTwoWaySplitter).unwrap();
    assert!(rejected.is_empty());
    assert_eq!(tree.data_items(), 40);
    assert!(tree.height() >= 3);
    assert_eq!(check_invariants(&mut tree).unwrap(), 40);
}

#[test]
fn test_clear_releases_every_node() {
    let mut tree = memory_data_tree(DiskTreeConfig::new(2, 4)).unwrap();
    tree.apply_operations(
        insertions(&random_objects(200, 0, 100.0, 11)),
        &RecursiveTwoWaySplitter,
    )
    .unwrap();
    let nodes = tree.container().len() as u64;
    let mut leaves = 0u64;
    tree.visit_tree(None, |_, _| Ok(true), |_, _| {
        leaves += 1;
        Ok(())
    })
    .unwrap();

    let stats = tree.clear().unwrap();
    assert_eq!(stats.removes, nodes);
    assert_eq!(stats.gets, nodes - leaves);
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
    assert!(tree.container().is_empty());
}
