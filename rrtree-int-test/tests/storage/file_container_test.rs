use rrtree::{
    Container, DiskDataTree, DiskTreeConfig, FileContainer, Node, RRTreeError,
    RecursiveTwoWaySplitter, Rectangle, SpatialObject,
};
use rrtree_int_test::test_util::{
    check_invariants, cleanup, create_test_context, deletions, file_container_config,
    file_data_tree, file_update_tree, insertions, interval_object, random_objects, run_test,
    scan, sorted_ids, DataNode, TEST_CACHE_PAGES,
};

#[test]
fn test_stored_node_round_trip() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = file_data_tree(&ctx, "round_trip.rrtree", DiskTreeConfig::new(2, 8))?;
            let node: DataNode = Node::leaf(vec![
                interval_object(1, 0.0, 1.0),
                interval_object(2, 3.0, 4.0),
                interval_object(3, 2.0, 2.5),
            ]);
            let entry = tree.store_node(node.clone(), true)?.expect("non-empty node");
            assert_eq!(entry.level, 1);
            assert_eq!(entry.descriptor, Rectangle::interval(0.0, 4.0));

            let fetched = tree.fetch_node(&entry)?;
            assert_eq!(fetched, node);

            tree.container_mut().flush()?;
            let fetched = tree.fetch_node(&entry)?;
            assert_eq!(fetched.leaf_entries(), node.leaf_entries());

            let empty: DataNode = Node::new_leaf();
            assert!(tree.store_node(empty, true)?.is_none());
            tree.container_mut().close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_reopen_tree_from_state() {
    run_test(
        || create_test_context(),
        |ctx| {
            let objects = random_objects(2000, 0, 1000.0, 21);
            let config = DiskTreeConfig::new(4, 16);
            let query = Rectangle::rect2d(200.0, 200.0, 500.0, 700.0);

            let state = {
                let mut tree = file_data_tree(&ctx, "reopen.rrtree", config)?;
                tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)?;
                let state = tree.state();
                tree.container_mut().close()?;
                state
            };
            assert_eq!(state.data_items, 2000);

            let container =
                FileContainer::<DataNode>::open(ctx.file("reopen.rrtree"), TEST_CACHE_PAGES)?;
            let mut tree: DiskDataTree<SpatialObject, _> =
                DiskDataTree::from_state(container, config, state)?;
            assert_eq!(tree.data_items(), 2000);
            assert_eq!(sorted_ids(tree.query(&query)?), scan(&objects, &query));
            assert_eq!(check_invariants(&mut tree)?, 2000);

            // keep working on the reopened tree
            let removed: Vec<_> = objects.iter().filter(|o| o.id < 1000).cloned().collect();
            tree.apply_operations(deletions(&removed), &RecursiveTwoWaySplitter)?;
            let kept: Vec<_> = objects.iter().filter(|o| o.id >= 1000).cloned().collect();
            assert_eq!(sorted_ids(tree.query(&query)?), scan(&kept, &query));
            tree.container_mut().close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_reopen_with_unknown_root_fails() {
    run_test(
        || create_test_context(),
        |ctx| {
            let state = {
                let mut tree = file_data_tree(&ctx, "first.rrtree", DiskTreeConfig::new(2, 4))?;
                tree.apply_operations(
                    insertions(&random_objects(50, 0, 100.0, 22)),
                    &RecursiveTwoWaySplitter,
                )?;
                tree.container_mut().close()?;
                tree.state()
            };

            let container: FileContainer<DataNode> =
                FileContainer::create(ctx.file("second.rrtree"), file_container_config())?;
            let result =
                DiskDataTree::<SpatialObject, _>::from_state(container, DiskTreeConfig::new(2, 4), state);
            assert!(matches!(result, Err(RRTreeError::NodeNotFound(_))));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_update_tree_in_small_cache() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = file_update_tree(&ctx, "updates.rrtree", DiskTreeConfig::new(3, 8))?;
            let objects = random_objects(2500, 0, 800.0, 23);
            tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)?;
            assert!(tree.container().len() > TEST_CACHE_PAGES);
            assert!(tree.container().stats().disk_writes > 0);

            let stored = check_invariants(&mut tree)?;
            assert_eq!(stored, 2500);
            let query = Rectangle::rect2d(0.0, 0.0, 400.0, 400.0);
            assert_eq!(sorted_ids(tree.query(&query)?), scan(&objects, &query));
            tree.container_mut().close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_closed_container_rejects_access() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = file_data_tree(&ctx, "closed.rrtree", DiskTreeConfig::new(2, 4))?;
            tree.apply_operations(
                insertions(&random_objects(20, 0, 50.0, 24)),
                &RecursiveTwoWaySplitter,
            )?;
            tree.container_mut().close()?;
            assert!(tree.container().is_closed());
            let err = tree.query(&Rectangle::rect2d(0.0, 0.0, 50.0, 50.0)).unwrap_err();
            assert!(matches!(err, RRTreeError::Closed));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_data_leaves_survive_page_eviction() {
    run_test(
        || create_test_context(),
        |ctx| {
            let objects: Vec<SpatialObject> = random_objects(3000, 0, 2000.0, 25);
            let mut tree = file_data_tree(&ctx, "evict.rrtree", DiskTreeConfig::new(2, 6))?;
            tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)?;
            assert!(tree.container().cached_pages() <= TEST_CACHE_PAGES);

            let everything = Rectangle::rect2d(-1.0, -1.0, 2100.0, 2100.0);
            assert_eq!(sorted_ids(tree.query(&everything)?), scan(&objects, &everything));
            tree.container_mut().close()
        },
        |ctx| cleanup(ctx),
    )
}
