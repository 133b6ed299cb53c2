use rand::rngs::StdRng;
use rand::SeedableRng;
use rrtree::errors::RRTreeResult;
use rrtree::{
    Container, DiskTreeConfig, LeafNodePiggybacker, OperationBuffer, OperationTypeStat,
    RecursiveTwoWaySplitter,
};
use rrtree_int_test::test_util::{
    check_invariants, create_test_context, file_data_tree, insertions, random_objects,
    random_region,
};

fn main() -> RRTreeResult<()> {
    colog::init();
    println!("Starting stress test...");
    let ctx = create_test_context()?;

    let count = 200_000;
    let extent = 10_000.0;
    let mut tree = file_data_tree(&ctx, "stress.rrtree", DiskTreeConfig::default())?;

    let start = std::time::Instant::now();
    let objects = random_objects(count, 0, extent, 42);
    tree.apply_operations(insertions(&objects), &RecursiveTwoWaySplitter)?;
    println!(
        "Inserted {} items in {:?}, height {}",
        tree.data_items(),
        start.elapsed(),
        tree.height()
    );

    let mut buffer = insertions(&random_objects(count / 10, count, extent, 43));
    let mut rng = StdRng::seed_from_u64(44);
    let mut stats = OperationTypeStat::default();
    let mut results = 0usize;

    let start = std::time::Instant::now();
    for _ in 0..1000 {
        let query = random_region(extent, 200.0, &mut rng);
        let mut piggybacker = LeafNodePiggybacker::new(&mut buffer);
        results += tree
            .rr_query(&query, &mut piggybacker, &mut stats, |p| {
                p.buffer().query_operations(&query)
            })?
            .len();
    }
    println!(
        "Ran 1000 queries in {:?}: {} results, {} operations piggybacked, {} still buffered",
        start.elapsed(),
        results,
        stats.total(),
        buffer.len()
    );

    let leaf_entries = check_invariants(&mut tree)?;
    println!("Tree holds {} items in {} nodes", leaf_entries, tree.container().len());
    tree.container_mut().close()?;
    Ok(())
}
