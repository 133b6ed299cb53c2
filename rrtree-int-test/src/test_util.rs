use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rrtree::{
    Container, DataLeaves, Descriptor, DiskDataTree, DiskTree, DiskTreeConfig, DiskUpdateTree,
    FileContainer, FileContainerConfig, InvariantChecker, MemoryContainer, Operation, RRTreeResult,
    Rectangle, SpatialObject, TreeNode, TreeVariant, UpdateLeaves,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub type DataNode = TreeNode<SpatialObject, DataLeaves>;
pub type UpdateNode = TreeNode<SpatialObject, UpdateLeaves>;
pub type MemoryDataTree = DiskDataTree<SpatialObject, MemoryContainer<DataNode>>;
pub type MemoryUpdateTree = DiskUpdateTree<SpatialObject, MemoryContainer<UpdateNode>>;
pub type FileDataTree = DiskDataTree<SpatialObject, FileContainer<DataNode>>;
pub type FileUpdateTree = DiskUpdateTree<SpatialObject, FileContainer<UpdateNode>>;

/// Pages kept in the cache of test file containers.
pub const TEST_CACHE_PAGES: usize = 256;

/// Runs `test` between `before` and `after`. `after` also runs when the
/// test fails, so temporary files are always released.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: FnOnce(TestContext) -> RRTreeResult<()>,
    B: FnOnce() -> RRTreeResult<TestContext>,
    A: FnOnce(TestContext) -> RRTreeResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };
    let result = test(ctx.clone());
    let after_result = after(ctx);
    if let Err(e) = result {
        panic!("Test failed: {:?}", e);
    }
    if let Err(e) = after_result {
        panic!("After run failed: {:?}", e);
    }
}

/// A scratch directory for the container files of one test.
#[derive(Clone)]
pub struct TestContext {
    dir: Arc<TempDir>,
}

impl TestContext {
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub fn create_test_context() -> RRTreeResult<TestContext> {
    let dir = tempfile::tempdir()?;
    log::debug!("Created test directory {:?}", dir.path());
    Ok(TestContext { dir: Arc::new(dir) })
}

pub fn cleanup(ctx: TestContext) -> RRTreeResult<()> {
    for entry in std::fs::read_dir(ctx.path())? {
        let path = entry?.path();
        if path.is_file() {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

// ============================================================================
// Trees
// ============================================================================

pub fn memory_data_tree(config: DiskTreeConfig) -> RRTreeResult<MemoryDataTree> {
    DiskDataTree::new(MemoryContainer::new(), config)
}

pub fn memory_update_tree(config: DiskTreeConfig) -> RRTreeResult<MemoryUpdateTree> {
    DiskUpdateTree::new(MemoryContainer::new(), config)
}

pub fn file_container_config() -> FileContainerConfig {
    FileContainerConfig::default().with_cache_pages(TEST_CACHE_PAGES)
}

pub fn file_data_tree(
    ctx: &TestContext,
    name: &str,
    config: DiskTreeConfig,
) -> RRTreeResult<FileDataTree> {
    let container = FileContainer::create(ctx.file(name), file_container_config())?;
    DiskDataTree::new(container, config)
}

pub fn file_update_tree(
    ctx: &TestContext,
    name: &str,
    config: DiskTreeConfig,
) -> RRTreeResult<FileUpdateTree> {
    let container = FileContainer::create(ctx.file(name), file_container_config())?;
    DiskUpdateTree::new(container, config)
}

/// Runs the invariant checker over `tree` and returns the number of leaf
/// entries it found.
pub fn check_invariants<V, C>(tree: &mut DiskTree<SpatialObject, V, C>) -> RRTreeResult<usize>
where
    V: TreeVariant<SpatialObject>,
    C: Container<TreeNode<SpatialObject, V>>,
{
    let mut checker = InvariantChecker::new();
    tree.visit_tree_nodes(None, &mut checker)?;
    Ok(checker.leaf_entries())
}

// ============================================================================
// Data
// ============================================================================

pub fn interval_object(id: u64, a: f64, b: f64) -> SpatialObject {
    SpatialObject::new(id, Rectangle::interval(a, b))
}

/// `count` small squares scattered over `[0, extent)^2`, ids starting at
/// `first_id`.
pub fn random_objects(count: u64, first_id: u64, extent: f64, seed: u64) -> Vec<SpatialObject> {
    let mut rng = StdRng::seed_from_u64(seed);
    (first_id..first_id + count)
        .map(|id| {
            let x = rng.random_range(0.0..extent);
            let y = rng.random_range(0.0..extent);
            let size = rng.random_range(0.1..2.0);
            SpatialObject::new(id, Rectangle::rect2d(x, y, x + size, y + size))
        })
        .collect()
}

pub fn random_region(extent: f64, size: f64, rng: &mut StdRng) -> Rectangle {
    let x = rng.random_range(0.0..extent);
    let y = rng.random_range(0.0..extent);
    Rectangle::rect2d(x, y, x + size, y + size)
}

pub fn insertions(objects: &[SpatialObject]) -> Vec<Operation<SpatialObject>> {
    objects.iter().cloned().map(Operation::insertion).collect()
}

pub fn deletions(objects: &[SpatialObject]) -> Vec<Operation<SpatialObject>> {
    objects.iter().cloned().map(Operation::deletion).collect()
}

/// Ids of the objects overlapping `query`, by linear scan.
pub fn scan(objects: &[SpatialObject], query: &Rectangle) -> Vec<u64> {
    let mut ids: Vec<u64> = objects
        .iter()
        .filter(|o| o.rect.overlaps(query))
        .map(|o| o.id)
        .collect();
    ids.sort_unstable();
    ids
}

pub fn sorted_ids(objects: Vec<SpatialObject>) -> Vec<u64> {
    let mut ids: Vec<u64> = objects.into_iter().map(|o| o.id).collect();
    ids.sort_unstable();
    ids
}
