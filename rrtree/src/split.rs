//! Splitting overflowing nodes into groups that fit.

use crate::config::DiskTreeConfig;
use crate::data::DataItem;
use crate::disk_tree::{IndexEntry, Node, TreeNode, TreeVariant};
use crate::errors::{RRTreeError, RRTreeResult};
use crate::geometry::Descriptor;

/// Partitions an overflowing node into nodes of the same level.
///
/// Every returned node holds between `min_node_capacity` and
/// `max_node_capacity` entries. The first returned node continues the
/// identity of the input; the others are new. A node that does not
/// overflow comes back unchanged as the only element.
pub trait GroupSplitter<E: DataItem, V: TreeVariant<E>> {
    fn group_split(
        &self,
        node: TreeNode<E, V>,
        config: &DiskTreeConfig,
    ) -> RRTreeResult<Vec<TreeNode<E, V>>>;
}

/// Sorts the entries along the widest axis of the node by their centres
/// and halves the sequence, recursing until every part fits.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveTwoWaySplitter;

impl<E: DataItem, V: TreeVariant<E>> GroupSplitter<E, V> for RecursiveTwoWaySplitter {
    fn group_split(
        &self,
        node: TreeNode<E, V>,
        config: &DiskTreeConfig,
    ) -> RRTreeResult<Vec<TreeNode<E, V>>> {
        if !node.overflows(config) {
            return Ok(vec![node]);
        }
        if config.max_node_capacity < 2 * config.min_node_capacity {
            return Err(RRTreeError::InvalidConfiguration(format!(
                "cannot split with min {} and max {}",
                config.min_node_capacity, config.max_node_capacity
            )));
        }

        let size = node.len();
        let nodes: Vec<TreeNode<E, V>> = match node {
            Node::Leaf { entries } => split_entries(entries, &V::leaf_descriptor, config)
                .into_iter()
                .map(Node::leaf)
                .collect(),
            Node::Index { level, children } => {
                split_entries(
                    children,
                    &|child: &IndexEntry<E::Desc>| child.descriptor.clone(),
                    config,
                )
                .into_iter()
                .map(|group| Node::index(level, group))
                .collect()
            }
        };
        log::debug!("Split a node of {} entries into {} nodes", size, nodes.len());
        Ok(nodes)
    }
}

fn split_entries<T, D, F>(mut entries: Vec<T>, descriptor: &F, config: &DiskTreeConfig) -> Vec<Vec<T>>
where
    D: Descriptor,
    F: Fn(&T) -> D,
{
    if entries.len() <= config.max_node_capacity {
        return vec![entries];
    }

    let axis = widest_axis(entries.iter().map(descriptor));
    entries.sort_by(|a, b| {
        descriptor(a)
            .center(axis)
            .partial_cmp(&descriptor(b).center(axis))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // len > max >= 2 * min, so both halves keep at least min entries
    let right = entries.split_off(entries.len() / 2);
    let mut groups = split_entries(entries, descriptor, config);
    groups.extend(split_entries(right, descriptor, config));
    groups
}

fn widest_axis<D: Descriptor>(descriptors: impl Iterator<Item = D>) -> usize {
    let Some(bounds) = descriptors.reduce(|a, b| a.union(&b)) else {
        return 0;
    };
    (0..bounds.dimensions())
        .max_by(|&a, &b| {
            bounds
                .extent(a)
                .partial_cmp(&bounds.extent(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0)
}
