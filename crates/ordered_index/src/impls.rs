mod avl;
mod bplus_tree;
mod btree;
mod rb;
mod skip_list;

pub use avl::AvlTree;
pub use bplus_tree::BPlusTree;
pub use btree::BTree;
pub use rb::RbTree;
pub use skip_list::{MAX_LEVEL, SkipList};

use crate::arena::NodeId;
use crate::error::{Error, Result};

/// Order used by `new()` for the multiway trees.
pub const DEFAULT_ORDER: usize = 32;

/// Smallest order a multiway tree accepts.
pub const MIN_ORDER: usize = 3;

fn check_order(order: usize) -> Result<usize> {
    if order < MIN_ORDER {
        return Err(Error::InvalidOrder {
            order,
            min: MIN_ORDER,
        });
    }
    Ok(order)
}

/// Position of one entry in a multiway node: the node and the key index
/// inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    node: NodeId,
    index: usize,
}

impl Slot {
    fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// First index whose key is not less than `key`.
///
/// Small nodes are scanned linearly.
fn lower_bound<K, C: crate::Comparator<K>>(keys: &[K], key: &K, cmp: &C) -> usize {
    use std::cmp::Ordering;
    if keys.len() <= 4 {
        return keys
            .iter()
            .position(|k| cmp.compare(key, k) != Ordering::Greater)
            .unwrap_or(keys.len());
    }
    keys.partition_point(|k| cmp.compare(k, key) == Ordering::Less)
}

#[cfg(test)]
mod tests {
    use super::{check_order, lower_bound};
    use crate::compare::Natural;
    use crate::error::Error;

    #[test]
    fn lower_bound_matches_on_both_paths() {
        for len in 0..12 {
            let keys: Vec<u32> = (0..len).map(|k| k * 2).collect();
            for probe in 0..(2 * len + 2) {
                let expect = keys.iter().filter(|&&k| k < probe).count();
                assert_eq!(lower_bound(&keys, &probe, &Natural), expect);
            }
        }
    }

    #[test]
    fn orders_below_three_are_rejected() {
        assert_eq!(check_order(2), Err(Error::InvalidOrder { order: 2, min: 3 }));
        assert_eq!(check_order(0), Err(Error::InvalidOrder { order: 0, min: 3 }));
        assert_eq!(check_order(3), Ok(3));
    }
}
