//! Structural self-check for [`ExtentTree`].

use super::{ExtentTree, MAX_TREE_HEIGHT};
use crate::node_store::{Direction, NodeId};

/// Shape of a tree that passed [`ExtentTree::verify`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of extents.
    pub len: usize,
    /// Black nodes on every root-to-leaf path.
    pub black_height: usize,
}

/// The first broken invariant found by [`ExtentTree::verify`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeViolation {
    #[error("root is red")]
    RedRoot,
    #[error("red node at {start:#x} has a red child")]
    RedRed { start: u64 },
    #[error("subtrees of node at {start:#x} differ in black height")]
    BlackHeight { start: u64 },
    #[error("node at {start:#x} records {stored:#x} bytes as subtree maximum, expected {expected:#x}")]
    Augmentation { start: u64, stored: u64, expected: u64 },
    #[error("extent at {start:#x} starts before its predecessor ends at {previous_end:#x}")]
    Order { start: u64, previous_end: u64 },
    #[error("extent at {start:#x} touches its predecessor")]
    Adjacent { start: u64 },
    #[error("empty extent at {start:#x}")]
    Empty { start: u64 },
    #[error("tree is deeper than {} levels", MAX_TREE_HEIGHT)]
    TooDeep,
    #[error("tree links {found} nodes but counts {counted}")]
    Count { found: usize, counted: usize },
}

struct Walk {
    previous_end: Option<u64>,
    len: usize,
}

impl ExtentTree<'_> {
    /// Walks the whole tree and checks ordering, coalescing, coloring and
    /// augmentation.
    ///
    /// # Errors
    /// Returns the first violation found, in in-order position.
    pub fn verify(&self) -> Result<TreeStats, TreeViolation> {
        let Some(root) = self.root else {
            return if self.len == 0 {
                Ok(TreeStats {
                    len: 0,
                    black_height: 0,
                })
            } else {
                Err(TreeViolation::Count {
                    found: 0,
                    counted: self.len,
                })
            };
        };

        if self.node(root).is_red() {
            return Err(TreeViolation::RedRoot);
        }

        let mut walk = Walk {
            previous_end: None,
            len: 0,
        };
        let (black_height, _) = self.check(root, 1, &mut walk)?;
        if walk.len != self.len {
            return Err(TreeViolation::Count {
                found: walk.len,
                counted: self.len,
            });
        }

        Ok(TreeStats {
            len: walk.len,
            black_height,
        })
    }

    /// Returns the black height and the largest extent of the subtree at `id`.
    fn check(&self, id: NodeId, depth: usize, walk: &mut Walk) -> Result<(usize, u64), TreeViolation> {
        if depth > MAX_TREE_HEIGHT {
            return Err(TreeViolation::TooDeep);
        }

        let node = self.node(id);
        let extent = node.extent();
        let left = node.child(Direction::Left);
        let right = node.child(Direction::Right);

        if node.is_red() && (self.is_red(left) || self.is_red(right)) {
            return Err(TreeViolation::RedRed {
                start: extent.start,
            });
        }

        let (left_height, left_most) = match left {
            Some(left) => self.check(left, depth + 1, walk)?,
            None => (0, 0),
        };

        if extent.is_empty() {
            return Err(TreeViolation::Empty {
                start: extent.start,
            });
        }
        match walk.previous_end {
            Some(previous_end) if extent.start < previous_end => {
                return Err(TreeViolation::Order {
                    start: extent.start,
                    previous_end,
                });
            }
            Some(previous_end) if extent.start == previous_end => {
                return Err(TreeViolation::Adjacent {
                    start: extent.start,
                });
            }
            _ => {}
        }
        walk.previous_end = Some(extent.end());
        walk.len += 1;

        let (right_height, right_most) = match right {
            Some(right) => self.check(right, depth + 1, walk)?,
            None => (0, 0),
        };

        if left_height != right_height {
            return Err(TreeViolation::BlackHeight {
                start: extent.start,
            });
        }

        let expected = extent.length.max(left_most).max(right_most);
        let stored = node.most_bytes_in_subtree();
        if stored != expected {
            return Err(TreeViolation::Augmentation {
                start: extent.start,
                stored,
                expected,
            });
        }

        Ok((left_height + usize::from(!node.is_red()), expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::Extent;
    use crate::node_store::{Node, NodeStore};

    /// Builds a two-node tree by hand: root `[100, +50)` with a red left child.
    fn hand_built(buf: &mut [Node], child: Extent) -> ExtentTree<'_> {
        let mut store = NodeStore::new(buf);
        let root = store.acquire(Extent::new(100, 50)).unwrap();
        let left = store.acquire(child).unwrap();
        store.get_mut(left).set_red(true);
        store.get_mut(root).set_child(Direction::Left, Some(left));
        store.get_mut(root).set_most(child.length.max(50));
        ExtentTree::from_raw_parts(store, Some(root))
    }

    #[test]
    fn accepts_valid_tree() {
        let mut buf = [Node::default(); 2];
        let tree = hand_built(&mut buf, Extent::new(10, 20));
        assert_eq!(
            tree.verify(),
            Ok(TreeStats {
                len: 2,
                black_height: 1
            })
        );
    }

    #[test]
    fn reports_adjacency() {
        let mut buf = [Node::default(); 2];
        let tree = hand_built(&mut buf, Extent::new(50, 50));
        assert_eq!(tree.verify(), Err(TreeViolation::Adjacent { start: 100 }));
    }

    #[test]
    fn reports_overlap() {
        let mut buf = [Node::default(); 2];
        let tree = hand_built(&mut buf, Extent::new(90, 20));
        assert_eq!(
            tree.verify(),
            Err(TreeViolation::Order {
                start: 100,
                previous_end: 110
            })
        );
    }

    #[test]
    fn reports_stale_augmentation() {
        let mut buf = [Node::default(); 2];
        let mut tree = hand_built(&mut buf, Extent::new(10, 20));
        let root = tree.root().unwrap();
        tree.nodes_mut().get_mut(root).set_most(20);
        assert_eq!(
            tree.verify(),
            Err(TreeViolation::Augmentation {
                start: 100,
                stored: 20,
                expected: 50
            })
        );
    }

    #[test]
    fn reports_red_root_and_black_height() {
        let mut buf = [Node::default(); 2];
        let mut tree = hand_built(&mut buf, Extent::new(10, 20));
        let root = tree.root().unwrap();
        let left = tree.nodes().get(root).child(Direction::Left).unwrap();

        tree.nodes_mut().get_mut(left).set_red(false);
        assert_eq!(tree.verify(), Err(TreeViolation::BlackHeight { start: 100 }));

        tree.nodes_mut().get_mut(root).set_red(true);
        assert_eq!(tree.verify(), Err(TreeViolation::RedRoot));
    }
}
