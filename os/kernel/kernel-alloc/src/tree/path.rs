//! Bounded ancestor stack.
//!
//! Nodes carry no parent pointers. Every descent records the nodes it passed
//! and the direction it left them in, and the rebalancing code walks back up
//! this record instead.

use crate::node_store::{Direction, NodeId};

/// Deepest tree the path stack can record.
///
/// A red-black tree with `n` nodes is at most `2·log2(n + 1)` high, so 31-bit
/// handles never get close.
pub const MAX_TREE_HEIGHT: usize = 128;

/// One recorded step: `node` was left towards its `dir` child.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    pub node: NodeId,
    pub dir: Direction,
}

impl Step {
    const UNUSED: Self = Self {
        node: NodeId::FIRST,
        dir: Direction::Left,
    };
}

pub(crate) struct Path {
    steps: [Step; MAX_TREE_HEIGHT],
    len: usize,
}

impl Path {
    pub const fn new() -> Self {
        Self {
            steps: [Step::UNUSED; MAX_TREE_HEIGHT],
            len: 0,
        }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// # Panics
    /// If the tree is deeper than [`MAX_TREE_HEIGHT`].
    #[inline]
    pub fn push(&mut self, node: NodeId, dir: Direction) {
        assert!(self.len < MAX_TREE_HEIGHT, "extent tree exceeds {MAX_TREE_HEIGHT} levels");
        self.steps[self.len] = Step { node, dir };
        self.len += 1;
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Step> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.steps[self.len])
    }

    /// The step `depth` levels above the top; `0` is the top itself.
    #[inline]
    pub fn from_top(&self, depth: usize) -> Option<Step> {
        if depth >= self.len {
            return None;
        }
        Some(self.steps[self.len - 1 - depth])
    }

    #[inline]
    pub fn get(&self, index: usize) -> Step {
        self.steps[..self.len][index]
    }

    /// Replaces the top step.
    #[inline]
    pub fn set_top(&mut self, step: Step) {
        debug_assert!(self.len > 0);
        self.steps[self.len - 1] = step;
    }

    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_discipline() {
        let a = NodeId::from_raw(1).unwrap();
        let b = NodeId::from_raw(2).unwrap();
        let c = NodeId::from_raw(3).unwrap();

        let mut path = Path::new();
        assert!(path.pop().is_none());
        path.push(a, Direction::Left);
        path.push(b, Direction::Right);
        path.push(c, Direction::Left);

        assert_eq!(path.from_top(0).map(|s| s.node), Some(c));
        assert_eq!(path.from_top(2).map(|s| s.node), Some(a));
        assert_eq!(path.from_top(3), None);
        assert_eq!(path.get(1).dir, Direction::Right);

        path.set_top(Step {
            node: a,
            dir: Direction::Right,
        });
        assert_eq!(path.pop(), Some(Step { node: a, dir: Direction::Right }));

        path.truncate(1);
        assert_eq!(path.len(), 1);
        path.truncate(5);
        assert_eq!(path.len(), 1);
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn overflow_is_fatal() {
        let mut path = Path::new();
        for _ in 0..=MAX_TREE_HEIGHT {
            path.push(NodeId::FIRST, Direction::Left);
        }
    }
}
