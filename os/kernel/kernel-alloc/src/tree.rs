//! # Augmented Extent Tree
//!
//! An address-ordered red-black tree of disjoint, non-adjacent free extents.
//! Every node additionally stores the length of the largest extent anywhere in
//! its subtree, which turns "find a free range of at least `n` bytes" into a
//! single root-to-leaf descent.
//!
//! ```text
//!                     ┌──────────────────────┐
//!                     │ [0x8000, +0x1000)    │
//!                     │ most = 0x6000   (B)  │
//!                     └──────┬────────┬──────┘
//!               ┌────────────┘        └─────────────┐
//!   ┌───────────▼──────────┐           ┌────────────▼─────────┐
//!   │ [0x1000, +0x0800)    │           │ [0x20000, +0x6000)   │
//!   │ most = 0x0800   (R)  │           │ most = 0x6000   (R)  │
//!   └──────────────────────┘           └──────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! * In-order traversal yields strictly increasing starts; no two extents
//!   overlap or touch.
//! * The root is black, no red node has a red child and every root-to-leaf
//!   path passes the same number of black nodes.
//! * `most = max(length, most(left), most(right))`, with `0` for a missing child.
//!
//! ## Operations
//!
//! * [`insert`](ExtentTree::insert) coalesces the incoming extent with its
//!   address neighbours. Touching one neighbour grows that node in place;
//!   touching both (a *bridge*) additionally removes the second neighbour.
//!   Nodes that end up unused are reported back in [`FreedNodes`].
//! * [`delete_at_least`](ExtentTree::delete_at_least) walks towards the
//!   subtree whose largest extent is the tighter fit and removes the smallest
//!   qualifying extent it passes.
//!
//! Nodes have no parent pointers; descents record a bounded [`Path`] and the
//! fix-up code walks back along it.

mod path;
mod verify;

pub use path::MAX_TREE_HEIGHT;
pub use verify::{TreeStats, TreeViolation};

use crate::extent::Extent;
use crate::node_store::{Direction, Node, NodeId, NodeStore};
use core::ops::Range;
use path::{Path, Step};

/// Node slots an insertion no longer needs: the inserted node when it was
/// merged into a neighbour, plus the far neighbour on a bridge merge.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FreedNodes([Option<NodeId>; 2]);

impl FreedNodes {
    const fn one(id: NodeId) -> Self {
        Self([Some(id), None])
    }

    const fn push(&mut self, id: NodeId) {
        if self.0[0].is_none() {
            self.0[0] = Some(id);
        } else {
            self.0[1] = Some(id);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.iter().flatten().count()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0[0].is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().flatten().copied()
    }
}

impl IntoIterator for FreedNodes {
    type Item = NodeId;
    type IntoIter = core::iter::Flatten<core::array::IntoIter<Option<NodeId>, 2>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter().flatten()
    }
}

/// Red-black tree of free extents, backed by a [`NodeStore`].
pub struct ExtentTree<'a> {
    nodes: NodeStore<'a>,
    root: Option<NodeId>,
    len: usize,
}

impl<'a> ExtentTree<'a> {
    /// An empty tree. Every slot already handed out by `nodes` is considered
    /// owned by the caller.
    #[must_use]
    pub const fn new(nodes: NodeStore<'a>) -> Self {
        Self {
            nodes,
            root: None,
            len: 0,
        }
    }

    /// Re-adopts a tree rooted at `root`.
    ///
    /// Every live slot of `nodes` must belong to the tree; nothing is walked
    /// or validated.
    #[must_use]
    pub fn from_raw_parts(nodes: NodeStore<'a>, root: Option<NodeId>) -> Self {
        let len = if root.is_some() { nodes.live() } else { 0 };
        Self { nodes, root, len }
    }

    #[must_use]
    pub fn into_raw_parts(self) -> (NodeStore<'a>, Option<NodeId>) {
        (self.nodes, self.root)
    }

    #[inline]
    #[must_use]
    pub const fn nodes(&self) -> &NodeStore<'a> {
        &self.nodes
    }

    #[inline]
    pub const fn nodes_mut(&mut self) -> &mut NodeStore<'a> {
        &mut self.nodes
    }

    #[inline]
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of extents in the tree.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Length of the largest free extent, `0` when empty.
    #[inline]
    #[must_use]
    pub fn largest(&self) -> u64 {
        self.most(self.root)
    }

    /// The extent currently held by `id`.
    #[inline]
    #[must_use]
    pub fn extent(&self, id: NodeId) -> Extent {
        self.node(id).extent()
    }

    /// In-order iterator over the free extents.
    #[must_use]
    pub fn iter(&self) -> Extents<'_, 'a> {
        let mut iter = Extents {
            tree: self,
            stack: Path::new(),
        };
        iter.descend_left(self.root);
        iter
    }

    /// Links the detached node `id` into the tree, coalescing with touching
    /// extents.
    ///
    /// Returns the slots the tree no longer uses; the caller owns them.
    ///
    /// # Panics
    /// If the node holds an empty extent.
    pub fn insert(&mut self, id: NodeId) -> FreedNodes {
        let incoming = self.extent(id);
        assert!(!incoming.is_empty(), "inserting empty extent at {:#x}", incoming.start);

        let mut path = Path::new();
        let mut cursor = self.root;
        while let Some(current) = cursor {
            let held = self.extent(current);
            if incoming.end() == held.start {
                return self.merge(&mut path, current, id, Direction::Left);
            }
            if held.end() == incoming.start {
                return self.merge(&mut path, current, id, Direction::Right);
            }

            let dir = if incoming.start >= held.start {
                Direction::Right
            } else {
                Direction::Left
            };
            path.push(current, dir);
            cursor = self.child(current, dir);
        }

        self.link(&mut path, id);
        FreedNodes::default()
    }

    /// Removes a free extent of at least `min_bytes` bytes.
    ///
    /// Returns the detached node holding the removed extent, or `None` (with
    /// the tree untouched) if no extent is large enough.
    pub fn delete_at_least(&mut self, min_bytes: u64) -> Option<NodeId> {
        let root = self.root?;
        if self.most(Some(root)) < min_bytes {
            return None;
        }

        let mut path = Path::new();
        let mut best: Option<(NodeId, usize)> = None;
        let mut current = root;
        loop {
            let length = self.extent(current).length;
            if length >= min_bytes && best.is_none_or(|(b, _)| length < self.extent(b).length) {
                best = Some((current, path.len()));
            }

            let fits = |id: Option<NodeId>| id.filter(|&c| self.most(Some(c)) >= min_bytes);
            let dir = match (
                fits(self.child(current, Direction::Left)),
                fits(self.child(current, Direction::Right)),
            ) {
                (None, None) => break,
                (Some(_), None) => Direction::Left,
                (None, Some(_)) => Direction::Right,
                (Some(l), Some(r)) => {
                    if self.most(Some(r)) < self.most(Some(l)) {
                        Direction::Right
                    } else {
                        Direction::Left
                    }
                }
            };

            path.push(current, dir);
            let Some(next) = self.child(current, dir) else {
                break;
            };
            current = next;
        }

        let (best, depth) = best?;
        path.truncate(depth);
        let removed = self.remove_at(&mut path, best);
        self.len -= 1;
        Some(removed)
    }

    /// Whether any free extent shares a byte with `extent`.
    #[must_use]
    pub fn overlaps(&self, extent: &Extent) -> bool {
        if extent.is_empty() {
            return false;
        }
        self.last_starting_before(extent.end())
            .is_some_and(|held| held.end() > extent.start)
    }

    /// The free extent containing `address`, if any.
    #[must_use]
    pub fn find(&self, address: u64) -> Option<Extent> {
        self.last_starting_before(address.checked_add(1)?)
            .filter(|held| held.contains(address))
    }

    /// The extent with the largest start below `bound`.
    fn last_starting_before(&self, bound: u64) -> Option<Extent> {
        let mut candidate = None;
        let mut cursor = self.root;
        while let Some(current) = cursor {
            let held = self.extent(current);
            if held.start < bound {
                candidate = Some(held);
                cursor = self.child(current, Direction::Right);
            } else {
                cursor = self.child(current, Direction::Left);
            }
        }
        candidate
    }

    /// Grows `target` by the incoming extent on its `side`, then checks the
    /// closest node on that side for a bridge.
    fn merge(&mut self, path: &mut Path, target: NodeId, id: NodeId, side: Direction) -> FreedNodes {
        let incoming = self.extent(id);
        let held = self.extent(target);
        let mut merged = Extent::new(held.start.min(incoming.start), held.length + incoming.length);
        let depth = path.len();
        let mut freed = FreedNodes::one(id);

        let mut bridge = None;
        if let Some(mut neighbour) = self.child(target, side) {
            path.push(target, side);
            while let Some(next) = self.child(neighbour, !side) {
                path.push(neighbour, !side);
                neighbour = next;
            }

            let beyond = self.extent(neighbour);
            if beyond.is_adjacent_to(&merged) {
                merged = Extent::new(merged.start.min(beyond.start), merged.length + beyond.length);
                bridge = Some(neighbour);
            }
        }

        self.node_mut(target).set_extent(merged);
        if self.node(target).most_bytes_in_subtree() < merged.length {
            self.node_mut(target).set_most(merged.length);
            self.grow(path, 0..depth, merged.length);
        }

        if let Some(neighbour) = bridge {
            let removed = self.remove_at(path, neighbour);
            self.len -= 1;
            freed.push(removed);
        }

        freed
    }

    /// Hangs the detached node `id` below the top of `path` and rebalances.
    fn link(&mut self, path: &mut Path, id: NodeId) {
        let length = self.extent(id).length;
        let node = self.node_mut(id);
        node.set_child(Direction::Left, None);
        node.set_child(Direction::Right, None);
        node.set_most(length);
        node.set_red(true);

        self.relink(path.from_top(0), Some(id));
        self.len += 1;
        self.grow(path, 0..path.len(), length);
        self.rebalance_insert(path);

        if let Some(root) = self.root {
            self.set_red(root, false);
        }
    }

    /// Unlinks `target`, whose ancestors are recorded in `path`.
    ///
    /// With two children the target swaps extents with its in-order successor
    /// and the successor's slot is unlinked instead. Returns the unlinked
    /// slot, reset to a detached node holding the removed extent.
    fn remove_at(&mut self, path: &mut Path, target: NodeId) -> NodeId {
        let removed_extent = self.extent(target);
        let left = self.child(target, Direction::Left);
        let right = self.child(target, Direction::Right);

        let removed = match (left, right) {
            (Some(_), Some(right)) => {
                let depth = path.len();
                path.push(target, Direction::Right);
                let mut successor = right;
                while let Some(next) = self.child(successor, Direction::Left) {
                    path.push(successor, Direction::Left);
                    successor = next;
                }

                let successor_extent = self.extent(successor);
                self.node_mut(target).set_extent(successor_extent);
                self.node_mut(successor).set_extent(removed_extent);

                let orphan = self.child(successor, Direction::Right);
                self.relink(path.from_top(0), orphan);

                // Below the target only the successor's length went missing;
                // from the target upwards, the removed extent's length did.
                self.shrink(path, depth + 1..path.len(), successor_extent.length);
                self.shrink(path, 0..depth + 1, removed_extent.length);
                successor
            }
            (orphan, None) | (None, orphan) => {
                self.relink(path.from_top(0), orphan);
                self.shrink(path, 0..path.len(), removed_extent.length);
                target
            }
        };

        if !self.node(removed).is_red() {
            self.rebalance_delete(path);
        }
        if let Some(root) = self.root {
            self.set_red(root, false);
        }

        self.nodes.reset(removed, removed_extent);
        removed
    }

    /// Raises the augmentation along `path[range]`, bottom-up, until an
    /// ancestor already covers `length`.
    fn grow(&mut self, path: &Path, range: Range<usize>, length: u64) {
        for index in range.rev() {
            let node = self.node_mut(path.get(index).node);
            if node.most_bytes_in_subtree() >= length {
                break;
            }
            node.set_most(length);
        }
    }

    /// Recomputes the augmentation along `path[range]`, bottom-up, after an
    /// extent of `removed` bytes left those subtrees.
    ///
    /// Stops at the first node still holding at least `removed` bytes: its
    /// old value was the same, so nothing above can change.
    fn shrink(&mut self, path: &Path, range: Range<usize>, removed: u64) {
        for index in range.rev() {
            if self.recompute(path.get(index).node) >= removed {
                break;
            }
        }
    }

    fn rebalance_insert(&mut self, path: &mut Path) {
        while let (Some(parent), Some(grand)) = (path.from_top(0), path.from_top(1)) {
            if !self.is_red(Some(parent.node)) {
                return;
            }

            let uncle = self.child(grand.node, !grand.dir);
            if let Some(uncle) = uncle.filter(|&u| self.is_red(Some(u))) {
                self.set_red(parent.node, false);
                self.set_red(uncle, false);
                self.set_red(grand.node, true);
                path.pop();
                path.pop();
                continue;
            }

            let mut upper = parent.node;
            if parent.dir != grand.dir {
                upper = self.rotate(Some(grand), parent.node, grand.dir);
            }
            self.set_red(upper, false);
            self.set_red(grand.node, true);
            self.rotate(path.from_top(2), grand.node, !grand.dir);
            return;
        }
    }

    /// Restores the black height after a black node was unlinked below the
    /// top of `path`.
    fn rebalance_delete(&mut self, path: &mut Path) {
        while let Some(Step { node: parent, dir }) = path.from_top(0) {
            let deficient = self.child(parent, dir);
            if let Some(red) = deficient.filter(|&x| self.is_red(Some(x))) {
                self.set_red(red, false);
                return;
            }

            let Some(mut sibling) = self.child(parent, !dir) else {
                unreachable!("black-height deficit without a sibling");
            };

            if self.is_red(Some(sibling)) {
                self.set_red(sibling, false);
                self.set_red(parent, true);
                self.rotate(path.from_top(1), parent, dir);
                path.set_top(Step { node: sibling, dir });
                path.push(parent, dir);
                let Some(next) = self.child(parent, !dir) else {
                    unreachable!("red sibling without black children");
                };
                sibling = next;
            }

            let near = self.child(sibling, dir);
            let far = self.child(sibling, !dir);
            if !self.is_red(near) && !self.is_red(far) {
                self.set_red(sibling, true);
                path.pop();
                continue;
            }

            if !self.is_red(far) {
                if let Some(near) = near {
                    self.set_red(near, false);
                }
                self.set_red(sibling, true);
                sibling = self.rotate(Some(Step { node: parent, dir: !dir }), sibling, !dir);
            }

            let parent_red = self.is_red(Some(parent));
            self.set_red(sibling, parent_red);
            self.set_red(parent, false);
            if let Some(far) = self.child(sibling, !dir) {
                self.set_red(far, false);
            }
            self.rotate(path.from_top(1), parent, dir);
            return;
        }
    }

    /// Rotates `node`, which hangs below `link`, towards `dir`; its `!dir`
    /// child takes its place. Returns the lifted child.
    fn rotate(&mut self, link: Option<Step>, node: NodeId, dir: Direction) -> NodeId {
        let Some(up) = self.child(node, !dir) else {
            unreachable!("rotation without a child to lift");
        };
        let inner = self.child(up, dir);
        self.node_mut(node).set_child(!dir, inner);
        self.node_mut(up).set_child(dir, Some(node));
        self.relink(link, Some(up));

        // Same subtree, same maximum; must happen before `node` is recomputed.
        let most = self.node(node).most_bytes_in_subtree();
        self.node_mut(up).set_most(most);
        self.recompute(node);
        up
    }

    /// Points `link` (or the root) at `child`.
    fn relink(&mut self, link: Option<Step>, child: Option<NodeId>) {
        match link {
            Some(Step { node, dir }) => self.node_mut(node).set_child(dir, child),
            None => self.root = child,
        }
    }

    fn recompute(&mut self, id: NodeId) -> u64 {
        let node = self.node(id);
        let most = node
            .extent()
            .length
            .max(self.most(node.child(Direction::Left)))
            .max(self.most(node.child(Direction::Right)));
        self.node_mut(id).set_most(most);
        most
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id)
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(id)
    }

    #[inline]
    fn child(&self, id: NodeId, dir: Direction) -> Option<NodeId> {
        self.node(id).child(dir)
    }

    #[inline]
    fn is_red(&self, id: Option<NodeId>) -> bool {
        id.is_some_and(|id| self.node(id).is_red())
    }

    #[inline]
    fn set_red(&mut self, id: NodeId, red: bool) {
        self.node_mut(id).set_red(red);
    }

    #[inline]
    fn most(&self, id: Option<NodeId>) -> u64 {
        id.map_or(0, |id| self.node(id).most_bytes_in_subtree())
    }
}

impl core::fmt::Debug for ExtentTree<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExtentTree")
            .field("len", &self.len)
            .field("largest", &self.largest())
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

/// In-order iterator over the extents of an [`ExtentTree`].
pub struct Extents<'t, 'a> {
    tree: &'t ExtentTree<'a>,
    stack: Path,
}

impl Extents<'_, '_> {
    fn descend_left(&mut self, mut cursor: Option<NodeId>) {
        while let Some(id) = cursor {
            self.stack.push(id, Direction::Left);
            cursor = self.tree.child(id, Direction::Left);
        }
    }
}

impl Iterator for Extents<'_, '_> {
    type Item = Extent;

    fn next(&mut self) -> Option<Self::Item> {
        let Step { node, .. } = self.stack.pop()?;
        self.descend_left(self.tree.child(node, Direction::Right));
        Some(self.tree.extent(node))
    }
}

impl<'t, 'a> IntoIterator for &'t ExtentTree<'a> {
    type Item = Extent;
    type IntoIter = Extents<'t, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(slots: usize) -> Box<[Node]> {
        vec![Node::default(); slots].into_boxed_slice()
    }

    /// Inserts `[start, start + length)` and recycles whatever the tree frees.
    fn insert(tree: &mut ExtentTree<'_>, start: u64, length: u64) -> usize {
        let id = tree.nodes_mut().acquire(Extent::new(start, length)).unwrap();
        let freed = tree.insert(id);
        for id in freed {
            tree.nodes_mut().release(id);
        }
        tree.verify().unwrap();
        freed.len()
    }

    fn take(tree: &mut ExtentTree<'_>, min: u64) -> Option<Extent> {
        let id = tree.delete_at_least(min)?;
        let extent = tree.extent(id);
        tree.nodes_mut().release(id);
        tree.verify().unwrap();
        Some(extent)
    }

    fn extents(tree: &ExtentTree<'_>) -> Vec<(u64, u64)> {
        tree.iter().map(|e| (e.start, e.end())).collect()
    }

    #[test]
    fn merge_with_predecessor() {
        let mut buf = buffer(8);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        assert_eq!(insert(&mut tree, 1000, 100), 0);
        assert_eq!(insert(&mut tree, 1100, 200), 1);
        assert_eq!(extents(&tree), [(1000, 1300)]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.largest(), 300);
        assert_eq!(tree.nodes().live(), 1);
    }

    #[test]
    fn merge_with_successor() {
        let mut buf = buffer(8);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        insert(&mut tree, 1100, 200);
        assert_eq!(insert(&mut tree, 1000, 100), 1);
        assert_eq!(extents(&tree), [(1000, 1300)]);
    }

    #[test]
    fn bridge_merge_frees_two_nodes() {
        let mut buf = buffer(8);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        insert(&mut tree, 1000, 100);
        insert(&mut tree, 1300, 100);
        assert_eq!(insert(&mut tree, 1100, 200), 2);
        assert_eq!(extents(&tree), [(1000, 1400)]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nodes().live(), 1);
    }

    #[test]
    fn bridge_deep_in_the_tree() {
        let mut buf = buffer(64);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        // Gaps of 10 between extents of 10.
        for i in 0..20 {
            insert(&mut tree, i * 20, 10);
        }
        assert_eq!(tree.len(), 20);

        // Fill every gap in an order that exercises both merge sides.
        for i in (0..19).rev().step_by(2).chain((1..19).step_by(2)) {
            assert_eq!(insert(&mut tree, i * 20 + 10, 10), 2);
        }
        assert_eq!(extents(&tree), [(0, 390)]);
    }

    #[test]
    fn single_extent_is_taken_whole() {
        let mut buf = buffer(4);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        insert(&mut tree, 0, 100);
        assert_eq!(take(&mut tree, 50), Some(Extent::new(0, 100)));
        assert!(tree.is_empty());
        assert_eq!(tree.largest(), 0);
    }

    #[test]
    fn only_large_enough_extents_qualify() {
        let mut buf = buffer(4);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        insert(&mut tree, 0, 100);
        insert(&mut tree, 500, 200);
        assert_eq!(take(&mut tree, 150), Some(Extent::new(500, 200)));
        assert_eq!(extents(&tree), [(0, 100)]);
    }

    #[test]
    fn too_large_requests_leave_tree_untouched() {
        let mut buf = buffer(4);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        assert_eq!(tree.delete_at_least(1), None);

        insert(&mut tree, 0, 100);
        insert(&mut tree, 500, 200);
        assert_eq!(tree.delete_at_least(201), None);
        assert_eq!(extents(&tree), [(0, 100), (500, 700)]);
        tree.verify().unwrap();
    }

    #[test]
    fn descends_towards_smaller_maximum() {
        let mut buf = buffer(16);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        // Ascending inserts settle into:
        //
        //            [1000, +50)
        //           /           \
        //     [0, +400)       [3000, +800)
        //                     /          \
        //             [2000, +120)    [5000, +110)
        for (start, length) in [(0, 400), (1000, 50), (2000, 120), (3000, 800), (5000, 110)] {
            insert(&mut tree, start, length);
        }
        assert_eq!(tree.extent(tree.root().unwrap()), Extent::new(1000, 50));

        // Both subtrees qualify; the left one has the smaller maximum.
        assert_eq!(take(&mut tree, 100), Some(Extent::new(0, 400)));
        // Only the right subtree qualifies now; 800 > 110 sends us right.
        assert_eq!(take(&mut tree, 100), Some(Extent::new(5000, 110)));
        assert_eq!(take(&mut tree, 1000), None);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn overlap_queries() {
        let mut buf = buffer(8);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        insert(&mut tree, 100, 100);
        insert(&mut tree, 400, 100);

        assert!(tree.overlaps(&Extent::new(150, 10)));
        assert!(tree.overlaps(&Extent::new(50, 51)));
        assert!(tree.overlaps(&Extent::new(0, 1000)));
        assert!(!tree.overlaps(&Extent::new(200, 200)));
        assert!(!tree.overlaps(&Extent::new(0, 100)));
        assert!(!tree.overlaps(&Extent::new(500, 10)));

        assert_eq!(tree.find(450), Some(Extent::new(400, 100)));
        assert_eq!(tree.find(500), None);
        assert_eq!(tree.find(u64::MAX), None);
    }

    #[test]
    fn ascending_and_descending_inserts_stay_balanced() {
        let mut buf = buffer(512);
        let mut tree = ExtentTree::new(NodeStore::new(&mut buf));
        for i in 0..200 {
            insert(&mut tree, i * 0x2000, 0x1000);
        }
        for i in 0..200 {
            insert(&mut tree, 0x1000_0000 - i * 0x2000, 0x1000);
        }
        let stats = tree.verify().unwrap();
        assert_eq!(stats.len, 400);
        assert!(stats.black_height <= 10);

        let mut total = 0;
        while let Some(extent) = take(&mut tree, 1) {
            total += extent.length;
        }
        assert_eq!(total, 400 * 0x1000);
        assert_eq!(tree.nodes().live(), 0);
    }
}
