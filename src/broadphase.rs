//! Broad-phase Spatial Indices
//!
//! Coarse AABB culling in front of the narrow phase. Two implementations of
//! the [`BroadPhase`] contract:
//!
//! - [`NaiveBroadPhase`]: flat slot list, linear scan. Used for dynamic
//!   bodies, whose bounds change every tick anyway.
//! - [`TreeBroadPhase`]: incremental AABB tree with fat leaves and surface
//!   area heuristic insertion. Used for static bodies, which rarely move.
//!
//! Both iterate in a fixed order that depends only on the sequence of
//! add/remove/update calls, so query results are deterministic.
//!
//! Author: Moroya Sakamoto

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::aabb::Aabb;
use crate::body::BodyHandle;
use crate::config::AABB_FAT_MARGIN;
use crate::math::Fix128;

/// Index-local identifier of an entry
pub type ProxyId = usize;

/// Query contract of a broad-phase index.
pub trait BroadPhase {
    /// Index `body` under `aabb`.
    fn add(&mut self, body: BodyHandle, aabb: Aabb) -> ProxyId;

    /// Drop an entry. Unknown proxies are ignored.
    fn remove(&mut self, proxy: ProxyId);

    /// Move an entry to new bounds.
    fn update(&mut self, proxy: ProxyId, aabb: Aabb);

    /// Append every indexed body whose bounds intersect `aabb`. The caller
    /// owns `out` and clears it between queries.
    fn query_overlap(&self, aabb: &Aabb, out: &mut Vec<BodyHandle>);

    /// Number of indexed bodies
    fn len(&self) -> usize;

    /// Nothing indexed
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Naive
// ============================================================================

/// Linear-scan index.
#[derive(Clone, Debug, Default)]
pub struct NaiveBroadPhase {
    slots: Vec<Option<(BodyHandle, Aabb)>>,
    free_list: Vec<ProxyId>,
    count: usize,
}

impl NaiveBroadPhase {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, Aabb)> + '_ {
        self.slots.iter().flatten().copied()
    }
}

impl BroadPhase for NaiveBroadPhase {
    fn add(&mut self, body: BodyHandle, aabb: Aabb) -> ProxyId {
        self.count += 1;
        match self.free_list.pop() {
            Some(id) => {
                self.slots[id] = Some((body, aabb));
                id
            }
            None => {
                self.slots.push(Some((body, aabb)));
                self.slots.len() - 1
            }
        }
    }

    fn remove(&mut self, proxy: ProxyId) {
        if let Some(slot) = self.slots.get_mut(proxy) {
            if slot.take().is_some() {
                self.count -= 1;
                self.free_list.push(proxy);
            }
        }
    }

    fn update(&mut self, proxy: ProxyId, aabb: Aabb) {
        if let Some(Some(entry)) = self.slots.get_mut(proxy) {
            entry.1 = aabb;
        }
    }

    fn query_overlap(&self, aabb: &Aabb, out: &mut Vec<BodyHandle>) {
        out.extend(
            self.iter()
                .filter(|(_, bounds)| bounds.intersects(aabb))
                .map(|(body, _)| body),
        );
    }

    fn len(&self) -> usize {
        self.count
    }
}

// ============================================================================
// Tree
// ============================================================================

const NULL_NODE: usize = usize::MAX;

#[derive(Clone, Copy, Debug)]
struct TreeNode {
    /// Fat bounds for leaves, union of children for internal nodes
    aabb: Aabb,
    parent: usize,
    left: usize,
    right: usize,
    /// 0 for leaves, -1 for free nodes
    height: i32,
    body: Option<BodyHandle>,
}

impl TreeNode {
    fn free() -> Self {
        Self {
            aabb: Aabb::default(),
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: -1,
            body: None,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left == NULL_NODE
    }
}

/// Incremental AABB tree.
///
/// Leaves store bounds enlarged by a margin; an update inside the fat
/// bounds is free. Insertion walks down choosing the cheaper child by
/// perimeter growth.
#[derive(Clone, Debug)]
pub struct TreeBroadPhase {
    nodes: Vec<TreeNode>,
    free_list: Vec<usize>,
    root: usize,
    count: usize,
    /// Fattening margin applied to leaf bounds
    pub margin: Fix128,
}

impl Default for TreeBroadPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBroadPhase {
    /// Empty tree with the default fat margin
    pub fn new() -> Self {
        Self::with_margin(AABB_FAT_MARGIN)
    }

    /// Empty tree with a custom fat margin
    pub fn with_margin(margin: Fix128) -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: NULL_NODE,
            count: 0,
            margin,
        }
    }

    /// Tree height (0 for a single leaf or an empty tree)
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root].height
        }
    }

    /// Fat bounds stored for a proxy
    pub fn fat_aabb(&self, proxy: ProxyId) -> Option<Aabb> {
        self.nodes
            .get(proxy)
            .filter(|n| n.body.is_some())
            .map(|n| n.aabb)
    }

    /// Call `visit` for every leaf whose fat bounds overlap `aabb`, left
    /// subtree first.
    ///
    /// Walks the parent links instead of keeping a stack, so a query never
    /// allocates.
    pub fn visit_overlap<F: FnMut(BodyHandle)>(&self, aabb: &Aabb, mut visit: F) {
        if self.root == NULL_NODE {
            return;
        }
        let mut id = self.root;
        loop {
            let node = &self.nodes[id];
            if node.aabb.intersects(aabb) {
                match node.body {
                    Some(body) => visit(body),
                    None => {
                        id = node.left;
                        continue;
                    }
                }
            }

            // Climb until an unvisited right sibling turns up
            loop {
                if id == self.root {
                    return;
                }
                let parent = self.nodes[id].parent;
                if self.nodes[parent].left == id {
                    id = self.nodes[parent].right;
                    break;
                }
                id = parent;
            }
        }
    }

    fn alloc_node(&mut self) -> usize {
        match self.free_list.pop() {
            Some(id) => id,
            None => {
                self.nodes.push(TreeNode::free());
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, id: usize) {
        self.nodes[id] = TreeNode::free();
        self.free_list.push(id);
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent = NULL_NODE;
            return;
        }

        let leaf_aabb = self.nodes[leaf].aabb;
        let mut sibling = self.root;
        while !self.nodes[sibling].is_leaf() {
            let node = self.nodes[sibling];
            let area = node.aabb.perimeter();
            let combined = node.aabb.merged(&leaf_aabb).perimeter();

            let cost = combined.double();
            let inheritance = (combined - area).double();
            let cost_left = self.descend_cost(node.left, &leaf_aabb, inheritance);
            let cost_right = self.descend_cost(node.right, &leaf_aabb, inheritance);

            if cost < cost_left && cost < cost_right {
                break;
            }
            sibling = if cost_left < cost_right {
                node.left
            } else {
                node.right
            };
        }

        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.alloc_node();
        self.nodes[new_parent] = TreeNode {
            aabb: leaf_aabb.merged(&self.nodes[sibling].aabb),
            parent: old_parent,
            left: sibling,
            right: leaf,
            height: self.nodes[sibling].height + 1,
            body: None,
        };

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else if self.nodes[old_parent].left == sibling {
            self.nodes[old_parent].left = new_parent;
        } else {
            self.nodes[old_parent].right = new_parent;
        }
        self.nodes[sibling].parent = new_parent;
        self.nodes[leaf].parent = new_parent;

        self.refit(old_parent);
    }

    fn descend_cost(&self, child: usize, leaf_aabb: &Aabb, inheritance: Fix128) -> Fix128 {
        let node = &self.nodes[child];
        let combined = leaf_aabb.merged(&node.aabb).perimeter();
        if node.is_leaf() {
            combined + inheritance
        } else {
            combined - node.aabb.perimeter() + inheritance
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let grand_parent = self.nodes[parent].parent;
        let sibling = if self.nodes[parent].left == leaf {
            self.nodes[parent].right
        } else {
            self.nodes[parent].left
        };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling].parent = NULL_NODE;
            self.free_node(parent);
            return;
        }

        if self.nodes[grand_parent].left == parent {
            self.nodes[grand_parent].left = sibling;
        } else {
            self.nodes[grand_parent].right = sibling;
        }
        self.nodes[sibling].parent = grand_parent;
        self.free_node(parent);
        self.refit(grand_parent);
    }

    /// Recompute bounds and heights from `start` up to the root.
    fn refit(&mut self, start: usize) {
        let mut id = start;
        while id != NULL_NODE {
            let TreeNode { left, right, .. } = self.nodes[id];
            let (l, r) = (self.nodes[left], self.nodes[right]);
            self.nodes[id].aabb = l.aabb.merged(&r.aabb);
            self.nodes[id].height = 1 + l.height.max(r.height);
            id = self.nodes[id].parent;
        }
    }
}

impl BroadPhase for TreeBroadPhase {
    fn add(&mut self, body: BodyHandle, aabb: Aabb) -> ProxyId {
        let leaf = self.alloc_node();
        self.nodes[leaf] = TreeNode {
            aabb: aabb.expanded(self.margin),
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: 0,
            body: Some(body),
        };
        self.insert_leaf(leaf);
        self.count += 1;
        leaf
    }

    fn remove(&mut self, proxy: ProxyId) {
        let is_live_leaf = self
            .nodes
            .get(proxy)
            .map_or(false, |n| n.body.is_some() && n.is_leaf());
        if !is_live_leaf {
            return;
        }
        self.remove_leaf(proxy);
        self.free_node(proxy);
        self.count -= 1;
    }

    fn update(&mut self, proxy: ProxyId, aabb: Aabb) {
        let Some(node) = self.nodes.get(proxy).filter(|n| n.body.is_some()) else {
            return;
        };
        if node.aabb.contains(&aabb) {
            return;
        }
        self.remove_leaf(proxy);
        self.nodes[proxy].aabb = aabb.expanded(self.margin);
        self.insert_leaf(proxy);
    }

    fn query_overlap(&self, aabb: &Aabb, out: &mut Vec<BodyHandle>) {
        self.visit_overlap(aabb, |body| out.push(body));
    }

    fn len(&self) -> usize {
        self.count
    }
}

// ============================================================================
// Tests
// ============================================================================
