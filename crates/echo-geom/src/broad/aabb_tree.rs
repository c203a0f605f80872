// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use core::hash::Hash;

use rustc_hash::FxHashMap;

use crate::types::{aabb::Aabb, ray::Ray};

/// Margin added around every leaf box unless configured otherwise.
pub const DEFAULT_FAT_MARGIN: f32 = 0.2;

/// Broad-phase interface for inserting proxies and querying overlapping pairs.
///
/// Implementations must return pairs deterministically: the pair `(a, b)` is
/// canonicalized such that `a < b`, and the full list is sorted ascending by
/// `(a, b)`.
pub trait BroadPhase {
    /// Proxy identifier.
    type Key;
    /// Inserts or updates the proxy with the given `key` and tight `aabb`.
    ///
    /// Returns `true` when the proxy was (re)inserted into the structure.
    fn upsert(&mut self, key: Self::Key, aabb: Aabb) -> bool;
    /// Removes a proxy if present; returns whether it existed.
    fn remove(&mut self, key: Self::Key) -> bool;
    /// Returns a canonical, deterministically-ordered list of overlapping pairs.
    fn pairs(&self) -> Vec<(Self::Key, Self::Key)>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeKind<K> {
    Leaf(K),
    Branch { left: usize, right: usize },
    Free,
}

#[derive(Debug, Clone)]
struct Node<K> {
    fat: Aabb,
    parent: Option<usize>,
    kind: NodeKind<K>,
}

enum Task {
    Single(usize),
    Cross(usize, usize),
}

/// Dynamic bounding-volume tree.
///
/// - Leaves store the tight box inflated by `fat_margin`; a leaf is only
///   reinserted when the tight box escapes its fat box.
/// - Insertion descends by surface-area growth: at each branch the cheaper
///   child is chosen, and the walk stops when creating a new sibling at the
///   current node is cheaper than descending.
/// - Nodes live in an index arena with a free list; no node is ever moved.
/// - `clone_from` reuses the target's arena and leaf map allocations.
#[derive(Debug)]
pub struct AabbTree<K> {
    nodes: Vec<Node<K>>,
    free: Vec<usize>,
    root: Option<usize>,
    leaves: FxHashMap<K, usize>,
    fat_margin: f32,
}

impl<K: Clone> Clone for AabbTree<K> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            free: self.free.clone(),
            root: self.root,
            leaves: self.leaves.clone(),
            fat_margin: self.fat_margin,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.nodes.clone_from(&source.nodes);
        self.free.clone_from(&source.free);
        self.root = source.root;
        self.leaves.clone_from(&source.leaves);
        self.fat_margin = source.fat_margin;
    }
}

impl<K> Default for AabbTree<K>
where
    K: Copy + Eq + Hash + Ord,
{
    fn default() -> Self {
        Self::new(DEFAULT_FAT_MARGIN)
    }
}

impl<K> AabbTree<K>
where
    K: Copy + Eq + Hash + Ord,
{
    /// Creates an empty tree whose leaves are inflated by `fat_margin`.
    pub fn new(fat_margin: f32) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            leaves: FxHashMap::default(),
            fat_margin: fat_margin.max(0.0),
        }
    }

    /// Margin applied around leaf boxes.
    pub fn fat_margin(&self) -> f32 {
        self.fat_margin
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// `true` when the tree holds no leaf.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Whether `key` has a leaf.
    pub fn contains(&self, key: &K) -> bool {
        self.leaves.contains_key(key)
    }

    /// Fat box stored for `key`.
    pub fn fat_aabb(&self, key: &K) -> Option<Aabb> {
        self.leaves.get(key).map(|&i| self.nodes[i].fat)
    }

    /// Height of the tree (0 when empty, 1 for a single leaf).
    pub fn height(&self) -> usize {
        let mut best = 0;
        let mut stack: Vec<(usize, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((i, depth)) = stack.pop() {
            best = best.max(depth);
            if let NodeKind::Branch { left, right } = self.nodes[i].kind {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        best
    }

    fn alloc(&mut self, node: Node<K>) -> usize {
        if let Some(i) = self.free.pop() {
            self.nodes[i] = node;
            i
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, i: usize) {
        self.nodes[i].kind = NodeKind::Free;
        self.nodes[i].parent = None;
        self.free.push(i);
    }

    fn child_cost(&self, child: usize, leaf_box: &Aabb, inheritance: f32) -> f32 {
        let node = &self.nodes[child];
        let merged = node.fat.union(leaf_box).surface_area();
        match node.kind {
            NodeKind::Leaf(_) => merged + inheritance,
            _ => merged - node.fat.surface_area() + inheritance,
        }
    }

    fn refit_from(&mut self, start: Option<usize>) {
        let mut cursor = start;
        while let Some(i) = cursor {
            if let NodeKind::Branch { left, right } = self.nodes[i].kind {
                self.nodes[i].fat = self.nodes[left].fat.union(&self.nodes[right].fat);
            }
            cursor = self.nodes[i].parent;
        }
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if let NodeKind::Branch { left, right } = &mut self.nodes[parent].kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
    }

    fn insert_leaf(&mut self, leaf: usize) {
        let Some(root) = self.root else {
            self.nodes[leaf].parent = None;
            self.root = Some(leaf);
            return;
        };
        let leaf_box = self.nodes[leaf].fat;

        let mut index = root;
        while let NodeKind::Branch { left, right } = self.nodes[index].kind {
            let area = self.nodes[index].fat.surface_area();
            let combined = self.nodes[index].fat.union(&leaf_box).surface_area();
            let cost = 2.0 * combined;
            let inheritance = 2.0 * (combined - area);
            let cost_left = self.child_cost(left, &leaf_box, inheritance);
            let cost_right = self.child_cost(right, &leaf_box, inheritance);
            if cost < cost_left && cost < cost_right {
                break;
            }
            index = if cost_left <= cost_right { left } else { right };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling].parent;
        let merged = self.nodes[sibling].fat.union(&leaf_box);
        let new_parent = self.alloc(Node {
            fat: merged,
            parent: old_parent,
            kind: NodeKind::Branch {
                left: sibling,
                right: leaf,
            },
        });
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);
        match old_parent {
            Some(p) => self.replace_child(p, sibling, new_parent),
            None => self.root = Some(new_parent),
        }
        self.refit_from(old_parent);
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }
        let Some(parent) = self.nodes[leaf].parent else {
            return;
        };
        let sibling = match self.nodes[parent].kind {
            NodeKind::Branch { left, right } => {
                if left == leaf {
                    right
                } else {
                    left
                }
            }
            _ => return,
        };
        let grand = self.nodes[parent].parent;
        self.nodes[sibling].parent = grand;
        match grand {
            Some(g) => {
                self.replace_child(g, parent, sibling);
                self.refit_from(Some(g));
            }
            None => self.root = Some(sibling),
        }
        self.release(parent);
        self.nodes[leaf].parent = None;
    }

    /// Keys whose fat box overlaps `aabb`, sorted ascending.
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<K> {
        self.collect_leaves(|b| b.overlaps(aabb))
    }

    /// Keys whose fat box is crossed by `ray`, sorted ascending.
    pub fn ray_test(&self, ray: &Ray) -> Vec<K> {
        self.collect_leaves(|b| b.ray_intersection(ray).is_some())
    }

    fn collect_leaves(&self, hit: impl Fn(&Aabb) -> bool) -> Vec<K> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if !hit(&node.fat) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(k) => out.push(k),
                NodeKind::Branch { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
                NodeKind::Free => {}
            }
        }
        out.sort_unstable();
        out
    }
}

impl<K> BroadPhase for AabbTree<K>
where
    K: Copy + Eq + Hash + Ord,
{
    type Key = K;

    fn upsert(&mut self, key: K, aabb: Aabb) -> bool {
        if let Some(&leaf) = self.leaves.get(&key) {
            if self.nodes[leaf].fat.contains(&aabb) {
                return false;
            }
            self.remove_leaf(leaf);
            self.nodes[leaf].fat = aabb.inflate(self.fat_margin);
            self.insert_leaf(leaf);
            return true;
        }
        let leaf = self.alloc(Node {
            fat: aabb.inflate(self.fat_margin),
            parent: None,
            kind: NodeKind::Leaf(key),
        });
        self.leaves.insert(key, leaf);
        self.insert_leaf(leaf);
        true
    }

    fn remove(&mut self, key: K) -> bool {
        let Some(leaf) = self.leaves.remove(&key) else {
            return false;
        };
        self.remove_leaf(leaf);
        self.release(leaf);
        true
    }

    fn pairs(&self) -> Vec<(K, K)> {
        let mut out = Vec::new();
        let mut tasks: Vec<Task> = self.root.map(Task::Single).into_iter().collect();
        while let Some(task) = tasks.pop() {
            match task {
                Task::Single(i) => {
                    if let NodeKind::Branch { left, right } = self.nodes[i].kind {
                        tasks.push(Task::Single(left));
                        tasks.push(Task::Single(right));
                        tasks.push(Task::Cross(left, right));
                    }
                }
                Task::Cross(a, b) => {
                    if !self.nodes[a].fat.overlaps(&self.nodes[b].fat) {
                        continue;
                    }
                    match (self.nodes[a].kind, self.nodes[b].kind) {
                        (NodeKind::Leaf(ka), NodeKind::Leaf(kb)) => {
                            out.push(if ka < kb { (ka, kb) } else { (kb, ka) });
                        }
                        (NodeKind::Leaf(_), NodeKind::Branch { left, right }) => {
                            tasks.push(Task::Cross(a, left));
                            tasks.push(Task::Cross(a, right));
                        }
                        (NodeKind::Branch { left, right }, _) => {
                            tasks.push(Task::Cross(left, b));
                            tasks.push(Task::Cross(right, b));
                        }
                        _ => {}
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}
