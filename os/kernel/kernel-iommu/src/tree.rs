//! Arena-backed, augmented red-black tree of map entries.
//!
//! Entries are keyed by `end` and never overlap, so ordering by `end` is also
//! ordering by address. Each node additionally caches, for its subtree:
//!
//! ```text
//!              first                                   last
//!                │                                       │
//!                ▼                                       ▼
//!   ... ─────────[ left subtree ]  gap  [ node ]  gap  [ right subtree ]─────
//!                               ◄───►          ◄───►
//!                        start - left.last   right.first - end
//! ```
//!
//! `free_down` is the largest such gap anywhere below and including the node.
//! The space finder uses it to skip subtrees that cannot hold a request.
//!
//! Links are slot indices into the arena owned by the tree. Public handles
//! carry a generation so a freed slot cannot be confused with its successor.

use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::DeviceAddress;
use crate::flags::EntryFlags;

/// Stable handle of a map entry record within its domain.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct EntryId {
    index: u32,
    generation: u32,
}

impl EntryId {
    /// Slot index inside the owning domain's arena.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct Node {
    pub(crate) start: DeviceAddress,
    pub(crate) end: DeviceAddress,
    pub(crate) flags: EntryFlags,
    pub(crate) first: DeviceAddress,
    pub(crate) last: DeviceAddress,
    pub(crate) free_down: u64,
    pub(crate) parent: Option<u32>,
    pub(crate) left: Option<u32>,
    pub(crate) right: Option<u32>,
    color: Color,
    linked: bool,
}

impl Node {
    const EMPTY: Self = Self {
        start: 0,
        end: 0,
        flags: EntryFlags::new(),
        first: 0,
        last: 0,
        free_down: 0,
        parent: None,
        left: None,
        right: None,
        color: Color::Black,
        linked: false,
    };

    /// Whether the node is currently part of the tree.
    #[inline]
    pub(crate) const fn is_linked(&self) -> bool {
        self.linked
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    occupied: bool,
    node: Node,
}

#[derive(Debug)]
pub(crate) struct EntryTree {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    root: Option<u32>,
    linked: usize,
}

impl EntryTree {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            root: None,
            linked: 0,
        }
    }

    #[inline]
    pub(crate) const fn root(&self) -> Option<u32> {
        self.root
    }

    /// Number of entries currently in the tree.
    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.linked
    }

    #[inline]
    pub(crate) const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[inline]
    pub(crate) fn at(&self, index: u32) -> &Node {
        &self.slots[index as usize].node
    }

    #[inline]
    fn at_mut(&mut self, index: u32) -> &mut Node {
        &mut self.slots[index as usize].node
    }

    /// Create an unlinked, flag-less record.
    pub(crate) fn alloc(&mut self) -> EntryId {
        let index = if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            slot.occupied = true;
            slot.node = Node::EMPTY;
            index
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
                panic!("map entry arena exhausted");
            });
            self.slots.push(Slot {
                generation: 0,
                occupied: true,
                node: Node::EMPTY,
            });
            index
        };
        EntryId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Drop an unlinked record and invalidate its handle.
    pub(crate) fn release(&mut self, id: EntryId) -> Node {
        let index = self.resolve(id);
        let slot = &mut self.slots[index as usize];
        assert!(!slot.node.linked, "releasing entry {id:?} still in the tree");
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(index);
        slot.node
    }

    /// Map a handle to its slot, panicking on stale or foreign handles.
    pub(crate) fn resolve(&self, id: EntryId) -> u32 {
        match self.slots.get(id.index as usize) {
            Some(slot) if slot.occupied && slot.generation == id.generation => id.index,
            _ => panic!("stale map entry handle {id:?}"),
        }
    }

    /// Map a handle to its slot if it is still live.
    pub(crate) fn try_resolve(&self, id: EntryId) -> Option<u32> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.occupied && slot.generation == id.generation)
            .map(|_| id.index)
    }

    #[inline]
    pub(crate) fn id_of(&self, index: u32) -> EntryId {
        EntryId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    pub(crate) fn get(&self, id: EntryId) -> &Node {
        self.at(self.resolve(id))
    }

    /// Set the interval of an unlinked record.
    pub(crate) fn set_range(&mut self, id: EntryId, start: DeviceAddress, end: DeviceAddress) {
        let index = self.resolve(id);
        let node = self.at_mut(index);
        assert!(!node.linked, "moving entry {id:?} while it is in the tree");
        node.start = start;
        node.end = end;
    }

    /// Flags do not take part in ordering or augmentation and may change at any time.
    pub(crate) fn set_flags(&mut self, id: EntryId, flags: EntryFlags) {
        let index = self.resolve(id);
        self.at_mut(index).flags = flags;
    }

    /// Insert by `end`. Returns `false`, leaving the tree untouched, if an
    /// entry with the same `end` already exists.
    pub(crate) fn insert(&mut self, id: EntryId) -> bool {
        let index = self.resolve(id);
        assert!(!self.at(index).linked, "entry {id:?} inserted twice");
        let (start, end) = (self.at(index).start, self.at(index).end);
        assert!(start <= end, "inverted entry {start:#x}..{end:#x}");

        let mut parent = None;
        let mut cursor = self.root;
        let mut to_left = false;
        while let Some(c) = cursor {
            let other = self.at(c);
            debug_assert!(
                end <= other.start || other.end <= start || start == end || other.start == other.end,
                "overlapping entries {start:#x}..{end:#x} and {:#x}..{:#x}",
                other.start,
                other.end
            );
            parent = Some(c);
            match end.cmp(&other.end) {
                Ordering::Less => {
                    to_left = true;
                    cursor = other.left;
                }
                Ordering::Greater => {
                    to_left = false;
                    cursor = other.right;
                }
                Ordering::Equal => return false,
            }
        }

        {
            let node = self.at_mut(index);
            node.parent = parent;
            node.left = None;
            node.right = None;
            node.color = Color::Red;
            node.linked = true;
        }
        match parent {
            None => self.root = Some(index),
            Some(p) if to_left => self.at_mut(p).left = Some(index),
            Some(p) => self.at_mut(p).right = Some(index),
        }
        self.linked += 1;

        self.augment_to_root(Some(index));
        self.insert_fixup(index);
        true
    }

    /// Unlink by identity.
    pub(crate) fn remove(&mut self, id: EntryId) {
        let z = self.resolve(id);
        assert!(self.at(z).linked, "removing entry {id:?} that is not in the tree");
        let Node {
            left: z_left,
            right: z_right,
            parent: z_parent,
            color: z_color,
            ..
        } = *self.at(z);

        let mut removed_color = z_color;
        let x;
        let x_parent;
        match (z_left, z_right) {
            (None, _) => {
                x = z_right;
                x_parent = z_parent;
                self.transplant(z, z_right);
            }
            (Some(_), None) => {
                x = z_left;
                x_parent = z_parent;
                self.transplant(z, z_left);
            }
            (Some(zl), Some(zr)) => {
                let y = self.minimum(zr);
                removed_color = self.at(y).color;
                x = self.at(y).right;
                if self.at(y).parent == Some(z) {
                    x_parent = Some(y);
                } else {
                    x_parent = self.at(y).parent;
                    self.transplant(y, x);
                    self.at_mut(y).right = Some(zr);
                    self.at_mut(zr).parent = Some(y);
                }
                self.transplant(z, Some(y));
                self.at_mut(y).left = Some(zl);
                self.at_mut(zl).parent = Some(y);
                self.at_mut(y).color = z_color;
            }
        }

        {
            let node = self.at_mut(z);
            node.parent = None;
            node.left = None;
            node.right = None;
            node.linked = false;
        }
        self.linked -= 1;

        // `x_parent` is the lowest node whose subtree changed.
        self.augment_to_root(x_parent);
        if removed_color == Color::Black {
            self.remove_fixup(x, x_parent);
        }
    }

    /// Smallest entry whose `end` is at least `end`.
    pub(crate) fn lower_bound(&self, end: DeviceAddress) -> Option<u32> {
        let mut cursor = self.root;
        let mut found = None;
        while let Some(c) = cursor {
            if self.at(c).end >= end {
                found = Some(c);
                cursor = self.at(c).left;
            } else {
                cursor = self.at(c).right;
            }
        }
        found
    }

    pub(crate) fn first_entry(&self) -> Option<u32> {
        self.root.map(|r| self.minimum(r))
    }

    pub(crate) fn last_entry(&self) -> Option<u32> {
        self.root.map(|r| self.maximum(r))
    }

    /// In-order predecessor.
    pub(crate) fn prev(&self, index: u32) -> Option<u32> {
        if let Some(l) = self.at(index).left {
            return Some(self.maximum(l));
        }
        let mut child = index;
        let mut parent = self.at(index).parent;
        while let Some(p) = parent {
            if self.at(p).right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.at(p).parent;
        }
        None
    }

    /// In-order successor.
    pub(crate) fn next(&self, index: u32) -> Option<u32> {
        if let Some(r) = self.at(index).right {
            return Some(self.minimum(r));
        }
        let mut child = index;
        let mut parent = self.at(index).parent;
        while let Some(p) = parent {
            if self.at(p).left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.at(p).parent;
        }
        None
    }

    /// Linked slots in address order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let mut cursor = self.first_entry();
        core::iter::from_fn(move || {
            let current = cursor?;
            cursor = self.next(current);
            Some(current)
        })
    }

    /// Every occupied slot, linked or not.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn occupied(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.occupied)
            .map(|(index, slot)| EntryId {
                index: index as u32,
                generation: slot.generation,
            })
    }

    fn minimum(&self, mut index: u32) -> u32 {
        while let Some(l) = self.at(index).left {
            index = l;
        }
        index
    }

    fn maximum(&self, mut index: u32) -> u32 {
        while let Some(r) = self.at(index).right {
            index = r;
        }
        index
    }

    /// Recompute `first`, `last` and `free_down` of one node from its children.
    fn augment(&mut self, index: u32) {
        let node = *self.at(index);
        let mut free_down = 0;
        let first = match node.left {
            Some(l) => {
                let child = self.at(l);
                debug_assert!(child.last <= node.start);
                free_down = free_down
                    .max(child.free_down)
                    .max(node.start.saturating_sub(child.last));
                child.first
            }
            None => node.start,
        };
        let last = match node.right {
            Some(r) => {
                let child = self.at(r);
                debug_assert!(node.end <= child.first);
                free_down = free_down
                    .max(child.free_down)
                    .max(child.first.saturating_sub(node.end));
                child.last
            }
            None => node.end,
        };
        let node = self.at_mut(index);
        node.first = first;
        node.last = last;
        node.free_down = free_down;
    }

    fn augment_to_root(&mut self, from: Option<u32>) {
        let mut cursor = from;
        while let Some(c) = cursor {
            self.augment(c);
            cursor = self.at(c).parent;
        }
    }

    fn replace_child(&mut self, parent: Option<u32>, old: u32, new: Option<u32>) {
        match parent {
            None => self.root = new,
            Some(p) if self.at(p).left == Some(old) => self.at_mut(p).left = new,
            Some(p) => self.at_mut(p).right = new,
        }
    }

    fn transplant(&mut self, old: u32, new: Option<u32>) {
        let parent = self.at(old).parent;
        self.replace_child(parent, old, new);
        if let Some(n) = new {
            self.at_mut(n).parent = parent;
        }
    }

    // Rotations keep the subtree content of the pair's parent unchanged, so
    // recomputing the two rotated nodes is enough.
    fn rotate_left(&mut self, x: u32) {
        let Some(y) = self.at(x).right else {
            return;
        };
        let inner = self.at(y).left;
        self.at_mut(x).right = inner;
        if let Some(b) = inner {
            self.at_mut(b).parent = Some(x);
        }
        self.transplant(x, Some(y));
        self.at_mut(y).left = Some(x);
        self.at_mut(x).parent = Some(y);
        self.augment(x);
        self.augment(y);
    }

    fn rotate_right(&mut self, x: u32) {
        let Some(y) = self.at(x).left else {
            return;
        };
        let inner = self.at(y).right;
        self.at_mut(x).left = inner;
        if let Some(b) = inner {
            self.at_mut(b).parent = Some(x);
        }
        self.transplant(x, Some(y));
        self.at_mut(y).right = Some(x);
        self.at_mut(x).parent = Some(y);
        self.augment(x);
        self.augment(y);
    }

    #[inline]
    fn is_red(&self, index: Option<u32>) -> bool {
        index.is_some_and(|i| self.at(i).color == Color::Red)
    }

    #[inline]
    fn paint(&mut self, index: Option<u32>, color: Color) {
        if let Some(i) = index {
            self.at_mut(i).color = color;
        }
    }

    fn insert_fixup(&mut self, mut z: u32) {
        loop {
            let Some(p) = self.at(z).parent else { break };
            if !self.is_red(Some(p)) {
                break;
            }
            // A red parent is never the root, so the grandparent exists.
            let Some(g) = self.at(p).parent else { break };
            if self.at(g).left == Some(p) {
                let uncle = self.at(g).right;
                if self.is_red(uncle) {
                    self.paint(Some(p), Color::Black);
                    self.paint(uncle, Color::Black);
                    self.paint(Some(g), Color::Red);
                    z = g;
                    continue;
                }
                if self.at(p).right == Some(z) {
                    z = p;
                    self.rotate_left(z);
                }
                let Some(p) = self.at(z).parent else { break };
                let Some(g) = self.at(p).parent else { break };
                self.paint(Some(p), Color::Black);
                self.paint(Some(g), Color::Red);
                self.rotate_right(g);
            } else {
                let uncle = self.at(g).left;
                if self.is_red(uncle) {
                    self.paint(Some(p), Color::Black);
                    self.paint(uncle, Color::Black);
                    self.paint(Some(g), Color::Red);
                    z = g;
                    continue;
                }
                if self.at(p).left == Some(z) {
                    z = p;
                    self.rotate_right(z);
                }
                let Some(p) = self.at(z).parent else { break };
                let Some(g) = self.at(p).parent else { break };
                self.paint(Some(p), Color::Black);
                self.paint(Some(g), Color::Red);
                self.rotate_left(g);
            }
        }
        self.paint(self.root, Color::Black);
    }

    fn remove_fixup(&mut self, mut x: Option<u32>, mut parent: Option<u32>) {
        while x != self.root && !self.is_red(x) {
            let Some(p) = parent else { break };
            if self.at(p).left == x {
                let Some(mut w) = self.at(p).right else { break };
                if self.is_red(Some(w)) {
                    self.paint(Some(w), Color::Black);
                    self.paint(Some(p), Color::Red);
                    self.rotate_left(p);
                    let Some(sibling) = self.at(p).right else { break };
                    w = sibling;
                }
                if !self.is_red(self.at(w).left) && !self.is_red(self.at(w).right) {
                    self.paint(Some(w), Color::Red);
                    x = Some(p);
                    parent = self.at(p).parent;
                } else {
                    if !self.is_red(self.at(w).right) {
                        self.paint(self.at(w).left, Color::Black);
                        self.paint(Some(w), Color::Red);
                        self.rotate_right(w);
                        let Some(sibling) = self.at(p).right else { break };
                        w = sibling;
                    }
                    let color = self.at(p).color;
                    self.paint(Some(w), color);
                    self.paint(Some(p), Color::Black);
                    self.paint(self.at(w).right, Color::Black);
                    self.rotate_left(p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let Some(mut w) = self.at(p).left else { break };
                if self.is_red(Some(w)) {
                    self.paint(Some(w), Color::Black);
                    self.paint(Some(p), Color::Red);
                    self.rotate_right(p);
                    let Some(sibling) = self.at(p).left else { break };
                    w = sibling;
                }
                if !self.is_red(self.at(w).left) && !self.is_red(self.at(w).right) {
                    self.paint(Some(w), Color::Red);
                    x = Some(p);
                    parent = self.at(p).parent;
                } else {
                    if !self.is_red(self.at(w).left) {
                        self.paint(self.at(w).right, Color::Black);
                        self.paint(Some(w), Color::Red);
                        self.rotate_left(w);
                        let Some(sibling) = self.at(p).left else { break };
                        w = sibling;
                    }
                    let color = self.at(p).color;
                    self.paint(Some(w), color);
                    self.paint(Some(p), Color::Black);
                    self.paint(self.at(w).left, Color::Black);
                    self.rotate_right(p);
                    x = self.root;
                    parent = None;
                }
            }
        }
        self.paint(x, Color::Black);
    }

    /// Walk the whole tree and recompute every cached field from scratch.
    ///
    /// Panics on the first mismatch, broken link, ordering violation,
    /// overlap, or red-black violation.
    pub(crate) fn check(&self) {
        if let Some(root) = self.root {
            assert_eq!(self.at(root).parent, None, "root has a parent");
            assert_eq!(self.at(root).color, Color::Black, "red root");
            let summary = self.check_subtree(root);
            assert_eq!(summary.count, self.linked, "linked count out of sync");
        } else {
            assert_eq!(self.linked, 0, "empty tree with linked entries");
        }

        let mut previous: Option<&Node> = None;
        for index in self.iter() {
            let node = self.at(index);
            if let Some(prev) = previous {
                assert!(prev.end < node.end, "entries out of order");
                assert!(
                    prev.end <= node.start || prev.start == prev.end || node.start == node.end,
                    "overlapping entries {:#x}..{:#x} and {:#x}..{:#x}",
                    prev.start,
                    prev.end,
                    node.start,
                    node.end
                );
            }
            previous = Some(node);
        }
    }

    fn check_subtree(&self, index: u32) -> Summary {
        let node = self.at(index);
        assert!(node.linked, "unlinked node {index} reachable from root");
        assert!(node.start <= node.end, "inverted entry in tree");

        let left = node.left.map(|l| {
            assert_eq!(self.at(l).parent, Some(index), "broken parent link");
            assert!(!(node.color == Color::Red && self.is_red(Some(l))), "red-red edge");
            self.check_subtree(l)
        });
        let right = node.right.map(|r| {
            assert_eq!(self.at(r).parent, Some(index), "broken parent link");
            assert!(!(node.color == Color::Red && self.is_red(Some(r))), "red-red edge");
            self.check_subtree(r)
        });

        let mut free_down = 0;
        let mut count = 1;
        let first = match &left {
            Some(s) => {
                free_down = free_down.max(s.free_down).max(node.start - s.last);
                count += s.count;
                s.first
            }
            None => node.start,
        };
        let last = match &right {
            Some(s) => {
                free_down = free_down.max(s.free_down).max(s.first - node.end);
                count += s.count;
                s.last
            }
            None => node.end,
        };
        let left_height = left.as_ref().map_or(0, |s| s.black_height);
        let right_height = right.as_ref().map_or(0, |s| s.black_height);
        assert_eq!(left_height, right_height, "unbalanced black height");
        let black_height = left_height;

        assert_eq!(node.first, first, "stale first at {:#x}..{:#x}", node.start, node.end);
        assert_eq!(node.last, last, "stale last at {:#x}..{:#x}", node.start, node.end);
        assert_eq!(
            node.free_down, free_down,
            "stale free_down at {:#x}..{:#x}",
            node.start, node.end
        );

        Summary {
            first,
            last,
            free_down,
            count,
            black_height: black_height + usize::from(node.color == Color::Black),
        }
    }
}

struct Summary {
    first: DeviceAddress,
    last: DeviceAddress,
    free_down: u64,
    count: usize,
    black_height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tree: &mut EntryTree, start: u64, end: u64) -> EntryId {
        let id = tree.alloc();
        tree.set_range(id, start, end);
        id
    }

    fn ranges(tree: &EntryTree) -> Vec<(u64, u64)> {
        tree.iter().map(|i| (tree.at(i).start, tree.at(i).end)).collect()
    }

    #[test]
    fn insert_orders_by_end_and_augments() {
        let mut tree = EntryTree::new();
        for (s, e) in [(0x5000, 0x6000), (0, 0x1000), (0x10000, 0x10000), (0x2000, 0x3000)] {
            let id = entry(&mut tree, s, e);
            assert!(tree.insert(id));
            tree.check();
        }
        assert_eq!(
            ranges(&tree),
            vec![(0, 0x1000), (0x2000, 0x3000), (0x5000, 0x6000), (0x10000, 0x10000)]
        );
        let root = tree.at(tree.root().unwrap());
        assert_eq!(root.first, 0);
        assert_eq!(root.last, 0x10000);
        assert_eq!(root.free_down, 0xA000);
    }

    #[test]
    fn duplicate_end_is_rejected() {
        let mut tree = EntryTree::new();
        let a = entry(&mut tree, 0x1000, 0x2000);
        let b = entry(&mut tree, 0x2000, 0x2000);
        assert!(tree.insert(a));
        assert!(!tree.insert(b));
        assert!(!tree.get(b).is_linked());
        assert_eq!(tree.len(), 1);
        tree.check();
    }

    #[test]
    fn neighbors_and_lower_bound() {
        let mut tree = EntryTree::new();
        let ids: Vec<_> = (0..8u64)
            .map(|i| {
                let id = entry(&mut tree, i * 0x2000, i * 0x2000 + 0x1000);
                assert!(tree.insert(id));
                id
            })
            .collect();
        let third = tree.resolve(ids[3]);
        assert_eq!(tree.prev(third), Some(tree.resolve(ids[2])));
        assert_eq!(tree.next(third), Some(tree.resolve(ids[4])));
        assert_eq!(tree.prev(tree.resolve(ids[0])), None);
        assert_eq!(tree.next(tree.resolve(ids[7])), None);
        assert_eq!(tree.lower_bound(0x7000), Some(third));
        assert_eq!(tree.lower_bound(0x7001), Some(tree.resolve(ids[4])));
        assert_eq!(tree.lower_bound(0x10000), None);
    }

    #[test]
    fn remove_keeps_augmentation_consistent() {
        let mut tree = EntryTree::new();
        let ids: Vec<_> = (0..64u64)
            .map(|i| {
                let id = entry(&mut tree, i * 0x3000, i * 0x3000 + 0x1000);
                assert!(tree.insert(id));
                id
            })
            .collect();
        tree.check();

        // Knock out a scattered half, checking after every step.
        for (n, id) in ids.iter().enumerate() {
            if (n * 7) % 3 == 0 {
                tree.remove(*id);
                tree.check();
            }
        }
        let root = tree.at(tree.root().unwrap());
        assert!(root.free_down >= 0x5000);

        for (n, id) in ids.iter().enumerate() {
            if (n * 7) % 3 != 0 {
                tree.remove(*id);
                tree.check();
            }
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn released_handles_go_stale() {
        let mut tree = EntryTree::new();
        let a = tree.alloc();
        tree.release(a);
        let b = tree.alloc();
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(tree.try_resolve(a).is_none());
        assert!(tree.try_resolve(b).is_some());
    }

    #[test]
    #[should_panic(expected = "stale map entry handle")]
    fn stale_handle_panics() {
        let mut tree = EntryTree::new();
        let a = tree.alloc();
        tree.release(a);
        let _ = tree.get(a);
    }
}
