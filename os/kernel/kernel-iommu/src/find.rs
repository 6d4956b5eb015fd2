//! Constrained free-space search over the augmented entry tree.
//!
//! Two passes, each a recursive descent that prunes subtrees whose
//! `free_down` cannot hold the request:
//!
//! - the **lower** pass places below `lowaddr` (devices with a narrow DMA
//!   window), trying the gap right of a node before descending;
//! - the **upper** pass places at or above `highaddr`, walking gaps in
//!   address order.
//!
//! Every placement leaves a guard page after the previous entry and keeps
//! `end + offset + PAGE_SIZE` clear of the next one.

use crate::constraints::{DmaConstraints, align_down, align_up, fits_boundary};
use crate::tree::EntryTree;
use crate::{DeviceAddress, PAGE_SIZE};

/// A single allocation request, as seen by the finder.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Request {
    pub(crate) size: u64,
    pub(crate) offset: u64,
    pub(crate) constraints: DmaConstraints,
    pub(crate) can_split: bool,
    /// Domain ceiling; bounds the upper pass.
    pub(crate) ceiling: DeviceAddress,
}

/// Where the finder decided to put the request.
///
/// `size` is smaller than requested only if the request was split.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Placement {
    pub(crate) start: DeviceAddress,
    pub(crate) size: u64,
}

impl Placement {
    #[inline]
    pub(crate) const fn end(self) -> DeviceAddress {
        self.start + self.size
    }
}

/// Search both regions. Does not modify the tree.
pub(crate) fn find_space(tree: &EntryTree, request: &Request) -> Option<Placement> {
    let root = tree.root()?;
    let search = Search {
        tree,
        request,
        needed: request
            .size
            .saturating_add(request.offset)
            .saturating_add(PAGE_SIZE),
    };

    if request.constraints.lowaddr > 0 {
        if let Some(placement) = search.lower(root) {
            return Some(placement);
        }
    }
    if request.constraints.highaddr >= request.ceiling {
        return None;
    }
    search.upper(root)
}

struct Search<'a> {
    tree: &'a EntryTree,
    request: &'a Request,
    /// Smallest `free_down` worth descending into.
    needed: u64,
}

impl Search<'_> {
    /// Fit the request into the gap `[beg, end)`, keeping `start + size <= max_addr`.
    fn match_one(
        &self,
        beg: DeviceAddress,
        end: DeviceAddress,
        max_addr: DeviceAddress,
    ) -> Option<Placement> {
        let Request {
            size,
            offset,
            constraints,
            can_split,
            ..
        } = *self.request;
        let guarded = beg.checked_add(PAGE_SIZE)?;
        let start = align_up(guarded, constraints.alignment)?;
        if start.saturating_add(size) > max_addr {
            return None;
        }
        // Trailing guard page.
        if start < guarded || clear_end(start, size, offset) > end {
            return None;
        }

        if fits_boundary(start.saturating_add(offset), size, constraints.boundary) {
            return Some(Placement { start, size });
        }

        // The object crosses a boundary; retry from the next one.
        let boundary = constraints.boundary;
        let bs = align_down(
            start.saturating_add(offset).saturating_add(boundary),
            boundary,
        );
        if let Some(moved) = align_up(bs, constraints.alignment) {
            if clear_end(moved, size, offset) <= end
                && moved.saturating_add(size) <= max_addr
                && fits_boundary(moved.saturating_add(offset), size, boundary)
            {
                return Some(Placement { start: moved, size });
            }
        }

        // Keep the whole pages in front of the boundary; `start + size` already fits.
        if can_split {
            let size = align_down(bs.saturating_sub(start).saturating_sub(offset), PAGE_SIZE);
            if size > 0 {
                return Some(Placement { start, size });
            }
        }
        None
    }

    fn lower(&self, index: u32) -> Option<Placement> {
        let tree = self.tree;
        let node = tree.at(index);
        let lowaddr = self.request.constraints.lowaddr;

        if let Some(right) = node.right {
            if node.end < lowaddr {
                if let Some(p) = self.match_one(node.end, tree.at(right).first, lowaddr) {
                    return Some(p);
                }
            }
        }
        if node.free_down < self.needed || node.first >= lowaddr {
            return None;
        }
        if let Some(left) = node.left {
            if let Some(p) = self.lower(left) {
                return Some(p);
            }
            let child = tree.at(left);
            if child.last < lowaddr {
                if let Some(p) = self.match_one(child.last, node.start, lowaddr) {
                    return Some(p);
                }
            }
        }
        node.right.and_then(|right| self.lower(right))
    }

    fn upper(&self, index: u32) -> Option<Placement> {
        let tree = self.tree;
        let node = tree.at(index);
        let highaddr = self.request.constraints.highaddr;
        let ceiling = self.request.ceiling;
        // Gap starts are entry ends and thus page aligned; keep it that way.
        let floor = align_down(highaddr, PAGE_SIZE);

        if node.free_down < self.needed || node.last < highaddr {
            return None;
        }
        // A gap straddling `highaddr` is usable from `highaddr` on.
        if let Some(left) = node.left {
            if let Some(p) = self.upper(left) {
                return Some(p);
            }
            let child = tree.at(left);
            if node.start > highaddr {
                if let Some(p) = self.match_one(child.last.max(floor), node.start, ceiling) {
                    return Some(p);
                }
            }
        }
        if let Some(right) = node.right {
            let child = tree.at(right);
            if child.first > highaddr {
                if let Some(p) = self.match_one(node.end.max(floor), child.first, ceiling) {
                    return Some(p);
                }
            }
            return self.upper(right);
        }
        None
    }
}

/// First address that must stay unused after a placement at `start`.
#[inline]
const fn clear_end(start: DeviceAddress, size: u64, offset: u64) -> DeviceAddress {
    start
        .saturating_add(size)
        .saturating_add(offset)
        .saturating_add(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::EntryFlags;

    const CEILING: u64 = 1 << 36;

    fn tree_with(entries: &[(u64, u64)]) -> EntryTree {
        let mut tree = EntryTree::new();
        for &(start, end) in [(0, PAGE_SIZE), (CEILING, CEILING)].iter().chain(entries) {
            let id = tree.alloc();
            tree.set_range(id, start, end);
            tree.set_flags(id, EntryFlags::new().with_map(true));
            assert!(tree.insert(id));
        }
        tree
    }

    fn request(size: u64, constraints: DmaConstraints) -> Request {
        Request {
            size,
            offset: 0,
            constraints,
            can_split: false,
            ceiling: CEILING,
        }
    }

    #[test]
    fn empty_domain_places_after_guard_page() {
        let tree = tree_with(&[]);
        let p = find_space(&tree, &request(PAGE_SIZE, DmaConstraints::unrestricted())).unwrap();
        assert_eq!(p, Placement { start: 2 * PAGE_SIZE, size: PAGE_SIZE });
    }

    #[test]
    fn skips_gap_without_room_for_trailing_guard() {
        // [guard][2 pages free][entry]: a 2-page request leaves no trailing guard.
        let tree = tree_with(&[(4 * PAGE_SIZE, 5 * PAGE_SIZE)]);
        let c = DmaConstraints::unrestricted().with_lowaddr(4 * PAGE_SIZE);
        assert_eq!(find_space(&tree, &request(2 * PAGE_SIZE, c)), None);

        let p = find_space(&tree, &request(PAGE_SIZE, c)).unwrap();
        assert_eq!(p.start, 2 * PAGE_SIZE);

        let p = find_space(&tree, &request(2 * PAGE_SIZE, DmaConstraints::unrestricted())).unwrap();
        assert_eq!(p.start, 6 * PAGE_SIZE);
    }

    #[test]
    fn alignment_rounds_start_up() {
        let tree = tree_with(&[]);
        let c = DmaConstraints::unrestricted().with_alignment(0x10_0000);
        let p = find_space(&tree, &request(PAGE_SIZE, c)).unwrap();
        assert_eq!(p.start, 0x10_0000);
    }

    #[test]
    fn boundary_moves_start_to_next_window() {
        let tree = tree_with(&[]);
        let c = DmaConstraints::unrestricted().with_boundary(0x1_0000);
        let p = find_space(&tree, &request(0x1_0000, c)).unwrap();
        assert_eq!(p.start, 0x1_0000);
    }

    #[test]
    fn boundary_split_keeps_leading_part() {
        // The free window below 0xF000 cannot hold the request past the 0x8000 boundary.
        let tree = tree_with(&[(0xF000, 0x1_0000)]);
        let c = DmaConstraints::unrestricted()
            .with_boundary(0x8000)
            .with_lowaddr(0xE000);
        let mut r = request(0x7000, c);
        assert_eq!(find_space(&tree, &r), None);

        r.can_split = true;
        let p = find_space(&tree, &r).unwrap();
        assert_eq!(p, Placement { start: 0x2000, size: 0x6000 });

        // Splitting never rescues a request that overruns the window.
        r.constraints = c.with_lowaddr(0x8000);
        assert_eq!(find_space(&tree, &r), None);
    }

    #[test]
    fn lower_pass_respects_lowaddr() {
        let tree = tree_with(&[]);
        let c = DmaConstraints::unrestricted()
            .with_lowaddr(3 * PAGE_SIZE)
            .with_highaddr(CEILING);
        assert!(find_space(&tree, &request(2 * PAGE_SIZE, c)).is_none());
        let p = find_space(&tree, &request(PAGE_SIZE, c)).unwrap();
        assert_eq!(p.end(), 3 * PAGE_SIZE);
    }

    #[test]
    fn upper_pass_starts_at_highaddr() {
        let tree = tree_with(&[]);
        let c = DmaConstraints::unrestricted()
            .with_lowaddr(0)
            .with_highaddr(0x1_0000_0000);
        let p = find_space(&tree, &request(PAGE_SIZE, c)).unwrap();
        assert_eq!(p.start, 0x1_0000_0000 + PAGE_SIZE);
    }

    #[test]
    fn upper_pass_keeps_unaligned_highaddr_page_aligned() {
        let tree = tree_with(&[]);
        let c = DmaConstraints::unrestricted()
            .with_lowaddr(0)
            .with_highaddr(0xFFFF_FFFF);
        let p = find_space(&tree, &request(PAGE_SIZE, c)).unwrap();
        assert_eq!(p.start % PAGE_SIZE, 0);
        assert!(p.start >= 0xFFFF_FFFF);
        assert_eq!(p.start, 0x1_0000_0000);

        // Past an entry straddling `highaddr`.
        let tree = tree_with(&[(0xFFFF_0000, 0x1_0000_1000)]);
        let p = find_space(&tree, &request(PAGE_SIZE, c)).unwrap();
        assert_eq!(p.start, 0x1_0000_2000);
    }

    #[test]
    fn split_with_offset_stays_inside_boundary() {
        let tree = tree_with(&[(0xF000, 0x1_0000)]);
        let c = DmaConstraints::unrestricted()
            .with_boundary(0x8000)
            .with_lowaddr(0xE000);
        let mut r = request(0x7000, c);
        r.can_split = true;
        r.offset = 0x800;
        let p = find_space(&tree, &r).unwrap();
        assert_eq!(p, Placement { start: 0x2000, size: 0x5000 });
        assert!(fits_boundary(p.start + r.offset, p.size, 0x8000));
    }

    #[test]
    fn offset_is_charged_against_trailing_guard() {
        let tree = tree_with(&[(5 * PAGE_SIZE, 6 * PAGE_SIZE)]);
        let c = DmaConstraints::unrestricted().with_lowaddr(5 * PAGE_SIZE);
        let mut r = request(2 * PAGE_SIZE, c);
        assert_eq!(find_space(&tree, &r).unwrap().start, 2 * PAGE_SIZE);
        r.offset = 0x800;
        assert_eq!(find_space(&tree, &r), None);
    }
}
