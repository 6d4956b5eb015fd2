//! Exact placement of firmware-reserved ranges.
//!
//! Firmware tables are known to list overlapping reserved regions. Overlap
//! between two reservations is absorbed by trimming the newcomer; overlap
//! with a live allocation is a conflict.

use alloc::vec::Vec;
use log::{debug, warn};

use crate::constraints::is_page_aligned;
use crate::domain::DomainState;
use crate::entry::MapEntry;
use crate::error::{GasError, InvalidArgument};
use crate::flags::EntryFlags;
use crate::tree::EntryId;
use crate::{DeviceAddress, PAGE_SIZE};

/// Outcome of placing a fixed range.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Placed {
    /// Inserted as `start..end`, possibly trimmed.
    Inserted {
        start: DeviceAddress,
        end: DeviceAddress,
    },
    /// Fully covered by existing reservations; nothing was inserted.
    Absorbed,
}

impl DomainState {
    /// Validate a fixed range against the domain geometry.
    pub(crate) const fn check_region(
        &self,
        start: DeviceAddress,
        end: DeviceAddress,
    ) -> Result<(), InvalidArgument> {
        if !is_page_aligned(start) {
            return Err(InvalidArgument::UnalignedStart(start));
        }
        if !is_page_aligned(end) {
            return Err(InvalidArgument::UnalignedEnd(end));
        }
        if start >= end {
            return Err(InvalidArgument::EmptyRange { start, end });
        }
        // The ceiling placeholder owns the key `self.end`.
        if end >= self.end {
            return Err(InvalidArgument::BeyondCeiling {
                end,
                ceiling: self.end,
            });
        }
        Ok(())
    }

    /// Insert the unlinked record `id` at `[start, end)`.
    ///
    /// With `reservation` set, overlap with existing reservations trims the
    /// range; any other overlap fails with [`GasError::Conflict`]. A
    /// placeholder swallowed by the range is taken out of the tree. Nothing
    /// is modified on error.
    pub(crate) fn alloc_region(
        &mut self,
        id: EntryId,
        mut start: DeviceAddress,
        mut end: DeviceAddress,
        reservation: bool,
    ) -> Result<Placed, GasError> {
        self.check_region(start, end)?;
        let conflict = GasError::Conflict { start, end };

        // The ceiling placeholder always ends at or after any valid range.
        let Some(next) = self.tree.lower_bound(end) else {
            panic!("domain without a ceiling placeholder");
        };
        let prev = self.tree.prev(next);

        if let Some(p) = prev {
            let node = self.tree.at(p);
            if node.end > start && !node.flags.place() {
                if !reservation || !node.flags.rmrr() {
                    return Err(conflict);
                }
                warn!(
                    "reserved range 0x{start:X}..0x{end:X} overlaps 0x{:X}..0x{:X}, trimming",
                    node.start, node.end
                );
                start = node.end;
            }
        }
        let node = self.tree.at(next);
        if node.start < end && !node.flags.place() {
            if !reservation || !node.flags.rmrr() {
                return Err(conflict);
            }
            warn!(
                "reserved range 0x{start:X}..0x{end:X} overlaps 0x{:X}..0x{:X}, trimming",
                node.start, node.end
            );
            end = node.start;
        }
        if end <= start {
            return Ok(Placed::Absorbed);
        }

        // Whatever still overlaps is a placeholder.
        if let Some(p) = prev {
            if self.tree.at(p).end > start {
                let place = self.tree.id_of(p);
                self.tree.remove(place);
            }
        }
        if self.tree.at(next).start < end {
            let place = self.tree.id_of(next);
            self.tree.remove(place);
        }

        self.tree.set_range(id, start, end);
        let inserted = self.tree.insert(id);
        assert!(inserted, "duplicate reserved range 0x{start:X}..0x{end:X}");
        let flags = self.tree.get(id).flags;
        self.tree.set_flags(id, flags.with_rmrr(true));
        Ok(Placed::Inserted { start, end })
    }

    /// Take a reservation out of the tree, restoring any placeholder it had swallowed.
    pub(crate) fn remove_region(&mut self, id: EntryId) {
        let index = self.tree.resolve(id);
        let node = *self.tree.at(index);
        assert!(
            node.is_linked() && node.flags.kind() == EntryFlags::new().with_rmrr(true),
            "freeing non-reserved entry 0x{:X}..0x{:X} as a region",
            node.start,
            node.end
        );
        let prev = self.tree.prev(index);
        let next = self.tree.next(index);
        self.tree.remove(id);
        self.tree.set_flags(id, node.flags.with_rmrr(false));

        if prev.is_none() {
            self.relink_placeholder(self.first_place);
        }
        if next.is_none() {
            self.relink_placeholder(self.last_place);
        }
        debug!("released reserved range 0x{:X}..0x{:X}", node.start, node.end);
    }

    fn relink_placeholder(&mut self, place: Option<EntryId>) {
        if let Some(place) = place {
            if !self.tree.get(place).is_linked() {
                let inserted = self.tree.insert(place);
                assert!(inserted, "placeholder collides with an existing entry");
            }
        }
    }

    /// First free gap inside `[start, end)`.
    pub(crate) fn first_gap(
        &self,
        start: DeviceAddress,
        end: DeviceAddress,
    ) -> Option<(DeviceAddress, DeviceAddress)> {
        let mut cursor = start;
        let mut next = self.tree.lower_bound(start.saturating_add(1));
        let mut prev_end = next
            .and_then(|n| self.tree.prev(n))
            .map(|p| self.tree.at(p).end);
        while let Some(n) = next {
            let node = self.tree.at(n);
            let gap_start = prev_end.map_or(cursor, |e| cursor.max(e));
            let gap_end = end.min(node.start);
            if gap_start < gap_end {
                return Some((gap_start, gap_end));
            }
            if node.start >= end {
                break;
            }
            cursor = cursor.max(node.end);
            prev_end = Some(node.end);
            next = self.tree.next(n);
        }
        None
    }
}

/// Reservations created by [`Domain::reserve_region_extend`](crate::Domain::reserve_region_extend).
pub type Reservations = Vec<MapEntry>;
