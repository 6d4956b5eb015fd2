use core::fmt;

use crate::DeviceAddress;
use crate::flags::EntryFlags;
use crate::tree::{EntryId, Node};

/// Snapshot of a map entry, detached from the domain lock.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct MapEntry {
    pub id: EntryId,
    pub start: DeviceAddress,
    pub end: DeviceAddress,
    pub flags: EntryFlags,
}

impl MapEntry {
    pub(crate) const fn from_node(id: EntryId, node: &Node) -> Self {
        Self {
            id,
            start: node.start,
            end: node.end,
            flags: node.flags,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, addr: DeviceAddress) -> bool {
        self.start <= addr && addr < self.end
    }
}

impl fmt::Debug for MapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MapEntry(#{} 0x{:X}..0x{:X} {:#06x})",
            self.id.index(),
            self.start,
            self.end,
            self.flags.into_bits()
        )
    }
}

/// A bare record obtained from [`Domain::alloc_entry`](crate::Domain::alloc_entry).
///
/// It must be consumed by [`Domain::map_region`](crate::Domain::map_region) or
/// handed back with [`Domain::free_entry`](crate::Domain::free_entry); a
/// dropped token is reported as a leak at domain teardown.
#[must_use = "pending entries must be mapped or freed"]
#[derive(Debug, Eq, PartialEq)]
pub struct PendingEntry {
    pub(crate) id: EntryId,
    pub(crate) start: DeviceAddress,
    pub(crate) end: DeviceAddress,
}

impl PendingEntry {
    pub(crate) const fn new(id: EntryId) -> Self {
        Self { id, start: 0, end: 0 }
    }

    /// Fill in the exact interval to place.
    pub const fn with_range(self, start: DeviceAddress, end: DeviceAddress) -> Self {
        Self { start, end, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntryId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> DeviceAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> DeviceAddress {
        self.end
    }
}
