//! Entry and allocation flag words.
//!
//! Both are plain `u32` bitfields so they can be handed through driver
//! interfaces unchanged and validated bit-by-bit.

use bitfield_struct::bitfield;

/// Flags carried by every map entry.
///
/// Layout (LSB→MSB):
/// - bit 0: `place`, permanent placeholder at either end of the address space
/// - bit 1: `rmrr`, reserved region at a fixed address
/// - bit 2: `map`, dynamically placed allocation
/// - bit 4: `unmapped`, no page-table mapping backs the entry
/// - bit 8: `read`, device may read through the mapping
/// - bit 9: `write`, device may write through the mapping
///
/// Exactly one of `place`, `rmrr` and `map` is set on an entry that lives in
/// a domain tree. A freshly allocated record has none of them.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct EntryFlags {
    pub place: bool,
    pub rmrr: bool,
    pub map: bool,
    #[bits(1)]
    __bit3: u8,
    pub unmapped: bool,
    #[bits(3)]
    __bits5_7: u8,
    pub read: bool,
    pub write: bool,
    #[bits(22)]
    __: u32,
}

impl EntryFlags {
    const KIND_MASK: u32 = Self::new()
        .with_place(true)
        .with_rmrr(true)
        .with_map(true)
        .into_bits();

    /// Bits a caller may request when mapping; the kind bits belong to the allocator.
    const CALLER_MASK: u32 = Self::new()
        .with_unmapped(true)
        .with_read(true)
        .with_write(true)
        .into_bits();

    /// Placeholder flags: `place | unmapped`.
    #[inline]
    #[must_use]
    pub const fn placeholder() -> Self {
        Self::new().with_place(true).with_unmapped(true)
    }

    /// Only the kind bits (`place`, `rmrr`, `map`).
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Self {
        Self::from_bits(self.into_bits() & Self::KIND_MASK)
    }

    /// No kind bit set, i.e. the record carries no tree responsibility.
    #[inline]
    #[must_use]
    pub const fn is_pristine(self) -> bool {
        self.into_bits() & Self::KIND_MASK == 0
    }

    /// Whether every set bit may be supplied by a caller.
    #[inline]
    #[must_use]
    pub const fn is_caller_settable(self) -> bool {
        self.into_bits() & !Self::CALLER_MASK == 0
    }

    /// Merge the caller-settable bits of `other` into `self`.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::from_bits(self.into_bits() | other.into_bits())
    }
}

/// Flags steering a single allocation request.
///
/// Layout (LSB→MSB):
/// - bit 0: `can_wait`, the entry pool may block
/// - bit 1: `can_split`, an oversized request may be cut at a DMA boundary
/// - bit 2: `rmrr`, the request is a firmware reservation and may overlap
///   other reservations
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct AllocFlags {
    pub can_wait: bool,
    pub can_split: bool,
    pub rmrr: bool,
    #[bits(29)]
    __: u32,
}

impl AllocFlags {
    /// Flags accepted by [`Domain::map`](crate::Domain::map).
    pub const MAP_MASK: u32 = Self::new()
        .with_can_wait(true)
        .with_can_split(true)
        .into_bits();

    /// Flags accepted by [`Domain::map_region`](crate::Domain::map_region).
    pub const REGION_MASK: u32 = Self::new()
        .with_can_wait(true)
        .with_rmrr(true)
        .into_bits();

    /// Whether all set bits are contained in `mask`.
    #[inline]
    #[must_use]
    pub const fn only(self, mask: u32) -> bool {
        self.into_bits() & !mask == 0
    }
}
