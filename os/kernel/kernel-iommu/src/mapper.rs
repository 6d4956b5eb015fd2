//! The page-table side of a domain.
//!
//! The allocator only decides *where* an interval lives. Programming the
//! translation for it is delegated to a [`DomainMapper`], invoked after the
//! domain lock has been dropped.

use crate::flags::EntryFlags;
use crate::{DeviceAddress, PhysicalAddress};

/// Programs translations for a freshly placed interval.
pub trait DomainMapper {
    /// Map `[start, start + len)` onto `pages` (one physical page per
    /// [`PAGE_SIZE`](crate::PAGE_SIZE) of `len`).
    ///
    /// # Errors
    /// Whatever the page-table layer cannot satisfy, e.g. running out of
    /// page-table pages when `can_block` is false.
    fn map(
        &self,
        start: DeviceAddress,
        len: u64,
        pages: &[PhysicalAddress],
        flags: EntryFlags,
        can_block: bool,
    ) -> Result<(), MapError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("out of page table memory")]
    OutOfMemory,
    #[error("page table rejected the mapping")]
    Rejected,
}

/// Mapper for domains whose translations are programmed elsewhere.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoopMapper;

impl DomainMapper for NoopMapper {
    fn map(
        &self,
        _start: DeviceAddress,
        _len: u64,
        _pages: &[PhysicalAddress],
        _flags: EntryFlags,
        _can_block: bool,
    ) -> Result<(), MapError> {
        Ok(())
    }
}

impl<M: DomainMapper + ?Sized> DomainMapper for &M {
    fn map(
        &self,
        start: DeviceAddress,
        len: u64,
        pages: &[PhysicalAddress],
        flags: EntryFlags,
        can_block: bool,
    ) -> Result<(), MapError> {
        (**self).map(start, len, pages, flags, can_block)
    }
}
