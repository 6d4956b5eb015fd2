use crate::DeviceAddress;
use crate::mapper::MapError;

/// Recoverable failures of the address-space allocator.
///
/// Invariant violations (duplicate keys, leaked allocations at teardown,
/// stale handles) are not represented here; they panic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GasError {
    /// No free interval satisfies the request in either search pass.
    #[error("no device address space left for the request")]
    OutOfAddressSpace,
    /// The entry pool could not supply a record.
    #[error("out of map entry records")]
    OutOfMemory,
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),
    /// A fixed placement collides with a live allocation.
    #[error("range {start:#x}..{end:#x} conflicts with an existing mapping")]
    Conflict {
        start: DeviceAddress,
        end: DeviceAddress,
    },
    /// The page-table mapper rejected the placed interval.
    #[error("page table mapping failed: {0}")]
    Mapper(#[from] MapError),
}

/// The specific geometry or flag problem behind [`GasError::InvalidArgument`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArgument {
    #[error("start {0:#x} is not page aligned")]
    UnalignedStart(DeviceAddress),
    #[error("end {0:#x} is not page aligned")]
    UnalignedEnd(DeviceAddress),
    #[error("empty or inverted range {start:#x}..{end:#x}")]
    EmptyRange {
        start: DeviceAddress,
        end: DeviceAddress,
    },
    #[error("end {end:#x} is not below the domain ceiling {ceiling:#x}")]
    BeyondCeiling {
        end: DeviceAddress,
        ceiling: DeviceAddress,
    },
    #[error("size {0:#x} is zero or not a page multiple")]
    Size(u64),
    #[error("alignment {0:#x} is not a power of two")]
    Alignment(u64),
    #[error("boundary {0:#x} is not a power of two of at least one page")]
    Boundary(u64),
    #[error("unknown allocation flag bits {0:#x}")]
    UnknownAllocFlags(u32),
    #[error("entry flag bits {0:#x} are reserved to the allocator")]
    EntryFlags(u32),
    #[error("pages slice holds {given} pages, {needed} needed")]
    ShortPageList { given: usize, needed: u64 },
    #[error("domain ceiling {0:#x} is not a page aligned address above the first page")]
    DomainEnd(DeviceAddress),
    #[error("domain is not initialized")]
    NotInitialized,
    #[error("domain is already initialized")]
    AlreadyInitialized,
}
