//! # IOMMU Guest Address Space
//!
//! Allocator for the device-visible address space of an IOMMU translation
//! domain. Drivers ask for DMA windows that satisfy their engine's
//! addressing limits; the allocator decides where each window lives so the
//! page-table layer can program the translation.
//!
//! ## What you get
//! - A [`Domain`] owning one address space `[0, end)` behind a spin lock.
//! - [`DmaConstraints`] describing alignment, boundary and address windows.
//! - [`EntryFlags`]/[`AllocFlags`] as `u32` bitfields.
//! - Fixed-address reservations for firmware-declared ranges (RMRR).
//! - Pluggable record budgets ([`EntryPool`]) and page-table programming
//!   ([`DomainMapper`]).
//!
//! ## Layout of an address space
//!
//! ```text
//!  0      PAGE_SIZE                                                  end
//!  │ place │ guard │  map  │ guard │ ... │ rmrr │ ... │  map  │ guard │ place (empty)
//!  └───────┘       └───────┘             └──────┘     └───────┘       └──
//! ```
//!
//! Two placeholders pin the ends of the space: `[0, PAGE_SIZE)` keeps page
//! zero out of every DMA window and `[end, end)` marks the ceiling. Every
//! dynamically placed entry (`map`) keeps one unmapped page between itself
//! and its lower neighbour, and one page (plus the caller's `offset`)
//! between its end and the upper neighbour. A device overrunning its buffer
//! therefore faults instead of scribbling over another mapping.
//!
//! ## Search
//!
//! Entries live in a red-black tree keyed by `end`, where every node caches
//! the first and last address of its subtree and the largest gap below it
//! (`free_down`). A request is tried first below `lowaddr` and then at or
//! above `highaddr`; subtrees whose largest gap is too small are skipped.
//!
//! ## Usage
//! ```rust
//! use kernel_iommu::{AllocFlags, DmaConstraints, Domain, EntryFlags, PAGE_SIZE};
//!
//! let domain = Domain::default();
//! domain.init(1 << 36).unwrap();
//!
//! // Firmware says this range must stay identity mapped.
//! let rmrr = domain.reserve_region(0x10_0000, 0x20_0000).unwrap().unwrap();
//!
//! let pages = [0x8000_0000, 0x8000_1000];
//! let entry = domain
//!     .map(
//!         &DmaConstraints::unrestricted().with_boundary(0x1_0000),
//!         2 * PAGE_SIZE,
//!         0,
//!         EntryFlags::new().with_read(true).with_write(true),
//!         AllocFlags::new().with_can_wait(true),
//!         &pages,
//!     )
//!     .unwrap();
//! assert!(!entry.contains(0x10_0000));
//!
//! domain.free_space(entry.id);
//! domain.free_region(rmrr.id);
//! domain.fini();
//! ```
//!
//! ## Locking
//!
//! All tree work happens under the domain's lock and never blocks. The
//! only blocking point is [`EntryPool::acquire`], called before the lock is
//! taken. [`DomainMapper::map`] runs after the lock is released.
//!
//! ## Self-check
//!
//! [`Domain::check_free`] recomputes every cached field from scratch and
//! panics on a mismatch. [`GasConfig::check_free`] (on by default with the
//! `check-free` feature) runs it after every mutation.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod constraints;
mod domain;
mod entry;
mod error;
mod find;
mod flags;
mod mapper;
mod pool;
mod region;
mod tree;

pub use crate::constraints::{DmaConstraints, align_down, align_up, fits_boundary, is_page_aligned};
pub use crate::domain::{Domain, GasConfig};
pub use crate::entry::{MapEntry, PendingEntry};
pub use crate::error::{GasError, InvalidArgument};
pub use crate::flags::{AllocFlags, EntryFlags};
pub use crate::mapper::{DomainMapper, MapError, NoopMapper};
pub use crate::pool::{BoundedPool, EntryPool, UnboundedPool};
pub use crate::region::Reservations;
pub use crate::tree::EntryId;

/// Address as seen by a device behind the IOMMU.
pub type DeviceAddress = u64;

/// Host physical address of a backing page.
pub type PhysicalAddress = u64;

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;
pub const PAGE_MASK: u64 = PAGE_SIZE - 1;
