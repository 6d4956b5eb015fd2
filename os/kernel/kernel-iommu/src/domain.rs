//! A translation domain's device address space.
//!
//! The domain owns the entry tree and serializes every operation on it with
//! one spin lock. Record accounting against the [`EntryPool`] and calls into
//! the [`DomainMapper`] happen outside the lock.

use alloc::vec::Vec;
use log::{debug, trace};
use spin::Mutex;

use crate::constraints::{DmaConstraints, is_page_aligned};
use crate::entry::{MapEntry, PendingEntry};
use crate::error::{GasError, InvalidArgument};
use crate::find::{Request, find_space};
use crate::flags::{AllocFlags, EntryFlags};
use crate::mapper::{DomainMapper, NoopMapper};
use crate::pool::{EntryPool, UnboundedPool};
use crate::region::{Placed, Reservations};
use crate::tree::{EntryId, EntryTree};
use crate::{DeviceAddress, PAGE_SHIFT, PAGE_SIZE, PhysicalAddress};

/// Runtime knobs of a domain.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GasConfig {
    /// Walk the whole tree after every mutation and panic on inconsistency.
    pub check_free: bool,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            check_free: cfg!(feature = "check-free"),
        }
    }
}

/// Everything guarded by the domain lock.
#[derive(Debug)]
pub(crate) struct DomainState {
    pub(crate) tree: EntryTree,
    pub(crate) end: DeviceAddress,
    pub(crate) first_place: Option<EntryId>,
    pub(crate) last_place: Option<EntryId>,
    /// Live records, linked or not.
    pub(crate) entries_cnt: usize,
}

impl DomainState {
    pub(crate) const fn new() -> Self {
        Self {
            tree: EntryTree::new(),
            end: 0,
            first_place: None,
            last_place: None,
            entries_cnt: 0,
        }
    }

    #[inline]
    pub(crate) const fn is_initialized(&self) -> bool {
        self.first_place.is_some()
    }

    pub(crate) fn new_record(&mut self) -> EntryId {
        self.entries_cnt += 1;
        self.tree.alloc()
    }

    pub(crate) fn drop_record(&mut self, id: EntryId) {
        let node = self.tree.get(id);
        assert!(
            !node.flags.map() && !node.flags.rmrr(),
            "freeing entry 0x{:X}..0x{:X} that still carries {:?}",
            node.start,
            node.end,
            node.flags
        );
        self.tree.release(id);
        self.entries_cnt -= 1;
    }

    /// Create and link the two permanent placeholders.
    pub(crate) fn install_placeholders(&mut self, end: DeviceAddress) {
        assert!(self.tree.is_empty(), "placeholders installed into a non-empty tree");
        self.end = end;

        let first = self.new_record();
        self.tree.set_range(first, 0, PAGE_SIZE);
        self.tree.set_flags(first, EntryFlags::placeholder());
        let last = self.new_record();
        self.tree.set_range(last, end, end);
        self.tree.set_flags(last, EntryFlags::placeholder());

        let linked = self.tree.insert(first) && self.tree.insert(last);
        assert!(linked, "placeholders collide");
        self.first_place = Some(first);
        self.last_place = Some(last);
    }

    fn require_initialized(&self) -> Result<(), InvalidArgument> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(InvalidArgument::NotInitialized)
        }
    }

    fn snapshot(&self, id: EntryId) -> MapEntry {
        MapEntry::from_node(id, self.tree.get(id))
    }
}

/// Device address-space allocator of one IOMMU translation domain.
///
/// # Example
/// ```
/// use kernel_iommu::{AllocFlags, DmaConstraints, Domain, EntryFlags, PAGE_SIZE};
///
/// let domain = Domain::default();
/// domain.init(1 << 39).unwrap();
///
/// let entry = domain
///     .map(
///         &DmaConstraints::dma32(),
///         4 * PAGE_SIZE,
///         0,
///         EntryFlags::new().with_read(true).with_unmapped(true),
///         AllocFlags::new().with_can_wait(true),
///         &[],
///     )
///     .unwrap();
/// assert!(entry.end <= 0xFFFF_FFFF);
///
/// domain.free_space(entry.id);
/// domain.fini();
/// ```
pub struct Domain<P: EntryPool = UnboundedPool, M: DomainMapper = NoopMapper> {
    pool: P,
    mapper: M,
    config: GasConfig,
    state: Mutex<DomainState>,
}

impl Default for Domain {
    fn default() -> Self {
        Self::new(UnboundedPool, NoopMapper)
    }
}

impl<P: EntryPool, M: DomainMapper> Domain<P, M> {
    /// An empty, uninitialized domain.
    pub fn new(pool: P, mapper: M) -> Self {
        Self::with_config(pool, mapper, GasConfig::default())
    }

    pub fn with_config(pool: P, mapper: M, config: GasConfig) -> Self {
        Self {
            pool,
            mapper,
            config,
            state: Mutex::new(DomainState::new()),
        }
    }

    pub const fn pool(&self) -> &P {
        &self.pool
    }

    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Address ceiling; zero before [`init`](Self::init).
    pub fn end(&self) -> DeviceAddress {
        self.state.lock().end
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().is_initialized()
    }

    /// Live records, including pending ones and unlinked placeholders.
    pub fn entry_count(&self) -> usize {
        self.state.lock().entries_cnt
    }

    /// Snapshot of a live entry, `None` once it has been freed.
    pub fn entry(&self, id: EntryId) -> Option<MapEntry> {
        let state = self.state.lock();
        state
            .tree
            .try_resolve(id)
            .map(|index| MapEntry::from_node(id, state.tree.at(index)))
    }

    /// All entries in the tree, in address order.
    pub fn entries(&self) -> Vec<MapEntry> {
        let state = self.state.lock();
        state
            .tree
            .iter()
            .map(|index| MapEntry::from_node(state.tree.id_of(index), state.tree.at(index)))
            .collect()
    }

    /// Set up the address space `[0, end)` with its two placeholders.
    ///
    /// # Errors
    /// - [`InvalidArgument::DomainEnd`] if `end` is unaligned or not above the first page.
    /// - [`InvalidArgument::AlreadyInitialized`] on a second call.
    /// - [`GasError::OutOfMemory`] if the pool cannot supply the placeholders.
    pub fn init(&self, end: DeviceAddress) -> Result<(), GasError> {
        if !is_page_aligned(end) || end <= PAGE_SIZE {
            return Err(InvalidArgument::DomainEnd(end).into());
        }
        self.acquire(true)?;
        if let Err(e) = self.acquire(true) {
            self.pool.release();
            return Err(e);
        }

        let mut state = self.state.lock();
        if state.is_initialized() {
            drop(state);
            self.pool.release();
            self.pool.release();
            return Err(InvalidArgument::AlreadyInitialized.into());
        }
        assert_eq!(state.entries_cnt, 0, "dirty domain");
        state.install_placeholders(end);
        self.maybe_check(&state);
        debug!("domain initialized, ceiling 0x{end:X}");
        Ok(())
    }

    /// Tear the address space down.
    ///
    /// Reservations and placeholders are released. Panics if a live
    /// allocation or an unreturned pending record remains, since either
    /// means a caller leaked device address space.
    pub fn fini(&self) {
        let mut state = self.state.lock();
        assert!(state.is_initialized(), "finalizing an uninitialized domain");

        let mut records = 0;
        for index in state.tree.iter() {
            let node = state.tree.at(index);
            assert!(
                !node.flags.map(),
                "domain torn down with live mapping 0x{:X}..0x{:X}",
                node.start,
                node.end
            );
            records += 1;
        }
        let places = [state.first_place, state.last_place];
        records += places
            .iter()
            .flatten()
            .filter(|&&id| !state.tree.get(id).is_linked())
            .count();
        assert_eq!(
            state.entries_cnt, records,
            "domain torn down with pending entry records"
        );

        let linked: Vec<EntryId> = state.tree.iter().map(|i| state.tree.id_of(i)).collect();
        for id in linked {
            state.tree.remove(id);
            let flags = state.tree.get(id).flags;
            state.tree.set_flags(id, flags.with_rmrr(false).with_place(false));
            state.drop_record(id);
        }
        for id in places.into_iter().flatten() {
            if state.tree.try_resolve(id).is_some() {
                state.tree.set_flags(id, EntryFlags::new());
                state.drop_record(id);
            }
        }
        state.first_place = None;
        state.last_place = None;
        assert_eq!(state.entries_cnt, 0, "leaked entry records");
        drop(state);

        for _ in 0..records {
            self.pool.release();
        }
        debug!("domain finalized, released {records} entries");
    }

    /// Take a bare record for a later [`map_region`](Self::map_region).
    ///
    /// # Errors
    /// [`GasError::OutOfMemory`] if the pool is exhausted and `can_wait` is false.
    pub fn alloc_entry(&self, can_wait: bool) -> Result<PendingEntry, GasError> {
        self.acquire(can_wait)?;
        let id = self.state.lock().new_record();
        Ok(PendingEntry::new(id))
    }

    /// Return a record that was never placed.
    pub fn free_entry(&self, entry: PendingEntry) {
        self.release_record(entry.id);
    }

    /// Place `size` bytes anywhere the constraints allow and map them onto `pages`.
    ///
    /// `offset` is the number of bytes of the caller's object in front of
    /// the placed interval; it counts for the boundary test and the trailing
    /// guard page. With `can_split`, an interval that would straddle a
    /// boundary may come back shorter than `size`.
    ///
    /// Unless `entry_flags` has `unmapped`, the mapper is called with the
    /// first `len / PAGE_SIZE` pages; if it fails, the placement is undone.
    ///
    /// # Errors
    /// - [`GasError::InvalidArgument`] for unknown flags, reserved entry flags,
    ///   bad constraints, a size that is not a page multiple, or too few pages.
    /// - [`GasError::OutOfMemory`] if no record is available.
    /// - [`GasError::OutOfAddressSpace`] if neither search pass finds room.
    /// - [`GasError::Mapper`] if the mapper fails.
    pub fn map(
        &self,
        constraints: &DmaConstraints,
        size: u64,
        offset: u64,
        entry_flags: EntryFlags,
        flags: AllocFlags,
        pages: &[PhysicalAddress],
    ) -> Result<MapEntry, GasError> {
        if !flags.only(AllocFlags::MAP_MASK) {
            return Err(InvalidArgument::UnknownAllocFlags(flags.into_bits()).into());
        }
        if !entry_flags.is_caller_settable() {
            return Err(InvalidArgument::EntryFlags(entry_flags.into_bits()).into());
        }
        constraints.validate()?;
        if size == 0 || !is_page_aligned(size) {
            return Err(InvalidArgument::Size(size).into());
        }
        if !entry_flags.unmapped() {
            check_pages(pages, size)?;
        }

        self.acquire(flags.can_wait())?;
        let mut state = self.state.lock();
        let placed = state.require_initialized().map_err(GasError::from).and_then(|()| {
            let request = Request {
                size,
                offset,
                constraints: *constraints,
                can_split: flags.can_split(),
                ceiling: state.end,
            };
            find_space(&state.tree, &request).ok_or(GasError::OutOfAddressSpace)
        });
        let placement = match placed {
            Ok(placement) => placement,
            Err(e) => {
                drop(state);
                self.pool.release();
                return Err(e);
            }
        };

        let id = state.new_record();
        state.tree.set_range(id, placement.start, placement.end());
        let inserted = state.tree.insert(id);
        assert!(
            inserted,
            "placement 0x{:X}..0x{:X} collides with an existing entry",
            placement.start,
            placement.end()
        );
        debug_assert!(placement.end() < state.end);
        state.tree.set_flags(id, entry_flags.with_map(true));
        self.maybe_check(&state);
        let entry = state.snapshot(id);
        drop(state);

        trace!(
            "placed 0x{:X}..0x{:X} (size 0x{size:X}, offset 0x{offset:X})",
            entry.start, entry.end
        );
        self.map_pages(entry, pages, flags.can_wait())?;
        Ok(entry)
    }

    /// Place a pending record at its exact range and map it onto `pages`.
    ///
    /// With the `rmrr` allocation flag, overlap with existing reservations
    /// trims the range and `pages` are consumed from the trimmed start.
    /// Returns `None` if nothing was left to place; the record is freed in
    /// that case and on error.
    ///
    /// # Errors
    /// - [`GasError::InvalidArgument`] for unknown flags or malformed geometry.
    /// - [`GasError::Conflict`] on overlap with a live allocation.
    /// - [`GasError::Mapper`] if the mapper fails.
    pub fn map_region(
        &self,
        entry: PendingEntry,
        entry_flags: EntryFlags,
        flags: AllocFlags,
        pages: &[PhysicalAddress],
    ) -> Result<Option<MapEntry>, GasError> {
        let (id, start, end) = (entry.id, entry.start, entry.end);
        let validated = if !flags.only(AllocFlags::REGION_MASK) {
            Err(InvalidArgument::UnknownAllocFlags(flags.into_bits()).into())
        } else if !entry_flags.is_caller_settable() {
            Err(InvalidArgument::EntryFlags(entry_flags.into_bits()).into())
        } else if !entry_flags.unmapped() && end > start {
            check_pages(pages, end - start)
        } else {
            Ok(())
        };
        if let Err(e) = validated {
            self.release_record(id);
            return Err(e);
        }

        let mut state = self.state.lock();
        assert!(state.tree.get(id).flags.is_pristine(), "reused entry {id:?}");
        let placed = state
            .require_initialized()
            .map_err(GasError::from)
            .and_then(|()| state.alloc_region(id, start, end, flags.rmrr()));
        let entry = match placed {
            Ok(Placed::Inserted { .. }) => {
                let flags = state.tree.get(id).flags;
                state.tree.set_flags(id, flags.union(entry_flags));
                self.maybe_check(&state);
                state.snapshot(id)
            }
            Ok(Placed::Absorbed) => {
                state.drop_record(id);
                drop(state);
                self.pool.release();
                return Ok(None);
            }
            Err(e) => {
                state.drop_record(id);
                drop(state);
                self.pool.release();
                return Err(e);
            }
        };
        drop(state);

        debug!("placed region 0x{:X}..0x{:X}", entry.start, entry.end);
        let skipped = usize::try_from((entry.start - start) >> PAGE_SHIFT).unwrap_or(usize::MAX);
        self.map_pages(entry, pages.get(skipped..).unwrap_or(&[]), flags.can_wait())?;
        Ok(Some(entry))
    }

    /// Reserve `[start, end)` so the finder never places there.
    ///
    /// The reservation is unmapped. Overlap with earlier reservations trims
    /// it; `None` means it was already fully reserved.
    ///
    /// # Errors
    /// - [`GasError::InvalidArgument`] for malformed geometry.
    /// - [`GasError::Conflict`] on overlap with a live allocation.
    pub fn reserve_region(
        &self,
        start: DeviceAddress,
        end: DeviceAddress,
    ) -> Result<Option<MapEntry>, GasError> {
        let entry = self.alloc_entry(true)?.with_range(start, end);
        self.map_region(
            entry,
            EntryFlags::new().with_unmapped(true),
            AllocFlags::new().with_can_wait(true).with_rmrr(true),
            &[],
        )
    }

    /// Reserve every free gap inside `[start, end)`, leaving existing entries alone.
    ///
    /// `end` is clamped to the last page below the domain ceiling. Returns
    /// the reservations made.
    ///
    /// # Errors
    /// [`GasError::InvalidArgument`] for an unaligned or empty range,
    /// [`GasError::OutOfMemory`] if the pool runs dry midway (reservations
    /// made so far are kept).
    pub fn reserve_region_extend(
        &self,
        start: DeviceAddress,
        end: DeviceAddress,
    ) -> Result<Reservations, GasError> {
        if !is_page_aligned(start) {
            return Err(InvalidArgument::UnalignedStart(start).into());
        }
        if !is_page_aligned(end) {
            return Err(InvalidArgument::UnalignedEnd(end).into());
        }
        if start >= end {
            return Err(InvalidArgument::EmptyRange { start, end }.into());
        }

        let mut reserved = Vec::new();
        let mut cursor = start;
        loop {
            self.acquire(true)?;
            let mut state = self.state.lock();
            if let Err(e) = state.require_initialized() {
                drop(state);
                self.pool.release();
                return Err(e.into());
            }
            let end = end.min(state.end - PAGE_SIZE);
            let Some((gap_start, gap_end)) = state.first_gap(cursor, end) else {
                drop(state);
                self.pool.release();
                break;
            };

            let id = state.new_record();
            let placed = state.alloc_region(id, gap_start, gap_end, true);
            assert_eq!(
                placed,
                Ok(Placed::Inserted {
                    start: gap_start,
                    end: gap_end
                }),
                "free gap could not be reserved"
            );
            let flags = state.tree.get(id).flags;
            state.tree.set_flags(id, flags.with_unmapped(true));
            self.maybe_check(&state);
            reserved.push(state.snapshot(id));
            cursor = gap_end;
        }
        debug!(
            "reserved {} gaps in 0x{start:X}..0x{end:X}",
            reserved.len()
        );
        Ok(reserved)
    }

    /// Release an allocation made by [`map`](Self::map).
    ///
    /// Panics if `id` is stale or not a live allocation.
    pub fn free_space(&self, id: EntryId) {
        let mut state = self.state.lock();
        let node = *state.tree.get(id);
        assert!(
            node.is_linked() && node.flags.kind() == EntryFlags::new().with_map(true),
            "freeing non-allocated entry 0x{:X}..0x{:X} as space",
            node.start,
            node.end
        );
        state.tree.remove(id);
        state.tree.set_flags(id, node.flags.with_map(false));
        state.drop_record(id);
        self.maybe_check(&state);
        drop(state);

        self.pool.release();
        trace!("freed 0x{:X}..0x{:X}", node.start, node.end);
    }

    /// Release a reservation.
    ///
    /// If it covered the very start of the address space, the placeholder
    /// there is put back. Panics if `id` is stale or not a reservation.
    pub fn free_region(&self, id: EntryId) {
        let mut state = self.state.lock();
        state.remove_region(id);
        state.drop_record(id);
        self.maybe_check(&state);
        drop(state);
        self.pool.release();
    }

    /// Verify every cached subtree field against a from-scratch walk.
    ///
    /// Panics on the first inconsistency.
    pub fn check_free(&self) {
        let state = self.state.lock();
        state.tree.check();
        assert_eq!(
            state.tree.occupied().count(),
            state.entries_cnt,
            "entry count out of sync"
        );
        if state.is_initialized() {
            let top = state.tree.last_entry().map(|i| state.tree.at(i).end);
            assert_eq!(top, Some(state.end), "ceiling placeholder is not the last entry");
        }
    }

    fn maybe_check(&self, state: &DomainState) {
        if self.config.check_free {
            state.tree.check();
        }
    }

    fn acquire(&self, can_wait: bool) -> Result<(), GasError> {
        if self.pool.acquire(can_wait) {
            Ok(())
        } else {
            Err(GasError::OutOfMemory)
        }
    }

    fn release_record(&self, id: EntryId) {
        let mut state = self.state.lock();
        assert!(!state.tree.get(id).is_linked(), "freeing placed entry {id:?}");
        state.drop_record(id);
        drop(state);
        self.pool.release();
    }

    /// Program the page tables for a fresh entry, undoing the placement on failure.
    fn map_pages(
        &self,
        entry: MapEntry,
        pages: &[PhysicalAddress],
        can_wait: bool,
    ) -> Result<(), GasError> {
        if entry.flags.unmapped() {
            return Ok(());
        }
        let count = usize::try_from(entry.len() >> PAGE_SHIFT).unwrap_or(usize::MAX);
        let pages = pages.get(..count).unwrap_or(pages);
        let Err(e) = self
            .mapper
            .map(entry.start, entry.len(), pages, entry.flags, can_wait)
        else {
            return Ok(());
        };

        let mut state = self.state.lock();
        if entry.flags.rmrr() {
            state.remove_region(entry.id);
        } else {
            state.tree.remove(entry.id);
        }
        state.tree.set_flags(entry.id, EntryFlags::new());
        state.drop_record(entry.id);
        self.maybe_check(&state);
        drop(state);
        self.pool.release();
        debug!(
            "mapping 0x{:X}..0x{:X} failed: {e}",
            entry.start, entry.end
        );
        Err(e.into())
    }
}

fn check_pages(pages: &[PhysicalAddress], len: u64) -> Result<(), GasError> {
    let needed = len >> PAGE_SHIFT;
    if (pages.len() as u64) < needed {
        return Err(InvalidArgument::ShortPageList {
            given: pages.len(),
            needed,
        }
        .into());
    }
    Ok(())
}
