//! DMA addressing constraints and the page/boundary arithmetic built on them.

use crate::error::InvalidArgument;
use crate::{DeviceAddress, PAGE_MASK, PAGE_SIZE};

/// Addressing limits of a DMA engine, as carried by a bus DMA tag.
///
/// - `alignment`: every placed `start` is a multiple of it (power of two).
/// - `boundary`: if nonzero, the object `[start + offset, start + offset + size)`
///   must not straddle a multiple of it (power of two, at least one page).
/// - `lowaddr`: addresses up to here form the lower region, searched first.
/// - `highaddr`: addresses from here up to the domain ceiling form the upper
///   region, searched when the lower region has no room.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DmaConstraints {
    pub alignment: u64,
    pub boundary: u64,
    pub lowaddr: DeviceAddress,
    pub highaddr: DeviceAddress,
}

impl Default for DmaConstraints {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl DmaConstraints {
    /// Byte alignment, no boundary, whole address space in the lower region.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            alignment: 1,
            boundary: 0,
            lowaddr: DeviceAddress::MAX,
            highaddr: DeviceAddress::MAX,
        }
    }

    /// Device limited to the 32-bit window, no upper region.
    #[must_use]
    pub const fn dma32() -> Self {
        Self {
            lowaddr: 0xFFFF_FFFF,
            ..Self::unrestricted()
        }
    }

    #[must_use]
    pub const fn with_alignment(self, alignment: u64) -> Self {
        Self { alignment, ..self }
    }

    #[must_use]
    pub const fn with_boundary(self, boundary: u64) -> Self {
        Self { boundary, ..self }
    }

    #[must_use]
    pub const fn with_lowaddr(self, lowaddr: DeviceAddress) -> Self {
        Self { lowaddr, ..self }
    }

    #[must_use]
    pub const fn with_highaddr(self, highaddr: DeviceAddress) -> Self {
        Self { highaddr, ..self }
    }

    /// Reject geometry the finder cannot honor.
    ///
    /// # Errors
    /// [`InvalidArgument::Alignment`] or [`InvalidArgument::Boundary`].
    pub const fn validate(&self) -> Result<(), InvalidArgument> {
        if !self.alignment.is_power_of_two() {
            return Err(InvalidArgument::Alignment(self.alignment));
        }
        if self.boundary != 0 && (!self.boundary.is_power_of_two() || self.boundary < PAGE_SIZE) {
            return Err(InvalidArgument::Boundary(self.boundary));
        }
        Ok(())
    }
}

/// Round `value` up to a multiple of `align` (power of two), `None` on overflow.
#[inline]
#[must_use]
pub const fn align_up(value: u64, align: u64) -> Option<u64> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Round `value` down to a multiple of `align` (power of two).
#[inline]
#[must_use]
pub const fn align_down(value: u64, align: u64) -> u64 {
    value & !(align - 1)
}

#[inline]
#[must_use]
pub const fn is_page_aligned(value: u64) -> bool {
    value & PAGE_MASK == 0
}

/// Whether `[start, start + size)` stays within one `boundary`-sized window.
///
/// A zero `boundary` never constrains.
#[inline]
#[must_use]
pub const fn fits_boundary(start: u64, size: u64, boundary: u64) -> bool {
    if boundary == 0 {
        return true;
    }
    let window_end = align_down(start.saturating_add(boundary), boundary);
    start.saturating_add(size) <= window_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(align_up(0x1001, 0x1000), Some(0x2000));
        assert_eq!(align_up(0x2000, 0x1000), Some(0x2000));
        assert_eq!(align_up(u64::MAX, 0x1000), None);
        assert_eq!(align_down(0x1FFF, 0x1000), 0x1000);
    }

    #[test]
    fn boundary_windows() {
        const B: u64 = 0x1_0000;
        assert!(fits_boundary(0, B, B));
        assert!(!fits_boundary(0x1000, B, B));
        assert!(fits_boundary(0xF000, 0x1000, B));
        assert!(!fits_boundary(0xF000, 0x2000, B));
        assert!(fits_boundary(0xF000, u64::MAX, 0));
    }

    #[test]
    fn validation() {
        assert!(DmaConstraints::unrestricted().validate().is_ok());
        assert_eq!(
            DmaConstraints::unrestricted().with_alignment(3).validate(),
            Err(InvalidArgument::Alignment(3))
        );
        assert_eq!(
            DmaConstraints::unrestricted().with_alignment(0).validate(),
            Err(InvalidArgument::Alignment(0))
        );
        assert_eq!(
            DmaConstraints::unrestricted().with_boundary(0x800).validate(),
            Err(InvalidArgument::Boundary(0x800))
        );
        assert!(DmaConstraints::dma32().with_boundary(0x1_0000).validate().is_ok());
    }
}
