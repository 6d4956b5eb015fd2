use kernel_iommu::{
    AllocFlags, DmaConstraints, Domain, EntryFlags, GasConfig, GasError, MapEntry, NoopMapper,
    PAGE_SIZE, UnboundedPool, fits_boundary,
};
use proptest::prelude::*;

const CEILING: u64 = 1 << 24;

#[derive(Debug, Clone)]
enum Op {
    Map {
        pages: u64,
        alignment: u64,
        boundary: u64,
        lowaddr: u64,
        highaddr: u64,
        offset: u64,
        split: bool,
    },
    Free(usize),
    Reserve {
        start_page: u64,
        pages: u64,
    },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (
            1..=16_u64,
            prop::sample::select(vec![1, PAGE_SIZE, 4 * PAGE_SIZE, 0x1_0000]),
            prop::sample::select(vec![0, 0x1_0000, 0x4_0000]),
            prop::sample::select(vec![u64::MAX, 0x10_0000, 0x4_0000]),
            prop::sample::select(vec![u64::MAX, 0x80_0000, 0x7F_FFFF, 0x10_0000]),
            prop::sample::select(vec![0, 0x800, PAGE_SIZE, 3 * PAGE_SIZE]),
            any::<bool>(),
        )
            .prop_map(|(pages, alignment, boundary, lowaddr, highaddr, offset, split)| Op::Map {
                pages,
                alignment,
                boundary,
                lowaddr,
                highaddr,
                offset,
                split,
            }),
        2 => any::<usize>().prop_map(Op::Free),
        1 => (1..(CEILING / PAGE_SIZE - 64), 1..=8_u64)
            .prop_map(|(start_page, pages)| Op::Reserve { start_page, pages }),
    ]
}

fn checked_domain() -> Domain {
    let d = Domain::with_config(UnboundedPool, NoopMapper, GasConfig { check_free: true });
    d.init(CEILING).unwrap();
    d
}

fn map(d: &Domain, c: &DmaConstraints, size: u64, split: bool) -> Result<MapEntry, GasError> {
    map_at(d, c, size, 0, split)
}

fn map_at(
    d: &Domain,
    c: &DmaConstraints,
    size: u64,
    offset: u64,
    split: bool,
) -> Result<MapEntry, GasError> {
    d.map(
        c,
        size,
        offset,
        EntryFlags::new().with_unmapped(true),
        AllocFlags::new().with_can_split(split),
        &[],
    )
}

fn assert_layout(d: &Domain) {
    let entries = d.entries();
    assert!(entries.first().is_some_and(|e| e.start == 0));
    assert!(entries.last().is_some_and(|e| e.start == CEILING && e.is_empty()));
    for pair in entries.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(a.end <= b.start, "{a:?} overlaps {b:?}");
        // Reservations are placed verbatim and may touch their neighbours.
        if (a.flags.map() || b.flags.map()) && !a.flags.rmrr() && !b.flags.rmrr() {
            assert!(b.start - a.end >= PAGE_SIZE, "no guard between {a:?} and {b:?}");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_workloads_keep_invariants(ops in prop::collection::vec(op(), 1..96)) {
        let d = checked_domain();
        let mut live: Vec<MapEntry> = Vec::new();

        for op in ops {
            match op {
                Op::Map { pages, alignment, boundary, lowaddr, highaddr, offset, split } => {
                    let size = pages * PAGE_SIZE;
                    let c = DmaConstraints::unrestricted()
                        .with_alignment(alignment)
                        .with_boundary(boundary)
                        .with_lowaddr(lowaddr)
                        .with_highaddr(highaddr);
                    match map_at(&d, &c, size, offset, split) {
                        Ok(e) => {
                            prop_assert_eq!(e.start % alignment, 0);
                            prop_assert_eq!(e.start % PAGE_SIZE, 0);
                            prop_assert_eq!(e.len() % PAGE_SIZE, 0);
                            prop_assert!(e.end <= lowaddr || e.start >= highaddr);
                            prop_assert!(fits_boundary(e.start + offset, e.len(), boundary));
                            // The trailing guard page sits behind `offset`.
                            let next = d.entries().into_iter().find(|n| n.start >= e.end && n.id != e.id);
                            if let Some(n) = next {
                                prop_assert!(e.end + offset + PAGE_SIZE <= n.start, "{:?} crowds {:?}", e, n);
                            }
                            if split {
                                prop_assert!(!e.is_empty() && e.len() <= size);
                            } else {
                                prop_assert_eq!(e.len(), size);
                            }
                            live.push(e);
                        }
                        Err(e) => prop_assert_eq!(e, GasError::OutOfAddressSpace),
                    }
                }
                Op::Free(i) => {
                    if !live.is_empty() {
                        let e = live.swap_remove(i % live.len());
                        if e.flags.map() {
                            d.free_space(e.id);
                        } else {
                            d.free_region(e.id);
                        }
                    }
                }
                Op::Reserve { start_page, pages } => {
                    let start = start_page * PAGE_SIZE;
                    match d.reserve_region(start, start + pages * PAGE_SIZE) {
                        Ok(Some(r)) => {
                            prop_assert!(r.start >= start && r.end <= start + pages * PAGE_SIZE);
                            live.push(r);
                        }
                        Ok(None) => {}
                        Err(GasError::Conflict { .. }) => {}
                        Err(e) => prop_assert!(false, "unexpected {:?}", e),
                    }
                }
            }
            assert_layout(&d);
        }

        d.check_free();
        prop_assert_eq!(d.entry_count(), live.len() + 2);
        for e in &live {
            prop_assert_eq!(d.entry(e.id), Some(*e));
        }
    }

    #[test]
    fn lower_window_is_preferred(pages in 1..=8_u64, taken in 0..40_usize) {
        let d = checked_domain();
        let lowaddr = 0x4_0000;
        let c = DmaConstraints::unrestricted().with_lowaddr(lowaddr).with_highaddr(0x8_0000);
        for _ in 0..taken {
            let _ = map(&d, &DmaConstraints::unrestricted().with_lowaddr(lowaddr), PAGE_SIZE, false);
        }

        let below = d.entries().windows(2).any(|w| {
            let start = w[0].end + PAGE_SIZE;
            start + pages * PAGE_SIZE + PAGE_SIZE <= w[1].start && start + pages * PAGE_SIZE <= lowaddr
        });
        let e = map(&d, &c, pages * PAGE_SIZE, false).unwrap();
        if below {
            prop_assert!(e.end <= lowaddr);
        } else {
            prop_assert!(e.start >= 0x8_0000);
        }
    }

    #[test]
    fn freeing_everything_restores_capacity(
        churn in prop::collection::vec(1..=32_u64, 1..48),
        fill in 1..=8_u64,
    ) {
        let fresh = small_domain();
        let expected = fill_up(&fresh, fill);

        let d = small_domain();
        let c = DmaConstraints::unrestricted().with_boundary(0x2_0000);
        let placed: Vec<_> = churn
            .iter()
            .filter_map(|&p| map(&d, &c, p * PAGE_SIZE, true).ok())
            .collect();
        for e in placed {
            d.free_space(e.id);
        }
        prop_assert_eq!(d.entries().len(), 2);
        prop_assert_eq!(fill_up(&d, fill), expected);
    }
}

fn small_domain() -> Domain {
    let d = Domain::with_config(UnboundedPool, NoopMapper, GasConfig { check_free: true });
    d.init(1 << 20).unwrap();
    d
}

/// Allocate `pages`-sized entries until the domain is full.
fn fill_up(d: &Domain, pages: u64) -> usize {
    let c = DmaConstraints::unrestricted();
    let mut n = 0;
    while map(d, &c, pages * PAGE_SIZE, false).is_ok() {
        n += 1;
    }
    n
}
