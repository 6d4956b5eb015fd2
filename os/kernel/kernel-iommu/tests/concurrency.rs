use std::sync::Arc;
use std::thread;

use kernel_iommu::{
    AllocFlags, BoundedPool, DmaConstraints, Domain, EntryFlags, GasConfig, NoopMapper, PAGE_SIZE,
    UnboundedPool,
};

const THREADS: usize = 8;
const ROUNDS: usize = 200;

#[test]
fn parallel_map_and_free_keep_tree_consistent() {
    let d = Arc::new(Domain::default());
    d.init(1 << 32).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let d = Arc::clone(&d);
            thread::spawn(move || {
                let c = DmaConstraints::unrestricted().with_alignment(PAGE_SIZE << (t % 3));
                let mut held = Vec::new();
                for i in 0..ROUNDS {
                    let size = PAGE_SIZE * (1 + (i % 4) as u64);
                    let e = d
                        .map(
                            &c,
                            size,
                            0,
                            EntryFlags::new().with_unmapped(true),
                            AllocFlags::new().with_can_wait(true),
                            &[],
                        )
                        .unwrap();
                    assert_eq!(e.start % c.alignment, 0);
                    held.push(e);
                    if i % 3 == 2 {
                        let e = held.swap_remove(i % held.len());
                        d.free_space(e.id);
                    }
                }
                held
            })
        })
        .collect();

    let mut live: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    d.check_free();

    // Every surviving allocation is still in the tree, untouched.
    live.sort_by_key(|e| e.start);
    for pair in live.windows(2) {
        assert!(pair[0].end + PAGE_SIZE <= pair[1].start);
    }
    for e in &live {
        assert_eq!(d.entry(e.id), Some(*e));
    }
    assert_eq!(d.entry_count(), live.len() + 2);

    for e in live {
        d.free_space(e.id);
    }
    d.fini();
}

#[test]
fn blocking_pool_waits_for_released_records() {
    // Room for the placeholders and two live allocations.
    let d = Arc::new(Domain::with_config(
        BoundedPool::new(4),
        NoopMapper,
        GasConfig { check_free: true },
    ));
    d.init(1 << 32).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let d = Arc::clone(&d);
            thread::spawn(move || {
                for _ in 0..50 {
                    let e = d
                        .map(
                            &DmaConstraints::dma32(),
                            PAGE_SIZE,
                            0,
                            EntryFlags::new().with_unmapped(true),
                            AllocFlags::new().with_can_wait(true),
                            &[],
                        )
                        .unwrap();
                    thread::yield_now();
                    d.free_space(e.id);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(d.pool().available(), 2);
    assert_eq!(d.entry_count(), 2);
    d.fini();
}

#[test]
fn domains_are_independent() {
    let domains: Vec<_> = (0..4)
        .map(|_| {
            let d = Domain::new(UnboundedPool, NoopMapper);
            d.init(1 << 32).unwrap();
            Arc::new(d)
        })
        .collect();

    let handles: Vec<_> = domains
        .iter()
        .map(|d| {
            let d = Arc::clone(d);
            thread::spawn(move || {
                (0..32)
                    .map(|_| {
                        d.map(
                            &DmaConstraints::unrestricted(),
                            PAGE_SIZE,
                            0,
                            EntryFlags::new().with_unmapped(true),
                            AllocFlags::new(),
                            &[],
                        )
                        .unwrap()
                        .start
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let layouts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    // Same request sequence, same placements.
    assert!(layouts.windows(2).all(|w| w[0] == w[1]));
}
