//! Integration tests for the tracked allocation entry points.
//!
//! The tracker is process-global, so every test holds `TEST_LOCK` and checks
//! counter deltas rather than absolute values.

use std::ffi::{c_char, c_void};
use std::ptr;
use std::sync::Mutex;

use allocwatch_abi::AllocwatchStats;
use allocwatch_abi::tracked_abi::{
    allocwatch_calloc, allocwatch_free, allocwatch_malloc, allocwatch_realloc, allocwatch_stats,
};

static TEST_LOCK: Mutex<()> = Mutex::new(());

const FILE: *const c_char = c"tracked_abi_test.c".as_ptr();

fn stats() -> AllocwatchStats {
    let mut out = AllocwatchStats::default();
    // SAFETY: `out` is valid local storage.
    assert_eq!(unsafe { allocwatch_stats(&mut out) }, 0);
    out
}

#[test]
fn malloc_realloc_free_scenario_updates_counters() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: pointers only flow between tracked entry points.
    unsafe {
        let before = stats();
        let p = allocwatch_malloc(100, FILE, 10);
        assert!(!p.is_null());
        ptr::write_bytes(p.cast::<u8>(), 0xAB, 100);

        let q = allocwatch_realloc(p, 250, FILE, 11);
        assert!(!q.is_null());
        assert_eq!(*q.cast::<u8>(), 0xAB);
        assert_eq!(*q.cast::<u8>().add(99), 0xAB);

        let mid = stats();
        assert_eq!(mid.live_allocations, before.live_allocations + 1);

        allocwatch_free(q, FILE, 12);
        let after = stats();
        assert_eq!(after.allocations, before.allocations + 1);
        assert_eq!(after.frees, before.frees + 1);
        assert_eq!(after.bytes_allocated, before.bytes_allocated + 350);
        assert_eq!(after.bytes_freed, before.bytes_freed + 350);
        assert_eq!(after.live_allocations, before.live_allocations);
    }
}

#[test]
fn user_pointers_are_sixteen_byte_aligned() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: pointers only flow between tracked entry points.
    unsafe {
        let pointers: Vec<*mut c_void> = (1..=32)
            .map(|size| allocwatch_malloc(size, FILE, 20))
            .collect();
        for p in &pointers {
            assert!(!p.is_null());
            assert_eq!(*p as usize % 16, 0);
        }
        for p in pointers {
            allocwatch_free(p, FILE, 21);
        }
    }
}

#[test]
fn calloc_zeroes_and_rejects_overflow() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: pointers only flow between tracked entry points.
    unsafe {
        let before = stats();
        let p = allocwatch_calloc(8, 32, FILE, 30);
        assert!(!p.is_null());
        let bytes = std::slice::from_raw_parts(p.cast::<u8>(), 256);
        assert!(bytes.iter().all(|b| *b == 0));
        allocwatch_free(p, FILE, 31);

        assert!(allocwatch_calloc(usize::MAX, 2, FILE, 32).is_null());
        let after = stats();
        assert_eq!(after.allocations, before.allocations + 1);
        assert_eq!(after.bytes_allocated, before.bytes_allocated + 256);
    }
}

#[test]
fn realloc_of_null_allocates() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: pointers only flow between tracked entry points.
    unsafe {
        let before = stats();
        let p = allocwatch_realloc(ptr::null_mut(), 40, FILE, 40);
        assert!(!p.is_null());
        allocwatch_free(p, FILE, 41);
        let after = stats();
        assert_eq!(after.allocations, before.allocations + 1);
        assert_eq!(after.bytes_freed, before.bytes_freed + 40);
    }
}

#[test]
fn null_and_unknown_pointers_leave_counters_alone() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let mut local = [0_u64; 4];
    let foreign = local.as_mut_ptr().cast::<c_void>();
    // SAFETY: unknown pointers are looked up, never dereferenced or freed.
    unsafe {
        let before = stats();
        allocwatch_free(ptr::null_mut(), FILE, 50);
        allocwatch_free(foreign, FILE, 51);
        assert!(allocwatch_realloc(foreign, 64, FILE, 52).is_null());

        let p = allocwatch_malloc(8, FILE, 53);
        allocwatch_free(p, FILE, 54);
        // Second free of the same pointer is ignored.
        allocwatch_free(p, FILE, 55);

        let after = stats();
        assert_eq!(after.frees, before.frees + 1);
        assert_eq!(after.bytes_freed, before.bytes_freed + 8);
    }
    assert_eq!(local, [0; 4]);
}

#[test]
fn stats_rejects_null_output() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: null is checked before any write.
    assert_eq!(unsafe { allocwatch_stats(ptr::null_mut()) }, -1);
}
