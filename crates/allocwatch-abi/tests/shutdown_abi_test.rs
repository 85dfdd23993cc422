//! Early shutdown through `allocwatch_shutdown` and the untracked service
//! that follows it. Kept in its own binary because it terminates the
//! process-global tracker.

use std::ffi::c_char;

use allocwatch_abi::AllocwatchStats;
use allocwatch_abi::tracked_abi::{
    allocwatch_calloc, allocwatch_free, allocwatch_malloc, allocwatch_realloc,
    allocwatch_shutdown, allocwatch_stats,
};

const FILE: *const c_char = c"shutdown_abi_test.c".as_ptr();

#[test]
fn shutdown_collects_leaks_and_later_calls_run_untracked() {
    // SAFETY: pointers only flow between tracked entry points.
    unsafe {
        let leaked = allocwatch_malloc(50, FILE, 1);
        let leaked_zeroed = allocwatch_calloc(4, 16, FILE, 2);
        assert!(!leaked.is_null());
        assert!(!leaked_zeroed.is_null());
        let mut stats = AllocwatchStats::default();
        assert_eq!(allocwatch_stats(&mut stats), 0);
        assert_eq!(stats.live_allocations, 2);
        assert_eq!(stats.bytes_collected, 0);

        assert_eq!(allocwatch_shutdown(), 0);
        assert_eq!(allocwatch_shutdown(), -1);
        assert_eq!(allocwatch_stats(&mut stats), -1);

        // The collector already released both chunks.
        assert!(allocwatch_realloc(leaked, 80, FILE, 3).is_null());
        allocwatch_free(leaked_zeroed, FILE, 4);

        // libc usually hands a collected chunk straight back; the new owner
        // must be able to resize and free it.
        let late = allocwatch_malloc(50, FILE, 5);
        assert!(!late.is_null());
        assert_eq!(late as usize % 16, 0);
        let late = allocwatch_realloc(late, 80, FILE, 6);
        assert!(!late.is_null(), "post-shutdown realloc of a live chunk failed");
        let late = allocwatch_realloc(late, 4096, FILE, 7);
        assert!(!late.is_null());
        allocwatch_free(late, FILE, 8);

        let zeroed = allocwatch_calloc(4, 16, FILE, 9);
        assert!(!zeroed.is_null());
        let bytes = std::slice::from_raw_parts(zeroed.cast::<u8>(), 64);
        assert!(bytes.iter().all(|b| *b == 0));
        let zeroed = allocwatch_realloc(zeroed, 128, FILE, 10);
        assert!(!zeroed.is_null());
        allocwatch_free(zeroed, FILE, 11);
    }
}
