//! Instrumented `malloc`, `calloc`, `realloc`, `free`, `exit` and `abort`.
//!
//! Each entry takes the caller's `__FILE__` / `__LINE__` in addition to the
//! usual arguments. `include/allocwatch.h` maps the standard names onto these.

use std::collections::HashSet;
use std::ffi::{c_char, c_int, c_void};

use allocwatch_core::AllocationStats;

use crate::system::{untracked_allocate, untracked_release, untracked_resize};
use crate::tracker_state::{self, with_tracker};
use crate::util::{site_from_c, to_ptr};

// ---------------------------------------------------------------------------
// allocation
// ---------------------------------------------------------------------------

/// A chunk libc hands out after termination is live again, even when the
/// collector released the same address earlier.
fn reclaim(collected: &mut HashSet<usize>, chunk: *mut c_void) -> *mut c_void {
    collected.remove(&(chunk as usize));
    chunk
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_malloc(
    size: usize,
    file: *const c_char,
    line: usize,
) -> *mut c_void {
    // SAFETY: caller passes `__FILE__` or null.
    let site = unsafe { site_from_c(file, line) };
    with_tracker(|tracker| match tracker {
        Ok(tracker) => to_ptr(tracker.allocate(size, site)),
        Err(collected) => reclaim(collected, untracked_allocate(size, false)),
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_calloc(
    count: usize,
    size: usize,
    file: *const c_char,
    line: usize,
) -> *mut c_void {
    // SAFETY: caller passes `__FILE__` or null.
    let site = unsafe { site_from_c(file, line) };
    with_tracker(|tracker| match tracker {
        Ok(tracker) => to_ptr(tracker.zero_allocate(count, size, site)),
        Err(collected) => {
            let chunk = count
                .checked_mul(size)
                .map_or(std::ptr::null_mut(), |total| untracked_allocate(total, true));
            reclaim(collected, chunk)
        }
    })
}

/// Unknown pointers are rejected with null and left untouched.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_realloc(
    ptr: *mut c_void,
    size: usize,
    file: *const c_char,
    line: usize,
) -> *mut c_void {
    // SAFETY: caller passes `__FILE__` or null.
    let site = unsafe { site_from_c(file, line) };
    with_tracker(|tracker| match tracker {
        Ok(tracker) => tracker
            .reallocate(ptr as usize, size, site)
            .map_or(std::ptr::null_mut(), to_ptr),
        Err(collected) if collected.contains(&(ptr as usize)) => std::ptr::null_mut(),
        Err(collected) => {
            // SAFETY: any other pointer came from an allocwatch entry point.
            let chunk = unsafe { untracked_resize(ptr, size) };
            reclaim(collected, chunk)
        }
    })
}

/// Null is a no-op. Unknown pointers are ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_free(ptr: *mut c_void, file: *const c_char, line: usize) {
    // SAFETY: caller passes `__FILE__` or null.
    let site = unsafe { site_from_c(file, line) };
    with_tracker(|tracker| match tracker {
        Ok(tracker) => {
            let _ = tracker.release(ptr as usize, site);
        }
        Err(collected) => {
            if !collected.remove(&(ptr as usize)) {
                // SAFETY: the pointer came from an allocwatch entry point and
                // was not released by the collector.
                unsafe { untracked_release(ptr) };
            }
        }
    });
}

// ---------------------------------------------------------------------------
// termination
// ---------------------------------------------------------------------------

/// Logs the call, then exits. The exit hook produces the report.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_exit(status: c_int, file: *const c_char, line: usize) -> ! {
    // SAFETY: caller passes `__FILE__` or null.
    let site = unsafe { site_from_c(file, line) };
    with_tracker(|tracker| {
        if let Ok(tracker) = tracker {
            tracker.log_exit(status, site);
        }
    });
    // SAFETY: the tracker lock is released; exit handlers may take it again.
    unsafe { libc::exit(status) }
}

/// Logs the call, then aborts. No report is produced.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_abort(file: *const c_char, line: usize) -> ! {
    // SAFETY: caller passes `__FILE__` or null.
    let site = unsafe { site_from_c(file, line) };
    with_tracker(|tracker| {
        if let Ok(tracker) = tracker {
            tracker.log_abort(site);
        }
    });
    // SAFETY: plain libc abort.
    unsafe { libc::abort() }
}

// ---------------------------------------------------------------------------
// introspection
// ---------------------------------------------------------------------------

/// Counters exported to C callers.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocwatchStats {
    pub allocations: usize,
    pub frees: usize,
    pub bytes_allocated: usize,
    pub bytes_freed: usize,
    pub bytes_collected: usize,
    pub live_allocations: usize,
}

impl AllocwatchStats {
    fn new(stats: AllocationStats, live_allocations: usize) -> Self {
        Self {
            allocations: stats.allocations,
            frees: stats.frees,
            bytes_allocated: stats.bytes_allocated,
            bytes_freed: stats.bytes_freed,
            bytes_collected: stats.bytes_collected,
            live_allocations,
        }
    }
}

/// Copy the current counters into `out`. Returns 0, or -1 when `out` is
/// null or the tracker has terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_stats(out: *mut AllocwatchStats) -> c_int {
    if out.is_null() {
        return -1;
    }
    let stats = with_tracker(|tracker| {
        tracker
            .ok()
            .map(|tracker| AllocwatchStats::new(tracker.stats(), tracker.registry().live_count()))
    });
    match stats {
        Some(stats) => {
            // SAFETY: `out` is non-null and points to caller-owned storage.
            unsafe { out.write(stats) };
            0
        }
        None => -1,
    }
}

/// Report, collect and terminate now instead of at exit. Returns 0 when the
/// tracker was shut down by this call, -1 otherwise.
#[unsafe(no_mangle)]
pub extern "C" fn allocwatch_shutdown() -> c_int {
    match tracker_state::shutdown() {
        Some(_) => 0,
        None => -1,
    }
}
