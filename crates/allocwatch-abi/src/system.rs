//! Raw allocation through the host libc.
//!
//! [`SystemAllocator`] backs the tracker. The `untracked_*` helpers serve
//! calls arriving after the tracker terminated: they keep the same chunk
//! header layout so pointers handed out before and after termination stay
//! interchangeable.

use std::ffi::c_void;

use allocwatch_core::RawAllocator;
use allocwatch_core::raw::{CHUNK_HEADER, chunk_base, chunk_size, user_address};

/// [`RawAllocator`] over `malloc`, `calloc`, `realloc` and `free`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl RawAllocator for SystemAllocator {
    fn allocate(&mut self, size: usize) -> Option<usize> {
        // SAFETY: plain libc allocation, result checked for null.
        let ptr = unsafe { libc::malloc(size) };
        (!ptr.is_null()).then_some(ptr as usize)
    }

    fn allocate_zeroed(&mut self, size: usize) -> Option<usize> {
        // SAFETY: plain libc allocation, result checked for null.
        let ptr = unsafe { libc::calloc(1, size) };
        (!ptr.is_null()).then_some(ptr as usize)
    }

    fn resize(&mut self, base: usize, size: usize) -> Option<usize> {
        // SAFETY: the tracker only passes bases this allocator returned and
        // that are still live (looked up in its address-keyed registry).
        let ptr = unsafe { libc::realloc(base as *mut c_void, size) };
        (!ptr.is_null()).then_some(ptr as usize)
    }

    fn release(&mut self, base: usize) {
        // SAFETY: same contract as `resize`.
        unsafe { libc::free(base as *mut c_void) }
    }
}

/// Allocate with a header but without tracking.
pub(crate) fn untracked_allocate(size: usize, zeroed: bool) -> *mut c_void {
    let Some(raw) = chunk_size(size) else {
        return std::ptr::null_mut();
    };
    let mut allocator = SystemAllocator;
    let base = if zeroed {
        allocator.allocate_zeroed(raw)
    } else {
        allocator.allocate(raw)
    };
    base.map_or(std::ptr::null_mut(), |b| user_address(b) as *mut c_void)
}

/// Resize a headered chunk without tracking.
///
/// # Safety
///
/// `ptr` must be a live pointer returned by an allocwatch entry point.
pub(crate) unsafe fn untracked_resize(ptr: *mut c_void, size: usize) -> *mut c_void {
    if ptr.is_null() {
        return untracked_allocate(size, false);
    }
    let Some(raw) = chunk_size(size) else {
        return std::ptr::null_mut();
    };
    SystemAllocator
        .resize(chunk_base(ptr as usize), raw)
        .map_or(std::ptr::null_mut(), |b| user_address(b) as *mut c_void)
}

/// Release a headered chunk without tracking. Null is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a live pointer returned by an allocwatch entry point.
pub(crate) unsafe fn untracked_release(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    debug_assert!(ptr as usize >= CHUNK_HEADER);
    SystemAllocator.release(chunk_base(ptr as usize));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_allocator_round_trip() {
        let mut allocator = SystemAllocator;
        let base = allocator.allocate(64).unwrap();
        let base = allocator.resize(base, 256).unwrap();
        allocator.release(base);
    }

    #[test]
    fn zeroed_allocation_is_zero() {
        let mut allocator = SystemAllocator;
        let base = allocator.allocate_zeroed(128).unwrap();
        // SAFETY: 128 freshly allocated bytes.
        let bytes = unsafe { std::slice::from_raw_parts(base as *const u8, 128) };
        assert!(bytes.iter().all(|b| *b == 0));
        allocator.release(base);
    }

    #[test]
    fn untracked_chunks_keep_header_layout() {
        let ptr = untracked_allocate(32, true);
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % 16, 0);
        // SAFETY: pointer from `untracked_allocate`.
        let ptr = unsafe { untracked_resize(ptr, 64) };
        assert!(!ptr.is_null());
        // SAFETY: pointer from `untracked_resize`.
        unsafe { untracked_release(ptr) };
    }

    #[test]
    fn untracked_overflow_fails() {
        assert!(untracked_allocate(usize::MAX, false).is_null());
    }
}
