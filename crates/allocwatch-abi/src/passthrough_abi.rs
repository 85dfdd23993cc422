//! Untracked entry points with fatal allocation failure.
//!
//! Same signatures as the tracked set so `include/allocwatch.h` can switch
//! between them at compile time. Nothing is recorded. A failed allocation
//! prints the call site and the OS reason to stderr, then aborts.

use std::ffi::{c_char, c_int, c_void};
use std::io;

use crate::util::site_from_c;

/// Abort with the call site unless `chunk` is non-null.
///
/// # Safety
///
/// Same contract as [`site_from_c`].
unsafe fn ensure(chunk: *mut c_void, file: *const c_char, line: usize) -> *mut c_void {
    if chunk.is_null() {
        // Read before anything else can clobber errno.
        let reason = io::Error::last_os_error();
        // SAFETY: forwarded caller contract.
        let site = unsafe { site_from_c(file, line) };
        eprintln!("At: {}:{}\nError: {reason}", site.file, site.line);
        std::process::abort();
    }
    chunk
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_passthrough_malloc(
    size: usize,
    file: *const c_char,
    line: usize,
) -> *mut c_void {
    // A zero-byte request may legitimately return null.
    // SAFETY: plain libc allocation.
    let chunk = unsafe { libc::malloc(size.max(1)) };
    // SAFETY: caller passes `__FILE__` or null.
    unsafe { ensure(chunk, file, line) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_passthrough_calloc(
    count: usize,
    size: usize,
    file: *const c_char,
    line: usize,
) -> *mut c_void {
    // SAFETY: plain libc allocation; libc checks `count * size` for overflow.
    let chunk = unsafe { libc::calloc(count.max(1), size.max(1)) };
    // SAFETY: caller passes `__FILE__` or null.
    unsafe { ensure(chunk, file, line) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_passthrough_realloc(
    ptr: *mut c_void,
    size: usize,
    file: *const c_char,
    line: usize,
) -> *mut c_void {
    // SAFETY: caller passes null or a pointer from the passthrough set.
    let chunk = unsafe { libc::realloc(ptr, size.max(1)) };
    // SAFETY: caller passes `__FILE__` or null.
    unsafe { ensure(chunk, file, line) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_passthrough_free(
    ptr: *mut c_void,
    _file: *const c_char,
    _line: usize,
) {
    // SAFETY: free(NULL) is a no-op; other pointers come from the passthrough set.
    unsafe { libc::free(ptr) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_passthrough_exit(
    status: c_int,
    _file: *const c_char,
    _line: usize,
) -> ! {
    // SAFETY: plain libc exit.
    unsafe { libc::exit(status) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn allocwatch_passthrough_abort(_file: *const c_char, _line: usize) -> ! {
    // SAFETY: plain libc abort.
    unsafe { libc::abort() }
}
