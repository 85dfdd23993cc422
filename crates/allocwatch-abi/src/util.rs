//! Shared internal utilities for ABI adapters.

use std::ffi::{CStr, c_char, c_void};

use allocwatch_core::SourceSite;

/// Attributed to calls whose file argument is null.
const UNKNOWN_FILE: &str = "<unknown>";
/// Attributed to calls whose file argument is not UTF-8.
const NON_UTF8_FILE: &str = "<non-utf8 file>";

/// Build a call site from the `__FILE__` / `__LINE__` pair passed by C callers.
///
/// # Safety
///
/// `file` must be null or a NUL-terminated string with static storage
/// duration (a string literal such as `__FILE__`). Traces keep borrowing it
/// until the tracker terminates.
pub(crate) unsafe fn site_from_c(file: *const c_char, line: usize) -> SourceSite {
    let line = u32::try_from(line).unwrap_or(u32::MAX);
    if file.is_null() {
        return SourceSite::new(UNKNOWN_FILE, line);
    }
    // SAFETY: caller guarantees a static NUL-terminated string.
    let file: &'static CStr = unsafe { CStr::from_ptr(file) };
    SourceSite::new(file.to_str().unwrap_or(NON_UTF8_FILE), line)
}

/// Convert a logical address into a C pointer, `None` becoming null.
#[inline]
pub(crate) fn to_ptr(address: Option<usize>) -> *mut c_void {
    address.map_or(std::ptr::null_mut(), |a| a as *mut c_void)
}
