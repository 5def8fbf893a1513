//! Shared internal utilities for ABI wrappers.

use std::ffi::c_int;

/// Set the real libc thread-local `errno`. This library never reimplements
/// `errno` storage: the program under test's own libc owns that slot, and
/// we only ever write the sentinel value documented for the primitive
/// being injected.
///
/// # Safety
///
/// Requires that the underlying libc's `__errno_location` returns a valid,
/// thread-local writable pointer, which is guaranteed by the platform ABI.
pub unsafe fn set_errno(value: c_int) {
    // SAFETY: see above; `__errno_location` is always valid on ELF/glibc.
    unsafe { *libc::__errno_location() = value };
}
