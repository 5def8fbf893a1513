//! Next-symbol resolution: `dlsym(RTLD_NEXT, name)`, the
//! platform capability that lets a wrapper call through to whichever
//! definition of `name` the loader would have bound next, ahead of this
//! library in load order. The same mechanism resolves `__libc_start_main`
//! to call through to host libc at process startup.

use std::ffi::CStr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Resolve `name`'s next binding. Returns `None` if the loader cannot find
/// one (the wrapper should treat this as an engine-internal error: there is
/// no underlying primitive to delegate to).
pub fn resolve(name: &CStr) -> Option<usize> {
    // SAFETY: `name` is a valid NUL-terminated C string for the duration of
    // the call; `dlsym` with `RTLD_NEXT` is the documented mechanism for
    // "the next definition of this symbol in load order".
    let ptr = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr()) };
    if ptr.is_null() { None } else { Some(ptr as usize) }
}

/// Resolve `name` once, memoizing the address in `cache` (0 = unresolved).
/// Every wrapper outside the allocator bootstrap dance uses this: resolution
/// is one-shot per primitive, and a benign race between threads
/// just repeats the (idempotent) `dlsym` lookup.
pub fn resolve_cached(cache: &AtomicUsize, name: &CStr) -> Option<usize> {
    let addr = cache.load(Ordering::Acquire);
    if addr != 0 {
        return Some(addr);
    }
    let addr = resolve(name)?;
    cache.store(addr, Ordering::Release);
    Some(addr)
}
