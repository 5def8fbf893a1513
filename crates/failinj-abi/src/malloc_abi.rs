//! ABI layer for `malloc`/`calloc`/`realloc`/`reallocarray`/`free`.
//!
//! The very first call ever made into any of these happens *while the
//! dynamic linker is itself resolving one of them* (classically `calloc`,
//! needed for the linker's own bookkeeping). Breaking that
//! recursion is this module's one subtlety: resolution of all five symbols
//! is bundled into one window guarded by the early-allocator flag, and any
//! wrapper re-entered during that window is served from the static bump
//! arena instead of recursing back into symbol resolution.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use failinj_core::Resource;

use crate::engine::global;
use crate::symbols::resolve;
use crate::util::set_errno;

static MALLOC_ADDR: AtomicUsize = AtomicUsize::new(0);
static CALLOC_ADDR: AtomicUsize = AtomicUsize::new(0);
static REALLOC_ADDR: AtomicUsize = AtomicUsize::new(0);
static REALLOCARRAY_ADDR: AtomicUsize = AtomicUsize::new(0);
static FREE_ADDR: AtomicUsize = AtomicUsize::new(0);
static BOOTSTRAPPED: AtomicBool = AtomicBool::new(false);

/// Resolve all five allocator symbols under one early-allocator window. Safe
/// to call repeatedly/concurrently: every store is idempotent, so a race
/// between threads just repeats the (cheap) `dlsym` lookups.
fn ensure_resolved() {
    if BOOTSTRAPPED.load(Ordering::Acquire) {
        return;
    }
    let _guard = failinj_core::gate::EarlyAllocatorGuard::enter();
    MALLOC_ADDR.store(resolve(c"malloc").unwrap_or(0), Ordering::Relaxed);
    CALLOC_ADDR.store(resolve(c"calloc").unwrap_or(0), Ordering::Relaxed);
    REALLOC_ADDR.store(resolve(c"realloc").unwrap_or(0), Ordering::Relaxed);
    REALLOCARRAY_ADDR.store(resolve(c"reallocarray").unwrap_or(0), Ordering::Relaxed);
    FREE_ADDR.store(resolve(c"free").unwrap_or(0), Ordering::Relaxed);
    BOOTSTRAPPED.store(true, Ordering::Release);
}

type MallocFn = unsafe extern "C" fn(usize) -> *mut c_void;
type CallocFn = unsafe extern "C" fn(usize, usize) -> *mut c_void;
type ReallocFn = unsafe extern "C" fn(*mut c_void, usize) -> *mut c_void;
type ReallocarrayFn = unsafe extern "C" fn(*mut c_void, usize, usize) -> *mut c_void;
type FreeFn = unsafe extern "C" fn(*mut c_void);

#[inline]
fn real_malloc() -> Option<MallocFn> {
    let addr = MALLOC_ADDR.load(Ordering::Acquire);
    // SAFETY: addr was produced by a successful `dlsym` for this exact signature.
    (addr != 0).then(|| unsafe { std::mem::transmute::<usize, MallocFn>(addr) })
}
#[inline]
fn real_calloc() -> Option<CallocFn> {
    let addr = CALLOC_ADDR.load(Ordering::Acquire);
    (addr != 0).then(|| unsafe { std::mem::transmute::<usize, CallocFn>(addr) })
}
#[inline]
fn real_realloc() -> Option<ReallocFn> {
    let addr = REALLOC_ADDR.load(Ordering::Acquire);
    (addr != 0).then(|| unsafe { std::mem::transmute::<usize, ReallocFn>(addr) })
}
#[inline]
fn real_reallocarray() -> Option<ReallocarrayFn> {
    let addr = REALLOCARRAY_ADDR.load(Ordering::Acquire);
    (addr != 0).then(|| unsafe { std::mem::transmute::<usize, ReallocarrayFn>(addr) })
}
#[inline]
fn real_free() -> Option<FreeFn> {
    let addr = FREE_ADDR.load(Ordering::Acquire);
    (addr != 0).then(|| unsafe { std::mem::transmute::<usize, FreeFn>(addr) })
}

// ---------------------------------------------------------------------------
// malloc
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    if failinj_core::gate::is_early_allocator() {
        return failinj_core::gate::bump_alloc(size)
            .map(|p| p.cast())
            .unwrap_or(std::ptr::null_mut());
    }
    ensure_resolved();

    let Some(real) = real_malloc() else {
        return std::ptr::null_mut();
    };
    if failinj_core::gate::is_reentrant() {
        return unsafe { real(size) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::ENOMEM) };
            return std::ptr::null_mut();
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let ptr = unsafe { real(size) };
    if !ptr.is_null() {
        engine.track_create(Resource::Allocation, ptr as u64);
    }
    ptr
}

// ---------------------------------------------------------------------------
// calloc
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    if failinj_core::gate::is_early_allocator() {
        let total = nmemb.saturating_mul(size);
        return failinj_core::gate::bump_alloc(total).map_or(std::ptr::null_mut(), |p| {
            // SAFETY: `p` was just carved from the arena and is valid for `total` bytes.
            unsafe { std::ptr::write_bytes(p, 0, total) };
            p.cast()
        });
    }
    ensure_resolved();

    let Some(real) = real_calloc() else {
        return std::ptr::null_mut();
    };
    if failinj_core::gate::is_reentrant() {
        return unsafe { real(nmemb, size) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::ENOMEM) };
            return std::ptr::null_mut();
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let ptr = unsafe { real(nmemb, size) };
    if !ptr.is_null() {
        engine.track_create(Resource::Allocation, ptr as u64);
    }
    ptr
}

// ---------------------------------------------------------------------------
// realloc
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    ensure_resolved();
    let Some(real) = real_realloc() else {
        return std::ptr::null_mut();
    };
    if failinj_core::gate::is_reentrant() {
        return unsafe { real(ptr, size) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::ENOMEM) };
            return std::ptr::null_mut();
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let new_ptr = unsafe { real(ptr, size) };
    if !new_ptr.is_null() {
        // Only retire the old block once the real call has actually
        // released it — if `real` genuinely failed (real OOM, not an
        // injected failure), `ptr` is still valid and owned by the program,
        // and must not be dropped from the shadow table.
        if !ptr.is_null() {
            let untracked_frees = engine.config.untracked_frees.clone();
            engine.track_destroy(
                Resource::Allocation,
                ptr as u64,
                &untracked_frees,
                "Attempted to free untracked pointer",
            );
        }
        engine.track_create(Resource::Allocation, new_ptr as u64);
    }
    new_ptr
}

// ---------------------------------------------------------------------------
// reallocarray
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn reallocarray(ptr: *mut c_void, nmemb: usize, size: usize) -> *mut c_void {
    ensure_resolved();
    let Some(real) = real_reallocarray() else {
        return std::ptr::null_mut();
    };
    if failinj_core::gate::is_reentrant() {
        return unsafe { real(ptr, nmemb, size) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::ENOMEM) };
            return std::ptr::null_mut();
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let new_ptr = unsafe { real(ptr, nmemb, size) };
    if !new_ptr.is_null() {
        // See `realloc` above: only retire the old block once the real call
        // has actually released it.
        if !ptr.is_null() {
            let untracked_frees = engine.config.untracked_frees.clone();
            engine.track_destroy(
                Resource::Allocation,
                ptr as u64,
                &untracked_frees,
                "Attempted to free untracked pointer",
            );
        }
        engine.track_create(Resource::Allocation, new_ptr as u64);
    }
    new_ptr
}

// ---------------------------------------------------------------------------
// free
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    if failinj_core::gate::is_early_allocator() {
        // Bump-arena memory is never freed; a real allocation
        // cannot exist yet this early, so there is nothing to forward to.
        return;
    }
    ensure_resolved();
    let Some(real) = real_free() else {
        return;
    };
    if failinj_core::gate::is_reentrant() {
        unsafe { real(ptr) };
        return;
    }

    if ptr.is_null() {
        unsafe { real(ptr) };
        return;
    }

    let engine = global();
    let untracked_frees = engine.config.untracked_frees.clone();
    engine.track_destroy(
        Resource::Allocation,
        ptr as u64,
        &untracked_frees,
        "Attempted to free untracked pointer",
    );
    unsafe { real(ptr) };
}
