//! Reentrancy gate and early bump allocator.
//!
//! Both flags are process-wide, not thread-local: raising and lowering is
//! tied to the single global mutex's critical section, not to per-thread
//! call depth.

use std::sync::atomic::{AtomicBool, Ordering};

static REENTRANT: AtomicBool = AtomicBool::new(false);

/// True while the engine itself is inside a wrapped primitive: subsequent
/// wrapped calls must pass straight through to the underlying symbol.
pub fn is_reentrant() -> bool {
    REENTRANT.load(Ordering::Acquire)
}

/// RAII guard that raises the reentrancy flag for its lifetime. Raising is
/// idempotent from the caller's point of view: nested `enter()` calls simply
/// observe `is_reentrant() == true` and take the bypass path.
pub struct ReentrancyGuard {
    _private: (),
}

impl ReentrancyGuard {
    pub fn enter() -> Self {
        REENTRANT.store(true, Ordering::Release);
        Self { _private: () }
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        REENTRANT.store(false, Ordering::Release);
    }
}

/// 4 KiB static bump arena used only while the underlying `malloc` symbol is
/// being resolved for the first time. Never freed; entries
/// carved from it must never be registered as tracked allocations — callers
/// enforce that by construction (the bootstrap path never calls into the
/// tracker).
#[allow(unsafe_code)]
mod arena_storage {
    use std::cell::UnsafeCell;

    pub struct BumpArena(pub UnsafeCell<[u8; 4096]>);
    // SAFETY: access is serialized by `EARLY_ALLOCATOR`'s atomic cursor plus
    // the reentrancy gate's mutex-backed critical section; see `bump_alloc`.
    unsafe impl Sync for BumpArena {}

    pub static ARENA: BumpArena = BumpArena(UnsafeCell::new([0u8; 4096]));
}

static EARLY_ALLOCATOR: AtomicBool = AtomicBool::new(false);
static BUMP_CURSOR: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

/// True while the underlying `malloc` symbol has not yet been resolved:
/// allocation requests must come from the bump arena instead.
pub fn is_early_allocator() -> bool {
    EARLY_ALLOCATOR.load(Ordering::Acquire)
}

pub struct EarlyAllocatorGuard {
    _private: (),
}

impl EarlyAllocatorGuard {
    pub fn enter() -> Self {
        EARLY_ALLOCATOR.store(true, Ordering::Release);
        Self { _private: () }
    }
}

impl Drop for EarlyAllocatorGuard {
    fn drop(&mut self) {
        EARLY_ALLOCATOR.store(false, Ordering::Release);
    }
}

/// Carve `size` bytes out of the static bump arena. Returns `None` once the
/// arena is exhausted (the engine has no fallback for this — it is sized for
/// the handful of allocations the dynamic linker's resolver itself makes
/// during the first `malloc` lookup).
#[allow(unsafe_code)]
pub fn bump_alloc(size: usize) -> Option<*mut u8> {
    let size = size.max(1);
    loop {
        let start = BUMP_CURSOR.load(Ordering::Acquire);
        let end = start.checked_add(size)?;
        if end > 4096 {
            return None;
        }
        if BUMP_CURSOR
            .compare_exchange(start, end, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // SAFETY: [start, end) was exclusively reserved by the successful
            // compare_exchange above and lies within the 4096-byte arena.
            let base = arena_storage::ARENA.0.get() as *mut u8;
            return Some(unsafe { base.add(start) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrancy_guard_raises_and_lowers() {
        assert!(!is_reentrant());
        {
            let _g = ReentrancyGuard::enter();
            assert!(is_reentrant());
        }
        assert!(!is_reentrant());
    }

    #[test]
    fn bump_alloc_hands_out_disjoint_ranges() {
        let a = bump_alloc(16).expect("room");
        let b = bump_alloc(16).expect("room");
        assert_ne!(a, b);
    }
}
