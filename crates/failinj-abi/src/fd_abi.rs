//! ABI layer for descriptor acquisition/release and stream I/O:
//! `open`/`creat`/`openat`/`close`/`read`/`write`.

use std::ffi::{c_char, c_int};
use std::sync::atomic::AtomicUsize;

use failinj_core::Resource;

use crate::engine::global;
use crate::symbols::resolve_cached;
use crate::util::set_errno;

static OPEN_ADDR: AtomicUsize = AtomicUsize::new(0);
static CREAT_ADDR: AtomicUsize = AtomicUsize::new(0);
static OPENAT_ADDR: AtomicUsize = AtomicUsize::new(0);
static CLOSE_ADDR: AtomicUsize = AtomicUsize::new(0);
static READ_ADDR: AtomicUsize = AtomicUsize::new(0);
static WRITE_ADDR: AtomicUsize = AtomicUsize::new(0);

type OpenFn = unsafe extern "C" fn(*const c_char, c_int, libc::mode_t) -> c_int;
type OpenatFn = unsafe extern "C" fn(c_int, *const c_char, c_int, libc::mode_t) -> c_int;
type CloseFn = unsafe extern "C" fn(c_int) -> c_int;
type ReadFn = unsafe extern "C" fn(c_int, *mut std::ffi::c_void, usize) -> isize;
type WriteFn = unsafe extern "C" fn(c_int, *const std::ffi::c_void, usize) -> isize;

// ---------------------------------------------------------------------------
// open / creat / openat
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mut args: ...) -> c_int {
    let mode = if flags & libc::O_CREAT != 0 {
        unsafe { args.arg::<libc::mode_t>() }
    } else {
        0
    };

    let Some(addr) = resolve_cached(&OPEN_ADDR, c"open") else {
        return fatal_missing_symbol();
    };
    // SAFETY: addr resolved for the `open` signature above.
    let real: OpenFn = unsafe { std::mem::transmute(addr) };

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(path, flags, mode) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::EACCES) };
            return -1;
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let fd = unsafe { real(path, flags, mode) };
    if fd >= 0 {
        engine.track_create(Resource::Descriptor, fd as u64);
    }
    fd
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn creat(path: *const c_char, mode: libc::mode_t) -> c_int {
    let Some(addr) = resolve_cached(&CREAT_ADDR, c"creat") else {
        return fatal_missing_symbol();
    };
    // SAFETY: addr resolved for a `(path, mode) -> fd` signature.
    let real: unsafe extern "C" fn(*const c_char, libc::mode_t) -> c_int =
        unsafe { std::mem::transmute(addr) };

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(path, mode) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::EACCES) };
            return -1;
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let fd = unsafe { real(path, mode) };
    if fd >= 0 {
        engine.track_create(Resource::Descriptor, fd as u64);
    }
    fd
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn openat(dirfd: c_int, path: *const c_char, flags: c_int, mut args: ...) -> c_int {
    let mode = if flags & libc::O_CREAT != 0 {
        unsafe { args.arg::<libc::mode_t>() }
    } else {
        0
    };

    let Some(addr) = resolve_cached(&OPENAT_ADDR, c"openat") else {
        return fatal_missing_symbol();
    };
    // SAFETY: addr resolved for the `openat` signature above.
    let real: OpenatFn = unsafe { std::mem::transmute(addr) };

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(dirfd, path, flags, mode) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::EACCES) };
            return -1;
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let fd = unsafe { real(dirfd, path, flags, mode) };
    if fd >= 0 {
        engine.track_create(Resource::Descriptor, fd as u64);
    }
    fd
}

// ---------------------------------------------------------------------------
// close — "close-like" pattern: call through first, only then
// may a success be replaced by a synthetic failure, so a genuinely-released
// descriptor is never leaked by a retry in the program under test.
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    let Some(addr) = resolve_cached(&CLOSE_ADDR, c"close") else {
        return fatal_missing_symbol();
    };
    // SAFETY: addr resolved for a `(fd) -> c_int` signature.
    let real: CloseFn = unsafe { std::mem::transmute(addr) };

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(fd) };
    }

    let engine = global();
    let untracked_closes = engine.config.untracked_closes.clone();
    let rc = unsafe { real(fd) };
    if rc == 0 {
        engine.track_destroy(
            Resource::Descriptor,
            fd as u64,
            &untracked_closes,
            "Attempted to close untracked file descriptor",
        );

        match engine.should_inject() {
            Ok(true) => {
                unsafe { set_errno(libc::EDQUOT) };
                return -1;
            }
            Ok(false) => {}
            Err(err) => crate::engine::fatal(&err),
        }
    }
    rc
}

// ---------------------------------------------------------------------------
// read / write — no tracking, straightforward injection.
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn read(fd: c_int, buf: *mut std::ffi::c_void, count: usize) -> isize {
    let Some(addr) = resolve_cached(&READ_ADDR, c"read") else {
        return -1;
    };
    // SAFETY: addr resolved for a `(fd, buf, count) -> isize` signature.
    let real: ReadFn = unsafe { std::mem::transmute(addr) };

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(fd, buf, count) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::EIO) };
            return -1;
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    unsafe { real(fd, buf, count) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn write(fd: c_int, buf: *const std::ffi::c_void, count: usize) -> isize {
    let Some(addr) = resolve_cached(&WRITE_ADDR, c"write") else {
        return -1;
    };
    // SAFETY: addr resolved for a `(fd, buf, count) -> isize` signature.
    let real: WriteFn = unsafe { std::mem::transmute(addr) };

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(fd, buf, count) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::ENOSPC) };
            return -1;
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    unsafe { real(fd, buf, count) }
}

fn fatal_missing_symbol() -> c_int {
    crate::engine::fatal(&failinj_core::EngineError::SymbolResolution { name: "<fd primitive>" })
}
