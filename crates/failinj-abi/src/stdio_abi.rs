//! ABI layer for stream-level stdio: `fopen`/`fmemopen`/
//! `tmpfile`/`fdopen`/`freopen`/`fclose`/`fcloseall`/`fwrite`/`fflush`.
//!
//! `fread` is intentionally not interposed: there is no portable
//! way to mark a stream's error indicator from outside libc, so injecting a
//! short read here could not be honored by the stream's own error-reporting
//! contract.

use std::ffi::{c_char, c_int, c_void};
use std::sync::atomic::AtomicUsize;

use failinj_core::Resource;

use crate::engine::global;
use crate::symbols::resolve_cached;
use crate::util::set_errno;

type FileFn = libc::FILE;

static FOPEN_ADDR: AtomicUsize = AtomicUsize::new(0);
static FMEMOPEN_ADDR: AtomicUsize = AtomicUsize::new(0);
static TMPFILE_ADDR: AtomicUsize = AtomicUsize::new(0);
static FDOPEN_ADDR: AtomicUsize = AtomicUsize::new(0);
static FREOPEN_ADDR: AtomicUsize = AtomicUsize::new(0);
static FCLOSE_ADDR: AtomicUsize = AtomicUsize::new(0);
static FCLOSEALL_ADDR: AtomicUsize = AtomicUsize::new(0);
static FWRITE_ADDR: AtomicUsize = AtomicUsize::new(0);
static FFLUSH_ADDR: AtomicUsize = AtomicUsize::new(0);

macro_rules! real_fn {
    ($cache:expr, $name:expr, $ty:ty, $fallback:expr) => {{
        match resolve_cached($cache, $name) {
            // SAFETY: `$cache` is only ever populated by `resolve_cached`
            // with the address of the real symbol matching `$ty`.
            Some(addr) => unsafe { std::mem::transmute::<usize, $ty>(addr) },
            None => return $fallback,
        }
    }};
}

// ---------------------------------------------------------------------------
// fopen / fmemopen / tmpfile — create a stream
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fopen(pathname: *const c_char, mode: *const c_char) -> *mut FileFn {
    type F = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FileFn;
    let real: F = real_fn!(&FOPEN_ADDR, c"fopen", F, std::ptr::null_mut());

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(pathname, mode) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::EACCES) };
            return std::ptr::null_mut();
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let stream = unsafe { real(pathname, mode) };
    if !stream.is_null() {
        engine.track_create(Resource::Stream, stream as u64);
    }
    stream
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmemopen(buf: *mut c_void, size: usize, mode: *const c_char) -> *mut FileFn {
    type F = unsafe extern "C" fn(*mut c_void, usize, *const c_char) -> *mut FileFn;
    let real: F = real_fn!(&FMEMOPEN_ADDR, c"fmemopen", F, std::ptr::null_mut());

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(buf, size, mode) };
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

    let stream = unsafe { real(buf, size, mode) };
    if !stream.is_null() {
        engine.track_create(Resource::Stream, stream as u64);
    }
    stream
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn tmpfile() -> *mut FileFn {
    type F = unsafe extern "C" fn() -> *mut FileFn;
    let real: F = real_fn!(&TMPFILE_ADDR, c"tmpfile", F, std::ptr::null_mut());

    if failinj_core::gate::is_reentrant() {
        return unsafe { real() };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::EROFS) };
            return std::ptr::null_mut();
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let stream = unsafe { real() };
    if !stream.is_null() {
        engine.track_create(Resource::Stream, stream as u64);
    }
    stream
}

// ---------------------------------------------------------------------------
// fdopen / freopen — create a stream, retiring another resource
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fdopen(fd: c_int, mode: *const c_char) -> *mut FileFn {
    type F = unsafe extern "C" fn(c_int, *const c_char) -> *mut FileFn;
    let real: F = real_fn!(&FDOPEN_ADDR, c"fdopen", F, std::ptr::null_mut());

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(fd, mode) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::EPERM) };
            return std::ptr::null_mut();
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let stream = unsafe { real(fd, mode) };
    if !stream.is_null() {
        engine.track_create(Resource::Stream, stream as u64);
        let untracked_closes = engine.config.untracked_closes.clone();
        engine.track_destroy(
            Resource::Descriptor,
            fd as u64,
            &untracked_closes,
            "Attempted to close untracked file descriptor",
        );
    }
    stream
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn freopen(
    pathname: *const c_char,
    mode: *const c_char,
    stream: *mut FileFn,
) -> *mut FileFn {
    type F = unsafe extern "C" fn(*const c_char, *const c_char, *mut FileFn) -> *mut FileFn;
    let real: F = real_fn!(&FREOPEN_ADDR, c"freopen", F, std::ptr::null_mut());

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(pathname, mode, stream) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::EPERM) };
            return std::ptr::null_mut();
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    let new_stream = unsafe { real(pathname, mode, stream) };
    if !new_stream.is_null() {
        engine.track_create(Resource::Stream, new_stream as u64);
        let untracked_fcloses = engine.config.untracked_fcloses.clone();
        engine.track_destroy(
            Resource::Stream,
            stream as u64,
            &untracked_fcloses,
            "Attempted to close untracked file",
        );
    }
    new_stream
}

// ---------------------------------------------------------------------------
// fclose / fcloseall — "close-like" pattern
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fclose(stream: *mut FileFn) -> c_int {
    type F = unsafe extern "C" fn(*mut FileFn) -> c_int;
    let real: F = real_fn!(&FCLOSE_ADDR, c"fclose", F, libc::EOF);

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(stream) };
    }

    let engine = global();
    let untracked_fcloses = engine.config.untracked_fcloses.clone();
    let rc = unsafe { real(stream) };
    if rc == 0 {
        engine.track_destroy(
            Resource::Stream,
            stream as u64,
            &untracked_fcloses,
            "Attempted to close untracked file",
        );

        match engine.should_inject() {
            Ok(true) => {
                unsafe { set_errno(libc::ENOSPC) };
                return libc::EOF;
            }
            Ok(false) => {}
            Err(err) => crate::engine::fatal(&err),
        }
    }
    rc
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fcloseall() -> c_int {
    type F = unsafe extern "C" fn() -> c_int;
    let real: F = real_fn!(&FCLOSEALL_ADDR, c"fcloseall", F, libc::EOF);

    if failinj_core::gate::is_reentrant() {
        return unsafe { real() };
    }

    let engine = global();
    let rc = unsafe { real() };
    if rc == 0 {
        // Every open stream was just closed by the real fcloseall; drop our
        // shadow entries for all of them rather than trying to recover each
        // individual handle.
        engine.clear_streams();

        match engine.should_inject() {
            Ok(true) => {
                unsafe { set_errno(libc::ENOSPC) };
                return libc::EOF;
            }
            Ok(false) => {}
            Err(err) => crate::engine::fatal(&err),
        }
    }
    rc
}

// ---------------------------------------------------------------------------
// fwrite / fflush — no tracking, straightforward injection
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fwrite(
    ptr: *const c_void,
    size: usize,
    nmemb: usize,
    stream: *mut FileFn,
) -> usize {
    type F = unsafe extern "C" fn(*const c_void, usize, usize, *mut FileFn) -> usize;
    let real: F = real_fn!(&FWRITE_ADDR, c"fwrite", F, 0);

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(ptr, size, nmemb, stream) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::ENOSPC) };
            return 0;
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    unsafe { real(ptr, size, nmemb, stream) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fflush(stream: *mut FileFn) -> c_int {
    type F = unsafe extern "C" fn(*mut FileFn) -> c_int;
    let real: F = real_fn!(&FFLUSH_ADDR, c"fflush", F, libc::EOF);

    if failinj_core::gate::is_reentrant() {
        return unsafe { real(stream) };
    }

    let engine = global();
    match engine.should_inject() {
        Ok(true) => {
            unsafe { set_errno(libc::ENOSPC) };
            return libc::EOF;
        }
        Ok(false) => {}
        Err(err) => crate::engine::fatal(&err),
    }

    unsafe { real(stream) }
}
