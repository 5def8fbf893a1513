#![feature(c_variadic)]
// All extern "C" ABI exports accept raw pointers/fds from the program under
// test; the engine validates what it can (fingerprints, table membership)
// but cannot prove C-level pointer validity, so per-function safety comments
// would mostly restate the platform's own `open`/`malloc`/... contracts.
#![allow(clippy::missing_safety_doc)]
//! # failinj-abi
//!
//! `extern "C"` interposition boundary for `failinj`.
//!
//! This crate produces a `cdylib` meant to be preloaded (`LD_PRELOAD`) ahead
//! of the platform's libc. Each wrapper here fingerprints the current call
//! stack, consults `failinj-core`'s injection decision and resource tracker,
//! and then calls through to the *next* binding of the same symbol
//! (`dlsym(RTLD_NEXT, ...)`) — see `symbols.rs`.
//!
//! ```text
//! program under test -> wrapper (this crate) -> injection decision -> real libc symbol
//! ```

pub mod engine;
pub mod fd_abi;
pub mod malloc_abi;
pub mod startup;
pub mod stdio_abi;
pub mod symbols;
pub mod util;

pub use engine::global;
